//! Core abstractions for Picpost: record types, the keyed document store
//! contract, and the write-request validator.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod records;
pub mod store;
pub mod validation;
