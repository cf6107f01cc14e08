//! Picpost server library: configuration, store wiring, and the HTTP routes.
//! The binary entry point is in main.rs; integration tests build the router from here.

pub mod config;
pub mod routes;
pub mod storage;
