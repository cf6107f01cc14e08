//! Concrete storage and credential protection for Picpost.
//! Passphrase key derivation, AES-GCM credential sealing, and a file-backed
//! implementation of the record store contract.

pub mod credential_cipher;
pub mod file_record_store;
pub mod key_derivation;
