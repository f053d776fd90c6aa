//! Core library components.
//!
//! Rotation orchestration, the at-rest cipher, the backup ledger and
//! master key recovery. Nothing in here prints; the CLI layer owns output.

pub mod backup;
pub mod cipher;
pub mod config;
pub mod constants;
pub mod fs;
pub mod generator;
pub mod recovery;
pub mod registry;
pub mod retry;
pub mod rotation;
pub mod store;
pub mod types;
