//! Symmetric authentication key-file loading
//!
//! [`keys::load_keys`] reads a key file and atomically replaces the
//! process-wide key set when, and only when, every entry is valid.

pub mod cli;
pub mod config;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod reload;
pub mod types;

#[cfg(test)]
mod testutil;

pub use keys::{load_keys, KeyStore, LoadOutcome};
