//! Symmetric authentication keys
//!
//! A key file is read line by line into a staging list. Only a file that
//! is valid in its entirety replaces the keys in the [`KeyStore`]; readers
//! hold an immutable [`KeySet`] snapshot that is never modified in place.

pub mod access;
pub mod budget;
pub mod digest;
pub mod entry;
pub mod loader;
pub mod secret;
pub mod store;
pub mod tokenizer;

pub use access::{AccessRestriction, Scope};
pub use budget::ErrorBudget;
pub use digest::DigestAlgorithm;
pub use entry::{EntryBuilder, EntryError, ErrorKind};
pub use loader::{load_keys, AbortReason, KeyLoader, LoadOutcome, LoaderLimits};
pub use secret::KeySecret;
pub use store::{KeyId, KeyRecord, KeySet, KeyStore, LoadSession, MAX_KEY_ID};
