//! Per-line entry builder
//!
//! A key line is `<key_id> <algorithm> <secret> [<addr>[,<addr>...]]`.
//! Fields are read in that order and the first failure rejects the line.
//! Bad access-list segments are reported separately and only drop the
//! segment.

use std::fmt;
use std::ops::ControlFlow;
use thiserror::Error;

use super::access::parse_access_list;
use super::digest::{resolve_algorithm, AlgorithmError};
use super::secret::{decode_secret, SecretError, MAX_SECRET_LEN};
use super::store::{KeyId, KeyRecord, MAX_KEY_ID};
use super::tokenizer::Tokenizer;

/// Error categories reported by the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FileUnreadable,
    InvalidKeyId,
    KeyIdOutOfRange,
    UnsupportedAlgorithm,
    InvalidSecret,
    InvalidAddress,
    TooManyErrors,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::FileUnreadable => "file_unreadable",
            ErrorKind::InvalidKeyId => "invalid_key_id",
            ErrorKind::KeyIdOutOfRange => "key_id_out_of_range",
            ErrorKind::UnsupportedAlgorithm => "unsupported_algorithm",
            ErrorKind::InvalidSecret => "invalid_secret",
            ErrorKind::InvalidAddress => "invalid_address",
            ErrorKind::TooManyErrors => "too_many_errors",
        };
        f.write_str(name)
    }
}

/// A malformed key line or access-list segment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("cannot change key {token}")]
    InvalidKeyId { token: String },

    #[error("key {token} > {max} reserved for Autokey")]
    KeyIdOutOfRange { token: String, max: KeyId },

    #[error("{source} for key {key_id}")]
    UnsupportedAlgorithm {
        key_id: KeyId,
        source: AlgorithmError,
    },

    #[error("{source} for key {key_id}")]
    InvalidSecret { key_id: KeyId, source: SecretError },

    #[error("invalid IP address <{segment}> for key {key_id}")]
    InvalidAddress { key_id: KeyId, segment: String },
}

impl EntryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EntryError::InvalidKeyId { .. } => ErrorKind::InvalidKeyId,
            EntryError::KeyIdOutOfRange { .. } => ErrorKind::KeyIdOutOfRange,
            EntryError::UnsupportedAlgorithm { .. } => ErrorKind::UnsupportedAlgorithm,
            EntryError::InvalidSecret { .. } => ErrorKind::InvalidSecret,
            EntryError::InvalidAddress { .. } => ErrorKind::InvalidAddress,
        }
    }
}

/// Result of reading one line
#[derive(Debug)]
pub enum LineOutcome {
    /// Blank or comment-only line
    Empty,
    Entry(KeyRecord),
    Rejected(EntryError),
}

/// Builds [`KeyRecord`]s from key file lines
#[derive(Debug, Clone, Copy)]
pub struct EntryBuilder {
    max_key_id: KeyId,
    max_secret_len: usize,
}

impl Default for EntryBuilder {
    fn default() -> Self {
        Self::new(MAX_KEY_ID)
    }
}

impl EntryBuilder {
    /// `max_key_id` is clamped to [`MAX_KEY_ID`]
    pub fn new(max_key_id: KeyId) -> Self {
        Self {
            max_key_id: max_key_id.min(MAX_KEY_ID),
            max_secret_len: MAX_SECRET_LEN,
        }
    }

    /// Read one line
    ///
    /// Invalid access-list segments are passed to `on_bad_address` as they
    /// are found; it decides whether the rest of the list is read.
    pub fn parse_line<F>(&self, line: &[u8], on_bad_address: F) -> LineOutcome
    where
        F: FnMut(EntryError) -> ControlFlow<()>,
    {
        let mut tokens = Tokenizer::new(line);
        let Some(first) = tokens.next_token() else {
            return LineOutcome::Empty;
        };

        match self.build(first, &mut tokens, on_bad_address) {
            Ok(record) => LineOutcome::Entry(record),
            Err(err) => LineOutcome::Rejected(err),
        }
    }

    fn build<F>(
        &self,
        id_token: &[u8],
        tokens: &mut Tokenizer<'_>,
        mut on_bad_address: F,
    ) -> Result<KeyRecord, EntryError>
    where
        F: FnMut(EntryError) -> ControlFlow<()>,
    {
        let key_id = self.read_key_id(id_token)?;

        let algorithm = resolve_algorithm(tokens.next_token())
            .map_err(|source| EntryError::UnsupportedAlgorithm { key_id, source })?;

        let secret_token = tokens.next_token().ok_or(EntryError::InvalidSecret {
            key_id,
            source: SecretError::Missing,
        })?;
        let secret = decode_secret(secret_token, self.max_secret_len)
            .map_err(|source| EntryError::InvalidSecret { key_id, source })?;

        let access_list = match tokens.next_token() {
            Some(list) => parse_access_list(list, |bad| {
                on_bad_address(EntryError::InvalidAddress {
                    key_id,
                    segment: bad.0,
                })
            }),
            None => Vec::new(),
        };

        KeyRecord::new(key_id, algorithm, secret, access_list)
    }

    fn read_key_id(&self, token: &[u8]) -> Result<KeyId, EntryError> {
        let text = String::from_utf8_lossy(token);
        if !token.iter().all(u8::is_ascii_digit) {
            return Err(EntryError::InvalidKeyId {
                token: text.into_owned(),
            });
        }

        // All digits: anything that does not fit is simply too large
        let out_of_range = || EntryError::KeyIdOutOfRange {
            token: text.to_string(),
            max: self.max_key_id,
        };
        let value = text.parse::<u64>().map_err(|_| out_of_range())?;
        if value == 0 {
            return Err(EntryError::InvalidKeyId {
                token: text.to_string(),
            });
        }
        if value > u64::from(self.max_key_id) {
            return Err(out_of_range());
        }
        KeyId::try_from(value).map_err(|_| out_of_range())
    }
}
