//! Secret decoding and zero-on-drop secret storage
//!
//! Secrets in a key file come in two encodings: short tokens are taken as
//! literal ASCII text, longer tokens are hex-encoded binary.

use constant_time_eq::constant_time_eq;
use thiserror::Error;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Longest token that is taken literally instead of hex-decoded
pub const TEXT_SECRET_MAX_LEN: usize = 20;

/// Upper bound on decoded secret length, in bytes
pub const MAX_SECRET_LEN: usize = 32;

/// Errors produced while decoding a secret token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("no key")]
    Missing,

    #[error("invalid hex digit at position {position}")]
    InvalidHexDigit { position: usize },

    #[error("secret length {len} outside 1..={max}", max = MAX_SECRET_LEN)]
    Length { len: usize },
}

/// Secret key material that is wiped when dropped
///
/// `Debug` and `Display` never print the bytes. Equality is constant time.
pub struct KeySecret {
    data: Vec<u8>,
}

impl KeySecret {
    /// Copy `bytes` into a new secret
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }

    fn zeroed(len: usize) -> Self {
        Self { data: vec![0; len] }
    }

    /// Expose the secret bytes (use with caution)
    pub fn expose(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl PartialEq for KeySecret {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.data, &other.data)
    }
}

impl Eq for KeySecret {}

impl std::fmt::Debug for KeySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeySecret([REDACTED {} bytes])", self.data.len())
    }
}

impl std::fmt::Display for KeySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Zeroize for KeySecret {
    fn zeroize(&mut self) {
        self.data.zeroize();
    }
}

impl Drop for KeySecret {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl ZeroizeOnDrop for KeySecret {}

/// Decode a secret token into at most `max_len` bytes
///
/// Tokens of up to [`TEXT_SECRET_MAX_LEN`] bytes are literal text. Longer
/// tokens are hex; only the first `2 * max_len` digits are read and an odd
/// trailing digit is dropped after being validated.
pub fn decode_secret(token: &[u8], max_len: usize) -> Result<KeySecret, SecretError> {
    if token.is_empty() {
        return Err(SecretError::Missing);
    }

    if token.len() <= TEXT_SECRET_MAX_LEN {
        if token.len() > max_len {
            return Err(SecretError::Length { len: token.len() });
        }
        return Ok(KeySecret::new(token));
    }

    decode_hex_secret(token, max_len)
}

/// Hex-decode the first `2 * max_len` digits of `token`
///
/// Every digit read is validated, including an odd trailing digit that is
/// then dropped.
pub fn decode_hex_secret(token: &[u8], max_len: usize) -> Result<KeySecret, SecretError> {
    let digits = token.len().min(2 * max_len);
    let len = digits / 2;

    // Decode straight into the secret so no unwiped copy is left behind
    let mut secret = KeySecret::zeroed(len);
    hex::decode_to_slice(&token[..len * 2], &mut secret.data).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { index, .. } => {
            SecretError::InvalidHexDigit { position: index }
        }
        _ => SecretError::Length { len },
    })?;

    if digits % 2 == 1 {
        let position = digits - 1;
        if !token[position].is_ascii_hexdigit() {
            return Err(SecretError::InvalidHexDigit { position });
        }
        debug!(digits, "Odd number of hex digits in secret, dropping the last one");
    }
    if len == 0 {
        return Err(SecretError::Length { len });
    }
    Ok(secret)
}
