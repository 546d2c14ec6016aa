//! Digest-algorithm registry
//!
//! Maps the algorithm field of a key line to a [`DigestAlgorithm`] and checks
//! that an implementation is actually linked in. Without the
//! `digest-registry` feature there is no registry: the field must start with
//! `M`/`m` and MD5 is assumed.

use std::fmt;
use thiserror::Error;

/// Digest kinds a key may be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    /// Recognised names with no implementation in this build
    Md4,
    Sha,
    Ripemd160,
    Mdc2,
}

/// Reasons the algorithm field did not resolve to a usable digest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlgorithmError {
    #[error("no key type")]
    Missing,

    #[error("invalid type '{0}'")]
    Unknown(String),

    #[error("no algorithm for type {0}")]
    Unavailable(DigestAlgorithm),
}

impl DigestAlgorithm {
    /// Canonical upper-case name
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA1",
            DigestAlgorithm::Sha224 => "SHA224",
            DigestAlgorithm::Sha256 => "SHA256",
            DigestAlgorithm::Sha384 => "SHA384",
            DigestAlgorithm::Sha512 => "SHA512",
            DigestAlgorithm::Md4 => "MD4",
            DigestAlgorithm::Sha => "SHA",
            DigestAlgorithm::Ripemd160 => "RMD160",
            DigestAlgorithm::Mdc2 => "MDC2",
        }
    }

    /// Look up a name, case-insensitively, ignoring hyphens
    ///
    /// A bare `M` is the historical spelling of MD5.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let algorithm = match normalized.as_str() {
            "M" | "MD5" => DigestAlgorithm::Md5,
            "SHA1" => DigestAlgorithm::Sha1,
            "SHA224" => DigestAlgorithm::Sha224,
            "SHA256" => DigestAlgorithm::Sha256,
            "SHA384" => DigestAlgorithm::Sha384,
            "SHA512" => DigestAlgorithm::Sha512,
            "MD4" => DigestAlgorithm::Md4,
            "SHA" => DigestAlgorithm::Sha,
            "RMD160" | "RIPEMD160" => DigestAlgorithm::Ripemd160,
            "MDC2" => DigestAlgorithm::Mdc2,
            _ => return None,
        };
        Some(algorithm)
    }

    /// Output length in bytes, or `None` when no implementation is linked
    #[cfg(feature = "digest-registry")]
    pub fn digest_len(self) -> Option<usize> {
        use sha2::Digest;

        let len = match self {
            DigestAlgorithm::Md5 => md5::compute(b"").0.len(),
            DigestAlgorithm::Sha1 => sha1::Sha1::digest(b"").len(),
            DigestAlgorithm::Sha224 => sha2::Sha224::digest(b"").len(),
            DigestAlgorithm::Sha256 => sha2::Sha256::digest(b"").len(),
            DigestAlgorithm::Sha384 => sha2::Sha384::digest(b"").len(),
            DigestAlgorithm::Sha512 => sha2::Sha512::digest(b"").len(),
            DigestAlgorithm::Md4
            | DigestAlgorithm::Sha
            | DigestAlgorithm::Ripemd160
            | DigestAlgorithm::Mdc2 => return None,
        };
        Some(len)
    }

    /// Output length in bytes, or `None` when no implementation is linked
    #[cfg(not(feature = "digest-registry"))]
    pub fn digest_len(self) -> Option<usize> {
        match self {
            DigestAlgorithm::Md5 => Some(16),
            _ => None,
        }
    }

    pub fn is_available(self) -> bool {
        self.digest_len().is_some()
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve the algorithm field of a key line
#[cfg(feature = "digest-registry")]
pub fn resolve_algorithm(token: Option<&[u8]>) -> Result<DigestAlgorithm, AlgorithmError> {
    let token = token.ok_or(AlgorithmError::Missing)?;
    let name = String::from_utf8_lossy(token);

    let algorithm =
        DigestAlgorithm::from_name(&name).ok_or_else(|| AlgorithmError::Unknown(name.to_string()))?;
    if !algorithm.is_available() {
        return Err(AlgorithmError::Unavailable(algorithm));
    }
    Ok(algorithm)
}

/// Resolve the algorithm field of a key line
///
/// No registry: only the legacy `M` prefix is accepted and MD5 is assumed.
#[cfg(not(feature = "digest-registry"))]
pub fn resolve_algorithm(token: Option<&[u8]>) -> Result<DigestAlgorithm, AlgorithmError> {
    let token = token.ok_or(AlgorithmError::Missing)?;
    match token.first() {
        Some(b'M') | Some(b'm') => Ok(DigestAlgorithm::Md5),
        _ => Err(AlgorithmError::Unknown(
            String::from_utf8_lossy(token).into_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_case_insensitive() {
        assert_eq!(DigestAlgorithm::from_name("md5"), Some(DigestAlgorithm::Md5));
        assert_eq!(DigestAlgorithm::from_name("M"), Some(DigestAlgorithm::Md5));
        assert_eq!(DigestAlgorithm::from_name("m"), Some(DigestAlgorithm::Md5));
        assert_eq!(DigestAlgorithm::from_name("Sha-256"), Some(DigestAlgorithm::Sha256));
        assert_eq!(DigestAlgorithm::from_name("ripemd160"), Some(DigestAlgorithm::Ripemd160));
        assert_eq!(DigestAlgorithm::from_name("BLAKE3"), None);
    }

    #[test]
    fn test_name_round_trips() {
        for algorithm in [
            DigestAlgorithm::Md5,
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha224,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
            DigestAlgorithm::Md4,
            DigestAlgorithm::Sha,
            DigestAlgorithm::Ripemd160,
            DigestAlgorithm::Mdc2,
        ] {
            assert_eq!(DigestAlgorithm::from_name(algorithm.name()), Some(algorithm));
        }
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(resolve_algorithm(None), Err(AlgorithmError::Missing));
    }

    #[cfg(feature = "digest-registry")]
    #[test]
    fn test_registry_resolves_implemented() {
        assert_eq!(resolve_algorithm(Some(b"MD5")), Ok(DigestAlgorithm::Md5));
        assert_eq!(resolve_algorithm(Some(b"sha1")), Ok(DigestAlgorithm::Sha1));
        assert_eq!(resolve_algorithm(Some(b"SHA512")), Ok(DigestAlgorithm::Sha512));
        assert_eq!(DigestAlgorithm::Md5.digest_len(), Some(16));
        assert_eq!(DigestAlgorithm::Sha1.digest_len(), Some(20));
        assert_eq!(DigestAlgorithm::Sha256.digest_len(), Some(32));
    }

    #[cfg(feature = "digest-registry")]
    #[test]
    fn test_registry_rejects_unknown_and_unavailable() {
        assert_eq!(
            resolve_algorithm(Some(b"WHIRLPOOL")),
            Err(AlgorithmError::Unknown("WHIRLPOOL".to_string()))
        );
        assert_eq!(
            resolve_algorithm(Some(b"MD4")),
            Err(AlgorithmError::Unavailable(DigestAlgorithm::Md4))
        );
        // The legacy prefix rule does not apply when a registry exists
        assert!(resolve_algorithm(Some(b"Mxyz")).is_err());
    }

    #[cfg(not(feature = "digest-registry"))]
    #[test]
    fn test_fallback_accepts_m_prefix_only() {
        assert_eq!(resolve_algorithm(Some(b"M")), Ok(DigestAlgorithm::Md5));
        assert_eq!(resolve_algorithm(Some(b"md5")), Ok(DigestAlgorithm::Md5));
        assert_eq!(resolve_algorithm(Some(b"Mxyz")), Ok(DigestAlgorithm::Md5));
        assert!(resolve_algorithm(Some(b"SHA1")).is_err());
    }
}
