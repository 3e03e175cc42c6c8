// src/hash.rs

//! SHA-256 checksums for source integrity
//!
//! Recipes declare the expected SHA-256 of their source archive either as a
//! bare 64-character hex string or prefixed (`sha256:<hex>`). An empty value
//! is legal and means the source is unverified, which callers must surface
//! to the operator rather than treat as a pass.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Length of a SHA-256 digest in hex characters
pub const SHA256_HEX_LEN: usize = 64;

/// Checksum parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    /// Prefix names an algorithm other than sha256
    UnsupportedAlgorithm(String),
    /// Digest has the wrong number of characters
    InvalidLength { expected: usize, got: usize },
    /// Digest contains non-hex characters
    InvalidHex(String),
}

impl fmt::Display for ChecksumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedAlgorithm(name) => {
                write!(f, "unsupported checksum algorithm: {} (only sha256)", name)
            }
            Self::InvalidLength { expected, got } => {
                write!(f, "invalid sha256 length: expected {}, got {}", expected, got)
            }
            Self::InvalidHex(s) => write!(f, "invalid hex in sha256: {}", s),
        }
    }
}

impl std::error::Error for ChecksumError {}

/// Declared checksum of a source archive
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Checksum {
    /// No checksum declared; integrity is not verified
    #[default]
    Unverified,
    /// Lowercase hex SHA-256 digest
    Sha256(String),
}

impl Checksum {
    /// Parse a recipe `sha256` value
    pub fn parse(value: &str) -> Result<Self, ChecksumError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Self::Unverified);
        }

        let digest = match value.split_once(':') {
            Some((algo, digest)) if algo.eq_ignore_ascii_case("sha256") => digest,
            Some((algo, _)) => return Err(ChecksumError::UnsupportedAlgorithm(algo.to_string())),
            None => value,
        };

        if digest.len() != SHA256_HEX_LEN {
            return Err(ChecksumError::InvalidLength {
                expected: SHA256_HEX_LEN,
                got: digest.len(),
            });
        }
        if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChecksumError::InvalidHex(digest.to_string()));
        }

        Ok(Self::Sha256(digest.to_lowercase()))
    }

    #[inline]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Sha256(_))
    }

    /// The hex digest, if one was declared
    pub fn digest(&self) -> Option<&str> {
        match self {
            Self::Unverified => None,
            Self::Sha256(hex) => Some(hex),
        }
    }

    /// Key used to store a verified archive in the source cache
    pub fn cache_key(&self) -> Option<String> {
        self.digest().map(|hex| format!("sha256_{}", hex))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unverified => f.write_str(""),
            Self::Sha256(hex) => write!(f, "sha256:{}", hex),
        }
    }
}

/// SHA-256 of a byte slice as lowercase hex
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 of everything a reader yields
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of a file, streamed
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    sha256_reader(&mut file)
}
