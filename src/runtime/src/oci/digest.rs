//! Content addresses (`algorithm:hex`).

use sha2::{Digest as _, Sha256};

use stackport_core::error::{RebaseError, Result};

const DEFAULT_ALGORITHM: &str = "sha256";

/// A content address such as a layer diff id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    pub algorithm: String,
    pub hex: String,
}

impl Digest {
    /// Parse `sha256:<hex>` or a bare `<hex>` (assumed sha256).
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let (algorithm, hex) = match value.split_once(':') {
            Some((algorithm, hex)) => (algorithm, hex),
            None => (DEFAULT_ALGORITHM, value),
        };

        if algorithm.is_empty() || hex.is_empty() {
            return Err(RebaseError::OciImageError(format!(
                "Invalid digest '{}': expected algorithm:hex",
                value
            )));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }

    /// SHA-256 of `data`.
    pub fn sha256(data: &[u8]) -> Self {
        Self {
            algorithm: DEFAULT_ALGORITHM.to_string(),
            hex: hex::encode(Sha256::digest(data)),
        }
    }

    /// Compare the hex portion against `hex`, ignoring case.
    pub fn matches_hex(&self, hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(hex)
    }
}

/// Strip an optional `algorithm:` prefix.
pub fn bare_hex(value: &str) -> &str {
    value.trim().split_once(':').map_or(value.trim(), |(_, hex)| hex)
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}
