//! Error types for the cipher engine.

use std::fmt;

/// Errors produced while constructing tables or running the cipher.
///
/// Every failure is caused by invalid caller input and is detected before
/// any transform runs; the engine never returns a partially transformed
/// block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherError {
    /// A candidate S-box or P-box is not a permutation of its index range
    /// (wrong length, out-of-range entry, or duplicate entry).
    InvalidTable,
    /// A block, round key, table, or bit vector does not match the
    /// configured cipher width.
    InvalidLength,
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherError::InvalidTable => {
                write!(f, "table is not a permutation of its index range")
            }
            CipherError::InvalidLength => {
                write!(f, "length does not match the configured cipher width")
            }
        }
    }
}

impl std::error::Error for CipherError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            format!("{}", CipherError::InvalidTable),
            "table is not a permutation of its index range"
        );
        assert_eq!(
            format!("{}", CipherError::InvalidLength),
            "length does not match the configured cipher width"
        );
    }
}
