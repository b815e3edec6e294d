//! Crypto error types.

use coralkm_core::ProtocolError;
use thiserror::Error;

/// Result type alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CryptoError {
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("unsupported AEAD algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Associated data absent on one side, or present with different bytes.
    #[error("associated data mismatch")]
    AadMismatch,

    #[error("encryption failed: {0}")]
    EncryptFailed(String),

    #[error("decryption failed: {0}")]
    DecryptFailed(String),

    #[error("invalid ciphertext envelope: {0}")]
    InvalidEnvelope(String),

    #[error("invalid share parameters: threshold {threshold} of {count}")]
    InvalidShareParameters { threshold: u8, count: u8 },

    #[error("insufficient shares: need {required}, have {provided}")]
    InsufficientShares { required: usize, provided: usize },

    #[error("corrupt share")]
    CorruptShare,
}

impl From<CryptoError> for ProtocolError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AadMismatch => ProtocolError::AeadAadMismatch,
            CryptoError::UnsupportedAlgorithm(alg) => ProtocolError::AeadUnsupportedAlg(alg),
            CryptoError::InsufficientShares { required, provided } => {
                ProtocolError::SssInsufficientShares { required, provided }
            }
            CryptoError::CorruptShare => ProtocolError::SssCorruptShare,
            CryptoError::InvalidShareParameters { .. } | CryptoError::InvalidKeyLength(_) => {
                ProtocolError::InvalidArgument(err.to_string())
            }
            other => ProtocolError::InternalError(other.to_string()),
        }
    }
}
