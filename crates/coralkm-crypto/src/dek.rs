//! Data-encryption key.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use coralkm_core::RandomSource;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// DEK length in bytes (AES-256).
pub const DEK_LEN: usize = 32;

/// The wallet's data-encryption key.
///
/// Lives only in wallet memory; leaves it exclusively as threshold shares or
/// as the base64url export embedded in the encrypted backup. Never
/// transmitted in plaintext, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Dek([u8; DEK_LEN]);

impl Dek {
    /// Generate a fresh random key.
    pub fn generate(rng: &dyn RandomSource) -> Self {
        let mut bytes = [0u8; DEK_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; DEK_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; DEK_LEN] {
        &self.0
    }

    /// Base64url export for persistence inside the backup plaintext.
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn from_base64url(text: &str) -> CryptoResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(text)
            .map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl PartialEq for Dek {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Dek {}

impl fmt::Debug for Dek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dek([redacted])")
    }
}
