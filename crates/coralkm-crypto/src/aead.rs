//! Authenticated encryption for wallet backups.
//!
//! AES-256-GCM with a 96-bit random IV and a 128-bit tag appended to the
//! ciphertext. Associated data, when present, is the canonical JSON
//! serialization (object keys sorted, recursively) of a caller context;
//! CoralKM binds every backup to its namespace this way. AD presence must
//! match between encrypt and decrypt; a mismatch fails before any
//! decryption is attempted.

use aes_gcm::aead::{Aead as _, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use coralkm_core::RandomSource;

use crate::dek::Dek;
use crate::error::{CryptoError, CryptoResult};

const ALG: &str = "AES-GCM";
const ENVELOPE_VERSION: u32 = 1;
const IV_LEN: usize = 12;

/// Serialized ciphertext envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AeadEnvelope {
    pub alg: String,
    pub v: u32,
    /// Base64url IV.
    pub iv: String,
    /// Base64url ciphertext including the GCM tag.
    pub ct: String,
    /// Base64url associated data, if any was bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad: Option<String>,
}

impl AeadEnvelope {
    /// Exact bytes stored and hashed by the gateway.
    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))
    }
}

/// AES-256-GCM engine with an injected randomness source for IVs.
pub struct Aead {
    rng: Arc<dyn RandomSource>,
}

impl Aead {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self { rng }
    }

    /// Encrypt `plaintext`, binding it to `ad` when given.
    pub fn encrypt(
        &self,
        key: &Dek,
        plaintext: &[u8],
        ad: Option<&Value>,
    ) -> CryptoResult<AeadEnvelope> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;
        let mut iv = [0u8; IV_LEN];
        self.rng.fill_bytes(&mut iv);
        let aad_bytes = ad.map(|value| canonical_json(value).into_bytes());
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad: aad_bytes.as_deref().unwrap_or(&[]),
                },
            )
            .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;
        Ok(AeadEnvelope {
            alg: ALG.to_string(),
            v: ENVELOPE_VERSION,
            iv: URL_SAFE_NO_PAD.encode(iv),
            ct: URL_SAFE_NO_PAD.encode(ciphertext),
            aad: aad_bytes.map(|bytes| URL_SAFE_NO_PAD.encode(bytes)),
        })
    }

    /// Decrypt an envelope, checking that `ad` matches what was bound at
    /// encryption time before touching the ciphertext.
    pub fn decrypt(
        &self,
        key: &Dek,
        envelope: &AeadEnvelope,
        ad: Option<&Value>,
    ) -> CryptoResult<Vec<u8>> {
        if envelope.alg != ALG {
            return Err(CryptoError::UnsupportedAlgorithm(envelope.alg.clone()));
        }
        let stored_aad = envelope
            .aad
            .as_deref()
            .map(|text| {
                URL_SAFE_NO_PAD
                    .decode(text)
                    .map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))
            })
            .transpose()?;
        let aad_bytes = match (&stored_aad, ad) {
            (None, None) => None,
            (Some(stored), Some(value)) => {
                let expected = canonical_json(value).into_bytes();
                if !bool::from(stored.ct_eq(&expected)) {
                    return Err(CryptoError::AadMismatch);
                }
                Some(expected)
            }
            // Presence mismatch in either direction.
            _ => return Err(CryptoError::AadMismatch),
        };
        let iv = URL_SAFE_NO_PAD
            .decode(&envelope.iv)
            .map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))?;
        if iv.len() != IV_LEN {
            return Err(CryptoError::InvalidEnvelope(format!(
                "iv must be {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(&envelope.ct)
            .map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::DecryptFailed(e.to_string()))?;
        cipher
            .decrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &ciphertext,
                    aad: aad_bytes.as_deref().unwrap_or(&[]),
                },
            )
            .map_err(|e| CryptoError::DecryptFailed(e.to_string()))
    }
}

/// Canonical JSON: object keys sorted lexicographically at every level,
/// no insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
