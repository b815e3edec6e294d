//! CoralKM Crypto — DEK handling, authenticated encryption, and threshold
//! secret sharing.
//!
//! Three primitives, all operating on the wallet's 256-bit data-encryption
//! key: [`Dek`] itself (generation, base64url export, zeroize-on-drop), the
//! AES-256-GCM [`Aead`] envelope binding ciphertexts to a canonical-JSON
//! associated-data context, and Shamir [`sss`] split/combine over the raw
//! key bytes.

pub mod aead;
pub mod dek;
pub mod error;
pub mod sss;

pub use aead::{canonical_json, Aead, AeadEnvelope};
pub use dek::{Dek, DEK_LEN};
pub use error::{CryptoError, CryptoResult};
