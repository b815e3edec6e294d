// Copyright 2025 CoralKM Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Backup encryption for namespace sync.
//!
//! The namespace object is the AEAD associated data, so a backup ciphertext
//! is cryptographically bound to its namespace: a blob swapped between
//! wallets fails decryption with an AAD mismatch instead of silently
//! decrypting into someone else's state.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use coralkm_core::{Namespace, RandomSource};
use coralkm_crypto::{Aead, AeadEnvelope, Dek};

use crate::backup::WalletBackup;
use crate::error::{WalletError, WalletResult};

/// Encrypts and decrypts wallet backups for the PUT/GET sync flow.
pub struct NamespaceSync {
    aead: Aead,
}

impl NamespaceSync {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self {
            aead: Aead::new(rng),
        }
    }

    /// Serialize and encrypt a backup; the returned bytes are exactly what
    /// the gateway stores and hashes.
    pub fn encrypt_backup(
        &self,
        dek: &Dek,
        namespace: &Namespace,
        backup: &WalletBackup,
    ) -> WalletResult<Vec<u8>> {
        let plaintext = serde_json::to_vec(backup)
            .map_err(|e| WalletError::UnexpectedReply(e.to_string()))?;
        let envelope = self
            .aead
            .encrypt(dek, &plaintext, Some(&namespace.aad_value()))?;
        Ok(envelope.to_bytes()?)
    }

    /// Decrypt gateway-held bytes back into a backup.
    pub fn decrypt_backup(
        &self,
        dek: &Dek,
        namespace: &Namespace,
        data: &[u8],
    ) -> WalletResult<WalletBackup> {
        let envelope = AeadEnvelope::from_bytes(data)?;
        let plaintext = self
            .aead
            .decrypt(dek, &envelope, Some(&namespace.aad_value()))?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| WalletError::UnexpectedReply(format!("malformed backup: {e}")))
    }

    /// Hex SHA-256 of the exact bytes handed to the gateway, for comparing
    /// against the PUT acknowledgement.
    pub fn hash_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }
}
