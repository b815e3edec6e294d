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

//! Backup plaintext.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coralkm_core::{Did, Namespace};

/// The wallet's record of one share it issued to a guardian.
///
/// Share bytes themselves stay with the guardian; the wallet only keeps
/// enough to know which guardians hold current shares and at what
/// threshold, so a restored wallet can tell stale guardians from live ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub guardian: Did,
    pub namespace: Namespace,
    pub threshold: u8,
    pub updated_at: DateTime<Utc>,
}

/// Plaintext of the wallet backup, encrypted under the DEK with the
/// namespace as associated data before it leaves the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBackup {
    /// Identities this wallet knows itself and its guardians by.
    pub identifiers: Vec<Did>,
    /// Exported keys, base64url-encoded, keyed by key id.
    pub keys: BTreeMap<String, String>,
    /// Current share records, one per granted guardian.
    pub shares: Vec<ShareRecord>,
}

impl WalletBackup {
    /// Guardians holding a current share according to this backup.
    pub fn guardians(&self) -> impl Iterator<Item = &Did> {
        self.shares.iter().map(|record| &record.guardian)
    }
}
