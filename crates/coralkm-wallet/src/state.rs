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

//! Mutable wallet state shared by the facade and the inbound handler.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use coralkm_core::{Did, Namespace, VerificationChallenge};
use coralkm_crypto::Dek;

use crate::backup::{ShareRecord, WalletBackup};
use crate::recovery::RecoveryCoordinator;

/// A verification challenge awaiting the user's answer.
#[derive(Debug)]
pub(crate) struct PendingChallenge {
    pub guardian: Did,
    pub ceremony: Uuid,
    /// Id of the challenge message, so the answer threads back to it.
    pub message_id: Uuid,
    pub challenge: VerificationChallenge,
}

/// A recovery GET in flight: the key is reconstructed, the backup fetch is
/// out, and the restore completes when the sync response threads back.
#[derive(Debug)]
pub(crate) struct PendingRestore {
    pub get_id: Uuid,
    pub dek: Dek,
    pub namespace: Namespace,
}

/// The DEK is confined here; guardians and the gateway only ever see shares
/// and ciphertext.
#[derive(Default)]
pub(crate) struct WalletState {
    pub dek: Option<Dek>,
    pub namespace: Option<Namespace>,
    /// Granted guardians, in stable iteration order for share assignment.
    pub guardians: BTreeSet<Did>,
    pub share_records: BTreeMap<Did, ShareRecord>,
    pub backup: Option<WalletBackup>,
    pub coordinator: RecoveryCoordinator,
    pub pending_challenges: Vec<PendingChallenge>,
    pub pending_restore: Option<PendingRestore>,
    pub last_sync_hash: Option<String>,
}
