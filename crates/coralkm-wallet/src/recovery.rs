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

//! Wallet-side recovery ceremony tracking.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use coralkm_core::{Did, Namespace, ProtocolError};
use coralkm_crypto::{sss, Dek};

use crate::error::{WalletError, WalletResult};

#[derive(Debug)]
struct Ceremony {
    id: Uuid,
    namespace: Namespace,
    expires_at: DateTime<Utc>,
    /// Shares keyed by releasing guardian, so a guardian releasing twice
    /// cannot double-count toward the threshold.
    shares: BTreeMap<Did, Vec<u8>>,
    threshold: Option<u8>,
}

/// Tracks the wallet's single outstanding recovery and collects released
/// shares until the threshold is met.
#[derive(Debug, Default)]
pub struct RecoveryCoordinator {
    current: Option<Ceremony>,
}

impl RecoveryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a ceremony. At most one may be in flight.
    pub fn start(
        &mut self,
        id: Uuid,
        namespace: Namespace,
        expires_at: DateTime<Utc>,
    ) -> WalletResult<()> {
        if self.current.is_some() {
            return Err(WalletError::RecoveryInProgress);
        }
        info!(ceremony = %id, namespace = %namespace.id, "recovery started");
        self.current = Some(Ceremony {
            id,
            namespace,
            expires_at,
            shares: BTreeMap::new(),
            threshold: None,
        });
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn ceremony_id(&self) -> Option<Uuid> {
        self.current.as_ref().map(|c| c.id)
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.current.as_ref().map(|c| &c.namespace)
    }

    pub fn collected(&self) -> usize {
        self.current.as_ref().map_or(0, |c| c.shares.len())
    }

    /// Record a released share. Returns the reconstructed DEK once enough
    /// distinct guardians have released theirs.
    ///
    /// Shares referencing a ceremony other than the current one are
    /// ignored; duplicates from the same guardian are deduped. A ceremony
    /// past its deadline is cleared and the share refused with `Expired`.
    pub fn accept_share(
        &mut self,
        now: DateTime<Utc>,
        ceremony: Uuid,
        guardian: &Did,
        share: Vec<u8>,
        threshold: u8,
    ) -> WalletResult<Option<Dek>> {
        let Some(current) = self.current.as_mut() else {
            return Err(WalletError::NoActiveRecovery);
        };
        if current.id != ceremony {
            debug!(expected = %current.id, got = %ceremony, "ignoring share for stale ceremony");
            return Ok(None);
        }
        if now >= current.expires_at {
            self.current = None;
            return Err(WalletError::Protocol(ProtocolError::Expired));
        }
        if current.shares.contains_key(guardian) {
            debug!(guardian = %guardian, "ignoring duplicate share");
            return Ok(None);
        }
        current.shares.insert(guardian.clone(), share);
        current.threshold = Some(current.threshold.map_or(threshold, |t| t.max(threshold)));
        let needed = current.threshold.unwrap_or(u8::MAX) as usize;
        info!(
            ceremony = %current.id,
            guardian = %guardian,
            collected = current.shares.len(),
            needed,
            "share received"
        );
        if current.shares.len() < needed {
            return Ok(None);
        }
        let shares: Vec<Vec<u8>> = current.shares.values().cloned().collect();
        let dek = sss::combine(&shares)?;
        info!(ceremony = %current.id, "threshold met, key reconstructed");
        Ok(Some(dek))
    }

    /// Drop the current ceremony, successful or not.
    pub fn clear(&mut self) {
        self.current = None;
    }
}
