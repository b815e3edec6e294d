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

//! Threshold-share distribution across guardians.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use coralkm_core::{
    Clock, Did, GuardianShareUpdateBody, Message, MessageBody, Namespace, RandomSource,
};
use coralkm_crypto::{sss, Dek};
use coralkm_transport::Mediator;

use crate::backup::ShareRecord;
use crate::error::WalletResult;

/// Threshold for `n` guardians: `max(2, ⌈n/2⌉)`.
pub fn threshold_for(n: usize) -> u8 {
    (n.div_ceil(2).max(2)).min(u8::MAX as usize) as u8
}

/// Outcome of one re-split cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ResplitReport {
    pub threshold: u8,
    /// Guardians that confirmed their new share.
    pub issued: Vec<ShareRecord>,
    /// Guardians that did not confirm, with the reason. Not rolled back.
    pub failed: Vec<(Did, String)>,
}

/// Splits the DEK whenever the granted-guardian set changes and hands each
/// guardian exactly one share.
///
/// Cycles are serialized: a guardian added while a re-split is in flight
/// waits for it to finish.
pub struct ShareManager {
    mediator: Arc<dyn Mediator>,
    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    cycle: Mutex<()>,
}

impl ShareManager {
    pub fn new(
        mediator: Arc<dyn Mediator>,
        rng: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mediator,
            rng,
            clock,
            cycle: Mutex::new(()),
        }
    }

    /// Re-split the DEK across `guardians` and push one share to each,
    /// awaiting confirmation per guardian.
    ///
    /// Returns `None` when fewer than two guardians are granted: a single
    /// guardian would hold the full secret, so nothing is distributed.
    /// Share assignment is stable with respect to the order of `guardians`.
    pub async fn resplit(
        &self,
        wallet: &Did,
        dek: &Dek,
        namespace: &Namespace,
        guardians: &[Did],
    ) -> WalletResult<Option<ResplitReport>> {
        let _cycle = self.cycle.lock().await;
        let n = guardians.len();
        if n < 2 {
            info!(guardians = n, "insufficient guardians, skipping re-split");
            return Ok(None);
        }
        let threshold = threshold_for(n);
        let shares = sss::split(self.rng.as_ref(), dek, n as u8, threshold)?;
        info!(guardians = n, threshold, "re-splitting key");

        let mut report = ResplitReport {
            threshold,
            issued: Vec::with_capacity(n),
            failed: Vec::new(),
        };
        for (guardian, share) in guardians.iter().zip(shares) {
            let update = Message::new(
                self.rng.uuid(),
                wallet.clone(),
                vec![guardian.clone()],
                MessageBody::GuardianShareUpdate(GuardianShareUpdateBody {
                    namespace: namespace.clone(),
                    threshold,
                    share,
                    delay: None,
                }),
            );
            match self.mediator.request(update).await {
                Ok(reply) if reply.body == MessageBody::GuardianShareUpdateConfirm => {
                    report.issued.push(ShareRecord {
                        guardian: guardian.clone(),
                        namespace: namespace.clone(),
                        threshold,
                        updated_at: self.clock.now(),
                    });
                }
                Ok(reply) => {
                    warn!(guardian = %guardian, reply = %reply.message_type(), "unexpected share-update reply");
                    report
                        .failed
                        .push((guardian.clone(), format!("unexpected reply: {}", reply.message_type())));
                }
                Err(err) => {
                    warn!(guardian = %guardian, %err, "share update failed");
                    report.failed.push((guardian.clone(), err.to_string()));
                }
            }
        }
        Ok(Some(report))
    }
}
