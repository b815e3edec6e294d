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

//! Wallet-role message handling.
//!
//! The handler plugs into a `ProtocolEngine` and covers everything a wallet
//! receives outside of directly-awaited request/response pairs: recovery
//! sub-dialogs (challenges, released shares, the restore fetch), namespace
//! grants, and problem reports.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use coralkm_core::{
    Clock, Did, GuardianReleaseShareBody, GuardianVerificationChallengeBody,
    GuardianVerificationChallengeResponseBody, Message, MessageBody, NamespaceSyncBody,
    NamespaceSyncResponseBody, ProblemReportBody, ProtocolError, ProtocolResult, RandomSource,
    SyncOp, VerificationChallenge,
};
use coralkm_engine::WalletRole;
use coralkm_transport::Dispatch;

use crate::events::WalletEvent;
use crate::state::{PendingChallenge, PendingRestore, WalletState};
use crate::sync::NamespaceSync;

/// Produces the user's answer to a verification challenge, when one can be
/// produced without a human in the loop.
#[async_trait]
pub trait ChallengeResponder: Send + Sync {
    /// `None` leaves the challenge pending for an interactive answer.
    async fn respond(&self, challenge: &VerificationChallenge) -> Option<String>;
}

/// Demo responder: always answers with a fixed code.
pub struct FixedCodeResponder {
    code: String,
}

impl FixedCodeResponder {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[async_trait]
impl ChallengeResponder for FixedCodeResponder {
    async fn respond(&self, _challenge: &VerificationChallenge) -> Option<String> {
        Some(self.code.clone())
    }
}

/// Inbound wallet-role handler; shares state with the facade.
pub struct WalletHandler {
    did: Did,
    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    state: Arc<RwLock<WalletState>>,
    sync: NamespaceSync,
    events: mpsc::Sender<WalletEvent>,
    responder: Option<Arc<dyn ChallengeResponder>>,
}

impl WalletHandler {
    pub(crate) fn new(
        did: Did,
        rng: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
        state: Arc<RwLock<WalletState>>,
        events: mpsc::Sender<WalletEvent>,
        responder: Option<Arc<dyn ChallengeResponder>>,
    ) -> Self {
        let sync = NamespaceSync::new(rng.clone());
        Self {
            did,
            rng,
            clock,
            state,
            sync,
            events,
            responder,
        }
    }

    fn emit(&self, event: WalletEvent) {
        if let Err(err) = self.events.try_send(event) {
            debug!(%err, "dropping wallet event");
        }
    }

    async fn on_challenge(
        &self,
        message: &Message,
        body: &GuardianVerificationChallengeBody,
    ) -> ProtocolResult<Vec<Dispatch>> {
        let ceremony = message.pthid.ok_or_else(|| {
            ProtocolError::InvalidArgument("verification challenge requires pthid".to_string())
        })?;
        {
            let state = self.state.read().await;
            if state.coordinator.ceremony_id() != Some(ceremony) {
                debug!(ceremony = %ceremony, "ignoring challenge for unknown ceremony");
                return Ok(vec![]);
            }
        }
        self.emit(WalletEvent::VerificationRequested {
            guardian: message.from.clone(),
            ceremony,
            challenge: body.challenge.clone(),
        });
        if let Some(responder) = &self.responder {
            if let Some(response) = responder.respond(&body.challenge).await {
                let reply = message.reply(
                    self.rng.uuid(),
                    self.did.clone(),
                    MessageBody::GuardianVerificationChallengeResponse(
                        GuardianVerificationChallengeResponseBody {
                            challenge_id: body.challenge.id,
                            response,
                        },
                    ),
                );
                return Ok(vec![Dispatch::Reply(reply)]);
            }
        }
        self.state.write().await.pending_challenges.push(PendingChallenge {
            guardian: message.from.clone(),
            ceremony,
            message_id: message.id,
            challenge: body.challenge.clone(),
        });
        Ok(vec![])
    }

    async fn on_release_share(
        &self,
        message: &Message,
        body: &GuardianReleaseShareBody,
    ) -> ProtocolResult<Vec<Dispatch>> {
        let ceremony = message.pthid.ok_or_else(|| {
            ProtocolError::InvalidArgument("released share requires pthid".to_string())
        })?;
        let mut state = self.state.write().await;
        if state.pending_restore.is_some() {
            debug!(from = %message.from, "restore already in flight, ignoring share");
            return Ok(vec![]);
        }
        let accepted = state.coordinator.accept_share(
            self.clock.now(),
            ceremony,
            &message.from,
            body.share.clone(),
            body.threshold,
        );
        match accepted {
            Ok(maybe_dek) => {
                self.emit(WalletEvent::RecoveryShareReceived {
                    guardian: message.from.clone(),
                    collected: state.coordinator.collected(),
                    threshold: body.threshold,
                });
                let Some(dek) = maybe_dek else {
                    return Ok(vec![]);
                };
                let namespace = state
                    .coordinator
                    .namespace()
                    .cloned()
                    .ok_or_else(|| ProtocolError::InternalError("ceremony vanished".into()))?;
                let get = Message::new(
                    self.rng.uuid(),
                    self.did.clone(),
                    vec![namespace.gateway_did.clone()],
                    MessageBody::NamespaceSync(NamespaceSyncBody {
                        request: SyncOp::Get,
                        data: None,
                        recovery_id: Some(namespace.id),
                    }),
                );
                state.pending_restore = Some(PendingRestore {
                    get_id: get.id,
                    dek,
                    namespace,
                });
                Ok(vec![Dispatch::Reply(get)])
            }
            Err(crate::WalletError::NoActiveRecovery) => {
                debug!(from = %message.from, "ignoring share with no recovery in flight");
                Ok(vec![])
            }
            Err(err) => {
                state.coordinator.clear();
                state.pending_restore = None;
                self.emit(WalletEvent::RecoveryFailed {
                    reason: err.to_string(),
                });
                Ok(vec![])
            }
        }
    }

    async fn on_sync_response(
        &self,
        message: &Message,
        body: &NamespaceSyncResponseBody,
    ) -> ProtocolResult<Vec<Dispatch>> {
        let mut state = self.state.write().await;
        let Some(pending) = state.pending_restore.take() else {
            debug!(kind = ?body.request, "sync response with nothing pending");
            return Ok(vec![]);
        };
        if message.thid != Some(pending.get_id) {
            state.pending_restore = Some(pending);
            debug!("sync response does not thread to the restore fetch");
            return Ok(vec![]);
        }
        let restored = body
            .data
            .as_deref()
            .ok_or_else(|| crate::WalletError::UnexpectedReply("GET response without data".into()))
            .and_then(|data| self.sync.decrypt_backup(&pending.dek, &pending.namespace, data));
        match restored {
            Ok(backup) => {
                state.dek = Some(pending.dek);
                state.namespace = Some(pending.namespace);
                state.guardians = backup.shares.iter().map(|r| r.guardian.clone()).collect();
                state.share_records = backup
                    .shares
                    .iter()
                    .map(|r| (r.guardian.clone(), r.clone()))
                    .collect();
                state.backup = Some(backup.clone());
                state.coordinator.clear();
                self.emit(WalletEvent::RecoveryRestored { backup });
            }
            Err(err) => {
                warn!(%err, "restore failed");
                state.coordinator.clear();
                self.emit(WalletEvent::RecoveryFailed {
                    reason: err.to_string(),
                });
            }
        }
        Ok(vec![])
    }

    fn on_problem_report(&self, message: &Message, body: &ProblemReportBody) {
        warn!(
            from = %message.from,
            code = %body.code,
            comment = %body.rendered_comment(),
            "problem report received"
        );
        self.emit(WalletEvent::ProblemReported {
            from: message.from.clone(),
            code: body.code.clone(),
            comment: body.rendered_comment(),
        });
    }
}

#[async_trait]
impl WalletRole for WalletHandler {
    async fn handle(&self, message: &Message) -> ProtocolResult<Vec<Dispatch>> {
        match &message.body {
            MessageBody::NamespaceGrant(body) => {
                self.state.write().await.namespace = Some(body.namespace.clone());
                self.emit(WalletEvent::NamespaceGranted {
                    namespace: body.namespace.clone(),
                });
                Ok(vec![])
            }
            MessageBody::NamespaceDeny(body) => {
                self.emit(WalletEvent::NamespaceDenied {
                    reason: body.reason.clone(),
                });
                Ok(vec![])
            }
            MessageBody::NamespaceSyncResponse(body) => self.on_sync_response(message, body).await,
            MessageBody::GuardianVerificationChallenge(body) => {
                self.on_challenge(message, body).await
            }
            MessageBody::GuardianReleaseShare(body) => self.on_release_share(message, body).await,
            MessageBody::ProblemReport(body) => {
                self.on_problem_report(message, body);
                Ok(vec![])
            }
            // Grants and confirms are consumed by the awaiting request;
            // one arriving here is late or unsolicited. Log and move on.
            MessageBody::GuardianGrant
            | MessageBody::GuardianDeny(_)
            | MessageBody::GuardianRemoveConfirm
            | MessageBody::GuardianShareUpdateConfirm => {
                debug!(from = %message.from, kind = %message.message_type(), "unsolicited confirmation");
                Ok(vec![])
            }
            other => Err(ProtocolError::UnsupportedMessageType(
                other.message_type().to_string(),
            )),
        }
    }
}
