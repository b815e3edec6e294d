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

//! The wallet facade.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, instrument};
use uuid::Uuid;

use coralkm_core::{
    Clock, Did, Message, MessageBody, Namespace, NamespaceSyncBody,
    NamespaceRecoveryRequestBody, GuardianVerificationChallengeResponseBody, RandomSource,
    SyncOp,
};
use coralkm_crypto::Dek;
use coralkm_engine::WalletRole;
use coralkm_transport::Mediator;

use crate::backup::WalletBackup;
use crate::error::{WalletError, WalletResult};
use crate::events::WalletEvent;
use crate::handler::{ChallengeResponder, WalletHandler};
use crate::share_manager::ShareManager;
use crate::state::WalletState;
use crate::sync::NamespaceSync;

/// Wallet configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// This wallet's identity.
    pub did: Did,
    /// Gateway holding (or to hold) this wallet's namespace.
    pub gateway_did: Did,
    /// Key id under which the DEK is exported inside backups.
    pub key_id: String,
    /// How long a recovery request stays answerable.
    pub recovery_ttl: Duration,
    /// Event channel capacity.
    pub event_buffer: usize,
}

impl WalletConfig {
    pub fn new(did: Did, gateway_did: Did) -> Self {
        Self {
            did,
            gateway_did,
            key_id: "dek".to_string(),
            recovery_ttl: Duration::hours(24),
            event_buffer: 64,
        }
    }

    pub fn with_recovery_ttl(mut self, ttl: Duration) -> Self {
        self.recovery_ttl = ttl;
        self
    }
}

/// Orchestrates the wallet role: namespace provisioning, guardianship and
/// share distribution, backup sync, and recovery.
///
/// Outbound operations go through the mediator with request/response
/// correlation; inbound sub-dialogs are handled by the [`WalletHandler`]
/// this facade shares state with. Register the facade's
/// [`wallet_role`](Self::wallet_role) with a `ProtocolEngine` and the
/// engine with the mediator.
pub struct WalletFacade {
    config: WalletConfig,
    mediator: Arc<dyn Mediator>,
    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    state: Arc<RwLock<WalletState>>,
    handler: Arc<WalletHandler>,
    shares: ShareManager,
    sync: NamespaceSync,
    events_tx: mpsc::Sender<WalletEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<WalletEvent>>>,
    provision: Mutex<()>,
}

impl WalletFacade {
    pub fn new(
        config: WalletConfig,
        mediator: Arc<dyn Mediator>,
        rng: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
        responder: Option<Arc<dyn ChallengeResponder>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer);
        let state = Arc::new(RwLock::new(WalletState::default()));
        let handler = Arc::new(WalletHandler::new(
            config.did.clone(),
            rng.clone(),
            clock.clone(),
            state.clone(),
            events_tx.clone(),
            responder,
        ));
        let shares = ShareManager::new(mediator.clone(), rng.clone(), clock.clone());
        let sync = NamespaceSync::new(rng.clone());
        Self {
            config,
            mediator,
            rng,
            clock,
            state,
            handler,
            shares,
            sync,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            provision: Mutex::new(()),
        }
    }

    pub fn did(&self) -> &Did {
        &self.config.did
    }

    /// Inbound handler to attach to this wallet's `ProtocolEngine`.
    pub fn wallet_role(&self) -> Arc<dyn WalletRole> {
        self.handler.clone()
    }

    /// Take the event stream. Yields `None` after the first call.
    pub async fn events(&self) -> Option<mpsc::Receiver<WalletEvent>> {
        self.events_rx.lock().await.take()
    }

    fn emit(&self, event: WalletEvent) {
        let _ = self.events_tx.try_send(event);
    }

    /// Generate a DEK if the wallet has none yet.
    pub async fn ensure_dek(&self) -> WalletResult<()> {
        let mut state = self.state.write().await;
        if state.dek.is_none() {
            state.dek = Some(Dek::generate(self.rng.as_ref()));
            info!("data-encryption key generated");
        }
        Ok(())
    }

    /// Install a specific DEK (imports, tests).
    pub async fn set_dek(&self, dek: Dek) {
        self.state.write().await.dek = Some(dek);
    }

    pub async fn has_dek(&self) -> bool {
        self.state.read().await.dek.is_some()
    }

    pub async fn namespace(&self) -> Option<Namespace> {
        self.state.read().await.namespace.clone()
    }

    pub async fn guardians(&self) -> Vec<Did> {
        self.state.read().await.guardians.iter().cloned().collect()
    }

    pub async fn recovery_active(&self) -> bool {
        self.state.read().await.coordinator.is_active()
    }

    /// Problem-report replies become typed errors.
    fn expect_ok(&self, reply: Message) -> WalletResult<Message> {
        if let MessageBody::ProblemReport(body) = &reply.body {
            return Err(WalletError::Rejected {
                code: body.code.clone(),
                comment: body.rendered_comment(),
            });
        }
        Ok(reply)
    }

    /// Ask the gateway for a namespace. One in-flight request at a time.
    #[instrument(skip(self), fields(wallet = %self.config.did))]
    pub async fn request_namespace(&self) -> WalletResult<Namespace> {
        let _provision = self.provision.lock().await;
        if let Some(namespace) = self.namespace().await {
            return Ok(namespace);
        }
        let request = Message::new(
            self.rng.uuid(),
            self.config.did.clone(),
            vec![self.config.gateway_did.clone()],
            MessageBody::NamespaceRequest,
        );
        let reply = self.expect_ok(self.mediator.request(request).await?)?;
        match reply.body {
            MessageBody::NamespaceGrant(grant) => {
                self.state.write().await.namespace = Some(grant.namespace.clone());
                self.emit(WalletEvent::NamespaceGranted {
                    namespace: grant.namespace.clone(),
                });
                info!(namespace = %grant.namespace.id, "namespace granted");
                Ok(grant.namespace)
            }
            MessageBody::NamespaceDeny(deny) => {
                self.emit(WalletEvent::NamespaceDenied {
                    reason: deny.reason.clone(),
                });
                Err(WalletError::NamespaceDenied(
                    deny.reason.unwrap_or_else(|| "no reason given".to_string()),
                ))
            }
            other => Err(WalletError::UnexpectedReply(
                other.message_type().to_string(),
            )),
        }
    }

    /// Ask `guardian` to guard this wallet; on grant, re-split and sync.
    #[instrument(skip(self), fields(wallet = %self.config.did, guardian = %guardian))]
    pub async fn add_guardian(&self, guardian: Did) -> WalletResult<()> {
        let request = Message::new(
            self.rng.uuid(),
            self.config.did.clone(),
            vec![guardian.clone()],
            MessageBody::GuardianRequest,
        );
        let reply = self.expect_ok(self.mediator.request(request).await?)?;
        match reply.body {
            MessageBody::GuardianGrant => {
                self.state.write().await.guardians.insert(guardian.clone());
                self.emit(WalletEvent::GuardianGranted {
                    guardian: guardian.clone(),
                });
                info!("guardian granted");
                self.resplit_and_sync().await
            }
            MessageBody::GuardianDeny(deny) => {
                self.emit(WalletEvent::GuardianDenied {
                    guardian: guardian.clone(),
                    reason: deny.reason.clone(),
                });
                Err(WalletError::GuardianDenied {
                    guardian: guardian.to_string(),
                    reason: deny.reason.unwrap_or_else(|| "no reason given".to_string()),
                })
            }
            other => Err(WalletError::UnexpectedReply(
                other.message_type().to_string(),
            )),
        }
    }

    /// Retire `guardian` and re-split across the remaining set.
    #[instrument(skip(self), fields(wallet = %self.config.did, guardian = %guardian))]
    pub async fn remove_guardian(&self, guardian: Did) -> WalletResult<()> {
        let request = Message::new(
            self.rng.uuid(),
            self.config.did.clone(),
            vec![guardian.clone()],
            MessageBody::GuardianRemove,
        );
        let reply = self.expect_ok(self.mediator.request(request).await?)?;
        if reply.body != MessageBody::GuardianRemoveConfirm {
            return Err(WalletError::UnexpectedReply(
                reply.message_type().to_string(),
            ));
        }
        {
            let mut state = self.state.write().await;
            state.guardians.remove(&guardian);
            state.share_records.remove(&guardian);
        }
        self.emit(WalletEvent::GuardianRemoved { guardian });
        self.resplit_and_sync().await
    }

    /// Rotate the DEK: fresh key, fresh shares, fresh backup.
    pub async fn rotate_dek(&self) -> WalletResult<()> {
        self.state.write().await.dek = Some(Dek::generate(self.rng.as_ref()));
        info!("data-encryption key rotated");
        self.resplit_and_sync().await
    }

    /// Re-split the DEK across the current guardian set and persist the
    /// updated share records in the backup.
    pub async fn resplit_and_sync(&self) -> WalletResult<()> {
        let (dek, namespace, guardians) = {
            let state = self.state.read().await;
            (
                state.dek.clone().ok_or(WalletError::NoDek)?,
                state.namespace.clone().ok_or(WalletError::NoNamespace)?,
                state.guardians.iter().cloned().collect::<Vec<_>>(),
            )
        };
        match self
            .shares
            .resplit(&self.config.did, &dek, &namespace, &guardians)
            .await?
        {
            None => {
                // Fewer than two guardians: nothing distributed, any
                // previous records are stale.
                self.state.write().await.share_records.clear();
            }
            Some(report) => {
                for record in &report.issued {
                    self.emit(WalletEvent::ShareUpdateConfirmed {
                        guardian: record.guardian.clone(),
                        threshold: record.threshold,
                    });
                }
                for (guardian, reason) in &report.failed {
                    self.emit(WalletEvent::ShareUpdateFailed {
                        guardian: guardian.clone(),
                        reason: reason.clone(),
                    });
                }
                let mut state = self.state.write().await;
                state.share_records = report
                    .issued
                    .iter()
                    .map(|r| (r.guardian.clone(), r.clone()))
                    .collect();
            }
        }
        self.sync_backup().await.map(|_| ())
    }

    /// Encrypt the wallet backup, PUT it to the gateway, and verify the
    /// acknowledged hash against the bytes sent.
    #[instrument(skip(self), fields(wallet = %self.config.did))]
    pub async fn sync_backup(&self) -> WalletResult<String> {
        let (dek, namespace, backup) = {
            let state = self.state.read().await;
            let dek = state.dek.clone().ok_or(WalletError::NoDek)?;
            let namespace = state.namespace.clone().ok_or(WalletError::NoNamespace)?;
            let mut identifiers = vec![self.config.did.clone()];
            identifiers.extend(state.guardians.iter().cloned());
            let backup = WalletBackup {
                identifiers,
                keys: BTreeMap::from([(self.config.key_id.clone(), dek.to_base64url())]),
                shares: state.share_records.values().cloned().collect(),
            };
            (dek, namespace, backup)
        };
        let data = self.sync.encrypt_backup(&dek, &namespace, &backup)?;
        let computed = NamespaceSync::hash_hex(&data);
        let put = Message::new(
            self.rng.uuid(),
            self.config.did.clone(),
            vec![namespace.gateway_did.clone()],
            MessageBody::NamespaceSync(NamespaceSyncBody {
                request: SyncOp::Put,
                data: Some(data),
                recovery_id: None,
            }),
        );
        let reply = self.expect_ok(self.mediator.request(put).await?)?;
        match reply.body {
            MessageBody::NamespaceSyncResponse(response) if response.request == SyncOp::Put => {
                let reported = response.hash.unwrap_or_default();
                if reported != computed {
                    return Err(WalletError::HashMismatch { reported, computed });
                }
                {
                    let mut state = self.state.write().await;
                    state.backup = Some(backup);
                    state.last_sync_hash = Some(computed.clone());
                }
                self.emit(WalletEvent::BackupSynced {
                    hash: computed.clone(),
                });
                info!(hash = %computed, "backup synced");
                Ok(computed)
            }
            other => Err(WalletError::UnexpectedReply(
                other.message_type().to_string(),
            )),
        }
    }

    /// GET the wallet's own backup back from the gateway and decrypt it.
    pub async fn fetch_backup(&self) -> WalletResult<WalletBackup> {
        let (dek, namespace) = {
            let state = self.state.read().await;
            (
                state.dek.clone().ok_or(WalletError::NoDek)?,
                state.namespace.clone().ok_or(WalletError::NoNamespace)?,
            )
        };
        let get = Message::new(
            self.rng.uuid(),
            self.config.did.clone(),
            vec![namespace.gateway_did.clone()],
            MessageBody::NamespaceSync(NamespaceSyncBody {
                request: SyncOp::Get,
                data: None,
                recovery_id: None,
            }),
        );
        let reply = self.expect_ok(self.mediator.request(get).await?)?;
        match reply.body {
            MessageBody::NamespaceSyncResponse(response) if response.request == SyncOp::Get => {
                let data = response.data.ok_or_else(|| {
                    WalletError::UnexpectedReply("GET response without data".to_string())
                })?;
                self.sync.decrypt_backup(&dek, &namespace, &data)
            }
            other => Err(WalletError::UnexpectedReply(
                other.message_type().to_string(),
            )),
        }
    }

    /// Start a recovery ceremony for `namespace` from this (new) device.
    ///
    /// The request fans out via the gateway; released shares, verification
    /// challenges, and the final restore all arrive through the wallet
    /// handler and surface as events.
    #[instrument(skip(self), fields(wallet = %self.config.did, namespace = %namespace.id))]
    pub async fn start_recovery(&self, namespace: Namespace) -> WalletResult<Uuid> {
        let ceremony = self.rng.uuid();
        let expires_at = self.clock.now() + self.config.recovery_ttl;
        self.state
            .write()
            .await
            .coordinator
            .start(ceremony, namespace.clone(), expires_at)?;
        // The ceremony id is the message id; every sub-dialog references it
        // through pthid.
        let request = Message::new(
            ceremony,
            self.config.did.clone(),
            vec![namespace.gateway_did.clone()],
            MessageBody::NamespaceRecoveryRequest(NamespaceRecoveryRequestBody {
                device_did: self.config.did.clone(),
                namespace,
                expires_at,
                request_id: Some(ceremony),
            }),
        );
        if let Err(err) = self.mediator.send(request).await {
            self.state.write().await.coordinator.clear();
            return Err(err.into());
        }
        info!(ceremony = %ceremony, "recovery requested");
        Ok(ceremony)
    }

    /// Answer a pending verification challenge interactively.
    pub async fn submit_verification(
        &self,
        challenge_id: Uuid,
        response: impl Into<String>,
    ) -> WalletResult<()> {
        let pending = {
            let mut state = self.state.write().await;
            let index = state
                .pending_challenges
                .iter()
                .position(|p| p.challenge.id == challenge_id)
                .ok_or(WalletError::UnknownChallenge(challenge_id))?;
            state.pending_challenges.remove(index)
        };
        let reply = Message::new(
            self.rng.uuid(),
            self.config.did.clone(),
            vec![pending.guardian],
            MessageBody::GuardianVerificationChallengeResponse(
                GuardianVerificationChallengeResponseBody {
                    challenge_id,
                    response: response.into(),
                },
            ),
        )
        .with_thid(pending.message_id)
        .with_pthid(pending.ceremony);
        Ok(self.mediator.send(reply).await?)
    }

    /// Abandon the in-flight recovery, if any.
    pub async fn abort_recovery(&self) {
        let mut state = self.state.write().await;
        if state.coordinator.is_active() {
            state.coordinator.clear();
            state.pending_restore = None;
            self.emit(WalletEvent::RecoveryFailed {
                reason: "aborted".to_string(),
            });
        }
    }
}
