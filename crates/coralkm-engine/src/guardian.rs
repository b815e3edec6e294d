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

//! Guardian-role handlers: lifecycle, share custody, and the verification
//! side of recovery ceremonies.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use coralkm_core::{
    Clock, Did, GuardianDenyBody, GuardianReleaseShareBody, GuardianShareUpdateBody,
    GuardianVerificationChallengeBody, GuardianVerificationChallengeResponseBody, Message,
    MessageBody, NamespaceRecoveryRequestBody, PolicyStatus, ProtocolError, ProtocolResult,
    RandomSource, RecoveryRequest,
};
use coralkm_store::GuardianStore;
use coralkm_transport::Dispatch;

use crate::verification::VerificationPolicy;

/// Guardian side of the protocol.
pub struct GuardianRole {
    did: Did,
    store: Arc<dyn GuardianStore>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    verification: Arc<dyn VerificationPolicy>,
}

impl GuardianRole {
    pub fn new(
        did: Did,
        store: Arc<dyn GuardianStore>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
        verification: Arc<dyn VerificationPolicy>,
    ) -> Self {
        Self {
            did,
            store,
            clock,
            rng,
            verification,
        }
    }

    pub(crate) async fn handle(&self, message: &Message) -> ProtocolResult<Vec<Dispatch>> {
        match &message.body {
            MessageBody::GuardianRequest => self.handle_guardian_request(message).await,
            MessageBody::GuardianRemove => self.handle_guardian_remove(message).await,
            MessageBody::GuardianShareUpdate(body) => {
                self.handle_share_update(message, body).await
            }
            MessageBody::NamespaceRecoveryRequest(body) => {
                self.handle_recovery_request(message, body).await
            }
            MessageBody::GuardianVerificationChallengeResponse(body) => {
                self.handle_challenge_response(message, body).await
            }
            other => Err(ProtocolError::UnsupportedMessageType(
                other.message_type().to_string(),
            )),
        }
    }

    /// Accept (or refuse) guardianship. An absent policy defaults to allow;
    /// the granted identity is persisted so later challenges are issued on
    /// behalf of a known wallet, not a transient field.
    async fn handle_guardian_request(&self, message: &Message) -> ProtocolResult<Vec<Dispatch>> {
        if self.store.policy(&message.from).await? == Some(PolicyStatus::Denied) {
            info!(requester = %message.from, "guardian request denied by policy");
            let deny = MessageBody::GuardianDeny(GuardianDenyBody {
                reason: Some("denied by policy".to_string()),
            });
            return Ok(vec![Dispatch::Reply(message.reply(
                self.rng.uuid(),
                self.did.clone(),
                deny,
            ))]);
        }
        self.store
            .set_policy(message.from.clone(), PolicyStatus::Granted)
            .await?;
        info!(requester = %message.from, "guardianship granted");
        Ok(vec![Dispatch::Reply(message.reply(
            self.rng.uuid(),
            self.did.clone(),
            MessageBody::GuardianGrant,
        ))])
    }

    /// Deny the policy and delete every share the wallet owns, as one
    /// transaction, then confirm.
    async fn handle_guardian_remove(&self, message: &Message) -> ProtocolResult<Vec<Dispatch>> {
        self.store.remove_guardian(&message.from).await?;
        info!(owner = %message.from, "guardianship removed, shares purged");
        Ok(vec![Dispatch::Reply(message.reply(
            self.rng.uuid(),
            self.did.clone(),
            MessageBody::GuardianRemoveConfirm,
        ))])
    }

    async fn handle_share_update(
        &self,
        message: &Message,
        body: &GuardianShareUpdateBody,
    ) -> ProtocolResult<Vec<Dispatch>> {
        // The store enforces the granted-policy requirement on upsert.
        self.store
            .save_share(
                &message.from,
                &body.namespace,
                body.threshold,
                body.share.clone(),
            )
            .await?;
        info!(
            owner = %message.from,
            namespace = %body.namespace.id,
            threshold = body.threshold,
            "share updated"
        );
        if let Some(delay) = body.delay {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(vec![Dispatch::Reply(message.reply(
            self.rng.uuid(),
            self.did.clone(),
            MessageBody::GuardianShareUpdateConfirm,
        ))])
    }

    /// A broadcast recovery request reached this party. If it does not
    /// guard the namespace it drops the message with no reply at all;
    /// answering would let anyone enumerate a wallet's guardians.
    async fn handle_recovery_request(
        &self,
        message: &Message,
        body: &NamespaceRecoveryRequestBody,
    ) -> ProtocolResult<Vec<Dispatch>> {
        if !self
            .store
            .is_guardian(&body.namespace.gateway_did, body.namespace.id)
            .await?
        {
            return Err(ProtocolError::NotAGuardian);
        }
        let request = RecoveryRequest {
            id: message.id,
            device_did: body.device_did.clone(),
            namespace: body.namespace.clone(),
            created_at: self.clock.now(),
            expires_at: body.expires_at,
        };
        let challenge = self.verification.issue_challenge(&request).await?;
        self.store.save_recovery_request(request).await?;
        info!(
            ceremony = %message.id,
            device = %body.device_did,
            "recovery request accepted, challenging device"
        );
        Ok(vec![Dispatch::Reply(
            Message::new(
                self.rng.uuid(),
                self.did.clone(),
                vec![body.device_did.clone()],
                MessageBody::GuardianVerificationChallenge(GuardianVerificationChallengeBody {
                    challenge,
                }),
            )
            .with_pthid(message.id),
        )])
    }

    /// Judge a verification response. Expired ceremonies are purged before
    /// any verification runs; a failed response consumes the request.
    async fn handle_challenge_response(
        &self,
        message: &Message,
        body: &GuardianVerificationChallengeResponseBody,
    ) -> ProtocolResult<Vec<Dispatch>> {
        let ceremony_id = message.pthid.ok_or_else(|| {
            ProtocolError::InvalidArgument("verification response requires pthid".to_string())
        })?;
        let Some(request) = self.store.recovery_request(ceremony_id).await? else {
            return Err(ProtocolError::InvalidArgument(
                "no outstanding recovery for pthid".to_string(),
            ));
        };
        if request.is_expired(self.clock.now()) {
            self.store.delete_recovery_request(request.id).await?;
            warn!(ceremony = %request.id, "recovery request expired, dropping response");
            return Ok(vec![]);
        }
        let verified = self
            .verification
            .verify_response(&request, body.challenge_id, &body.response)
            .await?;
        self.store.delete_recovery_request(request.id).await?;
        if !verified {
            warn!(ceremony = %request.id, device = %message.from, "verification failed");
            return Ok(vec![]);
        }
        let share = self
            .store
            .share(&request.namespace.gateway_did, request.namespace.id)
            .await?
            .ok_or(ProtocolError::NotAGuardian)?;
        info!(ceremony = %request.id, device = %request.device_did, "releasing share");
        Ok(vec![Dispatch::Reply(
            Message::new(
                self.rng.uuid(),
                self.did.clone(),
                vec![request.device_did.clone()],
                MessageBody::GuardianReleaseShare(GuardianReleaseShareBody {
                    share: share.share,
                    threshold: share.threshold,
                }),
            )
            .with_pthid(request.id),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use coralkm_core::{ManualClock, Namespace, SeededRandomSource};
    use coralkm_store::InMemoryGuardianStore;
    use uuid::Uuid;

    use crate::verification::FixedCodeVerification;

    fn did(s: &str) -> Did {
        Did::new_unchecked(s)
    }

    struct Fixture {
        guardian: GuardianRole,
        clock: Arc<ManualClock>,
        namespace: Namespace,
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let rng = Arc::new(SeededRandomSource::new(5));
        let store = Arc::new(InMemoryGuardianStore::new(clock.clone()));
        let guardian = GuardianRole::new(
            did("did:coral:g1"),
            store,
            clock.clone(),
            rng.clone(),
            Arc::new(FixedCodeVerification::new(rng)),
        );
        let namespace = Namespace::new(Uuid::new_v4(), did("did:coral:gw"));
        Fixture {
            guardian,
            clock,
            namespace,
        }
    }

    /// Run the grant + share-update flow so the guardian holds a share.
    async fn seed_share(fixture: &Fixture, wallet: &Did, share: Vec<u8>) {
        let request = Message::new(
            Uuid::new_v4(),
            wallet.clone(),
            vec![did("did:coral:g1")],
            MessageBody::GuardianRequest,
        );
        fixture.guardian.handle(&request).await.unwrap();
        let update = Message::new(
            Uuid::new_v4(),
            wallet.clone(),
            vec![did("did:coral:g1")],
            MessageBody::GuardianShareUpdate(GuardianShareUpdateBody {
                namespace: fixture.namespace.clone(),
                threshold: 2,
                share,
                delay: None,
            }),
        );
        fixture.guardian.handle(&update).await.unwrap();
    }

    fn recovery_request(fixture: &Fixture, device: &Did) -> Message {
        let id = Uuid::new_v4();
        Message::new(
            id,
            device.clone(),
            vec![did("did:coral:gw")],
            MessageBody::NamespaceRecoveryRequest(NamespaceRecoveryRequestBody {
                device_did: device.clone(),
                namespace: fixture.namespace.clone(),
                expires_at: fixture.clock.now() + ChronoDuration::hours(24),
                request_id: Some(id),
            }),
        )
    }

    #[tokio::test]
    async fn test_guardian_request_grants_and_persists_policy() {
        let fixture = fixture().await;
        let wallet = did("did:coral:w");
        let request = Message::new(
            Uuid::new_v4(),
            wallet.clone(),
            vec![did("did:coral:g1")],
            MessageBody::GuardianRequest,
        );
        let dispatches = fixture.guardian.handle(&request).await.unwrap();
        let reply = dispatches[0].message();
        assert_eq!(reply.body, MessageBody::GuardianGrant);
        assert_eq!(reply.thid, Some(request.id));
        assert_eq!(
            fixture.guardian.store.policy(&wallet).await.unwrap(),
            Some(PolicyStatus::Granted)
        );
    }

    #[tokio::test]
    async fn test_share_update_without_policy_is_rejected() {
        let fixture = fixture().await;
        let update = Message::new(
            Uuid::new_v4(),
            did("did:coral:stranger"),
            vec![did("did:coral:g1")],
            MessageBody::GuardianShareUpdate(GuardianShareUpdateBody {
                namespace: fixture.namespace.clone(),
                threshold: 2,
                share: vec![1],
                delay: None,
            }),
        );
        assert!(matches!(
            fixture.guardian.handle(&update).await,
            Err(ProtocolError::PolicyNotGranted(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_purges_shares_and_confirms() {
        let fixture = fixture().await;
        let wallet = did("did:coral:w");
        seed_share(&fixture, &wallet, vec![1, 2]).await;

        let remove = Message::new(
            Uuid::new_v4(),
            wallet.clone(),
            vec![did("did:coral:g1")],
            MessageBody::GuardianRemove,
        );
        let dispatches = fixture.guardian.handle(&remove).await.unwrap();
        assert_eq!(dispatches[0].message().body, MessageBody::GuardianRemoveConfirm);
        assert!(fixture.guardian.store.list_shares().await.unwrap().is_empty());
        // A removed guardian cannot be handed a share without a fresh grant.
        let update = Message::new(
            Uuid::new_v4(),
            wallet,
            vec![did("did:coral:g1")],
            MessageBody::GuardianShareUpdate(GuardianShareUpdateBody {
                namespace: fixture.namespace.clone(),
                threshold: 2,
                share: vec![3],
                delay: None,
            }),
        );
        assert!(matches!(
            fixture.guardian.handle(&update).await,
            Err(ProtocolError::PolicyNotGranted(_))
        ));
    }

    #[tokio::test]
    async fn test_recovery_request_challenges_device_under_pthid() {
        let fixture = fixture().await;
        seed_share(&fixture, &did("did:coral:w"), vec![1]).await;

        let device = did("did:coral:new-device");
        let request = recovery_request(&fixture, &device);
        let dispatches = fixture.guardian.handle(&request).await.unwrap();
        let challenge = dispatches[0].message();
        assert_eq!(challenge.pthid, Some(request.id));
        assert_eq!(challenge.to, vec![device]);
        assert!(matches!(
            challenge.body,
            MessageBody::GuardianVerificationChallenge(_)
        ));
    }

    #[tokio::test]
    async fn test_non_guardian_drops_recovery_request_silently() {
        let fixture = fixture().await;
        let request = recovery_request(&fixture, &did("did:coral:new-device"));
        assert_eq!(
            fixture.guardian.handle(&request).await,
            Err(ProtocolError::NotAGuardian)
        );
    }

    #[tokio::test]
    async fn test_valid_response_releases_share_and_consumes_request() {
        let fixture = fixture().await;
        seed_share(&fixture, &did("did:coral:w"), vec![42, 43]).await;

        let device = did("did:coral:new-device");
        let request = recovery_request(&fixture, &device);
        let dispatches = fixture.guardian.handle(&request).await.unwrap();
        let challenge = match &dispatches[0].message().body {
            MessageBody::GuardianVerificationChallenge(body) => body.challenge.clone(),
            other => panic!("expected challenge, got {other:?}"),
        };

        let response = Message::new(
            Uuid::new_v4(),
            device.clone(),
            vec![did("did:coral:g1")],
            MessageBody::GuardianVerificationChallengeResponse(
                GuardianVerificationChallengeResponseBody {
                    challenge_id: challenge.id,
                    response: FixedCodeVerification::DEMO_CODE.to_string(),
                },
            ),
        )
        .with_pthid(request.id);
        let dispatches = fixture.guardian.handle(&response).await.unwrap();
        let release = dispatches[0].message();
        assert_eq!(release.pthid, Some(request.id));
        assert_eq!(release.to, vec![device]);
        match &release.body {
            MessageBody::GuardianReleaseShare(body) => {
                assert_eq!(body.share, vec![42, 43]);
                assert_eq!(body.threshold, 2);
            }
            other => panic!("expected release, got {other:?}"),
        }
        // Request consumed: replaying the response finds nothing.
        assert!(matches!(
            fixture.guardian.handle(&response).await,
            Err(ProtocolError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_code_consumes_request_without_release() {
        let fixture = fixture().await;
        seed_share(&fixture, &did("did:coral:w"), vec![1]).await;

        let device = did("did:coral:new-device");
        let request = recovery_request(&fixture, &device);
        fixture.guardian.handle(&request).await.unwrap();

        let response = Message::new(
            Uuid::new_v4(),
            device,
            vec![did("did:coral:g1")],
            MessageBody::GuardianVerificationChallengeResponse(
                GuardianVerificationChallengeResponseBody {
                    challenge_id: Uuid::new_v4(),
                    response: "wrong".to_string(),
                },
            ),
        )
        .with_pthid(request.id);
        assert_eq!(fixture.guardian.handle(&response).await.unwrap(), vec![]);
        assert!(fixture
            .guardian
            .store
            .recovery_request(request.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_expired_request_is_purged_without_release() {
        let fixture = fixture().await;
        seed_share(&fixture, &did("did:coral:w"), vec![1]).await;

        let device = did("did:coral:new-device");
        let request = recovery_request(&fixture, &device);
        fixture.guardian.handle(&request).await.unwrap();

        fixture.clock.advance(ChronoDuration::hours(25));
        let response = Message::new(
            Uuid::new_v4(),
            device,
            vec![did("did:coral:g1")],
            MessageBody::GuardianVerificationChallengeResponse(
                GuardianVerificationChallengeResponseBody {
                    challenge_id: Uuid::new_v4(),
                    response: FixedCodeVerification::DEMO_CODE.to_string(),
                },
            ),
        )
        .with_pthid(request.id);
        assert_eq!(fixture.guardian.handle(&response).await.unwrap(), vec![]);
        assert!(fixture
            .guardian
            .store
            .recovery_request(request.id)
            .await
            .unwrap()
            .is_none());
    }
}
