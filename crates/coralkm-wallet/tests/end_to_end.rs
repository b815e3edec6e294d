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

//! End-to-end protocol scenarios over the in-memory mediator: one gateway,
//! a handful of guardians, and wallets wired through real engines, with
//! every hop passing through the wire codec.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use coralkm_core::{
    Clock, Did, ManualClock, Message, MessageBody, Namespace, NamespaceSyncBody,
    NamespaceSyncResponseBody, OsRandomSource, RandomSource, SyncOp,
};
use coralkm_crypto::{Aead, AeadEnvelope, Dek};
use coralkm_engine::{
    FixedCodeVerification, GatewayRole, GuardianRole, ProtocolEngine,
};
use coralkm_store::{InMemoryGuardianStore, InMemoryNamespaceStore};
use coralkm_transport::{InMemoryMediator, Mediator};
use coralkm_wallet::{
    ChallengeResponder, FixedCodeResponder, NamespaceSync, WalletConfig, WalletEvent,
    WalletFacade,
};

struct TestNet {
    mediator: Arc<InMemoryMediator>,
    clock: Arc<ManualClock>,
    rng: Arc<OsRandomSource>,
}

impl TestNet {
    fn new() -> Self {
        let rng = Arc::new(OsRandomSource);
        Self {
            mediator: Arc::new(InMemoryMediator::new(rng.clone())),
            clock: Arc::new(ManualClock::new(Utc::now())),
            rng,
        }
    }

    async fn spawn_gateway(&self, name: &str) -> Did {
        let did = Did::new_unchecked(name);
        let store = Arc::new(InMemoryNamespaceStore::new(
            did.clone(),
            self.clock.clone() as Arc<dyn Clock>,
            self.rng.clone() as Arc<dyn RandomSource>,
        ));
        let engine = ProtocolEngine::new(did.clone(), self.rng.clone())
            .with_gateway(GatewayRole::new(did.clone(), store, self.rng.clone()));
        self.mediator.register(did.clone(), Arc::new(engine)).await;
        did
    }

    async fn spawn_guardian(&self, name: &str) -> Did {
        let did = Did::new_unchecked(name);
        let store = Arc::new(InMemoryGuardianStore::new(self.clock.clone() as Arc<dyn Clock>));
        let engine = ProtocolEngine::new(did.clone(), self.rng.clone()).with_guardian(
            GuardianRole::new(
                did.clone(),
                store,
                self.clock.clone(),
                self.rng.clone(),
                Arc::new(FixedCodeVerification::new(self.rng.clone())),
            ),
        );
        self.mediator.register(did.clone(), Arc::new(engine)).await;
        did
    }

    async fn spawn_wallet(
        &self,
        name: &str,
        gateway: &Did,
        responder: Option<Arc<dyn ChallengeResponder>>,
    ) -> (Arc<WalletFacade>, mpsc::Receiver<WalletEvent>) {
        let did = Did::new_unchecked(name);
        let facade = Arc::new(WalletFacade::new(
            WalletConfig::new(did.clone(), gateway.clone()),
            self.mediator.clone(),
            self.rng.clone(),
            self.clock.clone(),
            responder,
        ));
        let engine =
            ProtocolEngine::new(did.clone(), self.rng.clone()).with_wallet(facade.wallet_role());
        self.mediator.register(did, Arc::new(engine)).await;
        let events = facade.events().await.expect("event stream");
        (facade, events)
    }
}

fn drain(events: &mut mpsc::Receiver<WalletEvent>) -> Vec<WalletEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn demo_responder() -> Option<Arc<dyn ChallengeResponder>> {
    Some(Arc::new(FixedCodeResponder::new(
        FixedCodeVerification::DEMO_CODE,
    )))
}

/// Provision a wallet with a DEK, namespace, and synced backup.
async fn provision(facade: &WalletFacade) -> Namespace {
    facade.ensure_dek().await.unwrap();
    let namespace = facade.request_namespace().await.unwrap();
    facade.sync_backup().await.unwrap();
    namespace
}

#[tokio::test]
async fn test_provision_put_hash_matches_client_computed() {
    let net = TestNet::new();
    let gateway = net.spawn_gateway("did:coral:gw").await;
    let (wallet, mut events) = net.spawn_wallet("did:coral:w", &gateway, None).await;

    // Zero DEK, ciphertext of {"x":1} bound to the namespace, as the
    // provisioning scenario prescribes.
    let dek = Dek::from_bytes(&[0u8; 32]).unwrap();
    wallet.set_dek(dek.clone()).await;
    let namespace = wallet.request_namespace().await.unwrap();
    assert_eq!(namespace.gateway_did, gateway);

    let aead = Aead::new(Arc::new(OsRandomSource));
    let envelope = aead
        .encrypt(&dek, br#"{"x":1}"#, Some(&namespace.aad_value()))
        .unwrap();
    let data = envelope.to_bytes().unwrap();
    let computed = NamespaceSync::hash_hex(&data);

    let put = Message::new(
        Uuid::new_v4(),
        wallet.did().clone(),
        vec![gateway.clone()],
        MessageBody::NamespaceSync(NamespaceSyncBody {
            request: SyncOp::Put,
            data: Some(data.clone()),
            recovery_id: None,
        }),
    );
    let reply = net.mediator.request(put).await.unwrap();
    match reply.body {
        MessageBody::NamespaceSyncResponse(NamespaceSyncResponseBody {
            request: SyncOp::Put,
            hash: Some(hash),
            ..
        }) => assert_eq!(hash, computed),
        other => panic!("expected PUT response, got {other:?}"),
    }

    // GET returns the exact stored bytes, which decrypt under the same AAD.
    let get = Message::new(
        Uuid::new_v4(),
        wallet.did().clone(),
        vec![gateway],
        MessageBody::NamespaceSync(NamespaceSyncBody {
            request: SyncOp::Get,
            data: None,
            recovery_id: None,
        }),
    );
    let reply = net.mediator.request(get).await.unwrap();
    match reply.body {
        MessageBody::NamespaceSyncResponse(NamespaceSyncResponseBody {
            request: SyncOp::Get,
            data: Some(stored),
            ..
        }) => {
            assert_eq!(stored, data);
            let envelope = AeadEnvelope::from_bytes(&stored).unwrap();
            let plaintext = aead
                .decrypt(&dek, &envelope, Some(&namespace.aad_value()))
                .unwrap();
            assert_eq!(plaintext, br#"{"x":1}"#);
        }
        other => panic!("expected GET response, got {other:?}"),
    }

    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, WalletEvent::NamespaceGranted { .. })));
}

#[tokio::test]
async fn test_two_guardians_get_one_share_each_at_threshold_two() {
    let net = TestNet::new();
    let gateway = net.spawn_gateway("did:coral:gw").await;
    let ga = net.spawn_guardian("did:coral:ga").await;
    let gb = net.spawn_guardian("did:coral:gb").await;
    let (wallet, mut events) = net.spawn_wallet("did:coral:w", &gateway, None).await;

    provision(&wallet).await;
    wallet.add_guardian(ga.clone()).await.unwrap();
    wallet.add_guardian(gb.clone()).await.unwrap();

    let backup = wallet.fetch_backup().await.unwrap();
    assert_eq!(backup.shares.len(), 2);
    assert!(backup.shares.iter().all(|record| record.threshold == 2));
    let mut guardians: Vec<&Did> = backup.guardians().collect();
    guardians.sort();
    assert_eq!(guardians, vec![&ga, &gb]);

    let events = drain(&mut events);
    let confirmed = events
        .iter()
        .filter(|e| matches!(e, WalletEvent::ShareUpdateConfirmed { .. }))
        .count();
    // The solo-GA cycle distributes nothing; both confirmations come from
    // the re-split when GB joins.
    assert_eq!(confirmed, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, WalletEvent::BackupSynced { .. })));
}

#[tokio::test]
async fn test_resplit_on_third_guardian_keeps_threshold_two() {
    let net = TestNet::new();
    let gateway = net.spawn_gateway("did:coral:gw").await;
    let ga = net.spawn_guardian("did:coral:ga").await;
    let gb = net.spawn_guardian("did:coral:gb").await;
    let gc = net.spawn_guardian("did:coral:gc").await;
    let (wallet, _events) = net.spawn_wallet("did:coral:w", &gateway, None).await;

    provision(&wallet).await;
    wallet.add_guardian(ga).await.unwrap();
    wallet.add_guardian(gb).await.unwrap();
    wallet.add_guardian(gc).await.unwrap();

    let backup = wallet.fetch_backup().await.unwrap();
    assert_eq!(backup.shares.len(), 3);
    // n = 3 ⇒ t = max(2, ⌈3/2⌉) = 2.
    assert!(backup.shares.iter().all(|record| record.threshold == 2));
}

#[tokio::test]
async fn test_recovery_happy_path_restores_dek_and_backup() {
    let net = TestNet::new();
    let gateway = net.spawn_gateway("did:coral:gw").await;
    let ga = net.spawn_guardian("did:coral:ga").await;
    let gb = net.spawn_guardian("did:coral:gb").await;
    let (wallet, _w_events) = net.spawn_wallet("did:coral:w", &gateway, None).await;

    let namespace = provision(&wallet).await;
    wallet.add_guardian(ga).await.unwrap();
    wallet.add_guardian(gb).await.unwrap();
    let original = wallet.fetch_backup().await.unwrap();

    // A fresh device that knows only the namespace handle and the
    // out-of-band code.
    let (recovered, mut events) = net
        .spawn_wallet("did:coral:w-new", &gateway, demo_responder())
        .await;
    recovered.start_recovery(namespace.clone()).await.unwrap();

    // The whole ceremony ran inside the fan-out: challenges answered,
    // shares released, backup fetched and decrypted.
    assert!(recovered.has_dek().await);
    assert!(!recovered.recovery_active().await);
    assert_eq!(recovered.namespace().await, Some(namespace));

    let events = drain(&mut events);
    let restored = events.iter().find_map(|e| match e {
        WalletEvent::RecoveryRestored { backup } => Some(backup.clone()),
        _ => None,
    });
    assert_eq!(restored, Some(original.clone()));
    // The restored wallet can decrypt its backup on its own now.
    assert_eq!(recovered.fetch_backup().await.unwrap(), original);
}

#[tokio::test]
async fn test_duplicate_release_does_not_double_count() {
    let net = TestNet::new();
    let gateway = net.spawn_gateway("did:coral:gw").await;
    // Three guardians, threshold two: the first two releases finish the
    // ceremony; a replay of the third must land on a cleared coordinator
    // without effect.
    for name in ["did:coral:ga", "did:coral:gb", "did:coral:gc"] {
        net.spawn_guardian(name).await;
    }
    let (wallet, _w_events) = net.spawn_wallet("did:coral:w", &gateway, None).await;
    let namespace = provision(&wallet).await;
    for name in ["did:coral:ga", "did:coral:gb", "did:coral:gc"] {
        wallet.add_guardian(Did::new_unchecked(name)).await.unwrap();
    }

    let (recovered, mut events) = net
        .spawn_wallet("did:coral:w-new", &gateway, demo_responder())
        .await;
    recovered.start_recovery(namespace).await.unwrap();
    assert!(recovered.has_dek().await);

    let events = drain(&mut events);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, WalletEvent::RecoveryRestored { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_expired_recovery_releases_no_share() {
    let net = TestNet::new();
    let gateway = net.spawn_gateway("did:coral:gw").await;
    let ga = net.spawn_guardian("did:coral:ga").await;
    let gb = net.spawn_guardian("did:coral:gb").await;
    let (wallet, _w_events) = net.spawn_wallet("did:coral:w", &gateway, None).await;
    let namespace = provision(&wallet).await;
    wallet.add_guardian(ga).await.unwrap();
    wallet.add_guardian(gb).await.unwrap();

    // No auto-responder: challenges stay pending until the user answers.
    let (recovered, mut events) = net.spawn_wallet("did:coral:w-new", &gateway, None).await;
    recovered.start_recovery(namespace).await.unwrap();

    let challenges: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            WalletEvent::VerificationRequested { challenge, .. } => Some(challenge),
            _ => None,
        })
        .collect();
    assert_eq!(challenges.len(), 2);

    // Answer only after the request's deadline: guardians must purge the
    // request and drop the response without releasing a share.
    net.clock.advance(chrono::Duration::hours(25));
    for challenge in challenges {
        recovered
            .submit_verification(challenge.id, FixedCodeVerification::DEMO_CODE)
            .await
            .unwrap();
    }

    assert!(!recovered.has_dek().await);
    assert!(recovered.recovery_active().await);
    let events = drain(&mut events);
    assert!(!events
        .iter()
        .any(|e| matches!(e, WalletEvent::RecoveryRestored { .. })));
}

#[tokio::test]
async fn test_wrong_code_releases_no_share() {
    let net = TestNet::new();
    let gateway = net.spawn_gateway("did:coral:gw").await;
    let ga = net.spawn_guardian("did:coral:ga").await;
    let gb = net.spawn_guardian("did:coral:gb").await;
    let (wallet, _w_events) = net.spawn_wallet("did:coral:w", &gateway, None).await;
    let namespace = provision(&wallet).await;
    wallet.add_guardian(ga).await.unwrap();
    wallet.add_guardian(gb).await.unwrap();

    let wrong: Option<Arc<dyn ChallengeResponder>> =
        Some(Arc::new(FixedCodeResponder::new("000000")));
    let (recovered, mut events) = net.spawn_wallet("did:coral:w-new", &gateway, wrong).await;
    recovered.start_recovery(namespace).await.unwrap();

    assert!(!recovered.has_dek().await);
    let events = drain(&mut events);
    assert!(!events
        .iter()
        .any(|e| matches!(e, WalletEvent::RecoveryShareReceived { .. })));
}

#[tokio::test]
async fn test_removed_guardian_cannot_serve_recovery() {
    let net = TestNet::new();
    let gateway = net.spawn_gateway("did:coral:gw").await;
    let ga = net.spawn_guardian("did:coral:ga").await;
    let gb = net.spawn_guardian("did:coral:gb").await;
    let gc = net.spawn_guardian("did:coral:gc").await;
    let (wallet, _w_events) = net.spawn_wallet("did:coral:w", &gateway, None).await;
    let namespace = provision(&wallet).await;
    wallet.add_guardian(ga.clone()).await.unwrap();
    wallet.add_guardian(gb).await.unwrap();
    wallet.add_guardian(gc).await.unwrap();

    wallet.remove_guardian(ga).await.unwrap();
    let backup = wallet.fetch_backup().await.unwrap();
    assert_eq!(backup.shares.len(), 2);

    // The remaining two guardians still recover the wallet.
    let (recovered, _events) = net
        .spawn_wallet("did:coral:w-new", &gateway, demo_responder())
        .await;
    recovered.start_recovery(namespace).await.unwrap();
    assert!(recovered.has_dek().await);
}

#[tokio::test]
async fn test_guardian_typed_request_to_gateway_is_rejected() {
    let net = TestNet::new();
    let gateway = net.spawn_gateway("did:coral:gw").await;
    let (wallet, mut events) = net.spawn_wallet("did:coral:w", &gateway, None).await;

    // Asking the gateway to be a guardian earns a problem report.
    let err = wallet.add_guardian(gateway).await.unwrap_err();
    match err {
        coralkm_wallet::WalletError::Rejected { code, .. } => {
            assert_eq!(code, "invalid-role");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    drain(&mut events);
}
