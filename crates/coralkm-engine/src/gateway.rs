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

//! Gateway-role handlers: namespace provisioning, backup sync, and
//! recovery fan-out.

use std::sync::Arc;

use tracing::{info, warn};

use coralkm_core::{
    Did, Message, MessageBody, NamespaceDenyBody, NamespaceGrantBody,
    NamespaceRecoveryRequestBody, NamespaceSyncBody, NamespaceSyncResponseBody, PolicyStatus,
    ProtocolError, ProtocolResult, RandomSource, SyncOp,
};
use coralkm_store::NamespaceStore;
use coralkm_transport::Dispatch;

/// Gateway side of the protocol.
pub struct GatewayRole {
    did: Did,
    store: Arc<dyn NamespaceStore>,
    rng: Arc<dyn RandomSource>,
}

impl GatewayRole {
    pub fn new(did: Did, store: Arc<dyn NamespaceStore>, rng: Arc<dyn RandomSource>) -> Self {
        Self { did, store, rng }
    }

    pub(crate) async fn handle(&self, message: &Message) -> ProtocolResult<Vec<Dispatch>> {
        match &message.body {
            MessageBody::NamespaceRequest => self.handle_namespace_request(message).await,
            MessageBody::NamespaceSync(body) => self.handle_sync(message, body).await,
            MessageBody::NamespaceRecoveryRequest(body) => {
                self.handle_recovery_request(message, body).await
            }
            other => Err(ProtocolError::UnsupportedMessageType(
                other.message_type().to_string(),
            )),
        }
    }

    /// Provision a namespace. An absent policy defaults to allow; only a
    /// pre-seeded `Denied` entry turns the wallet away.
    async fn handle_namespace_request(&self, message: &Message) -> ProtocolResult<Vec<Dispatch>> {
        if self.store.policy(&message.from).await? == Some(PolicyStatus::Denied) {
            info!(requester = %message.from, "namespace request denied by policy");
            let deny = MessageBody::NamespaceDeny(NamespaceDenyBody {
                reason: Some("denied by policy".to_string()),
            });
            return Ok(vec![Dispatch::Reply(message.reply(
                self.rng.uuid(),
                self.did.clone(),
                deny,
            ))]);
        }
        let namespace = self.store.create(message.from.clone()).await?;
        info!(requester = %message.from, namespace = %namespace.id, "namespace granted");
        Ok(vec![Dispatch::Reply(message.reply(
            self.rng.uuid(),
            self.did.clone(),
            MessageBody::NamespaceGrant(NamespaceGrantBody { namespace }),
        ))])
    }

    async fn handle_sync(
        &self,
        message: &Message,
        body: &NamespaceSyncBody,
    ) -> ProtocolResult<Vec<Dispatch>> {
        let response = match body.request {
            SyncOp::Put => {
                let data = body.data.clone().ok_or_else(|| {
                    ProtocolError::InvalidArgument("PUT requires data".to_string())
                })?;
                let hash = self.store.save_data(&message.from, data).await?;
                info!(owner = %message.from, "backup stored");
                NamespaceSyncResponseBody {
                    request: SyncOp::Put,
                    hash: Some(hex::encode(hash)),
                    data: None,
                }
            }
            SyncOp::Get => {
                let record = match body.recovery_id {
                    Some(id) => {
                        // Deliberately unauthenticated (see design notes):
                        // a recovering device holds no credentials yet.
                        // Deployments must gate this on a verified ceremony.
                        warn!(namespace = %id, caller = %message.from, "recovery read of namespace backup");
                        self.store.namespace_by_id(id).await?
                    }
                    None => self.store.namespace_by_owner(&message.from).await?,
                };
                let record = record.ok_or_else(|| {
                    ProtocolError::NamespaceNotFound(
                        body.recovery_id
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| message.from.to_string()),
                    )
                })?;
                let data = record.data.ok_or_else(|| {
                    ProtocolError::InvalidArgument("namespace has no backup data".to_string())
                })?;
                NamespaceSyncResponseBody {
                    request: SyncOp::Get,
                    hash: None,
                    data: Some(data),
                }
            }
        };
        Ok(vec![Dispatch::Reply(message.reply(
            self.rng.uuid(),
            self.did.clone(),
            MessageBody::NamespaceSyncResponse(response),
        ))])
    }

    /// Fan a recovery request out to every reachable party. Guardians of
    /// the namespace act on it; everyone else drops it silently, so the
    /// broadcast reveals nothing about who guards what.
    async fn handle_recovery_request(
        &self,
        message: &Message,
        body: &NamespaceRecoveryRequestBody,
    ) -> ProtocolResult<Vec<Dispatch>> {
        if body.namespace.gateway_did != self.did {
            return Err(ProtocolError::InvalidArgument(
                "namespace belongs to a different gateway".to_string(),
            ));
        }
        if self
            .store
            .namespace_by_id(body.namespace.id)
            .await?
            .is_none()
        {
            return Err(ProtocolError::NamespaceNotFound(
                body.namespace.id.to_string(),
            ));
        }
        info!(namespace = %body.namespace.id, device = %body.device_did, "fanning out recovery request");
        Ok(vec![Dispatch::Broadcast(message.clone())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coralkm_core::{ManualClock, SeededRandomSource};
    use coralkm_store::InMemoryNamespaceStore;
    use uuid::Uuid;

    fn did(s: &str) -> Did {
        Did::new_unchecked(s)
    }

    fn gateway() -> GatewayRole {
        let gw = did("did:coral:gw");
        let store = Arc::new(InMemoryNamespaceStore::new(
            gw.clone(),
            Arc::new(ManualClock::new(Utc::now())),
            Arc::new(SeededRandomSource::new(3)),
        ));
        GatewayRole::new(gw, store, Arc::new(SeededRandomSource::new(4)))
    }

    fn namespace_request(from: &Did) -> Message {
        Message::new(
            Uuid::new_v4(),
            from.clone(),
            vec![did("did:coral:gw")],
            MessageBody::NamespaceRequest,
        )
    }

    #[tokio::test]
    async fn test_namespace_request_grants_with_thid() {
        let gateway = gateway();
        let request = namespace_request(&did("did:coral:w"));
        let dispatches = gateway.handle(&request).await.unwrap();
        assert_eq!(dispatches.len(), 1);
        let reply = dispatches[0].message();
        assert_eq!(reply.thid, Some(request.id));
        assert_eq!(reply.to, vec![did("did:coral:w")]);
        match &reply.body {
            MessageBody::NamespaceGrant(grant) => {
                assert_eq!(grant.namespace.gateway_did, did("did:coral:gw"));
            }
            other => panic!("expected grant, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_namespace_request_denied_by_policy() {
        let gateway = gateway();
        gateway
            .store
            .set_policy(did("did:coral:w"), PolicyStatus::Denied)
            .await
            .unwrap();
        let request = namespace_request(&did("did:coral:w"));
        let dispatches = gateway.handle(&request).await.unwrap();
        match &dispatches[0].message().body {
            MessageBody::NamespaceDeny(deny) => {
                assert_eq!(deny.reason.as_deref(), Some("denied by policy"));
            }
            other => panic!("expected deny, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_put_replies_with_hash_of_stored_bytes() {
        let gateway = gateway();
        let wallet = did("did:coral:w");
        gateway.store.create(wallet.clone()).await.unwrap();

        let sync = Message::new(
            Uuid::new_v4(),
            wallet,
            vec![did("did:coral:gw")],
            MessageBody::NamespaceSync(NamespaceSyncBody {
                request: SyncOp::Put,
                data: Some(vec![1, 2, 3]),
                recovery_id: None,
            }),
        );
        let dispatches = gateway.handle(&sync).await.unwrap();
        match &dispatches[0].message().body {
            MessageBody::NamespaceSyncResponse(response) => {
                use sha2::{Digest, Sha256};
                let expected = hex::encode(Sha256::digest([1u8, 2, 3]));
                assert_eq!(response.hash.as_deref(), Some(expected.as_str()));
            }
            other => panic!("expected sync response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_by_recovery_id_returns_backup() {
        let gateway = gateway();
        let wallet = did("did:coral:w");
        let namespace = gateway.store.create(wallet.clone()).await.unwrap();
        gateway
            .store
            .save_data(&wallet, vec![9, 9, 9])
            .await
            .unwrap();

        let get = Message::new(
            Uuid::new_v4(),
            did("did:coral:new-device"),
            vec![did("did:coral:gw")],
            MessageBody::NamespaceSync(NamespaceSyncBody {
                request: SyncOp::Get,
                data: None,
                recovery_id: Some(namespace.id),
            }),
        );
        let dispatches = gateway.handle(&get).await.unwrap();
        match &dispatches[0].message().body {
            MessageBody::NamespaceSyncResponse(response) => {
                assert_eq!(response.data.as_deref(), Some([9u8, 9, 9].as_slice()));
            }
            other => panic!("expected sync response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_unknown_namespace_fails() {
        let gateway = gateway();
        let get = Message::new(
            Uuid::new_v4(),
            did("did:coral:w"),
            vec![did("did:coral:gw")],
            MessageBody::NamespaceSync(NamespaceSyncBody {
                request: SyncOp::Get,
                data: None,
                recovery_id: None,
            }),
        );
        assert!(matches!(
            gateway.handle(&get).await,
            Err(ProtocolError::NamespaceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_recovery_request_broadcasts_unchanged() {
        let gateway = gateway();
        let wallet = did("did:coral:w");
        let namespace = gateway.store.create(wallet).await.unwrap();

        let request_id = Uuid::new_v4();
        let request = Message::new(
            request_id,
            did("did:coral:new-device"),
            vec![did("did:coral:gw")],
            MessageBody::NamespaceRecoveryRequest(NamespaceRecoveryRequestBody {
                device_did: did("did:coral:new-device"),
                namespace,
                expires_at: Utc::now() + chrono::Duration::hours(24),
                request_id: Some(request_id),
            }),
        );
        let dispatches = gateway.handle(&request).await.unwrap();
        assert_eq!(dispatches, vec![Dispatch::Broadcast(request)]);
    }

    #[tokio::test]
    async fn test_recovery_request_for_unknown_namespace_fails() {
        let gateway = gateway();
        let request_id = Uuid::new_v4();
        let request = Message::new(
            request_id,
            did("did:coral:new-device"),
            vec![did("did:coral:gw")],
            MessageBody::NamespaceRecoveryRequest(NamespaceRecoveryRequestBody {
                device_did: did("did:coral:new-device"),
                namespace: coralkm_core::Namespace::new(Uuid::new_v4(), did("did:coral:gw")),
                expires_at: Utc::now() + chrono::Duration::hours(24),
                request_id: Some(request_id),
            }),
        );
        assert!(matches!(
            gateway.handle(&request).await,
            Err(ProtocolError::NamespaceNotFound(_))
        ));
    }
}
