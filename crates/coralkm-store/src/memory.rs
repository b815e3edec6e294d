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

//! In-memory store implementations (development/testing).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use coralkm_core::{Clock, Did, Namespace, PolicyStatus, RandomSource, RecoveryRequest, Share};

use crate::error::{StoreError, StoreResult};
use crate::guardian::GuardianStore;
use crate::namespace::{NamespaceRecord, NamespaceStore};

#[derive(Default)]
struct NamespaceTables {
    policies: HashMap<Did, PolicyStatus>,
    namespaces: HashMap<Uuid, NamespaceRecord>,
}

/// In-memory gateway store.
pub struct InMemoryNamespaceStore {
    gateway_did: Did,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    tables: RwLock<NamespaceTables>,
}

impl InMemoryNamespaceStore {
    pub fn new(gateway_did: Did, clock: Arc<dyn Clock>, rng: Arc<dyn RandomSource>) -> Self {
        Self {
            gateway_did,
            clock,
            rng,
            tables: RwLock::new(NamespaceTables::default()),
        }
    }
}

#[async_trait]
impl NamespaceStore for InMemoryNamespaceStore {
    async fn policy(&self, requester: &Did) -> StoreResult<Option<PolicyStatus>> {
        Ok(self.tables.read().await.policies.get(requester).copied())
    }

    async fn set_policy(&self, requester: Did, status: PolicyStatus) -> StoreResult<()> {
        self.tables.write().await.policies.insert(requester, status);
        Ok(())
    }

    async fn remove_policy(&self, requester: &Did) -> StoreResult<()> {
        self.tables.write().await.policies.remove(requester);
        Ok(())
    }

    async fn create(&self, owner: Did) -> StoreResult<Namespace> {
        let mut tables = self.tables.write().await;
        if let Some(record) = tables.namespaces.values().find(|r| r.owner == owner) {
            return Ok(record.namespace.clone());
        }
        let namespace = Namespace::new(self.rng.uuid(), self.gateway_did.clone());
        tables.namespaces.insert(
            namespace.id,
            NamespaceRecord {
                namespace: namespace.clone(),
                owner,
                data: None,
                synced_at: None,
                hash: None,
            },
        );
        Ok(namespace)
    }

    async fn namespace_by_id(&self, id: Uuid) -> StoreResult<Option<NamespaceRecord>> {
        Ok(self.tables.read().await.namespaces.get(&id).cloned())
    }

    async fn namespace_by_owner(&self, owner: &Did) -> StoreResult<Option<NamespaceRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .namespaces
            .values()
            .find(|r| &r.owner == owner)
            .cloned())
    }

    async fn rotate_id(&self, owner: &Did) -> StoreResult<Namespace> {
        let mut tables = self.tables.write().await;
        let old_id = tables
            .namespaces
            .values()
            .find(|r| &r.owner == owner)
            .map(|r| r.namespace.id)
            .ok_or_else(|| StoreError::NamespaceNotFound(owner.to_string()))?;
        let mut record = tables
            .namespaces
            .remove(&old_id)
            .ok_or_else(|| StoreError::NamespaceNotFound(old_id.to_string()))?;
        record.namespace.id = self.rng.uuid();
        let namespace = record.namespace.clone();
        tables.namespaces.insert(namespace.id, record);
        Ok(namespace)
    }

    async fn save_data(&self, owner: &Did, data: Vec<u8>) -> StoreResult<[u8; 32]> {
        let mut tables = self.tables.write().await;
        let record = tables
            .namespaces
            .values_mut()
            .find(|r| &r.owner == owner)
            .ok_or_else(|| StoreError::NamespaceNotFound(owner.to_string()))?;
        let hash: [u8; 32] = Sha256::digest(&data).into();
        record.data = Some(data);
        record.synced_at = Some(self.clock.now());
        record.hash = Some(hash);
        Ok(hash)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.tables.write().await.namespaces.remove(&id);
        Ok(())
    }
}

#[derive(Default)]
struct GuardianTables {
    policies: HashMap<Did, PolicyStatus>,
    shares: HashMap<(Did, Uuid), Share>,
    recovery_requests: HashMap<Uuid, RecoveryRequest>,
}

/// In-memory guardian store.
pub struct InMemoryGuardianStore {
    clock: Arc<dyn Clock>,
    tables: RwLock<GuardianTables>,
}

impl InMemoryGuardianStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tables: RwLock::new(GuardianTables::default()),
        }
    }
}

#[async_trait]
impl GuardianStore for InMemoryGuardianStore {
    async fn policy(&self, requester: &Did) -> StoreResult<Option<PolicyStatus>> {
        Ok(self.tables.read().await.policies.get(requester).copied())
    }

    async fn set_policy(&self, requester: Did, status: PolicyStatus) -> StoreResult<()> {
        self.tables.write().await.policies.insert(requester, status);
        Ok(())
    }

    async fn remove_policy(&self, requester: &Did) -> StoreResult<()> {
        self.tables.write().await.policies.remove(requester);
        Ok(())
    }

    async fn is_guardian(&self, gateway: &Did, namespace_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .shares
            .contains_key(&(gateway.clone(), namespace_id)))
    }

    async fn save_share(
        &self,
        owner: &Did,
        namespace: &Namespace,
        threshold: u8,
        share: Vec<u8>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.policies.get(owner) != Some(&PolicyStatus::Granted) {
            return Err(StoreError::PolicyNotGranted(owner.to_string()));
        }
        tables.shares.insert(
            (namespace.gateway_did.clone(), namespace.id),
            Share {
                owner: owner.clone(),
                namespace: namespace.clone(),
                threshold,
                share,
                updated_at: self.clock.now(),
            },
        );
        Ok(())
    }

    async fn share(&self, gateway: &Did, namespace_id: Uuid) -> StoreResult<Option<Share>> {
        Ok(self
            .tables
            .read()
            .await
            .shares
            .get(&(gateway.clone(), namespace_id))
            .cloned())
    }

    async fn list_shares(&self) -> StoreResult<Vec<Share>> {
        Ok(self.tables.read().await.shares.values().cloned().collect())
    }

    async fn delete_share(&self, gateway: &Did, namespace_id: Uuid) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .shares
            .remove(&(gateway.clone(), namespace_id));
        Ok(())
    }

    async fn remove_guardian(&self, owner: &Did) -> StoreResult<()> {
        // One write lock covers both mutations, keeping the removal atomic.
        let mut tables = self.tables.write().await;
        tables.policies.insert(owner.clone(), PolicyStatus::Denied);
        tables.shares.retain(|_, share| &share.owner != owner);
        Ok(())
    }

    async fn save_recovery_request(&self, request: RecoveryRequest) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .recovery_requests
            .insert(request.id, request);
        Ok(())
    }

    async fn recovery_request(&self, id: Uuid) -> StoreResult<Option<RecoveryRequest>> {
        Ok(self.tables.read().await.recovery_requests.get(&id).cloned())
    }

    async fn delete_recovery_request(&self, id: Uuid) -> StoreResult<()> {
        self.tables.write().await.recovery_requests.remove(&id);
        Ok(())
    }
}
