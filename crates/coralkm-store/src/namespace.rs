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

//! Gateway-side persistence contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use coralkm_core::{Did, Namespace, PolicyStatus};

use crate::error::StoreResult;

/// A namespace with its backup blob, as the gateway stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceRecord {
    pub namespace: Namespace,
    pub owner: Did,
    /// Encrypted backup bytes, exactly as received.
    pub data: Option<Vec<u8>>,
    pub synced_at: Option<DateTime<Utc>>,
    /// SHA-256 of `data`.
    pub hash: Option<[u8; 32]>,
}

/// Gateway persistence: namespace policies, namespaces, and backup blobs.
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    async fn policy(&self, requester: &Did) -> StoreResult<Option<PolicyStatus>>;

    async fn set_policy(&self, requester: Did, status: PolicyStatus) -> StoreResult<()>;

    async fn remove_policy(&self, requester: &Did) -> StoreResult<()>;

    /// Create a namespace owned by `owner`, or return the existing one;
    /// an owner holds at most one namespace per gateway.
    async fn create(&self, owner: Did) -> StoreResult<Namespace>;

    async fn namespace_by_id(&self, id: Uuid) -> StoreResult<Option<NamespaceRecord>>;

    async fn namespace_by_owner(&self, owner: &Did) -> StoreResult<Option<NamespaceRecord>>;

    /// Assign a fresh UUID to the owner's namespace, keeping its data.
    async fn rotate_id(&self, owner: &Did) -> StoreResult<Namespace>;

    /// Atomically replace the owner's backup blob.
    ///
    /// Returns the SHA-256 of the exact stored bytes; concurrent reads see
    /// either the previous blob or the new one, never a mix.
    async fn save_data(&self, owner: &Did, data: Vec<u8>) -> StoreResult<[u8; 32]>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}
