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

//! Guardian-side persistence contract.

use async_trait::async_trait;
use uuid::Uuid;

use coralkm_core::{Did, Namespace, PolicyStatus, RecoveryRequest, Share};

use crate::error::StoreResult;

/// Guardian persistence: policies, held shares, and outstanding recovery
/// requests.
///
/// Shares are keyed by `(namespace.gateway_did, namespace.id)`: exactly one
/// live share per namespace per guardian.
#[async_trait]
pub trait GuardianStore: Send + Sync {
    async fn policy(&self, requester: &Did) -> StoreResult<Option<PolicyStatus>>;

    async fn set_policy(&self, requester: Did, status: PolicyStatus) -> StoreResult<()>;

    async fn remove_policy(&self, requester: &Did) -> StoreResult<()>;

    /// Whether this guardian holds a share for the namespace.
    async fn is_guardian(&self, gateway: &Did, namespace_id: Uuid) -> StoreResult<bool>;

    /// Upsert the share for `(namespace.gateway_did, namespace.id)`.
    ///
    /// Requires an existing `Granted` policy for `owner`; fails with
    /// [`crate::StoreError::PolicyNotGranted`] otherwise.
    async fn save_share(
        &self,
        owner: &Did,
        namespace: &Namespace,
        threshold: u8,
        share: Vec<u8>,
    ) -> StoreResult<()>;

    async fn share(&self, gateway: &Did, namespace_id: Uuid) -> StoreResult<Option<Share>>;

    async fn list_shares(&self) -> StoreResult<Vec<Share>>;

    async fn delete_share(&self, gateway: &Did, namespace_id: Uuid) -> StoreResult<()>;

    /// Set the owner's policy to `Denied` and delete every share they own,
    /// as one transaction.
    async fn remove_guardian(&self, owner: &Did) -> StoreResult<()>;

    async fn save_recovery_request(&self, request: RecoveryRequest) -> StoreResult<()>;

    async fn recovery_request(&self, id: Uuid) -> StoreResult<Option<RecoveryRequest>>;

    async fn delete_recovery_request(&self, id: Uuid) -> StoreResult<()>;
}
