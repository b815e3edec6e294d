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

//! CoralKM Store — persistence contracts for gateways and guardians.
//!
//! Each protocol entity has exactly one authoritative owner: namespaces,
//! their policies, and backup blobs live behind [`NamespaceStore`] on the
//! gateway; guardian policies, threshold shares, and outstanding recovery
//! requests behind [`GuardianStore`] on each guardian. The in-memory
//! implementations back tests and demos; production deployments implement
//! the same traits over a durable engine.

pub mod error;
pub mod guardian;
pub mod memory;
pub mod namespace;

pub use error::{StoreError, StoreResult};
pub use guardian::GuardianStore;
pub use memory::{InMemoryGuardianStore, InMemoryNamespaceStore};
pub use namespace::{NamespaceRecord, NamespaceStore};
