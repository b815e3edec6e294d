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

//! Store error types.

use coralkm_core::ProtocolError;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Write requires a `Granted` policy for the identity, and there is none.
    #[error("no granted policy for {0}")]
    PolicyNotGranted(String),

    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Backend failure (I/O, serialization, lock poisoning).
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for ProtocolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PolicyNotGranted(who) => ProtocolError::PolicyNotGranted(who),
            StoreError::NamespaceNotFound(id) => ProtocolError::NamespaceNotFound(id),
            StoreError::Storage(detail) => ProtocolError::InternalError(detail),
        }
    }
}
