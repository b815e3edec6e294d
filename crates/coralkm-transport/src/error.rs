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

//! Transport error types.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    /// No reply arrived for the request within its deadline.
    #[error("request {id} timed out after {after:?}")]
    Timeout { id: Uuid, after: Duration },

    /// A request needs at least one reachable recipient.
    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("codec error: {0}")]
    Codec(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
