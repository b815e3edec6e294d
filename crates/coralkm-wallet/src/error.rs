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

//! Wallet error types.

use thiserror::Error;
use uuid::Uuid;

use coralkm_core::ProtocolError;
use coralkm_crypto::CryptoError;
use coralkm_transport::TransportError;

/// Result type alias for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Error)]
pub enum WalletError {
    /// Operation needs a provisioned namespace.
    #[error("wallet has no namespace yet")]
    NoNamespace,

    /// Operation needs a data-encryption key.
    #[error("wallet has no data-encryption key")]
    NoDek,

    #[error("namespace request denied: {0}")]
    NamespaceDenied(String),

    #[error("guardian request denied by {guardian}: {reason}")]
    GuardianDenied { guardian: String, reason: String },

    /// Gateway acknowledged a PUT with a hash that does not match the
    /// bytes the wallet sent.
    #[error("backup hash mismatch: gateway reported {reported}, computed {computed}")]
    HashMismatch { reported: String, computed: String },

    #[error("a recovery ceremony is already in flight")]
    RecoveryInProgress,

    #[error("no recovery ceremony in flight")]
    NoActiveRecovery,

    #[error("unknown verification challenge {0}")]
    UnknownChallenge(Uuid),

    /// The peer answered with a problem report.
    #[error("peer rejected request ({code}): {comment}")]
    Rejected { code: String, comment: String },

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl WalletError {
    /// Whether retrying the same operation later can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }
}

impl From<WalletError> for ProtocolError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Protocol(err) => err,
            WalletError::Crypto(err) => err.into(),
            other => ProtocolError::InternalError(other.to_string()),
        }
    }
}
