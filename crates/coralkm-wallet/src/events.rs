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

//! Structured events the wallet surfaces to its UI.

use uuid::Uuid;

use coralkm_core::{Did, Namespace, VerificationChallenge};

use crate::backup::WalletBackup;

/// What happened, as the wallet's user interface wants to hear it.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    NamespaceGranted { namespace: Namespace },
    NamespaceDenied { reason: Option<String> },
    BackupSynced { hash: String },
    GuardianGranted { guardian: Did },
    GuardianDenied { guardian: Did, reason: Option<String> },
    GuardianRemoved { guardian: Did },
    ShareUpdateConfirmed { guardian: Did, threshold: u8 },
    /// A guardian failed to confirm its new share; other guardians are not
    /// rolled back.
    ShareUpdateFailed { guardian: Did, reason: String },
    /// A guardian challenged the recovering device; the user must answer
    /// out of band.
    VerificationRequested {
        guardian: Did,
        ceremony: Uuid,
        challenge: VerificationChallenge,
    },
    RecoveryShareReceived {
        guardian: Did,
        collected: usize,
        threshold: u8,
    },
    RecoveryRestored { backup: WalletBackup },
    RecoveryFailed { reason: String },
    ProblemReported {
        from: Did,
        code: String,
        comment: String,
    },
}
