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

//! Out-of-band identity verification for recovery ceremonies.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use coralkm_core::{
    ChallengeKind, ProtocolResult, RandomSource, RecoveryRequest, VerificationChallenge,
};

/// How a guardian challenges a recovering device and judges its response.
///
/// The engine treats verification as a capability so deployments can swap
/// the demo code check for a cryptographic challenge-response (an HMAC or
/// signed nonce bound to the ceremony and device identity) without touching
/// any handler.
#[async_trait]
pub trait VerificationPolicy: Send + Sync {
    async fn issue_challenge(
        &self,
        request: &RecoveryRequest,
    ) -> ProtocolResult<VerificationChallenge>;

    async fn verify_response(
        &self,
        request: &RecoveryRequest,
        challenge_id: Uuid,
        response: &str,
    ) -> ProtocolResult<bool>;
}

/// Demo policy: a fixed code communicated out of band.
///
/// Accepts any response equal to the configured code regardless of
/// challenge id. Not suitable for production.
pub struct FixedCodeVerification {
    code: String,
    rng: Arc<dyn RandomSource>,
}

impl FixedCodeVerification {
    /// The code the demo deployment hands out.
    pub const DEMO_CODE: &'static str = "123456";

    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self {
            code: Self::DEMO_CODE.to_string(),
            rng,
        }
    }

    pub fn with_code(rng: Arc<dyn RandomSource>, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            rng,
        }
    }
}

#[async_trait]
impl VerificationPolicy for FixedCodeVerification {
    async fn issue_challenge(
        &self,
        _request: &RecoveryRequest,
    ) -> ProtocolResult<VerificationChallenge> {
        Ok(VerificationChallenge {
            id: self.rng.uuid(),
            kind: ChallengeKind::Code,
            instructions: "Enter the recovery code you received out of band".to_string(),
        })
    }

    async fn verify_response(
        &self,
        _request: &RecoveryRequest,
        _challenge_id: Uuid,
        response: &str,
    ) -> ProtocolResult<bool> {
        Ok(response == self.code)
    }
}
