//! Out-of-band identity-verification challenge.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the recovering user is expected to prove their identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    /// A code communicated out of band (phone call, in person).
    Code,
    /// A shared-knowledge question.
    Question,
}

/// Challenge issued by a guardian under `pthid = recovery id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationChallenge {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ChallengeKind,
    /// Human-readable instructions presented to the recovering user.
    pub instructions: String,
}
