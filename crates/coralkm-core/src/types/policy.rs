//! Access-policy decision shared by gateway and guardian stores.

use serde::{Deserialize, Serialize};

/// Decision recorded against a requester identity.
///
/// An absent policy is not the same as `Denied`: both the gateway and the
/// guardian default to granting first-time requesters in the demo
/// deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    Granted,
    Denied,
}

impl PolicyStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}
