//! Guardian-side record of an outstanding recovery ceremony.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Did, Namespace};

/// Persisted by a guardian when a recovery request arrives; deleted once the
/// verification response is processed or the request expires.
///
/// `id` is the recovery-request message id, which doubles as the ceremony
/// identifier every sub-dialog references through `pthid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub id: Uuid,
    /// Identity of the (new) device performing the recovery.
    pub device_did: Did,
    pub namespace: Namespace,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RecoveryRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(expires_at: DateTime<Utc>) -> RecoveryRequest {
        RecoveryRequest {
            id: Uuid::nil(),
            device_did: Did::new_unchecked("did:coral:device"),
            namespace: Namespace::new(Uuid::nil(), Did::new_unchecked("did:coral:gw")),
            created_at: expires_at - Duration::hours(24),
            expires_at,
        }
    }

    #[test]
    fn test_not_expired_before_deadline() {
        let now = Utc::now();
        assert!(!request(now + Duration::seconds(1)).is_expired(now));
    }

    #[test]
    fn test_expired_at_deadline() {
        let now = Utc::now();
        assert!(request(now).is_expired(now));
        assert!(request(now - Duration::seconds(1)).is_expired(now));
    }
}
