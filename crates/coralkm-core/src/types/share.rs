//! Threshold-share record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{b64u, Did, Namespace};

/// One threshold share of a wallet's DEK.
///
/// Guardians persist these keyed by `(namespace.gateway_did, namespace.id)`;
/// the wallet keeps its own copy of every issued share inside the encrypted
/// backup so a restored wallet can tell which guardians hold current shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Wallet identity the share belongs to.
    pub owner: Did,
    pub namespace: Namespace,
    pub threshold: u8,
    #[serde(with = "b64u")]
    pub share: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_share_serializes_bytes_as_base64url() {
        let share = Share {
            owner: Did::new_unchecked("did:coral:w"),
            namespace: Namespace::new(Uuid::nil(), Did::new_unchecked("did:coral:gw")),
            threshold: 2,
            share: vec![1, 2, 3],
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&share).unwrap();
        assert_eq!(json["share"], b64u::encode(&[1, 2, 3]));
        let back: Share = serde_json::from_value(json).unwrap();
        assert_eq!(back.share, vec![1, 2, 3]);
    }
}
