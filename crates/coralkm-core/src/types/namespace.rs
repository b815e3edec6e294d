//! Namespace handle: a per-wallet bucket on a gateway.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Did;

/// Opaque handle to a wallet's backup bucket on a gateway.
///
/// The namespace object is also the associated data bound to every backup
/// ciphertext, so a blob produced for one namespace cannot be decrypted as
/// another's.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub id: Uuid,
    pub gateway_did: Did,
}

impl Namespace {
    pub fn new(id: Uuid, gateway_did: Did) -> Self {
        Self { id, gateway_did }
    }

    /// JSON value of the namespace, used as AEAD associated data.
    pub fn aad_value(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "gateway_did": self.gateway_did,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aad_value_fields() {
        let ns = Namespace::new(Uuid::nil(), Did::new_unchecked("did:coral:gw"));
        let value = ns.aad_value();
        assert_eq!(value["gateway_did"], "did:coral:gw");
        assert_eq!(value["id"], Uuid::nil().to_string());
    }

    #[test]
    fn test_serde_round_trip() {
        let ns = Namespace::new(Uuid::nil(), Did::new_unchecked("did:coral:gw"));
        let json = serde_json::to_string(&ns).unwrap();
        let back: Namespace = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ns);
    }
}
