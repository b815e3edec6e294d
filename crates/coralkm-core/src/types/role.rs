//! Protocol roles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role a party plays in the protocol. An engine may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Wallet,
    Gateway,
    Guardian,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wallet => "wallet",
            Self::Gateway => "gateway",
            Self::Guardian => "guardian",
        })
    }
}
