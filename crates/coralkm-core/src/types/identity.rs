//! Decentralized identifier newtype.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a protocol party (wallet device, gateway, or guardian).
///
/// Cross-component references are always identity values, never pointers;
/// a `Did` is the only way one role names another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    /// Create a validated identifier.
    pub fn new(did: impl Into<String>) -> Result<Self, IdentityError> {
        let did = did.into();
        Self::validate(&did)?;
        Ok(Self(did))
    }

    /// Create without validation (trusted input, e.g. local configuration).
    pub fn new_unchecked(did: impl Into<String>) -> Self {
        Self(did.into())
    }

    fn validate(did: &str) -> Result<(), IdentityError> {
        if did.is_empty() {
            return Err(IdentityError::Empty);
        }
        if !did.starts_with("did:") {
            return Err(IdentityError::MissingScheme);
        }
        if did.len() > 512 {
            return Err(IdentityError::TooLong(512));
        }
        if !did
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ':' | '.' | '-' | '_' | '%'))
        {
            return Err(IdentityError::InvalidCharacters);
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Did {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identifier cannot be empty")]
    Empty,
    #[error("identifier must start with \"did:\"")]
    MissingScheme,
    #[error("identifier exceeds maximum length of {0}")]
    TooLong(usize),
    #[error("identifier contains invalid characters")]
    InvalidCharacters,
}
