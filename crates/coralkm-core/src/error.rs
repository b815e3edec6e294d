//! Protocol error taxonomy.

use thiserror::Error;

use crate::types::Role;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors a protocol participant can hit while processing a message.
///
/// Handlers recover locally by turning one of these into a problem report
/// addressed to the offending sender; `NotAGuardian` is the one deliberate
/// exception and is never reported back (it would let a caller enumerate
/// which parties guard a namespace).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Missing or ill-typed message field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Message addressed to a role the receiver does not play.
    #[error("message requires the {0} role")]
    InvalidRole(Role),

    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(String),

    /// Requester has no granted policy with this party.
    #[error("no granted policy for {0}")]
    PolicyNotGranted(String),

    /// Receiver does not guard the referenced namespace. Silent.
    #[error("not a guardian of the referenced namespace")]
    NotAGuardian,

    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Associated-data mismatch, including one side missing it entirely.
    #[error("associated data mismatch")]
    AeadAadMismatch,

    #[error("unsupported AEAD algorithm: {0}")]
    AeadUnsupportedAlg(String),

    #[error("insufficient shares: need {required}, have {provided}")]
    SssInsufficientShares { required: usize, provided: usize },

    #[error("corrupt share")]
    SssCorruptShare,

    /// Recovery request past its deadline.
    #[error("request has expired")]
    Expired,

    #[error("internal error: {0}")]
    InternalError(String),
}

impl ProtocolError {
    /// Problem-report code for this error.
    pub fn problem_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid-argument",
            Self::InvalidRole(_) => "invalid-role",
            Self::UnsupportedMessageType(_) => "unsupported-message-type",
            Self::PolicyNotGranted(_) => "policy-not-granted",
            Self::NotAGuardian => "not-a-guardian",
            Self::NamespaceNotFound(_) => "namespace-not-found",
            Self::AeadAadMismatch => "aead-aad-mismatch",
            Self::AeadUnsupportedAlg(_) => "aead-unsupported-alg",
            Self::SssInsufficientShares { .. } => "sss-insufficient-shares",
            Self::SssCorruptShare => "sss-corrupt-share",
            Self::Expired => "expired",
            Self::InternalError(_) => "internal-error",
        }
    }

    /// Whether the receiver must drop the message without any reply.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::NotAGuardian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ProtocolError::PolicyNotGranted("did:coral:x".into());
        assert_eq!(err.to_string(), "no granted policy for did:coral:x");
    }

    #[test]
    fn test_not_a_guardian_is_silent() {
        assert!(ProtocolError::NotAGuardian.is_silent());
        assert!(!ProtocolError::Expired.is_silent());
    }

    #[test]
    fn test_problem_codes_are_kebab_case() {
        let err = ProtocolError::SssInsufficientShares {
            required: 2,
            provided: 1,
        };
        assert_eq!(err.problem_code(), "sss-insufficient-shares");
    }
}
