//! Problem-report companion protocol.
//!
//! When a handler rejects a message it replies with a problem report whose
//! `pthid` references the offender's `thid` (or, for an unthreaded message,
//! its id), preserving thread correlation for the sender.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Body of a problem-report message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemReportBody {
    /// Machine-readable code, e.g. `invalid-argument`.
    pub code: String,
    /// Human-readable comment; may contain `{1}`..`{n}` placeholders
    /// resolved against `args`.
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Where a human can escalate, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalate_to: Option<String>,
}

impl ProblemReportBody {
    pub fn new(code: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            comment: comment.into(),
            args: None,
            escalate_to: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = Some(args);
        self
    }

    /// Build a report from a protocol error, threading the error's message
    /// through placeholder args where it carries a payload.
    pub fn from_error(error: &ProtocolError) -> Self {
        match error {
            ProtocolError::InvalidArgument(detail) => {
                Self::new(error.problem_code(), "invalid argument: {1}")
                    .with_args(vec![detail.clone()])
            }
            ProtocolError::InvalidRole(role) => {
                Self::new(error.problem_code(), "message requires the {1} role")
                    .with_args(vec![role.to_string()])
            }
            ProtocolError::UnsupportedMessageType(uri) => {
                Self::new(error.problem_code(), "unsupported message type: {1}")
                    .with_args(vec![uri.clone()])
            }
            ProtocolError::PolicyNotGranted(who) => {
                Self::new(error.problem_code(), "no granted policy for {1}")
                    .with_args(vec![who.clone()])
            }
            ProtocolError::NamespaceNotFound(id) => {
                Self::new(error.problem_code(), "namespace {1} not found")
                    .with_args(vec![id.clone()])
            }
            ProtocolError::SssInsufficientShares { required, provided } => {
                Self::new(error.problem_code(), "insufficient shares: need {1}, have {2}")
                    .with_args(vec![required.to_string(), provided.to_string()])
            }
            // No payload worth echoing back; internal details stay local.
            _ => Self::new(error.problem_code(), error.to_string()),
        }
    }

    /// Comment with `{1}`..`{n}` placeholders substituted from `args`.
    /// Unknown or out-of-range indices are left literal.
    pub fn rendered_comment(&self) -> String {
        let args: &[String] = self.args.as_deref().unwrap_or(&[]);
        let mut out = String::with_capacity(self.comment.len());
        let mut chars = self.comment.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if c != '{' {
                out.push(c);
                continue;
            }
            // Scan ahead for a digits-only `{n}` placeholder.
            let mut end = None;
            for (i, c) in self.comment[start + 1..].char_indices() {
                match c {
                    '0'..='9' => continue,
                    '}' if i > 0 => {
                        end = Some(start + 1 + i);
                        break;
                    }
                    _ => break,
                }
            }
            match end {
                Some(end) => {
                    let index: usize = self.comment[start + 1..end]
                        .parse()
                        .unwrap_or(0);
                    match index.checked_sub(1).and_then(|i| args.get(i)) {
                        Some(arg) => out.push_str(arg),
                        None => out.push_str(&self.comment[start..=end]),
                    }
                    while chars.peek().is_some_and(|(i, _)| *i <= end) {
                        chars.next();
                    }
                }
                None => out.push(c),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_numbered_placeholders() {
        let report = ProblemReportBody::new("invalid-argument", "field {1} of {2} is bad")
            .with_args(vec!["data".into(), "namespace-sync".into()]);
        assert_eq!(report.rendered_comment(), "field data of namespace-sync is bad");
    }

    #[test]
    fn test_unknown_index_stays_literal() {
        let report = ProblemReportBody::new("x", "value {3} missing")
            .with_args(vec!["only-one".into()]);
        assert_eq!(report.rendered_comment(), "value {3} missing");
    }

    #[test]
    fn test_zero_index_stays_literal() {
        let report =
            ProblemReportBody::new("x", "value {0} missing").with_args(vec!["a".into()]);
        assert_eq!(report.rendered_comment(), "value {0} missing");
    }

    #[test]
    fn test_non_numeric_braces_stay_literal() {
        let report = ProblemReportBody::new("x", "literal {foo} and {} stay")
            .with_args(vec!["a".into()]);
        assert_eq!(report.rendered_comment(), "literal {foo} and {} stay");
    }

    #[test]
    fn test_no_args() {
        let report = ProblemReportBody::new("expired", "request has expired");
        assert_eq!(report.rendered_comment(), "request has expired");
    }

    #[test]
    fn test_from_error_carries_code_and_args() {
        let err = ProtocolError::PolicyNotGranted("did:coral:x".into());
        let report = ProblemReportBody::from_error(&err);
        assert_eq!(report.code, "policy-not-granted");
        assert_eq!(report.rendered_comment(), "no granted policy for did:coral:x");
    }
}
