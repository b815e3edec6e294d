//! Typed protocol messages.
//!
//! Every CoralKM message is an envelope `{id, type, from, to, thid?, pthid?,
//! body?}` whose body is one of a closed set of shapes keyed by the type
//! URI. The body is modeled as a sum type so role handlers dispatch with an
//! exhaustive match instead of inspecting raw JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::problem::ProblemReportBody;
use crate::types::{b64u, Did, Namespace, Role, VerificationChallenge};

/// Prefix of every CoralKM message type URI.
pub const CORALKM_URI_PREFIX: &str = "https://coralstack.com/coralkm/0.1/";

/// Type URI of the companion error-report protocol.
pub const PROBLEM_REPORT_URI: &str =
    "https://coralstack.com/report-problem/0.1/problem-report";

macro_rules! coralkm_uri {
    ($suffix:literal) => {
        concat!("https://coralstack.com/coralkm/0.1/", $suffix)
    };
}

/// The closed set of message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    NamespaceRequest,
    NamespaceGrant,
    NamespaceDeny,
    NamespaceSync,
    NamespaceSyncResponse,
    NamespaceRecoveryRequest,
    GuardianRequest,
    GuardianGrant,
    GuardianDeny,
    GuardianRemove,
    GuardianRemoveConfirm,
    GuardianShareUpdate,
    GuardianShareUpdateConfirm,
    GuardianVerificationChallenge,
    GuardianVerificationChallengeResponse,
    GuardianReleaseShare,
    ProblemReport,
}

impl MessageType {
    /// Absolute type URI carried on the wire.
    pub fn as_uri(self) -> &'static str {
        match self {
            Self::NamespaceRequest => coralkm_uri!("namespace-request"),
            Self::NamespaceGrant => coralkm_uri!("namespace-grant"),
            Self::NamespaceDeny => coralkm_uri!("namespace-deny"),
            Self::NamespaceSync => coralkm_uri!("namespace-sync"),
            Self::NamespaceSyncResponse => coralkm_uri!("namespace-sync-response"),
            Self::NamespaceRecoveryRequest => coralkm_uri!("namespace-recovery-request"),
            Self::GuardianRequest => coralkm_uri!("guardian-request"),
            Self::GuardianGrant => coralkm_uri!("guardian-grant"),
            Self::GuardianDeny => coralkm_uri!("guardian-deny"),
            Self::GuardianRemove => coralkm_uri!("guardian-remove"),
            Self::GuardianRemoveConfirm => coralkm_uri!("guardian-remove-confirm"),
            Self::GuardianShareUpdate => coralkm_uri!("guardian-share-update"),
            Self::GuardianShareUpdateConfirm => {
                coralkm_uri!("guardian-share-update-confirm")
            }
            Self::GuardianVerificationChallenge => {
                coralkm_uri!("guardian-verification-challenge")
            }
            Self::GuardianVerificationChallengeResponse => {
                coralkm_uri!("guardian-verification-challenge-response")
            }
            Self::GuardianReleaseShare => coralkm_uri!("guardian-release-share"),
            Self::ProblemReport => PROBLEM_REPORT_URI,
        }
    }

    /// Parse a type URI; `None` for anything outside the closed set.
    pub fn from_uri(uri: &str) -> Option<Self> {
        if uri == PROBLEM_REPORT_URI {
            return Some(Self::ProblemReport);
        }
        match uri.strip_prefix(CORALKM_URI_PREFIX)? {
            "namespace-request" => Some(Self::NamespaceRequest),
            "namespace-grant" => Some(Self::NamespaceGrant),
            "namespace-deny" => Some(Self::NamespaceDeny),
            "namespace-sync" => Some(Self::NamespaceSync),
            "namespace-sync-response" => Some(Self::NamespaceSyncResponse),
            "namespace-recovery-request" => Some(Self::NamespaceRecoveryRequest),
            "guardian-request" => Some(Self::GuardianRequest),
            "guardian-grant" => Some(Self::GuardianGrant),
            "guardian-deny" => Some(Self::GuardianDeny),
            "guardian-remove" => Some(Self::GuardianRemove),
            "guardian-remove-confirm" => Some(Self::GuardianRemoveConfirm),
            "guardian-share-update" => Some(Self::GuardianShareUpdate),
            "guardian-share-update-confirm" => Some(Self::GuardianShareUpdateConfirm),
            "guardian-verification-challenge" => Some(Self::GuardianVerificationChallenge),
            "guardian-verification-challenge-response" => {
                Some(Self::GuardianVerificationChallengeResponse)
            }
            "guardian-release-share" => Some(Self::GuardianReleaseShare),
            _ => None,
        }
    }

    /// Roles whose handler processes this type. The recovery request is the
    /// one type two roles touch: the gateway fans it out, guardians act on
    /// it.
    pub fn handler_roles(self) -> &'static [Role] {
        match self {
            Self::NamespaceRequest | Self::NamespaceSync => &[Role::Gateway],
            Self::NamespaceRecoveryRequest => &[Role::Gateway, Role::Guardian],
            Self::GuardianRequest
            | Self::GuardianRemove
            | Self::GuardianShareUpdate
            | Self::GuardianVerificationChallengeResponse => &[Role::Guardian],
            Self::NamespaceGrant
            | Self::NamespaceDeny
            | Self::NamespaceSyncResponse
            | Self::GuardianGrant
            | Self::GuardianDeny
            | Self::GuardianRemoveConfirm
            | Self::GuardianShareUpdateConfirm
            | Self::GuardianVerificationChallenge
            | Self::GuardianReleaseShare
            | Self::ProblemReport => &[Role::Wallet],
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_uri())
    }
}

/// Direction of a namespace-sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOp {
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "GET")]
    Get,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceGrantBody {
    pub namespace: Namespace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceDenyBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceSyncBody {
    pub request: SyncOp,
    /// PUT: serialized backup ciphertext envelope.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64u::opt")]
    pub data: Option<Vec<u8>>,
    /// GET during recovery: resolve the namespace by id instead of owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceSyncResponseBody {
    pub request: SyncOp,
    /// PUT: hex SHA-256 of the exact stored bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// GET: the stored bytes.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64u::opt")]
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceRecoveryRequestBody {
    /// Identity of the recovering device; challenges and shares go here.
    pub device_did: Did,
    pub namespace: Namespace,
    pub expires_at: DateTime<Utc>,
    /// Ceremony identifier; when set it equals the message id, which is
    /// what every sub-dialog correlates on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianDenyBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianShareUpdateBody {
    pub namespace: Namespace,
    pub threshold: u8,
    #[serde(with = "b64u")]
    pub share: Vec<u8>,
    /// Optional confirmation delay in milliseconds, honored by test
    /// guardians to exercise slow-quorum paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianVerificationChallengeBody {
    pub challenge: VerificationChallenge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianVerificationChallengeResponseBody {
    pub challenge_id: Uuid,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianReleaseShareBody {
    #[serde(with = "b64u")]
    pub share: Vec<u8>,
    pub threshold: u8,
}

/// Typed message body; one variant per type URI.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    NamespaceRequest,
    NamespaceGrant(NamespaceGrantBody),
    NamespaceDeny(NamespaceDenyBody),
    NamespaceSync(NamespaceSyncBody),
    NamespaceSyncResponse(NamespaceSyncResponseBody),
    NamespaceRecoveryRequest(NamespaceRecoveryRequestBody),
    GuardianRequest,
    GuardianGrant,
    GuardianDeny(GuardianDenyBody),
    GuardianRemove,
    GuardianRemoveConfirm,
    GuardianShareUpdate(GuardianShareUpdateBody),
    GuardianShareUpdateConfirm,
    GuardianVerificationChallenge(GuardianVerificationChallengeBody),
    GuardianVerificationChallengeResponse(GuardianVerificationChallengeResponseBody),
    GuardianReleaseShare(GuardianReleaseShareBody),
    ProblemReport(ProblemReportBody),
}

impl MessageBody {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::NamespaceRequest => MessageType::NamespaceRequest,
            Self::NamespaceGrant(_) => MessageType::NamespaceGrant,
            Self::NamespaceDeny(_) => MessageType::NamespaceDeny,
            Self::NamespaceSync(_) => MessageType::NamespaceSync,
            Self::NamespaceSyncResponse(_) => MessageType::NamespaceSyncResponse,
            Self::NamespaceRecoveryRequest(_) => MessageType::NamespaceRecoveryRequest,
            Self::GuardianRequest => MessageType::GuardianRequest,
            Self::GuardianGrant => MessageType::GuardianGrant,
            Self::GuardianDeny(_) => MessageType::GuardianDeny,
            Self::GuardianRemove => MessageType::GuardianRemove,
            Self::GuardianRemoveConfirm => MessageType::GuardianRemoveConfirm,
            Self::GuardianShareUpdate(_) => MessageType::GuardianShareUpdate,
            Self::GuardianShareUpdateConfirm => MessageType::GuardianShareUpdateConfirm,
            Self::GuardianVerificationChallenge(_) => {
                MessageType::GuardianVerificationChallenge
            }
            Self::GuardianVerificationChallengeResponse(_) => {
                MessageType::GuardianVerificationChallengeResponse
            }
            Self::GuardianReleaseShare(_) => MessageType::GuardianReleaseShare,
            Self::ProblemReport(_) => MessageType::ProblemReport,
        }
    }
}

/// An immutable protocol message.
///
/// `thid` threads a reply to a prior request; `pthid` links a sub-dialog to
/// its parent recovery ceremony.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub from: Did,
    pub to: Vec<Did>,
    pub thid: Option<Uuid>,
    pub pthid: Option<Uuid>,
    pub body: MessageBody,
}

impl Message {
    pub fn new(id: Uuid, from: Did, to: Vec<Did>, body: MessageBody) -> Self {
        Self {
            id,
            from,
            to,
            thid: None,
            pthid: None,
            body,
        }
    }

    pub fn with_thid(mut self, thid: Uuid) -> Self {
        self.thid = Some(thid);
        self
    }

    pub fn with_pthid(mut self, pthid: Uuid) -> Self {
        self.pthid = Some(pthid);
        self
    }

    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    /// Build a reply: addressed to the sender, `thid` set to this message's
    /// id, `pthid` carried over so ceremony sub-dialogs stay correlated.
    pub fn reply(&self, id: Uuid, from: Did, body: MessageBody) -> Message {
        Message {
            id,
            from,
            to: vec![self.from.clone()],
            thid: Some(self.id),
            pthid: self.pthid,
            body,
        }
    }
}
