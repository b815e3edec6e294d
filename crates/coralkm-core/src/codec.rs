//! JSON wire codec for protocol messages.
//!
//! Decoding validates the envelope and the per-type required body fields
//! before any handler runs. A failed decode yields enough of the offending
//! envelope to build the problem-report reply the protocol requires.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::message::{
    GuardianDenyBody, GuardianReleaseShareBody, GuardianShareUpdateBody,
    GuardianVerificationChallengeBody, GuardianVerificationChallengeResponseBody, Message,
    MessageBody, MessageType, NamespaceDenyBody, NamespaceGrantBody,
    NamespaceRecoveryRequestBody, NamespaceSyncBody, NamespaceSyncResponseBody, SyncOp,
};
use crate::problem::ProblemReportBody;
use crate::types::Did;

/// Codec-level validation failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("unsupported message type: {0}")]
    UnsupportedType(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("message has no recipients")]
    NoRecipients,
}

impl From<CodecError> for ProtocolError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedType(uri) => ProtocolError::UnsupportedMessageType(uri),
            other => ProtocolError::InvalidArgument(other.to_string()),
        }
    }
}

/// Envelope fields of a message that failed to decode, as far as they could
/// be recovered. Enough to thread a problem report back to the sender.
#[derive(Debug, Clone, PartialEq)]
pub struct Offender {
    pub id: Uuid,
    pub from: Did,
    pub thid: Option<Uuid>,
}

/// A decode failure plus whatever envelope context survived.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeFailure {
    pub offender: Option<Offender>,
    pub error: CodecError,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    id: Uuid,
    #[serde(rename = "type")]
    type_uri: String,
    from: Did,
    to: Vec<Did>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pthid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

/// Serialize a message to its JSON wire form.
pub fn encode(message: &Message) -> Result<String, CodecError> {
    let body = match &message.body {
        MessageBody::NamespaceRequest
        | MessageBody::GuardianRequest
        | MessageBody::GuardianGrant
        | MessageBody::GuardianRemove
        | MessageBody::GuardianRemoveConfirm
        | MessageBody::GuardianShareUpdateConfirm => None,
        MessageBody::NamespaceGrant(b) => Some(to_value(b)?),
        MessageBody::NamespaceDeny(b) => Some(to_value(b)?),
        MessageBody::NamespaceSync(b) => Some(to_value(b)?),
        MessageBody::NamespaceSyncResponse(b) => Some(to_value(b)?),
        MessageBody::NamespaceRecoveryRequest(b) => Some(to_value(b)?),
        MessageBody::GuardianDeny(b) => Some(to_value(b)?),
        MessageBody::GuardianShareUpdate(b) => Some(to_value(b)?),
        MessageBody::GuardianVerificationChallenge(b) => Some(to_value(b)?),
        MessageBody::GuardianVerificationChallengeResponse(b) => Some(to_value(b)?),
        MessageBody::GuardianReleaseShare(b) => Some(to_value(b)?),
        MessageBody::ProblemReport(b) => Some(to_value(b)?),
    };
    let wire = WireMessage {
        id: message.id,
        type_uri: message.message_type().as_uri().to_string(),
        from: message.from.clone(),
        to: message.to.clone(),
        thid: message.thid,
        pthid: message.pthid,
        body,
    };
    serde_json::to_string(&wire).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Parse and validate a message from its JSON wire form.
pub fn decode(raw: &str) -> Result<Message, Box<DecodeFailure>> {
    let wire: WireMessage = serde_json::from_str(raw).map_err(|e| {
        Box::new(DecodeFailure {
            offender: None,
            error: CodecError::Malformed(e.to_string()),
        })
    })?;
    let offender = Offender {
        id: wire.id,
        from: wire.from.clone(),
        thid: wire.thid,
    };
    decode_wire(wire).map_err(|error| {
        Box::new(DecodeFailure {
            offender: Some(offender),
            error,
        })
    })
}

fn decode_wire(wire: WireMessage) -> Result<Message, CodecError> {
    if wire.id.is_nil() {
        return Err(CodecError::InvalidField {
            field: "id".into(),
            reason: "must not be nil".into(),
        });
    }
    if wire.to.is_empty() {
        return Err(CodecError::NoRecipients);
    }
    let message_type = MessageType::from_uri(&wire.type_uri)
        .ok_or_else(|| CodecError::UnsupportedType(wire.type_uri.clone()))?;
    let body = decode_body(message_type, wire.body)?;
    validate_body(&body)?;
    Ok(Message {
        id: wire.id,
        from: wire.from,
        to: wire.to,
        thid: wire.thid,
        pthid: wire.pthid,
        body,
    })
}

fn decode_body(message_type: MessageType, body: Option<Value>) -> Result<MessageBody, CodecError> {
    // Empty-body types accept a missing body or an empty object.
    match message_type {
        MessageType::NamespaceRequest => return Ok(MessageBody::NamespaceRequest),
        MessageType::GuardianRequest => return Ok(MessageBody::GuardianRequest),
        MessageType::GuardianGrant => return Ok(MessageBody::GuardianGrant),
        MessageType::GuardianRemove => return Ok(MessageBody::GuardianRemove),
        MessageType::GuardianRemoveConfirm => return Ok(MessageBody::GuardianRemoveConfirm),
        MessageType::GuardianShareUpdateConfirm => {
            return Ok(MessageBody::GuardianShareUpdateConfirm)
        }
        _ => {}
    }
    let body = body.ok_or(CodecError::MissingField("body"))?;
    for field in required_fields(message_type) {
        if body.get(field).is_none() {
            return Err(CodecError::MissingField(field));
        }
    }
    match message_type {
        MessageType::NamespaceGrant => from_value::<NamespaceGrantBody>(body)
            .map(MessageBody::NamespaceGrant),
        MessageType::NamespaceDeny => {
            from_value::<NamespaceDenyBody>(body).map(MessageBody::NamespaceDeny)
        }
        MessageType::NamespaceSync => {
            from_value::<NamespaceSyncBody>(body).map(MessageBody::NamespaceSync)
        }
        MessageType::NamespaceSyncResponse => from_value::<NamespaceSyncResponseBody>(body)
            .map(MessageBody::NamespaceSyncResponse),
        MessageType::NamespaceRecoveryRequest => from_value::<NamespaceRecoveryRequestBody>(body)
            .map(MessageBody::NamespaceRecoveryRequest),
        MessageType::GuardianDeny => {
            from_value::<GuardianDenyBody>(body).map(MessageBody::GuardianDeny)
        }
        MessageType::GuardianShareUpdate => {
            from_value::<GuardianShareUpdateBody>(body).map(MessageBody::GuardianShareUpdate)
        }
        MessageType::GuardianVerificationChallenge => {
            from_value::<GuardianVerificationChallengeBody>(body)
                .map(MessageBody::GuardianVerificationChallenge)
        }
        MessageType::GuardianVerificationChallengeResponse => {
            from_value::<GuardianVerificationChallengeResponseBody>(body)
                .map(MessageBody::GuardianVerificationChallengeResponse)
        }
        MessageType::GuardianReleaseShare => {
            from_value::<GuardianReleaseShareBody>(body).map(MessageBody::GuardianReleaseShare)
        }
        MessageType::ProblemReport => {
            from_value::<ProblemReportBody>(body).map(MessageBody::ProblemReport)
        }
        // Handled above.
        MessageType::NamespaceRequest
        | MessageType::GuardianRequest
        | MessageType::GuardianGrant
        | MessageType::GuardianRemove
        | MessageType::GuardianRemoveConfirm
        | MessageType::GuardianShareUpdateConfirm => unreachable!(),
    }
}

/// Required body fields per type. Conditional requirements (PUT data,
/// response hash vs data) are checked by [`validate_body`].
fn required_fields(message_type: MessageType) -> &'static [&'static str] {
    match message_type {
        MessageType::NamespaceGrant => &["namespace"],
        MessageType::NamespaceSync => &["request"],
        MessageType::NamespaceSyncResponse => &["request"],
        MessageType::NamespaceRecoveryRequest => &["device_did", "namespace", "expires_at"],
        MessageType::GuardianShareUpdate => &["namespace", "threshold", "share"],
        MessageType::GuardianVerificationChallenge => &["challenge"],
        MessageType::GuardianVerificationChallengeResponse => &["challenge_id", "response"],
        MessageType::GuardianReleaseShare => &["share", "threshold"],
        MessageType::ProblemReport => &["code", "comment"],
        _ => &[],
    }
}

/// Cross-field validation the flat required-field table cannot express.
pub fn validate_body(body: &MessageBody) -> Result<(), CodecError> {
    match body {
        MessageBody::NamespaceSync(sync) => {
            if sync.request == SyncOp::Put && sync.data.is_none() {
                return Err(CodecError::MissingField("data"));
            }
        }
        MessageBody::NamespaceSyncResponse(response) => match response.request {
            SyncOp::Put if response.hash.is_none() => {
                return Err(CodecError::MissingField("hash"));
            }
            SyncOp::Get if response.data.is_none() => {
                return Err(CodecError::MissingField("data"));
            }
            _ => {}
        },
        MessageBody::GuardianShareUpdate(update) if update.threshold == 0 => {
            return Err(CodecError::InvalidField {
                field: "threshold".into(),
                reason: "must be at least 1".into(),
            });
        }
        MessageBody::GuardianReleaseShare(release) if release.threshold == 0 => {
            return Err(CodecError::InvalidField {
                field: "threshold".into(),
                reason: "must be at least 1".into(),
            });
        }
        _ => {}
    }
    Ok(())
}

/// Build the problem-report reply for a decode failure, or `None` when not
/// enough of the envelope survived to address one.
///
/// `pthid` references the offender's `thid` when present, its id otherwise.
pub fn problem_report_for(
    failure: &DecodeFailure,
    report_id: Uuid,
    reporter: Did,
) -> Option<Message> {
    let offender = failure.offender.as_ref()?;
    let error: ProtocolError = failure.error.clone().into();
    let body = ProblemReportBody::from_error(&error);
    Some(
        Message::new(
            report_id,
            reporter,
            vec![offender.from.clone()],
            MessageBody::ProblemReport(body),
        )
        .with_pthid(offender.thid.unwrap_or(offender.id)),
    )
}

fn to_value<T: Serialize>(body: &T) -> Result<Value, CodecError> {
    serde_json::to_value(body).map_err(|e| CodecError::Malformed(e.to_string()))
}

fn from_value<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, CodecError> {
    serde_json::from_value(body).map_err(|e| CodecError::Malformed(e.to_string()))
}
