//! CoralKM Core — protocol types, message codec, and error taxonomy.
//!
//! CoralKM is a decentralized key-management protocol between three roles:
//! a wallet that owns a data-encryption key (DEK), a gateway that stores the
//! wallet's encrypted backup under a namespace, and guardians that each hold
//! one threshold share of the DEK. This crate defines the data model shared
//! by every role: identities, namespaces, policies, shares, recovery
//! requests, the typed message envelope with its JSON wire codec, the
//! problem-report companion protocol, and the injected `Clock` /
//! `RandomSource` capabilities.

pub mod capabilities;
pub mod codec;
pub mod error;
pub mod message;
pub mod problem;
pub mod types;

pub use capabilities::{Clock, ManualClock, OsRandomSource, RandomSource, SeededRandomSource, SystemClock};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    GuardianDenyBody, GuardianReleaseShareBody, GuardianShareUpdateBody,
    GuardianVerificationChallengeBody, GuardianVerificationChallengeResponseBody, Message,
    MessageBody, MessageType, NamespaceDenyBody, NamespaceGrantBody,
    NamespaceRecoveryRequestBody, NamespaceSyncBody, NamespaceSyncResponseBody, SyncOp,
    CORALKM_URI_PREFIX, PROBLEM_REPORT_URI,
};
pub use problem::ProblemReportBody;
pub use types::{
    ChallengeKind, Did, Namespace, PolicyStatus, RecoveryRequest, Role, Share,
    VerificationChallenge,
};
