// Order matters: identity first (no internal deps), then namespace, rest.

mod identity;
mod namespace;
mod policy;
mod recovery;
mod role;
mod share;
mod verification;

pub mod b64u;

pub use identity::{Did, IdentityError};
pub use namespace::Namespace;
pub use policy::PolicyStatus;
pub use recovery::RecoveryRequest;
pub use role::Role;
pub use share::Share;
pub use verification::{ChallengeKind, VerificationChallenge};
