// Copyright 2025 CoralKM Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CoralKM Engine — the protocol state machine.
//!
//! A [`ProtocolEngine`] holds a subset of the three roles and dispatches
//! each inbound message to the handler its type belongs to: the gateway
//! provisions namespaces, serves backup sync, and fans recovery requests
//! out; the guardian manages its policy, holds shares, and runs the
//! verification side of a recovery ceremony; the wallet role is provided by
//! the wallet crate through [`WalletRole`]. Handler failures become
//! problem-report replies threaded back at the offender, except the
//! deliberately silent not-a-guardian drop.

pub mod engine;
pub mod gateway;
pub mod guardian;
pub mod verification;

pub use engine::{ProtocolEngine, WalletRole};
pub use gateway::GatewayRole;
pub use guardian::GuardianRole;
pub use verification::{FixedCodeVerification, VerificationPolicy};
