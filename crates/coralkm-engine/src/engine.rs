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

//! The role-parametric protocol engine.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use coralkm_core::{
    Did, Message, MessageBody, MessageType, ProblemReportBody, ProtocolError, ProtocolResult,
    RandomSource, Role,
};
use coralkm_transport::{Dispatch, MessageHandler};

use crate::gateway::GatewayRole;
use crate::guardian::GuardianRole;

/// Wallet-role message handling, implemented by the wallet crate. Kept as a
/// trait object so the engine stays free of wallet state.
#[async_trait]
pub trait WalletRole: Send + Sync {
    async fn handle(&self, message: &Message) -> ProtocolResult<Vec<Dispatch>>;
}

/// Per-party protocol engine holding a subset of the three roles.
///
/// Dispatches each message to the handler of the role its type belongs to.
/// A violation (wrong role, bad fields, policy failure) becomes a problem
/// report threaded back at the offender via
/// `pthid = offender.thid ?? offender.id`, unless the error is one the
/// protocol keeps silent.
pub struct ProtocolEngine {
    did: Did,
    rng: Arc<dyn RandomSource>,
    gateway: Option<GatewayRole>,
    guardian: Option<GuardianRole>,
    wallet: Option<Arc<dyn WalletRole>>,
}

impl ProtocolEngine {
    pub fn new(did: Did, rng: Arc<dyn RandomSource>) -> Self {
        Self {
            did,
            rng,
            gateway: None,
            guardian: None,
            wallet: None,
        }
    }

    pub fn with_gateway(mut self, gateway: GatewayRole) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_guardian(mut self, guardian: GuardianRole) -> Self {
        self.guardian = Some(guardian);
        self
    }

    pub fn with_wallet(mut self, wallet: Arc<dyn WalletRole>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    /// Roles this engine holds.
    pub fn roles(&self) -> HashSet<Role> {
        let mut roles = HashSet::new();
        if self.gateway.is_some() {
            roles.insert(Role::Gateway);
        }
        if self.guardian.is_some() {
            roles.insert(Role::Guardian);
        }
        if self.wallet.is_some() {
            roles.insert(Role::Wallet);
        }
        roles
    }

    async fn process(&self, message: &Message) -> ProtocolResult<Vec<Dispatch>> {
        let message_type = message.message_type();
        let mut dispatches = Vec::new();
        let mut handled = false;
        for role in message_type.handler_roles() {
            match role {
                Role::Gateway => {
                    if let Some(gateway) = &self.gateway {
                        dispatches.extend(gateway.handle(message).await?);
                        handled = true;
                    }
                }
                Role::Guardian => {
                    if let Some(guardian) = &self.guardian {
                        dispatches.extend(guardian.handle(message).await?);
                        handled = true;
                    }
                }
                Role::Wallet => {
                    if let Some(wallet) = &self.wallet {
                        dispatches.extend(wallet.handle(message).await?);
                        handled = true;
                    }
                }
            }
        }
        if !handled {
            // A fanned-out recovery request reaching a non-guardian party is
            // the expected broadcast case; answering it would leak who the
            // guardians are.
            if message_type == MessageType::NamespaceRecoveryRequest {
                return Err(ProtocolError::NotAGuardian);
            }
            // Never answer a problem report with another problem report.
            if message_type == MessageType::ProblemReport {
                debug!(party = %self.did, from = %message.from, "unhandled problem report");
                return Ok(vec![]);
            }
            return Err(ProtocolError::InvalidRole(message_type.handler_roles()[0]));
        }
        Ok(dispatches)
    }

    fn problem_report(&self, offender: &Message, error: &ProtocolError) -> Dispatch {
        let body = ProblemReportBody::from_error(error);
        Dispatch::Reply(
            Message::new(
                self.rng.uuid(),
                self.did.clone(),
                vec![offender.from.clone()],
                MessageBody::ProblemReport(body),
            )
            .with_pthid(offender.thid.unwrap_or(offender.id)),
        )
    }
}

#[async_trait]
impl MessageHandler for ProtocolEngine {
    async fn handle(&self, message: Message) -> Vec<Dispatch> {
        match self.process(&message).await {
            Ok(dispatches) => dispatches,
            Err(error) if error.is_silent() => {
                debug!(party = %self.did, kind = %message.message_type(), "dropping message silently");
                vec![]
            }
            Err(error) => {
                warn!(
                    party = %self.did,
                    kind = %message.message_type(),
                    from = %message.from,
                    %error,
                    "message rejected"
                );
                vec![self.problem_report(&message, &error)]
            }
        }
    }
}
