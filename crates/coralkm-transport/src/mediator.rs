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

//! Mediator and endpoint contracts.

use async_trait::async_trait;

use coralkm_core::Message;

use crate::error::TransportResult;

/// What an endpoint wants done with a message it produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Deliver to the recipients in the message's `to` field.
    Reply(Message),
    /// Deliver to every reachable party; used by the gateway to fan a
    /// recovery request out to guardians it cannot enumerate.
    Broadcast(Message),
}

impl Dispatch {
    pub fn message(&self) -> &Message {
        match self {
            Self::Reply(message) | Self::Broadcast(message) => message,
        }
    }
}

/// A protocol endpoint: receives one validated message, returns any
/// messages it wants sent in response. Handlers are short and non-blocking;
/// store and crypto work may suspend.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> Vec<Dispatch>;
}

/// The secure-messaging transport as CoralKM sees it.
///
/// Implementations are assumed to deliver sender-authenticated,
/// recipient-encrypted messages and to correlate a reply to its request via
/// `thid`. Every request carries an implicit deadline; on expiry the caller
/// marks the thread failed without rolling back remote state.
#[async_trait]
pub trait Mediator: Send + Sync {
    /// Fire-and-forget delivery to the message's recipients.
    async fn send(&self, message: Message) -> TransportResult<()>;

    /// Deliver and await the correlated reply (`reply.thid == message.id`).
    async fn request(&self, message: Message) -> TransportResult<Message>;

    /// Deliver to every reachable party.
    async fn broadcast(&self, message: Message) -> TransportResult<()>;
}
