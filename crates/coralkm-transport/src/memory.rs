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

//! In-memory mediator (development/testing).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use async_trait::async_trait;
use coralkm_core::{codec, Did, Message, MessageType, RandomSource};

use crate::error::{TransportError, TransportResult};
use crate::mediator::{Dispatch, Mediator, MessageHandler};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// In-memory mediator routing between registered endpoints.
///
/// Every delivery is encoded to the JSON wire form and decoded at the
/// receiving endpoint, so the codec's validation runs on each hop exactly
/// as it would over a real transport; a message that fails to decode earns
/// the sender a problem report from the receiving party. Dispatches
/// produced by handlers are drained breadth-first off a queue, which keeps
/// per-recipient arrival order and rules out reply recursion.
pub struct InMemoryMediator {
    endpoints: RwLock<HashMap<Did, Arc<dyn MessageHandler>>>,
    pending: Mutex<HashMap<Uuid, oneshot::Sender<Message>>>,
    rng: Arc<dyn RandomSource>,
    request_timeout: Duration,
}

impl InMemoryMediator {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self {
            endpoints: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            rng,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Attach an endpoint under its identity.
    pub async fn register(&self, did: Did, handler: Arc<dyn MessageHandler>) {
        self.endpoints.write().await.insert(did, handler);
    }

    /// Reply correlation key: `thid` for ordinary replies, `pthid` for
    /// problem reports (which thread on the parent by definition).
    fn correlation_key(message: &Message) -> Option<Uuid> {
        match message.message_type() {
            MessageType::ProblemReport => message.thid.or(message.pthid),
            _ => message.thid,
        }
    }

    async fn drain(&self, first: Dispatch) -> TransportResult<()> {
        // Each queued dispatch remembers which endpoint produced it, so a
        // broadcast is never handed back to the party that fanned it out.
        let mut queue: VecDeque<(Dispatch, Option<Did>)> = VecDeque::from([(first, None)]);
        while let Some((dispatch, producer)) = queue.pop_front() {
            let broadcast = matches!(dispatch, Dispatch::Broadcast(_));
            let message = dispatch.message().clone();

            // Resolve an awaiting request before (instead of) endpoint
            // delivery; the transport contract hands correlated replies to
            // the requester, not to its inbound handler.
            if !broadcast {
                if let Some(key) = Self::correlation_key(&message) {
                    if let Some(tx) = self.pending.lock().await.remove(&key) {
                        let _ = tx.send(message);
                        continue;
                    }
                }
            }

            let recipients: Vec<Did> = if broadcast {
                self.endpoints
                    .read()
                    .await
                    .keys()
                    .filter(|did| **did != message.from && Some(*did) != producer.as_ref())
                    .cloned()
                    .collect()
            } else {
                message.to.clone()
            };

            let raw = codec::encode(&message)
                .map_err(|e| TransportError::Codec(e.to_string()))?;
            for recipient in recipients {
                let handler = self.endpoints.read().await.get(&recipient).cloned();
                let Some(handler) = handler else {
                    warn!(recipient = %recipient, "dropping message for unknown recipient");
                    continue;
                };
                match codec::decode(&raw) {
                    Ok(decoded) => {
                        for produced in handler.handle(decoded).await {
                            queue.push_back((produced, Some(recipient.clone())));
                        }
                    }
                    Err(failure) => {
                        debug!(recipient = %recipient, error = %failure.error, "message failed to decode");
                        if let Some(report) = codec::problem_report_for(
                            &failure,
                            self.rng.uuid(),
                            recipient.clone(),
                        ) {
                            queue.push_back((Dispatch::Reply(report), Some(recipient.clone())));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Mediator for InMemoryMediator {
    async fn send(&self, message: Message) -> TransportResult<()> {
        self.drain(Dispatch::Reply(message)).await
    }

    async fn request(&self, message: Message) -> TransportResult<Message> {
        let reachable = {
            let endpoints = self.endpoints.read().await;
            message.to.iter().any(|did| endpoints.contains_key(did))
        };
        if !reachable {
            return Err(TransportError::UnknownRecipient(
                message
                    .to
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            ));
        }

        let id = message.id;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        if let Err(err) = self.drain(Dispatch::Reply(message)).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            _ => {
                self.pending.lock().await.remove(&id);
                Err(TransportError::Timeout {
                    id,
                    after: self.request_timeout,
                })
            }
        }
    }

    async fn broadcast(&self, message: Message) -> TransportResult<()> {
        self.drain(Dispatch::Broadcast(message)).await
    }
}
