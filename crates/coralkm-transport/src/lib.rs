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

//! CoralKM Transport — the mediator contract and an in-memory mediator.
//!
//! The real secure-messaging transport is out of scope; CoralKM only
//! requires what the [`Mediator`] trait states: sender-authenticated,
//! recipient-encrypted delivery with request/response correlation over
//! `thid`. The in-memory mediator implements the same contract for tests
//! and demos, pushing every hop through the wire codec so nothing typed
//! leaks past what the protocol can actually express.

pub mod error;
pub mod mediator;
pub mod memory;

pub use error::{TransportError, TransportResult};
pub use mediator::{Dispatch, Mediator, MessageHandler};
pub use memory::InMemoryMediator;
