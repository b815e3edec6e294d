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

//! CoralKM Wallet — the wallet-side facade.
//!
//! Orchestrates the rest of the stack for a wallet role: provisioning a
//! namespace, keeping the threshold shares of the DEK distributed across
//! granted guardians, syncing the encrypted backup to the gateway, and
//! running a recovery ceremony on a new device. Inbound wallet-role
//! messages are handled by [`handler::WalletHandler`], which plugs into a
//! `ProtocolEngine`; the application drives outbound operations through
//! [`WalletFacade`] and observes progress on the [`WalletEvent`] stream.

pub mod backup;
pub mod error;
pub mod events;
pub mod facade;
pub mod handler;
pub mod recovery;
pub mod share_manager;
pub mod sync;

mod state;

pub use backup::{ShareRecord, WalletBackup};
pub use error::{WalletError, WalletResult};
pub use events::WalletEvent;
pub use facade::{WalletConfig, WalletFacade};
pub use handler::{ChallengeResponder, FixedCodeResponder, WalletHandler};
pub use recovery::RecoveryCoordinator;
pub use share_manager::{threshold_for, ResplitReport, ShareManager};
pub use sync::NamespaceSync;

pub use coralkm_core::{Did, Message, Namespace};
pub use coralkm_crypto::Dek;
