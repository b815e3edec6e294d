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

//! Observability error types.

use thiserror::Error;

/// Result type alias for observability operations.
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("logging initialization failed: {0}")]
    LoggingInitFailed(String),
}
