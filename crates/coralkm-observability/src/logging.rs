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

use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::Layered};

use crate::config::{LogConfig, LogFormat};
use crate::error::{ObservabilityError, ObservabilityResult};

type FilteredRegistry = Layered<EnvFilter, Registry>;

/// Initialize global logging with the given configuration.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: LogConfig) -> ObservabilityResult<()> {
    let env_filter = build_env_filter(&config)?;
    let mut layers: Vec<Box<dyn Layer<FilteredRegistry> + Send + Sync>> = Vec::new();
    if config.stdout {
        layers.push(stdout_layer(config.format));
    }
    if let Some(path) = &config.file {
        layers.push(file_layer(path, config.format)?);
    }
    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| ObservabilityError::LoggingInitFailed(e.to_string()))
}

fn build_env_filter(config: &LogConfig) -> ObservabilityResult<EnvFilter> {
    let directive = config.filter.as_deref().unwrap_or("info");
    EnvFilter::try_new(directive)
        .map_err(|e| ObservabilityError::LoggingInitFailed(e.to_string()))
}

fn stdout_layer(format: LogFormat) -> Box<dyn Layer<FilteredRegistry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

fn file_layer(
    path: &str,
    format: LogFormat,
) -> ObservabilityResult<Box<dyn Layer<FilteredRegistry> + Send + Sync>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            ObservabilityError::LoggingInitFailed(format!("failed to open log file: {e}"))
        })?;
    let writer: Arc<File> = Arc::new(file);
    let layer = match format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(writer).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(writer).boxed(),
    };
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = LogConfig {
            filter: Some("not=a=filter".to_string()),
            ..Default::default()
        };
        assert!(init_logging(config).is_err());
    }
}
