// Copyright 2025 eraflo
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

//! Process-wide logger setup.
//!
//! The `log` records of every strata crate go to `env_logger`. The `tracing` spans
//! around frame begin/end go to an optional `tracing-subscriber` fmt subscriber.

use std::sync::Once;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logger configuration.
///
/// `filter` follows the `env_logger` / `EnvFilter` directive syntax
/// (e.g. "info", "strata_core=debug,wgpu=warn"). `RUST_LOG` wins over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default directives when `RUST_LOG` is unset.
    pub filter: String,
    /// Colour the output when the terminal supports it.
    pub color: bool,
    /// Also install a `tracing` subscriber for frame spans.
    pub frame_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,wgpu_core=warn,wgpu_hal=warn,naga=warn".to_owned(),
            color: true,
            frame_spans: false,
        }
    }
}

impl LoggingConfig {
    /// Parses a configuration from JSON, missing fields taking their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid logging configuration")
    }

    fn directives(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.filter.clone())
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Subsequent calls are ignored. Intended usage is early in `main`.
pub fn init(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&config.directives());
        builder.write_style(if config.color {
            env_logger::WriteStyle::Auto
        } else {
            env_logger::WriteStyle::Never
        });
        if let Err(e) = builder.try_init() {
            eprintln!("strata-telemetry: a logger was already installed: {e}");
            return;
        }
        log::debug!("logging initialized");

        if config.frame_spans {
            if let Err(e) = init_tracing(config) {
                log::warn!("frame spans disabled: {e:#}");
            }
        }
    });
}

/// Installs a fmt subscriber for `tracing` spans and events.
///
/// Only the subscriber is installed: `log` records keep going to `env_logger`.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directives()).context("invalid tracing filter")?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.color)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("a tracing subscriber was already installed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config = LoggingConfig::from_json(r#"{ "frame_spans": true }"#).unwrap();
        assert!(config.frame_spans);
        assert_eq!(config.filter, LoggingConfig::default().filter);
    }

    #[test]
    fn malformed_config_is_rejected() {
        assert!(LoggingConfig::from_json("{ filter: }").is_err());
    }

    #[test]
    fn init_is_idempotent() {
        let config = LoggingConfig::default();
        init(&config);
        init(&config);
        log::info!("still logging");
    }
}
