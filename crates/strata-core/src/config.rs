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

//! Settings for the frame lifecycle subsystems.
//!
//! Every field has a default; a JSON document only needs the fields it overrides.

use crate::renderer::api::{TextureFormat, COPY_BUFFER_ALIGNMENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on frames in flight.
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// An invalid [`RendererConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Frames in flight must be within `1..=MAX_FRAMES_IN_FLIGHT`.
    #[error("frames_in_flight must be between 1 and {MAX_FRAMES_IN_FLIGHT}, got {0}")]
    FramesInFlight(usize),
    /// Staging alignment must be a power of two no smaller than the copy alignment.
    #[error("staging alignment must be a power of two of at least {COPY_BUFFER_ALIGNMENT}, got {0}")]
    Alignment(u64),
    /// The default staging chunk cannot be empty.
    #[error("staging chunk size must be non-zero")]
    ZeroChunkSize,
    /// The cull array needs room for at least one record.
    #[error("max_cull_records must be non-zero")]
    ZeroCullCapacity,
    /// The scene depth target is sampled by the culler, so it must be depth-only.
    #[error("depth_format must be a depth-only format, got {0:?}")]
    DepthFormat(TextureFormat),
    /// The depth bias must be a finite, non-negative number.
    #[error("culling depth_bias must be finite and non-negative, got {0}")]
    DepthBias(f32),
    /// The document is not valid JSON for this schema.
    #[error("failed to parse renderer config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Preferred presentation mode; the backend falls back to FIFO if unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PresentModePreference {
    /// Vsync, always supported.
    #[default]
    Fifo,
    /// Low-latency vsync.
    Mailbox,
    /// No vsync.
    Immediate,
}

/// Settings of the [`StagingAllocator`](crate::frame::StagingAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Size of a freshly allocated chunk, before alignment.
    pub chunk_size: u64,
    /// Every allocation is rounded up to this power of two, at least 4.
    pub alignment: u64,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            alignment: 256,
        }
    }
}

/// Settings of the [`DepthPyramidCuller`](crate::culling::DepthPyramidCuller).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Capacity of the cull-record array. Exceeding it is fatal.
    pub max_records: u32,
    /// Depth tolerance added to the sampled pyramid depth.
    pub depth_bias: f32,
    /// When `false` every renderable is reported visible.
    pub culling_enabled: bool,
    /// When `false` the pyramid is not consulted and every renderable is visible.
    pub occlusion_enabled: bool,
    /// Bound on the same-frame visibility readback, in milliseconds.
    pub readback_timeout_ms: u64,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            max_records: 65_536,
            depth_bias: 1.0e-4,
            culling_enabled: true,
            occlusion_enabled: true,
            readback_timeout_ms: 1_000,
        }
    }
}

impl CullingConfig {
    /// The readback bound as a `Duration`.
    pub fn readback_timeout(&self) -> Duration {
        Duration::from_millis(self.readback_timeout_ms)
    }
}

/// Settings shared by the whole frame lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of frame slots (N-buffering).
    pub frames_in_flight: usize,
    /// Bound on the wait for a slot's previous submission, in milliseconds.
    pub slot_wait_timeout_ms: u64,
    /// Format of the scene depth target.
    pub depth_format: TextureFormat,
    /// Preferred presentation mode.
    pub present_mode: PresentModePreference,
    /// Staging allocator settings.
    pub staging: StagingConfig,
    /// Culling settings.
    pub culling: CullingConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            slot_wait_timeout_ms: 1_000,
            depth_format: TextureFormat::Depth32Float,
            present_mode: PresentModePreference::default(),
            staging: StagingConfig::default(),
            culling: CullingConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to pretty JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(ConfigError::FramesInFlight(self.frames_in_flight));
        }
        if !self.staging.alignment.is_power_of_two() || self.staging.alignment < COPY_BUFFER_ALIGNMENT {
            return Err(ConfigError::Alignment(self.staging.alignment));
        }
        if self.staging.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.culling.max_records == 0 {
            return Err(ConfigError::ZeroCullCapacity);
        }
        if !self.depth_format.is_depth() || self.depth_format.has_stencil() {
            return Err(ConfigError::DepthFormat(self.depth_format));
        }
        let bias = self.culling.depth_bias;
        if !bias.is_finite() || bias < 0.0 {
            return Err(ConfigError::DepthBias(bias));
        }
        Ok(())
    }

    /// The slot wait bound as a `Duration`.
    pub fn slot_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.slot_wait_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.staging.chunk_size, 1 << 20);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            RendererConfig::from_json_str(r#"{ "frames_in_flight": 2, "culling": { "max_records": 128 } }"#)
                .unwrap();
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.culling.max_records, 128);
        assert!(config.culling.occlusion_enabled);
        assert_eq!(config.staging, StagingConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            RendererConfig::from_json_str(r#"{ "frames_in_flight": 0 }"#),
            Err(ConfigError::FramesInFlight(0))
        ));
        assert!(matches!(
            RendererConfig::from_json_str(r#"{ "staging": { "alignment": 24 } }"#),
            Err(ConfigError::Alignment(24))
        ));
        assert!(matches!(
            RendererConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn alignment_below_four_bytes_is_rejected() {
        for alignment in [1, 2] {
            assert!(matches!(
                RendererConfig::from_json_str(&format!(r#"{{ "staging": {{ "alignment": {alignment} }} }}"#)),
                Err(ConfigError::Alignment(a)) if a == alignment
            ));
        }
        assert!(RendererConfig::from_json_str(r#"{ "staging": { "alignment": 4 } }"#).is_ok());
    }

    #[test]
    fn depth_settings_are_checked() {
        assert!(matches!(
            RendererConfig::from_json_str(r#"{ "depth_format": "Rgba8Unorm" }"#),
            Err(ConfigError::DepthFormat(TextureFormat::Rgba8Unorm))
        ));
        assert!(matches!(
            RendererConfig::from_json_str(r#"{ "depth_format": "Depth24PlusStencil8" }"#),
            Err(ConfigError::DepthFormat(TextureFormat::Depth24PlusStencil8))
        ));
        assert!(matches!(
            RendererConfig::from_json_str(r#"{ "culling": { "depth_bias": -0.5 } }"#),
            Err(ConfigError::DepthBias(_))
        ));

        let mut config = RendererConfig::default();
        config.culling.depth_bias = f32::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::DepthBias(b)) if b.is_nan()));
        config.culling.depth_bias = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_round_trip_preserves_settings() {
        let mut config = RendererConfig::default();
        config.present_mode = PresentModePreference::Mailbox;
        let json = config.to_json_string().unwrap();
        assert_eq!(RendererConfig::from_json_str(&json).unwrap(), config);
    }
}
