//! Player configuration, loaded from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tp_audio::Backend;
use tp_engine::{EngineConfig, Interpolation};
use tp_ir::MAX_CHANNELS;

/// Output rates the player accepts.
pub const SAMPLE_RATES: &[u32] = &[8000, 22050, 44100, 48000];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerConfig {
    pub sample_rate: u32,
    /// Voice slots, fixed for the lifetime of the player
    pub voices: usize,
    pub backend: Backend,
    /// Output queue length
    pub buffer_ms: u32,
    pub interpolation: Interpolation,
    /// 0 (mono) to 100 (hard stereo)
    pub stereo_separation: u8,
    /// How long `tick` waits for room in the output queue
    pub write_timeout_ms: u64,
    /// How long the end of the song waits for the queue to play out
    pub drain_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            voices: MAX_CHANNELS,
            backend: Backend::Cpal,
            buffer_ms: 500,
            interpolation: Interpolation::Linear,
            stereo_separation: 70,
            write_timeout_ms: 2000,
            drain_timeout_ms: 2000,
        }
    }
}

impl PlayerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loading config from {}", path.as_ref().display());
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(ConfigError::Invalid(format!(
                "sample_rate {} is not one of {SAMPLE_RATES:?}",
                self.sample_rate
            )));
        }
        if self.voices == 0 || self.voices > MAX_CHANNELS {
            return Err(ConfigError::Invalid(format!(
                "voices must be 1..={MAX_CHANNELS}, got {}",
                self.voices
            )));
        }
        if self.stereo_separation > 100 {
            return Err(ConfigError::Invalid(format!(
                "stereo_separation must be 0..=100, got {}",
                self.stereo_separation
            )));
        }
        if self.buffer_ms < 10 {
            return Err(ConfigError::Invalid("buffer_ms must be at least 10".into()));
        }
        Ok(())
    }

    /// Engine parameters for a given device rate.
    pub fn engine_config(&self, sample_rate: u32) -> EngineConfig {
        EngineConfig {
            sample_rate,
            voices: self.voices,
            interpolation: self.interpolation,
            stereo_separation: self.stereo_separation,
        }
    }
}
