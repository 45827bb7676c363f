// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the sequence generator.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. pulsegen.yaml / config.yaml file
//! 3. Environment variables (PULSEGEN_*)
//! 4. CLI arguments

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ValidationError};

/// Prefix of analog channel names in an activation config.
pub const ANALOG_PREFIX: &str = "a_ch";
/// Prefix of digital channel names in an activation config.
pub const DIGITAL_PREFIX: &str = "d_ch";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage locations
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Channel settings applied at start-up
    #[serde(default)]
    pub settings: ChannelSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Resource limits
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                config = serde_yaml::from_str(&content)?;
            }
        } else {
            for path in &["pulsegen.yaml", "config.yaml"] {
                let path = Path::new(path);
                if path.exists() {
                    let content = std::fs::read_to_string(path)?;
                    config = serde_yaml::from_str(&content)?;
                    break;
                }
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PULSEGEN_PULSED_FILE_DIR") {
            self.generator.pulsed_file_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("PULSEGEN_SAMPLE_RATE") {
            if let Ok(rate) = val.parse() {
                self.settings.sample_rate = rate;
            }
        }
        if let Ok(val) = env::var("PULSEGEN_WAVEFORM_FORMAT") {
            self.settings.waveform_format = val;
        }
        if let Ok(val) = env::var("PULSEGEN_SEQUENCE_FORMAT") {
            self.settings.sequence_format = val;
        }
        if let Ok(val) = env::var("PULSEGEN_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("PULSEGEN_LOG_FORMAT") {
            self.logging.format = val;
        }
    }

    /// Validate configuration.
    ///
    /// Settings are checked after the laser channel fallback is applied.
    pub fn validate(&self) -> Result<()> {
        self.settings.clone().normalized().validate()?;
        if self.limits.max_monolithic_samples == 0 {
            return Err(Error::Config(
                "max_monolithic_samples cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Root directory for persisted assets and sampled files
    #[serde(default = "default_pulsed_file_dir")]
    pub pulsed_file_dir: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            pulsed_file_dir: default_pulsed_file_dir(),
        }
    }
}

fn default_pulsed_file_dir() -> PathBuf {
    PathBuf::from("./pulsed_files")
}

/// Channel configuration of the generator.
///
/// This describes what the sampler produces, not what a connected device
/// is currently set to. Channel names follow the `a_chN` / `d_chN`
/// convention; the order of analog names in `activation_config` fixes the
/// analog channel index used by block elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Active channel names
    #[serde(default = "default_activation_config")]
    pub activation_config: Vec<String>,

    /// Digital channel driving the laser
    #[serde(default = "default_laser_channel")]
    pub laser_channel: Option<String>,

    /// Full-scale normalization per analog channel
    #[serde(default = "default_amplitude_dict")]
    pub amplitude_dict: BTreeMap<String, f64>,

    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    /// Writer format key for sampled waveforms
    #[serde(default = "default_waveform_format")]
    pub waveform_format: String,

    /// Writer format key for sequences
    #[serde(default = "default_sequence_format")]
    pub sequence_format: String,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            activation_config: default_activation_config(),
            laser_channel: default_laser_channel(),
            amplitude_dict: default_amplitude_dict(),
            sample_rate: default_sample_rate(),
            waveform_format: default_waveform_format(),
            sequence_format: default_sequence_format(),
        }
    }
}

impl ChannelSettings {
    /// Active analog channel names, in activation order.
    pub fn analog_channel_names(&self) -> Vec<String> {
        analog_channel_names(&self.activation_config)
    }

    /// Active digital channel names, in activation order.
    pub fn digital_channel_names(&self) -> Vec<String> {
        digital_channel_names(&self.activation_config)
    }

    /// Number of active analog channels.
    pub fn analog_channels(&self) -> usize {
        self.analog_channel_names().len()
    }

    /// Number of active digital channels.
    pub fn digital_channels(&self) -> usize {
        self.digital_channel_names().len()
    }

    /// Resolve the laser channel against the activation list.
    ///
    /// A laser channel that is not active falls back to the first active
    /// digital channel, or to `None` if there is no digital channel.
    pub fn normalized(mut self) -> Self {
        let active = self
            .laser_channel
            .as_ref()
            .map(|ch| self.activation_config.contains(ch))
            .unwrap_or(false);
        if !active {
            let fallback = self.digital_channel_names().into_iter().next();
            match &fallback {
                Some(ch) => tracing::warn!(
                    laser_channel = ?self.laser_channel,
                    fallback = %ch,
                    "Laser channel not in activation config, using first digital channel"
                ),
                None => tracing::warn!("No digital channel present in activation config"),
            }
            self.laser_channel = fallback;
        }
        self
    }

    /// Check the settings for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(field_error(
                "sample_rate",
                format!("must be finite and > 0, got {}", self.sample_rate),
            ));
        }

        let mut seen = HashSet::new();
        for channel in &self.activation_config {
            if !channel.starts_with(ANALOG_PREFIX) && !channel.starts_with(DIGITAL_PREFIX) {
                return Err(field_error(
                    "activation_config",
                    format!("unknown channel name '{}'", channel),
                ));
            }
            if !seen.insert(channel.as_str()) {
                return Err(field_error(
                    "activation_config",
                    format!("duplicate channel '{}'", channel),
                ));
            }
        }

        for channel in self.analog_channel_names() {
            match self.amplitude_dict.get(&channel) {
                Some(amp) if amp.is_finite() && *amp > 0.0 => {}
                Some(amp) => {
                    return Err(field_error(
                        "amplitude_dict",
                        format!("amplitude for '{}' must be > 0, got {}", channel, amp),
                    ))
                }
                None => {
                    return Err(field_error(
                        "amplitude_dict",
                        format!("no amplitude for active channel '{}'", channel),
                    ))
                }
            }
        }

        if let Some(laser) = &self.laser_channel {
            if !laser.starts_with(DIGITAL_PREFIX) || !self.activation_config.contains(laser) {
                return Err(field_error(
                    "laser_channel",
                    format!("'{}' is not an active digital channel", laser),
                ));
            }
        }

        if self.waveform_format.is_empty() || self.sequence_format.is_empty() {
            return Err(field_error("format", "format keys cannot be empty".into()));
        }

        Ok(())
    }
}

/// Analog channel names in `activation_config`, in order.
pub fn analog_channel_names(activation_config: &[String]) -> Vec<String> {
    activation_config
        .iter()
        .filter(|ch| ch.starts_with(ANALOG_PREFIX))
        .cloned()
        .collect()
}

/// Digital channel names in `activation_config`, in order.
pub fn digital_channel_names(activation_config: &[String]) -> Vec<String> {
    activation_config
        .iter()
        .filter(|ch| ch.starts_with(DIGITAL_PREFIX))
        .cloned()
        .collect()
}

fn field_error(field: &str, message: String) -> Error {
    ValidationError::Field {
        field: field.into(),
        message,
    }
    .into()
}

fn default_activation_config() -> Vec<String> {
    ["a_ch1", "d_ch1", "d_ch2", "a_ch2", "d_ch3", "d_ch4"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_laser_channel() -> Option<String> {
    Some("d_ch1".into())
}

fn default_amplitude_dict() -> BTreeMap<String, f64> {
    ["a_ch1", "a_ch2", "a_ch3", "a_ch4"]
        .iter()
        .map(|ch| (ch.to_string(), 0.5))
        .collect()
}

fn default_sample_rate() -> f64 {
    25e9
}

fn default_waveform_format() -> String {
    "raw".into()
}

fn default_sequence_format() -> String {
    "rawseq".into()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

/// Resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Largest ensemble (in samples per channel) sampled into one array
    #[serde(default = "default_max_monolithic_samples")]
    pub max_monolithic_samples: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_monolithic_samples: default_max_monolithic_samples(),
        }
    }
}

fn default_max_monolithic_samples() -> u64 {
    1 << 30
}
