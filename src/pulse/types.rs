// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Blocks, block elements and ensembles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::function::PulseFunction;
use crate::config::{self, ChannelSettings};

/// An atomic timed segment.
///
/// # Invariants
///
/// - `init_length_s >= 0.0`
/// - `digital_high.len()` equals the digital channel count of the owning
///   ensemble, `pulse_function.len()` its analog channel count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockElement {
    /// Length of the first repetition in seconds.
    pub init_length_s: f64,
    /// Length added per repetition in seconds.
    #[serde(default)]
    pub increment_s: f64,
    /// Level of each digital channel for the whole element.
    pub digital_high: Vec<bool>,
    /// Waveform of each analog channel.
    pub pulse_function: Vec<PulseFunction>,
}

impl BlockElement {
    pub fn new(
        init_length_s: f64,
        increment_s: f64,
        digital_high: Vec<bool>,
        pulse_function: Vec<PulseFunction>,
    ) -> Self {
        Self {
            init_length_s,
            increment_s,
            digital_high,
            pulse_function,
        }
    }

    /// Element of `length_s` with every analog channel idle and every
    /// digital channel low.
    pub fn idle(length_s: f64, analog_channels: usize, digital_channels: usize) -> Self {
        Self::new(
            length_s,
            0.0,
            vec![false; digital_channels],
            vec![PulseFunction::Idle; analog_channels],
        )
    }

    /// Length in seconds of the `repetition`-th playback (0-based).
    ///
    /// Negative increments can shrink an element to zero but not below.
    pub fn length_s(&self, repetition: u32) -> f64 {
        (self.init_length_s + repetition as f64 * self.increment_s).max(0.0)
    }

    pub fn analog_channels(&self) -> usize {
        self.pulse_function.len()
    }

    pub fn digital_channels(&self) -> usize {
        self.digital_high.len()
    }
}

/// Named ordered list of elements. Order is playback order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub element_list: Vec<BlockElement>,
}

impl Block {
    pub fn new(name: impl Into<String>, element_list: Vec<BlockElement>) -> Self {
        Self {
            name: name.into(),
            element_list,
        }
    }

    pub fn push(&mut self, element: BlockElement) -> &mut Self {
        self.element_list.push(element);
        self
    }

    pub fn len(&self) -> usize {
        self.element_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element_list.is_empty()
    }

    /// Analog channel count of the first element.
    pub fn analog_channels(&self) -> Option<usize> {
        self.element_list.first().map(BlockElement::analog_channels)
    }

    /// Digital channel count of the first element.
    pub fn digital_channels(&self) -> Option<usize> {
        self.element_list.first().map(BlockElement::digital_channels)
    }

    /// Whether all elements agree on their channel counts.
    pub fn is_consistent(&self) -> bool {
        match self.element_list.first() {
            None => true,
            Some(first) => self.element_list.iter().all(|e| {
                e.analog_channels() == first.analog_channels()
                    && e.digital_channels() == first.digital_channels()
            }),
        }
    }
}

/// Reference to a stored block with a repetition count.
///
/// The block plays `repetitions + 1` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub block: String,
    #[serde(default)]
    pub repetitions: u32,
}

impl BlockRef {
    pub fn new(block: impl Into<String>, repetitions: u32) -> Self {
        Self {
            block: block.into(),
            repetitions,
        }
    }

    /// Number of times the block is played.
    pub fn playbacks(&self) -> u32 {
        self.repetitions + 1
    }
}

/// The unit that is sampled into a waveform.
///
/// Carries the channel metadata it was built for. Sampling uses the
/// ensemble's own sample rate and amplitude normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    pub name: String,
    pub block_list: Vec<BlockRef>,
    pub analog_channels: usize,
    pub digital_channels: usize,
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Full-scale normalization divisor per analog channel name.
    pub amplitude_dict: BTreeMap<String, f64>,
    pub activation_config: Vec<String>,
    #[serde(default)]
    pub laser_channel: Option<String>,
    /// Thread the time origin across elements instead of restarting it.
    #[serde(default = "default_rotating_frame")]
    pub rotating_frame: bool,
}

fn default_rotating_frame() -> bool {
    true
}

impl Ensemble {
    /// Empty ensemble whose metadata is taken from `settings`.
    pub fn with_settings(
        name: impl Into<String>,
        settings: &ChannelSettings,
        rotating_frame: bool,
    ) -> Self {
        Self {
            name: name.into(),
            block_list: Vec::new(),
            analog_channels: settings.analog_channels(),
            digital_channels: settings.digital_channels(),
            sample_rate: settings.sample_rate,
            amplitude_dict: settings.amplitude_dict.clone(),
            activation_config: settings.activation_config.clone(),
            laser_channel: settings.laser_channel.clone(),
            rotating_frame,
        }
    }

    pub fn push_block(&mut self, block: impl Into<String>, repetitions: u32) -> &mut Self {
        self.block_list.push(BlockRef::new(block, repetitions));
        self
    }

    /// Analog channel names from the activation config, in index order.
    pub fn analog_channel_names(&self) -> Vec<String> {
        config::analog_channel_names(&self.activation_config)
    }

    /// Channel settings described by this ensemble's metadata.
    ///
    /// Format keys are not part of an ensemble and are taken from `base`.
    pub fn settings(&self, base: &ChannelSettings) -> ChannelSettings {
        ChannelSettings {
            activation_config: self.activation_config.clone(),
            laser_channel: self.laser_channel.clone(),
            amplitude_dict: self.amplitude_dict.clone(),
            sample_rate: self.sample_rate,
            ..base.clone()
        }
    }

    /// Names of referenced blocks, in first-seen order.
    pub fn block_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for r in &self.block_list {
            if !names.contains(&r.block.as_str()) {
                names.push(&r.block);
            }
        }
        names
    }
}
