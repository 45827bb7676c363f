// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structural validation of ensembles before sampling.

use crate::error::{Result, SamplingError, ValidationError};
use crate::pulse::{Block, Ensemble};

/// Validate an ensemble's channel counts against the configured counts.
pub fn validate_channel_counts(
    ensemble: &Ensemble,
    analog_channels: usize,
    digital_channels: usize,
) -> Result<()> {
    if ensemble.analog_channels != analog_channels || ensemble.digital_channels != digital_channels
    {
        return Err(SamplingError::ChannelMismatch {
            context: format!("ensemble '{}'", ensemble.name),
            expected_analog: analog_channels,
            expected_digital: digital_channels,
            found_analog: ensemble.analog_channels,
            found_digital: ensemble.digital_channels,
        }
        .into());
    }

    let named = ensemble.analog_channel_names().len();
    if named != ensemble.analog_channels {
        return Err(SamplingError::ChannelMismatch {
            context: format!("activation config of ensemble '{}'", ensemble.name),
            expected_analog: ensemble.analog_channels,
            expected_digital: ensemble.digital_channels,
            found_analog: named,
            found_digital: ensemble.digital_channels,
        }
        .into());
    }

    Ok(())
}

/// Validate every element of `block` against the ensemble's channel counts
/// and check element lengths.
pub fn validate_block(ensemble: &Ensemble, block: &Block) -> Result<()> {
    for (i, element) in block.element_list.iter().enumerate() {
        if element.analog_channels() != ensemble.analog_channels
            || element.digital_channels() != ensemble.digital_channels
        {
            return Err(SamplingError::ChannelMismatch {
                context: format!("block '{}' element {}", block.name, i),
                expected_analog: ensemble.analog_channels,
                expected_digital: ensemble.digital_channels,
                found_analog: element.analog_channels(),
                found_digital: element.digital_channels(),
            }
            .into());
        }

        if !element.init_length_s.is_finite() || element.init_length_s < 0.0 {
            return Err(ValidationError::Field {
                field: format!("{}[{}].init_length_s", block.name, i),
                message: format!("must be finite and >= 0, got {}", element.init_length_s),
            }
            .into());
        }
        if !element.increment_s.is_finite() {
            return Err(ValidationError::Field {
                field: format!("{}[{}].increment_s", block.name, i),
                message: "must be finite".into(),
            }
            .into());
        }
    }
    Ok(())
}

/// Resolve the amplitude divisor of each analog channel, in index order.
pub fn amplitudes(ensemble: &Ensemble) -> Result<Vec<f64>> {
    ensemble
        .analog_channel_names()
        .into_iter()
        .map(|name| match ensemble.amplitude_dict.get(&name) {
            Some(&amp) if amp.is_finite() && amp != 0.0 => Ok(amp),
            Some(&amp) => Err(ValidationError::Field {
                field: format!("amplitude_dict.{}", name),
                message: format!("must be finite and non-zero, got {}", amp),
            }
            .into()),
            None => Err(SamplingError::MissingAmplitude(name).into()),
        })
        .collect()
}

/// Validate the ensemble's sample rate.
pub fn validate_sample_rate(ensemble: &Ensemble) -> Result<()> {
    if !ensemble.sample_rate.is_finite() || ensemble.sample_rate <= 0.0 {
        return Err(ValidationError::Field {
            field: "sample_rate".into(),
            message: format!(
                "ensemble '{}' has invalid sample rate {}",
                ensemble.name, ensemble.sample_rate
            ),
        }
        .into());
    }
    Ok(())
}

/// Refuse monolithic arrays larger than `limit` samples per channel.
pub fn validate_monolithic_size(total_samples: usize, limit: u64) -> Result<()> {
    if total_samples as u64 > limit {
        return Err(ValidationError::ResourceLimit {
            resource: "monolithic_samples".into(),
            limit,
            requested: total_samples as u64,
        }
        .into());
    }
    Ok(())
}
