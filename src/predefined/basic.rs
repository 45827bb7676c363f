// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Built-in predefined generators.

use tracing::debug;

use super::registry::{PredefinedArgs, PredefinedRegistry};
use crate::config::ChannelSettings;
use crate::error::{Result, ValidationError};
use crate::pulse::{Block, BlockElement, Ensemble, PulseFunction};
use crate::store::AssetStaging;

/// Register `laser_on` and `rabi`.
pub fn register_builtin(registry: &PredefinedRegistry) {
    registry.register("laser_on", &["name", "length_s"], laser_on);
    registry.register(
        "rabi",
        &[
            "name",
            "tau_start_s",
            "tau_step_s",
            "points",
            "mw_amplitude",
            "mw_frequency",
            "laser_length_s",
            "wait_length_s",
        ],
        rabi,
    );
}

/// Digital levels with only the laser channel high.
fn laser_levels(settings: &ChannelSettings, laser_on: bool) -> Result<Vec<bool>> {
    let digital = settings.digital_channel_names();
    let laser = settings
        .laser_channel
        .as_deref()
        .and_then(|laser| digital.iter().position(|ch| ch == laser))
        .ok_or_else(|| ValidationError::Field {
            field: "laser_channel".into(),
            message: "an active laser channel is required".into(),
        })?;

    let mut levels = vec![false; digital.len()];
    levels[laser] = laser_on;
    Ok(levels)
}

fn positive(value: f64, field: &str) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::Field {
            field: field.to_string(),
            message: format!("must be positive, got {}", value),
        }
        .into());
    }
    Ok(value)
}

/// Laser permanently on for `length_s`.
fn laser_on(settings: &ChannelSettings, args: &PredefinedArgs, staging: &mut AssetStaging) -> Result<()> {
    let name = args.str(0, "name")?;
    let length_s = positive(args.f64(1, "length_s")?, "length_s")?;

    let element = BlockElement::new(
        length_s,
        0.0,
        laser_levels(settings, true)?,
        vec![PulseFunction::Idle; settings.analog_channels()],
    );
    staging.save_block(name, Block::new(name, vec![element]));

    let mut ensemble = Ensemble::with_settings(name, settings, false);
    ensemble.push_block(name, 0);
    staging.save_ensemble(name, ensemble);
    Ok(())
}

/// Rabi sweep: microwave pulse of growing length, laser readout, wait.
///
/// The sweep is one block repeated `points - 1` times whose microwave
/// element grows by `tau_step_s` per repetition.
fn rabi(settings: &ChannelSettings, args: &PredefinedArgs, staging: &mut AssetStaging) -> Result<()> {
    let name = args.str(0, "name")?;
    let tau_start_s = args.f64(1, "tau_start_s")?;
    let tau_step_s = args.f64(2, "tau_step_s")?;
    let points = args.u32(3, "points")?;
    let mw_amplitude = args.f64(4, "mw_amplitude")?;
    let mw_frequency = args.f64(5, "mw_frequency")?;
    let laser_length_s = positive(args.f64(6, "laser_length_s")?, "laser_length_s")?;
    let wait_length_s = positive(args.f64(7, "wait_length_s")?, "wait_length_s")?;

    if points == 0 {
        return Err(ValidationError::Field {
            field: "points".into(),
            message: "must be at least 1".into(),
        }
        .into());
    }
    if tau_start_s < 0.0 {
        return Err(ValidationError::Field {
            field: "tau_start_s".into(),
            message: format!("must be >= 0, got {}", tau_start_s),
        }
        .into());
    }
    let analog = settings.analog_channels();
    if analog == 0 {
        return Err(ValidationError::Field {
            field: "activation_config".into(),
            message: "rabi needs an analog channel".into(),
        }
        .into());
    }

    let mut mw = vec![PulseFunction::Idle; analog];
    mw[0] = PulseFunction::Sin {
        amplitude: mw_amplitude,
        frequency: mw_frequency,
        phase: 0.0,
    };
    let idle = vec![PulseFunction::Idle; analog];

    let block = Block::new(
        name,
        vec![
            BlockElement::new(tau_start_s, tau_step_s, laser_levels(settings, false)?, mw),
            BlockElement::new(laser_length_s, 0.0, laser_levels(settings, true)?, idle.clone()),
            BlockElement::new(wait_length_s, 0.0, laser_levels(settings, false)?, idle),
        ],
    );
    staging.save_block(name, block);

    let mut ensemble = Ensemble::with_settings(name, settings, true);
    ensemble.push_block(name, points - 1);
    staging.save_ensemble(name, ensemble);

    debug!(name = %name, points, "Built rabi sweep");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AssetKind, Error};
    use serde_json::json;

    #[test]
    fn test_laser_on() {
        let settings = ChannelSettings::default();
        let mut staging = AssetStaging::new();
        let args = PredefinedArgs::new(vec![json!("laser"), json!(3e-6)]);

        laser_on(&settings, &args, &mut staging).unwrap();
        assert_eq!(
            staging.staged(),
            vec![(AssetKind::Block, "laser"), (AssetKind::Ensemble, "laser")]
        );
    }

    #[test]
    fn test_laser_levels_follow_laser_channel() {
        let mut settings = ChannelSettings::default();
        settings.laser_channel = Some("d_ch2".into());
        assert_eq!(laser_levels(&settings, true).unwrap(), vec![false, true, false, false]);

        settings.laser_channel = None;
        assert!(laser_levels(&settings, true).is_err());
    }

    #[test]
    fn test_rabi_validates_arguments() {
        let settings = ChannelSettings::default();
        let mut staging = AssetStaging::new();
        let args = PredefinedArgs::new(vec![
            json!("rabi"),
            json!(10e-9),
            json!(10e-9),
            json!(0),
            json!(0.5),
            json!(2.87e9),
            json!(3e-6),
            json!(1e-6),
        ]);

        let err = rabi(&settings, &args, &mut staging).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Field { ref field, .. }) if field == "points"));
        assert!(staging.is_empty());
    }

    #[test]
    fn test_rabi_missing_argument() {
        let settings = ChannelSettings::default();
        let mut staging = AssetStaging::new();
        let args = PredefinedArgs::new(vec![json!("rabi"), json!(10e-9)]);
        assert!(rabi(&settings, &args, &mut staging).is_err());
    }
}
