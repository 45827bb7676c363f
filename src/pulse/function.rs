// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Analog sampling functions.
//!
//! Each variant carries its own parameters. Evaluation is done in `f64`;
//! narrowing to the storage precision happens in the sampler.

use std::f64::consts::PI;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Analog waveform of a block element on one channel.
///
/// Frequencies are in Hz, phases in degrees, amplitudes in volts before
/// normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case")]
pub enum PulseFunction {
    /// Zero output.
    #[default]
    Idle,
    /// Constant output.
    Constant { value: f64 },
    /// `amplitude * sin(2π f t + φ)`
    Sin {
        amplitude: f64,
        frequency: f64,
        phase: f64,
    },
    /// Sum of two sines.
    DoubleSin {
        amplitude: [f64; 2],
        frequency: [f64; 2],
        phase: [f64; 2],
    },
    /// Sum of three sines.
    TripleSin {
        amplitude: [f64; 3],
        frequency: [f64; 3],
        phase: [f64; 3],
    },
}

impl PulseFunction {
    /// Identifier of the function.
    pub fn name(&self) -> &'static str {
        match self {
            PulseFunction::Idle => "idle",
            PulseFunction::Constant { .. } => "constant",
            PulseFunction::Sin { .. } => "sin",
            PulseFunction::DoubleSin { .. } => "double_sin",
            PulseFunction::TripleSin { .. } => "triple_sin",
        }
    }

    /// Evaluate at each time (seconds) in `t`.
    pub fn evaluate(&self, t: &Array1<f64>) -> Array1<f64> {
        match self {
            PulseFunction::Idle => Array1::zeros(t.len()),
            PulseFunction::Constant { value } => Array1::from_elem(t.len(), *value),
            PulseFunction::Sin {
                amplitude,
                frequency,
                phase,
            } => t.mapv(|t| sine(*amplitude, *frequency, *phase, t)),
            PulseFunction::DoubleSin {
                amplitude,
                frequency,
                phase,
            } => t.mapv(|t| sum_of_sines(amplitude, frequency, phase, t)),
            PulseFunction::TripleSin {
                amplitude,
                frequency,
                phase,
            } => t.mapv(|t| sum_of_sines(amplitude, frequency, phase, t)),
        }
    }
}

fn sine(amplitude: f64, frequency: f64, phase_deg: f64, t: f64) -> f64 {
    amplitude * (2.0 * PI * frequency * t + phase_deg.to_radians()).sin()
}

fn sum_of_sines(amplitude: &[f64], frequency: &[f64], phase: &[f64], t: f64) -> f64 {
    amplitude
        .iter()
        .zip(frequency)
        .zip(phase)
        .map(|((a, f), p)| sine(*a, *f, *p, t))
        .sum()
}
