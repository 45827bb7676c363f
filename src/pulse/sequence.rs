// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequences of ensembles with playback parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Playback directives of one sequence step.
///
/// These are passed through to the sequence writer untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepParameters {
    /// Extra plays of the step (0 = play once).
    #[serde(default)]
    pub repetitions: u32,
    /// Wait for a trigger before playing the step.
    #[serde(default)]
    pub trigger_wait: bool,
    /// Step to continue with (0 = next).
    #[serde(default)]
    pub go_to: u32,
    /// Step to jump to on an event (0 = none).
    #[serde(default)]
    pub event_jump_to: u32,
}

/// One entry of a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStep {
    pub ensemble: String,
    #[serde(default)]
    pub params: StepParameters,
}

impl SequenceStep {
    pub fn new(ensemble: impl Into<String>, params: StepParameters) -> Self {
        Self {
            ensemble: ensemble.into(),
            params,
        }
    }
}

/// Ordered composition of ensembles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub ensemble_param_list: Vec<SequenceStep>,
    #[serde(default)]
    pub rotating_frame: bool,
    /// Files produced per sampled output name by the most recent sampling.
    #[serde(default)]
    pub sampled_ensembles: BTreeMap<String, Vec<String>>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, rotating_frame: bool) -> Self {
        Self {
            name: name.into(),
            ensemble_param_list: Vec::new(),
            rotating_frame,
            sampled_ensembles: BTreeMap::new(),
        }
    }

    pub fn push_step(&mut self, ensemble: impl Into<String>, params: StepParameters) -> &mut Self {
        self.ensemble_param_list
            .push(SequenceStep::new(ensemble, params));
        self
    }

    /// Distinct ensemble names, in first-seen order.
    pub fn distinct_ensembles(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for step in &self.ensemble_param_list {
            if !names.contains(&step.ensemble.as_str()) {
                names.push(&step.ensemble);
            }
        }
        names
    }
}
