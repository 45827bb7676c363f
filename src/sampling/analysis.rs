// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bin analysis of an ensemble.
//!
//! Computes the sample count of every element playback without evaluating
//! any channel function. The sampler uses the same traversal and the same
//! [`length_bins`] rounding, so the counts always agree.

use crate::error::Result;
use crate::pulse::{Block, BlockElement, Ensemble};
use crate::store::PersistedMap;

/// Number of samples covering `length_s` at `sample_rate`.
///
/// Rounds half away from zero. Negative lengths give zero.
pub fn length_bins(length_s: f64, sample_rate: f64) -> usize {
    let bins = (length_s * sample_rate).round();
    if bins > 0.0 {
        bins as usize
    } else {
        0
    }
}

/// Result of [`analyze_ensemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsembleAnalysis {
    /// Samples per channel of the whole ensemble.
    pub total_samples: usize,
    /// Element playbacks, repetitions included.
    pub total_elements: usize,
    /// Equal to `total_elements`.
    pub total_states: usize,
    /// Sample count of each element playback, in playback order.
    pub state_length_bins: Vec<usize>,
}

/// An ensemble with its block references looked up.
#[derive(Debug, Clone)]
pub struct ResolvedEnsemble<'a> {
    pub ensemble: &'a Ensemble,
    /// `(block, repetitions)` in block-list order.
    pub blocks: Vec<(&'a Block, u32)>,
}

impl<'a> ResolvedEnsemble<'a> {
    /// Look up every block referenced by `ensemble`.
    pub fn resolve(ensemble: &'a Ensemble, blocks: &'a PersistedMap<Block>) -> Result<Self> {
        let blocks = ensemble
            .block_list
            .iter()
            .map(|r| Ok((blocks.get(&r.block)?, r.repetitions)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { ensemble, blocks })
    }

    /// Element playbacks as `(element, repetition)`, in playback order.
    pub fn elements(&self) -> impl Iterator<Item = (&'a BlockElement, u32)> + '_ {
        self.blocks.iter().flat_map(|&(block, repetitions)| {
            (0..=repetitions)
                .flat_map(move |rep| block.element_list.iter().map(move |element| (element, rep)))
        })
    }

    pub fn analyze(&self) -> EnsembleAnalysis {
        let rate = self.ensemble.sample_rate;
        let state_length_bins: Vec<usize> = self
            .elements()
            .map(|(element, rep)| length_bins(element.length_s(rep), rate))
            .collect();
        let total_elements = self
            .blocks
            .iter()
            .map(|(block, reps)| (*reps as usize + 1) * block.len())
            .sum();

        EnsembleAnalysis {
            total_samples: state_length_bins.iter().sum(),
            total_elements,
            total_states: total_elements,
            state_length_bins,
        }
    }
}

/// Analyze `ensemble`, looking its blocks up in `blocks`.
pub fn analyze_ensemble(ensemble: &Ensemble, blocks: &PersistedMap<Block>) -> Result<EnsembleAnalysis> {
    Ok(ResolvedEnsemble::resolve(ensemble, blocks)?.analyze())
}
