// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Writer trait definitions.

use std::path::Path;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pulse::StepParameters;

/// Samples of one write call, `[channel, sample]`.
#[derive(Debug, Clone, Copy)]
pub struct SampleChunk<'a> {
    pub analog: ArrayView2<'a, f32>,
    pub digital: ArrayView2<'a, bool>,
}

impl SampleChunk<'_> {
    /// Samples per channel in this chunk.
    pub fn len(&self) -> usize {
        self.analog.ncols().max(self.digital.ncols())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One step of a sampled sequence as handed to a [`SequenceWriter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStepDescriptor {
    /// Files holding the step's waveform.
    pub files: Vec<String>,
    /// Playback directives of the step.
    #[serde(flatten)]
    pub params: StepParameters,
}

/// Writes sampled waveforms in one container format.
///
/// A waveform may arrive in several chunks. `is_first_chunk` means
/// create-or-truncate, `is_last_chunk` means finalize (trailers, headers,
/// closing). A finalize-only call passes `chunk = None`.
///
/// Every file written for `name` must be named `<name>_ch...` so stale
/// output can be found by prefix before re-sampling.
pub trait WaveformWriter: Send + Sync {
    /// Format key this writer is registered under.
    fn format(&self) -> &str;

    /// Write one chunk and return the files written or updated.
    fn write_chunk(
        &self,
        dir: &Path,
        name: &str,
        chunk: Option<SampleChunk<'_>>,
        total_samples: usize,
        is_first_chunk: bool,
        is_last_chunk: bool,
    ) -> Result<Vec<String>>;
}

/// Writes sequence tables in one container format.
///
/// Files must be named `<name>.seq...`.
pub trait SequenceWriter: Send + Sync {
    /// Format key this writer is registered under.
    fn format(&self) -> &str;

    /// Write the step table and return the files written.
    fn write_sequence(
        &self,
        dir: &Path,
        name: &str,
        steps: &[SequenceStepDescriptor],
    ) -> Result<Vec<String>>;
}
