// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sampling of ensembles and sequences into per-channel sample streams.
//!
//! - [`analysis`]: sample counts per element, without evaluating functions
//! - [`sampler`]: one ensemble, monolithic or chunked
//! - [`sequence`]: a sequence of ensembles plus its step table

pub mod analysis;
pub mod sampler;
pub mod sequence;

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;

pub use analysis::{analyze_ensemble, length_bins, EnsembleAnalysis, ResolvedEnsemble};
pub use sampler::{EnsembleSampler, SampleOutput, SamplerOptions, SamplingMode};
pub use sequence::{SequenceSampleOutput, SequenceSampler};

/// Delete files in `dir` whose names start with `prefix`.
///
/// Returns the number of files removed.
pub(crate) fn remove_stale_files(dir: &Path, prefix: &str) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_stale = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(prefix));
        if is_stale && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    if removed > 0 {
        info!(dir = %dir.display(), prefix = %prefix, removed, "Removed stale sampled files");
    }
    Ok(removed)
}
