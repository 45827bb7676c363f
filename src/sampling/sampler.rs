// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ensemble sampler.
//!
//! Turns an ensemble into per-channel sample arrays, either all at once
//! (monolithic) or one element at a time handed straight to a writer
//! (chunked).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use ndarray::{s, Array1, Array2, ArrayViewMut2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::analysis::{EnsembleAnalysis, ResolvedEnsemble};
use super::remove_stale_files;
use crate::error::{Result, SamplingError};
use crate::pulse::BlockElement;
use crate::validation;
use crate::writer::{SampleChunk, WaveformWriter};

/// How samples are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Allocate the full waveform, write it in one call.
    #[default]
    Monolithic,
    /// Write each element as soon as it is sampled.
    Chunked,
}

/// Constraints applied by the sampler.
#[derive(Debug, Clone, Copy)]
pub struct SamplerOptions<'a> {
    /// Configured analog channel count.
    pub analog_channels: usize,
    /// Configured digital channel count.
    pub digital_channels: usize,
    /// Largest monolithic waveform, in samples per channel.
    pub max_monolithic_samples: u64,
    /// Checked between elements.
    pub cancel: Option<&'a AtomicBool>,
}

impl SamplerOptions<'_> {
    /// Options for `analog`/`digital` channels without a size limit.
    pub fn new(analog_channels: usize, digital_channels: usize) -> Self {
        Self {
            analog_channels,
            digital_channels,
            max_monolithic_samples: u64::MAX,
            cancel: None,
        }
    }
}

/// Result of [`EnsembleSampler::sample`].
#[derive(Debug, Clone, Default)]
pub struct SampleOutput {
    /// `[channel, sample]`, only when sampled monolithically without writing.
    pub analog: Option<Array2<f32>>,
    /// `[channel, sample]`, only when sampled monolithically without writing.
    pub digital: Option<Array2<bool>>,
    /// Files reported by the writer.
    pub files: Vec<String>,
    /// Phase offset to pass to the next sampling call.
    pub offset_bin: u64,
}

/// Samples one resolved ensemble.
pub struct EnsembleSampler<'a> {
    resolved: &'a ResolvedEnsemble<'a>,
    writer: &'a dyn WaveformWriter,
    waveform_dir: &'a Path,
    options: SamplerOptions<'a>,
}

impl<'a> EnsembleSampler<'a> {
    pub fn new(
        resolved: &'a ResolvedEnsemble<'a>,
        writer: &'a dyn WaveformWriter,
        waveform_dir: &'a Path,
        options: SamplerOptions<'a>,
    ) -> Self {
        Self {
            resolved,
            writer,
            waveform_dir,
            options,
        }
    }

    /// Sample the ensemble starting at `offset_bin`.
    ///
    /// Output files are named after the ensemble plus `name_tag`. With
    /// `write == false` nothing is written and the arrays are returned;
    /// chunked mode then falls back to monolithic.
    pub fn sample(
        &self,
        mode: SamplingMode,
        offset_bin: u64,
        write: bool,
        name_tag: &str,
    ) -> Result<SampleOutput> {
        let ensemble = self.resolved.ensemble;

        validation::validate_channel_counts(
            ensemble,
            self.options.analog_channels,
            self.options.digital_channels,
        )?;
        validation::validate_sample_rate(ensemble)?;
        for (block, _) in &self.resolved.blocks {
            validation::validate_block(ensemble, block)?;
        }
        let amplitudes = validation::amplitudes(ensemble)?;

        let analysis = self.resolved.analyze();
        let chunked = match mode {
            SamplingMode::Chunked if write => true,
            SamplingMode::Chunked => {
                debug!(ensemble = %ensemble.name, "Nothing to stream to, sampling monolithically");
                false
            }
            SamplingMode::Monolithic => false,
        };
        if !chunked {
            validation::validate_monolithic_size(
                analysis.total_samples,
                self.options.max_monolithic_samples,
            )?;
        }

        let output_name = format!("{}{}", ensemble.name, name_tag);
        if write {
            remove_stale_files(self.waveform_dir, &format!("{}_ch", output_name))?;
        }

        let start = Instant::now();
        let output = if chunked {
            self.sample_chunked(&output_name, &analysis, &amplitudes, offset_bin)?
        } else {
            self.sample_monolithic(&output_name, &analysis, &amplitudes, offset_bin, write)?
        };
        debug!(
            ensemble = %ensemble.name,
            output = %output_name,
            samples = analysis.total_samples,
            elements = analysis.total_elements,
            chunked,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sampled ensemble"
        );
        Ok(output)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.options.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            warn!(ensemble = %self.resolved.ensemble.name, "Sampling cancelled");
            return Err(SamplingError::Cancelled.into());
        }
        Ok(())
    }

    fn sample_chunked(
        &self,
        output_name: &str,
        analysis: &EnsembleAnalysis,
        amplitudes: &[f64],
        offset_bin: u64,
    ) -> Result<SampleOutput> {
        let ensemble = self.resolved.ensemble;
        let mut offset = offset_bin;
        let mut files = Vec::new();

        if analysis.total_elements == 0 {
            let written = self
                .writer
                .write_chunk(self.waveform_dir, output_name, None, 0, true, true)?;
            merge_files(&mut files, written);
        }

        let playbacks = self.resolved.elements().zip(&analysis.state_length_bins);
        for (index, ((element, _), &bins)) in playbacks.enumerate() {
            self.check_cancelled()?;

            let mut analog = Array2::<f32>::zeros((ensemble.analog_channels, bins));
            let mut digital = Array2::from_elem((ensemble.digital_channels, bins), false);
            let t = time_vector(offset, bins, ensemble.sample_rate);
            fill_element(element, &t, amplitudes, analog.view_mut(), digital.view_mut());

            let chunk = SampleChunk {
                analog: analog.view(),
                digital: digital.view(),
            };
            let written = self.writer.write_chunk(
                self.waveform_dir,
                output_name,
                Some(chunk),
                analysis.total_samples,
                index == 0,
                index + 1 == analysis.total_elements,
            )?;
            merge_files(&mut files, written);

            if ensemble.rotating_frame {
                offset += bins as u64;
            }
        }

        Ok(SampleOutput {
            analog: None,
            digital: None,
            files,
            offset_bin: offset,
        })
    }

    fn sample_monolithic(
        &self,
        output_name: &str,
        analysis: &EnsembleAnalysis,
        amplitudes: &[f64],
        offset_bin: u64,
        write: bool,
    ) -> Result<SampleOutput> {
        let ensemble = self.resolved.ensemble;
        let total = analysis.total_samples;
        let mut analog = Array2::<f32>::zeros((ensemble.analog_channels, total));
        let mut digital = Array2::from_elem((ensemble.digital_channels, total), false);

        let mut offset = offset_bin;
        let mut cursor = 0;
        let playbacks = self.resolved.elements().zip(&analysis.state_length_bins);
        for ((element, _), &bins) in playbacks {
            self.check_cancelled()?;

            let t = time_vector(offset, bins, ensemble.sample_rate);
            fill_element(
                element,
                &t,
                amplitudes,
                analog.slice_mut(s![.., cursor..cursor + bins]),
                digital.slice_mut(s![.., cursor..cursor + bins]),
            );
            cursor += bins;

            if ensemble.rotating_frame {
                offset += bins as u64;
            }
        }

        if !write {
            return Ok(SampleOutput {
                analog: Some(analog),
                digital: Some(digital),
                files: Vec::new(),
                offset_bin: offset,
            });
        }

        let chunk = SampleChunk {
            analog: analog.view(),
            digital: digital.view(),
        };
        let files = self
            .writer
            .write_chunk(self.waveform_dir, output_name, Some(chunk), total, true, true)?;
        Ok(SampleOutput {
            analog: None,
            digital: None,
            files,
            offset_bin: offset,
        })
    }
}

/// `t[i] = (offset_bin + i) / sample_rate`.
fn time_vector(offset_bin: u64, bins: usize, sample_rate: f64) -> Array1<f64> {
    Array1::from_shape_fn(bins, |i| (offset_bin + i as u64) as f64 / sample_rate)
}

/// Fill one element's samples into `analog` and `digital` (`[channel, sample]`).
///
/// Analog values are computed in f64 and narrowed to f32 once, here.
fn fill_element(
    element: &BlockElement,
    t: &Array1<f64>,
    amplitudes: &[f64],
    mut analog: ArrayViewMut2<'_, f32>,
    mut digital: ArrayViewMut2<'_, bool>,
) {
    for (mut row, &high) in digital.rows_mut().into_iter().zip(&element.digital_high) {
        row.fill(high);
    }

    let channels = element.pulse_function.iter().zip(amplitudes);
    for (mut row, (function, &amplitude)) in analog.rows_mut().into_iter().zip(channels) {
        let values = function.evaluate(t);
        row.zip_mut_with(&values, |out, &v| *out = (v / amplitude) as f32);
    }
}

fn merge_files(files: &mut Vec<String>, written: Vec<String>) {
    for file in written {
        if !files.contains(&file) {
            files.push(file);
        }
    }
}
