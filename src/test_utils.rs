// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test utilities.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use parking_lot::Mutex;

use crate::config::{ChannelSettings, Config};
use crate::error::{Error, Result};
use crate::pulse::{Block, BlockElement, Ensemble, PulseFunction};
use crate::writer::{SampleChunk, SequenceStepDescriptor, SequenceWriter, WaveformWriter};

/// One recorded waveform writer call.
#[derive(Debug, Clone)]
pub struct ChunkCall {
    pub name: String,
    pub analog: Option<Array2<f32>>,
    pub digital: Option<Array2<bool>>,
    pub total_samples: usize,
    pub is_first_chunk: bool,
    pub is_last_chunk: bool,
}

/// One recorded sequence writer call.
#[derive(Debug, Clone)]
pub struct SequenceCall {
    pub name: String,
    pub steps: Vec<SequenceStepDescriptor>,
}

/// Writer that records every call and writes nothing.
///
/// Reports one file `<name>_ch1.mock` per waveform.
pub struct RecordingWriter {
    pub format: String,
    pub chunks: Mutex<Vec<ChunkCall>>,
    pub sequences: Mutex<Vec<SequenceCall>>,
}

impl RecordingWriter {
    pub fn new(format: &str) -> Arc<Self> {
        Arc::new(Self {
            format: format.to_string(),
            chunks: Mutex::new(Vec::new()),
            sequences: Mutex::new(Vec::new()),
        })
    }

    pub fn chunk_calls(&self) -> Vec<ChunkCall> {
        self.chunks.lock().clone()
    }

    pub fn sequence_calls(&self) -> Vec<SequenceCall> {
        self.sequences.lock().clone()
    }

    /// Number of waveforms started (first chunks) per output name.
    pub fn waveforms_started(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for call in self.chunks.lock().iter().filter(|c| c.is_first_chunk) {
            *counts.entry(call.name.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Analog samples of all chunks for `name`, concatenated per channel.
    pub fn analog_concat(&self, name: &str) -> Vec<Vec<f32>> {
        let calls = self.chunks.lock();
        let mut out: Vec<Vec<f32>> = Vec::new();
        for call in calls.iter().filter(|c| c.name == name) {
            if let Some(analog) = &call.analog {
                if out.is_empty() {
                    out = vec![Vec::new(); analog.nrows()];
                }
                for (ch, row) in analog.rows().into_iter().enumerate() {
                    out[ch].extend(row.iter().copied());
                }
            }
        }
        out
    }

    /// Digital samples of all chunks for `name`, concatenated per channel.
    pub fn digital_concat(&self, name: &str) -> Vec<Vec<bool>> {
        let calls = self.chunks.lock();
        let mut out: Vec<Vec<bool>> = Vec::new();
        for call in calls.iter().filter(|c| c.name == name) {
            if let Some(digital) = &call.digital {
                if out.is_empty() {
                    out = vec![Vec::new(); digital.nrows()];
                }
                for (ch, row) in digital.rows().into_iter().enumerate() {
                    out[ch].extend(row.iter().copied());
                }
            }
        }
        out
    }
}

impl WaveformWriter for RecordingWriter {
    fn format(&self) -> &str {
        &self.format
    }

    fn write_chunk(
        &self,
        _dir: &Path,
        name: &str,
        chunk: Option<SampleChunk<'_>>,
        total_samples: usize,
        is_first_chunk: bool,
        is_last_chunk: bool,
    ) -> Result<Vec<String>> {
        self.chunks.lock().push(ChunkCall {
            name: name.to_string(),
            analog: chunk.map(|c| c.analog.to_owned()),
            digital: chunk.map(|c| c.digital.to_owned()),
            total_samples,
            is_first_chunk,
            is_last_chunk,
        });
        Ok(vec![format!("{}_ch1.mock", name)])
    }
}

impl SequenceWriter for RecordingWriter {
    fn format(&self) -> &str {
        &self.format
    }

    fn write_sequence(
        &self,
        _dir: &Path,
        name: &str,
        steps: &[SequenceStepDescriptor],
    ) -> Result<Vec<String>> {
        self.sequences.lock().push(SequenceCall {
            name: name.to_string(),
            steps: steps.to_vec(),
        });
        Ok(vec![format!("{}.seq.mock", name)])
    }
}

/// Writer that always fails.
pub struct FailingWriter;

impl WaveformWriter for FailingWriter {
    fn format(&self) -> &str {
        "failing"
    }

    fn write_chunk(
        &self,
        _dir: &Path,
        _name: &str,
        _chunk: Option<SampleChunk<'_>>,
        _total_samples: usize,
        _is_first_chunk: bool,
        _is_last_chunk: bool,
    ) -> Result<Vec<String>> {
        Err(Error::Writer("mock writer failure".into()))
    }
}

/// Settings with one analog (`a_ch1`, amplitude 1.0) and one digital
/// (`d_ch1`) channel.
pub fn single_channel_settings(sample_rate: f64, format: &str) -> ChannelSettings {
    ChannelSettings {
        activation_config: vec!["a_ch1".into(), "d_ch1".into()],
        laser_channel: Some("d_ch1".into()),
        amplitude_dict: [("a_ch1".to_string(), 1.0)].into_iter().collect(),
        sample_rate,
        waveform_format: format.into(),
        sequence_format: format.into(),
    }
}

/// Config rooted at `dir` using [`single_channel_settings`].
pub fn single_channel_config(dir: &Path, sample_rate: f64, format: &str) -> Config {
    let mut config = Config::default();
    config.generator.pulsed_file_dir = dir.to_path_buf();
    config.settings = single_channel_settings(sample_rate, format);
    config
}

/// Block with one element: digital high, constant `value` on the analog channel.
pub fn constant_block(name: &str, length_s: f64, value: f64) -> Block {
    Block::new(
        name,
        vec![BlockElement::new(
            length_s,
            0.0,
            vec![true],
            vec![PulseFunction::Constant { value }],
        )],
    )
}

/// Block with one sine element and one idle element on a single channel pair.
pub fn sine_block(name: &str, frequency: f64) -> Block {
    Block::new(
        name,
        vec![
            BlockElement::new(
                10e-9,
                2e-9,
                vec![false],
                vec![PulseFunction::Sin {
                    amplitude: 0.8,
                    frequency,
                    phase: 0.0,
                }],
            ),
            BlockElement::new(3e-9, 0.0, vec![true], vec![PulseFunction::Idle]),
        ],
    )
}

/// Single-channel ensemble playing `block` once.
pub fn single_channel_ensemble(
    name: &str,
    block: &str,
    sample_rate: f64,
    rotating_frame: bool,
) -> Ensemble {
    let mut ensemble =
        Ensemble::with_settings(name, &single_channel_settings(sample_rate, "mock"), rotating_frame);
    ensemble.push_block(block, 0);
    ensemble
}
