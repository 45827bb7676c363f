// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequence sampler.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use tracing::debug;

use super::analysis::ResolvedEnsemble;
use super::remove_stale_files;
use super::sampler::{EnsembleSampler, SampleOutput, SamplerOptions, SamplingMode};
use crate::error::Result;
use crate::pulse::Sequence;
use crate::store::AssetStore;
use crate::writer::{SequenceStepDescriptor, SequenceWriter, WaveformWriter};

/// Result of [`SequenceSampler::sample`].
#[derive(Debug, Clone, Default)]
pub struct SequenceSampleOutput {
    /// One descriptor per sequence step, in step order.
    pub steps: Vec<SequenceStepDescriptor>,
    /// Files per sampled output name.
    pub sampled_ensembles: BTreeMap<String, Vec<String>>,
    /// Files written by the sequence writer.
    pub sequence_files: Vec<String>,
    /// Phase offset after the last step.
    pub offset_bin: u64,
}

/// Samples every ensemble of a sequence and writes the step table.
pub struct SequenceSampler<'a> {
    store: &'a AssetStore,
    waveform_writer: &'a dyn WaveformWriter,
    sequence_writer: &'a dyn SequenceWriter,
    waveform_dir: PathBuf,
    options: SamplerOptions<'a>,
}

impl<'a> SequenceSampler<'a> {
    pub fn new(
        store: &'a AssetStore,
        waveform_writer: &'a dyn WaveformWriter,
        sequence_writer: &'a dyn SequenceWriter,
        options: SamplerOptions<'a>,
    ) -> Self {
        Self {
            store,
            waveform_writer,
            sequence_writer,
            waveform_dir: store.waveform_dir(),
            options,
        }
    }

    fn sample_ensemble(
        &self,
        name: &str,
        mode: SamplingMode,
        offset_bin: u64,
        name_tag: &str,
    ) -> Result<SampleOutput> {
        let ensemble = self.store.ensemble(name)?;
        let resolved = ResolvedEnsemble::resolve(ensemble, self.store.blocks())?;
        EnsembleSampler::new(
            &resolved,
            self.waveform_writer,
            &self.waveform_dir,
            self.options,
        )
        .sample(mode, offset_bin, true, name_tag)
    }

    /// Sample `sequence` and write its step table.
    ///
    /// A rotating-frame sequence samples every step, tagged `_000`, `_001`,
    /// ..., threading the phase offset from step to step. Otherwise each
    /// distinct ensemble is sampled once at offset 0 and shared by all steps
    /// using it.
    pub fn sample(&self, sequence: &Sequence, mode: SamplingMode) -> Result<SequenceSampleOutput> {
        let start = Instant::now();
        remove_stale_files(&self.waveform_dir, &format!("{}.seq", sequence.name))?;

        let mut output = SequenceSampleOutput::default();
        if sequence.rotating_frame {
            let mut offset = 0;
            for (index, step) in sequence.ensemble_param_list.iter().enumerate() {
                let tag = format!("_{:03}", index);
                let sampled = self.sample_ensemble(&step.ensemble, mode, offset, &tag)?;
                offset = sampled.offset_bin;

                output
                    .sampled_ensembles
                    .insert(format!("{}{}", step.ensemble, tag), sampled.files.clone());
                output.steps.push(SequenceStepDescriptor {
                    files: sampled.files,
                    params: step.params.clone(),
                });
            }
            output.offset_bin = offset;
        } else {
            for name in sequence.distinct_ensembles() {
                let sampled = self.sample_ensemble(name, mode, 0, "")?;
                output.sampled_ensembles.insert(name.to_string(), sampled.files);
            }
            for step in &sequence.ensemble_param_list {
                let files = output
                    .sampled_ensembles
                    .get(&step.ensemble)
                    .cloned()
                    .unwrap_or_default();
                output.steps.push(SequenceStepDescriptor {
                    files,
                    params: step.params.clone(),
                });
            }
        }

        output.sequence_files = self.sequence_writer.write_sequence(
            &self.waveform_dir,
            &sequence.name,
            &output.steps,
        )?;
        debug!(
            sequence = %sequence.name,
            steps = output.steps.len(),
            waveforms = output.sampled_ensembles.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sampled sequence"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AssetError, Error};
    use crate::pulse::StepParameters;
    use crate::test_utils::{constant_block, sine_block, single_channel_ensemble, RecordingWriter};

    fn store_with(dir: &std::path::Path) -> AssetStore {
        let mut store = AssetStore::open(dir).unwrap();
        store.save_block("B", sine_block("B", 40e6)).unwrap();
        store.save_block("C", constant_block("C", 5e-9, 0.5)).unwrap();
        store
            .save_ensemble("E1", single_channel_ensemble("E1", "B", 1e9, true))
            .unwrap();
        store
            .save_ensemble("E2", single_channel_ensemble("E2", "C", 1e9, true))
            .unwrap();
        store
    }

    fn params(repetitions: u32) -> StepParameters {
        StepParameters {
            repetitions,
            ..StepParameters::default()
        }
    }

    #[test]
    fn test_non_rotating_samples_each_ensemble_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path());
        let writer = RecordingWriter::new("mock");
        let mut seq = Sequence::new("S", false);
        seq.push_step("E1", params(0))
            .push_step("E2", params(1))
            .push_step("E1", params(2))
            .push_step("E1", params(3));

        let out = SequenceSampler::new(&store, &*writer, &*writer, SamplerOptions::new(1, 1))
            .sample(&seq, SamplingMode::Monolithic)
            .unwrap();

        let started = writer.waveforms_started();
        assert_eq!(started.get("E1"), Some(&1));
        assert_eq!(started.get("E2"), Some(&1));
        assert_eq!(started.len(), 2);

        assert_eq!(out.steps.len(), 4);
        assert_eq!(out.steps[0].files, out.steps[2].files);
        assert_eq!(out.steps[3].params.repetitions, 3);
        assert_eq!(out.sampled_ensembles.len(), 2);
        assert_eq!(out.offset_bin, 0);

        let seq_calls = writer.sequence_calls();
        assert_eq!(seq_calls.len(), 1);
        assert_eq!(seq_calls[0].name, "S");
        assert_eq!(seq_calls[0].steps, out.steps);
    }

    #[test]
    fn test_rotating_samples_every_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path());
        let writer = RecordingWriter::new("mock");
        let mut seq = Sequence::new("S", true);
        seq.push_step("E1", params(0))
            .push_step("E2", params(0))
            .push_step("E1", params(0));

        let out = SequenceSampler::new(&store, &*writer, &*writer, SamplerOptions::new(1, 1))
            .sample(&seq, SamplingMode::Chunked)
            .unwrap();

        let names: Vec<&String> = out.sampled_ensembles.keys().collect();
        assert_eq!(names, vec!["E1_000", "E1_002", "E2_001"]);
        // E1 = 13 samples, E2 = 5 samples
        assert_eq!(out.offset_bin, 13 + 5 + 13);
        assert_ne!(writer.analog_concat("E1_000"), writer.analog_concat("E1_002"));
        assert_eq!(out.steps[2].files, vec!["E1_002_ch1.mock"]);
    }

    #[test]
    fn test_missing_ensemble_fails_before_sequence_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path());
        let writer = RecordingWriter::new("mock");
        let mut seq = Sequence::new("S", false);
        seq.push_step("E1", params(0)).push_step("nope", params(0));

        let err = SequenceSampler::new(&store, &*writer, &*writer, SamplerOptions::new(1, 1))
            .sample(&seq, SamplingMode::Monolithic)
            .unwrap_err();
        assert!(matches!(err, Error::Asset(AssetError::NotFound { .. })));
        assert!(writer.sequence_calls().is_empty());
    }

    #[test]
    fn test_stale_sequence_files_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path());
        let stale = store.waveform_dir().join("S.seq.json");
        std::fs::write(&stale, b"old").unwrap();
        let writer = RecordingWriter::new("mock");

        SequenceSampler::new(&store, &*writer, &*writer, SamplerOptions::new(1, 1))
            .sample(&Sequence::new("S", false), SamplingMode::Monolithic)
            .unwrap();
        assert!(!stale.exists());
        assert_eq!(writer.sequence_calls()[0].steps.len(), 0);
    }
}
