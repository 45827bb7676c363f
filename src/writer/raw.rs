// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Headerless reference formats.
//!
//! `raw` stores analog channel `N` (1-based) as little-endian `f32` in
//! `<name>_chN.f32` and digital channel `N` as one byte per sample in
//! `<name>_chN.dig`. `rawseq` stores the step list as `<name>.seq.json`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use super::{SampleChunk, SequenceStepDescriptor, SequenceWriter, WaveformWriter};
use crate::error::{Error, Result};

/// Writer for the `raw` waveform format.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawWriter;

impl RawWriter {
    fn analog_file(name: &str, channel: usize) -> String {
        format!("{}_ch{}.f32", name, channel + 1)
    }

    fn digital_file(name: &str, channel: usize) -> String {
        format!("{}_ch{}.dig", name, channel + 1)
    }

    fn open(path: &Path, truncate: bool) -> Result<BufWriter<File>> {
        let file = if truncate {
            File::create(path)?
        } else {
            OpenOptions::new().append(true).create(true).open(path)?
        };
        Ok(BufWriter::new(file))
    }

    fn check_size(path: &Path, expected: u64) -> Result<()> {
        let actual = std::fs::metadata(path)?.len();
        if actual != expected {
            return Err(Error::Writer(format!(
                "{} holds {} bytes, expected {}",
                path.display(),
                actual,
                expected
            )));
        }
        Ok(())
    }
}

impl WaveformWriter for RawWriter {
    fn format(&self) -> &str {
        "raw"
    }

    fn write_chunk(
        &self,
        dir: &Path,
        name: &str,
        chunk: Option<SampleChunk<'_>>,
        total_samples: usize,
        is_first_chunk: bool,
        is_last_chunk: bool,
    ) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let Some(chunk) = chunk else {
            // finalize only
            return Ok(files);
        };

        for (ch, row) in chunk.analog.rows().into_iter().enumerate() {
            let file = Self::analog_file(name, ch);
            let path = dir.join(&file);
            let mut out = Self::open(&path, is_first_chunk)?;
            for v in row {
                out.write_all(&v.to_le_bytes())?;
            }
            out.flush()?;
            drop(out);
            if is_last_chunk {
                Self::check_size(&path, total_samples as u64 * 4)?;
            }
            files.push(file);
        }

        for (ch, row) in chunk.digital.rows().into_iter().enumerate() {
            let file = Self::digital_file(name, ch);
            let path = dir.join(&file);
            let mut out = Self::open(&path, is_first_chunk)?;
            let bytes: Vec<u8> = row.iter().map(|&high| high as u8).collect();
            out.write_all(&bytes)?;
            out.flush()?;
            drop(out);
            if is_last_chunk {
                Self::check_size(&path, total_samples as u64)?;
            }
            files.push(file);
        }

        debug!(
            name = %name,
            samples = chunk.len(),
            is_first_chunk,
            is_last_chunk,
            "Wrote raw chunk"
        );
        Ok(files)
    }
}

/// Writer for the `rawseq` sequence format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSequenceWriter;

impl SequenceWriter for JsonSequenceWriter {
    fn format(&self) -> &str {
        "rawseq"
    }

    fn write_sequence(
        &self,
        dir: &Path,
        name: &str,
        steps: &[SequenceStepDescriptor],
    ) -> Result<Vec<String>> {
        let file = format!("{}.seq.json", name);
        let out = BufWriter::new(File::create(dir.join(&file))?);
        serde_json::to_writer_pretty(out, steps)?;
        debug!(name = %name, steps = steps.len(), "Wrote sequence table");
        Ok(vec![file])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::StepParameters;
    use ndarray::{array, Array2};

    fn read_f32(path: &Path) -> Vec<f32> {
        std::fs::read(path)
            .unwrap()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn test_raw_single_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let analog = array![[0.5f32, -0.5], [1.0, 0.0]];
        let digital = array![[true, false]];
        let chunk = SampleChunk {
            analog: analog.view(),
            digital: digital.view(),
        };

        let files = RawWriter
            .write_chunk(dir.path(), "ens", Some(chunk), 2, true, true)
            .unwrap();
        assert_eq!(files, vec!["ens_ch1.f32", "ens_ch2.f32", "ens_ch1.dig"]);
        assert_eq!(read_f32(&dir.path().join("ens_ch1.f32")), vec![0.5, -0.5]);
        assert_eq!(std::fs::read(dir.path().join("ens_ch1.dig")).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_raw_chunks_append_and_first_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let a1 = array![[1.0f32]];
        let a2 = array![[2.0f32, 3.0]];
        let d1 = Array2::<bool>::from_elem((0, 1), false);
        let d2 = Array2::<bool>::from_elem((0, 2), false);

        for _ in 0..2 {
            RawWriter
                .write_chunk(
                    dir.path(),
                    "e",
                    Some(SampleChunk { analog: a1.view(), digital: d1.view() }),
                    3,
                    true,
                    false,
                )
                .unwrap();
            RawWriter
                .write_chunk(
                    dir.path(),
                    "e",
                    Some(SampleChunk { analog: a2.view(), digital: d2.view() }),
                    3,
                    false,
                    true,
                )
                .unwrap();
        }
        assert_eq!(read_f32(&dir.path().join("e_ch1.f32")), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_raw_size_mismatch_on_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let a = array![[1.0f32]];
        let d = Array2::<bool>::from_elem((0, 1), false);
        let result = RawWriter.write_chunk(
            dir.path(),
            "e",
            Some(SampleChunk { analog: a.view(), digital: d.view() }),
            5,
            true,
            true,
        );
        assert!(matches!(result, Err(Error::Writer(_))));
    }

    #[test]
    fn test_json_sequence_writer() {
        let dir = tempfile::tempdir().unwrap();
        let steps = vec![SequenceStepDescriptor {
            files: vec!["e_ch1.f32".into()],
            params: StepParameters {
                repetitions: 2,
                ..StepParameters::default()
            },
        }];
        let files = JsonSequenceWriter
            .write_sequence(dir.path(), "seq", &steps)
            .unwrap();
        assert_eq!(files, vec!["seq.seq.json"]);

        let content = std::fs::read_to_string(dir.path().join("seq.seq.json")).unwrap();
        let back: Vec<SequenceStepDescriptor> = serde_json::from_str(&content).unwrap();
        assert_eq!(back, steps);
    }
}
