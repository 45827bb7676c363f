// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Writer registry keyed by format.
//!
//! Waveform and sequence writers are registered independently; the
//! generator looks them up by the format keys in its channel settings.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::{SequenceWriter, WaveformWriter};
use crate::error::{Result, SamplingError};

/// Registry of destination-format writers.
///
/// The registry is thread-safe and can be shared across threads.
#[derive(Default)]
pub struct WriterRegistry {
    waveform: RwLock<HashMap<String, Arc<dyn WaveformWriter>>>,
    sequence: RwLock<HashMap<String, Arc<dyn SequenceWriter>>>,
}

impl WriterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `raw` and `rawseq` writers.
    pub fn with_reference_writers() -> Self {
        let registry = Self::new();
        registry.register_waveform(Arc::new(super::RawWriter));
        registry.register_sequence(Arc::new(super::JsonSequenceWriter));
        registry
    }

    /// Register a waveform writer, replacing one with the same format.
    pub fn register_waveform(&self, writer: Arc<dyn WaveformWriter>) {
        let format = writer.format().to_string();
        info!(format = %format, "Registering waveform writer");
        self.waveform.write().insert(format, writer);
    }

    /// Register a sequence writer, replacing one with the same format.
    pub fn register_sequence(&self, writer: Arc<dyn SequenceWriter>) {
        let format = writer.format().to_string();
        info!(format = %format, "Registering sequence writer");
        self.sequence.write().insert(format, writer);
    }

    /// Get a waveform writer by format.
    pub fn waveform(&self, format: &str) -> Result<Arc<dyn WaveformWriter>> {
        self.waveform
            .read()
            .get(format)
            .cloned()
            .ok_or_else(|| SamplingError::UnknownFormat(format.to_string()).into())
    }

    /// Get a sequence writer by format.
    pub fn sequence(&self, format: &str) -> Result<Arc<dyn SequenceWriter>> {
        self.sequence
            .read()
            .get(format)
            .cloned()
            .ok_or_else(|| SamplingError::UnknownFormat(format.to_string()).into())
    }

    pub fn has_waveform(&self, format: &str) -> bool {
        self.waveform.read().contains_key(format)
    }

    pub fn has_sequence(&self, format: &str) -> bool {
        self.sequence.read().contains_key(format)
    }

    /// Registered waveform formats, sorted.
    pub fn waveform_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.waveform.read().keys().cloned().collect();
        formats.sort();
        formats
    }

    /// Registered sequence formats, sorted.
    pub fn sequence_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.sequence.read().keys().cloned().collect();
        formats.sort();
        formats
    }

    /// Unregister a waveform writer.
    pub fn unregister_waveform(&self, format: &str) -> Option<Arc<dyn WaveformWriter>> {
        let removed = self.waveform.write().remove(format);
        if removed.is_some() {
            info!(format = %format, "Unregistered waveform writer");
        }
        removed
    }
}
