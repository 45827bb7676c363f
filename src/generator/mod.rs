// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The sequence generator.
//!
//! [`SequenceGenerator`] owns the channel settings, the asset store, the
//! writer and predefined-generator registries, and a single busy flag. It is
//! `Send + Sync` and meant to be shared behind an `Arc`.
//!
//! # Example
//!
//! ```ignore
//! use pulsegen::{Config, SequenceGenerator};
//! use pulsegen::sampling::SamplingMode;
//!
//! let generator = SequenceGenerator::new(Config::default())?;
//! let out = generator.sample_ensemble("rabi", SamplingMode::Chunked, 0, true)?;
//! println!("wrote {:?}", out.files);
//! ```

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::config::{ChannelSettings, Config, ResourceLimits};
use crate::error::{AssetKind, Error, Result, SamplingError};
use crate::predefined::{PredefinedArgs, PredefinedMethod, PredefinedRegistry};
use crate::pulse::{Block, Ensemble, Sequence};
use crate::sampling::{
    EnsembleSampler, ResolvedEnsemble, SampleOutput, SamplerOptions, SamplingMode,
    SequenceSampleOutput, SequenceSampler,
};
use crate::store::{AssetStaging, AssetStore, SavedAsset};
use crate::writer::WriterRegistry;

/// Owned copy of a stored ensemble or sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedAsset {
    Ensemble(Ensemble),
    Sequence(Sequence),
}

/// Marks the generator busy for its lifetime.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    /// Flip idle to busy and clear any stale cancellation request.
    fn acquire(busy: &'a AtomicBool, cancel: &AtomicBool) -> Result<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                warn!("Generator is busy, sampling request rejected");
                Error::Sampling(SamplingError::Busy)
            })?;
        cancel.store(false, Ordering::Release);
        Ok(Self { busy })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Pulse-sequence generator.
pub struct SequenceGenerator {
    settings: RwLock<ChannelSettings>,
    store: Mutex<AssetStore>,
    writers: WriterRegistry,
    predefined: PredefinedRegistry,
    limits: ResourceLimits,
    busy: AtomicBool,
    cancel: AtomicBool,
}

impl SequenceGenerator {
    /// Open the asset store under the configured pulsed-file directory and
    /// register the reference writers and built-in predefined generators.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let settings = config.settings.normalized();
        let store = AssetStore::open(&config.generator.pulsed_file_dir)?;

        let generator = Self {
            settings: RwLock::new(settings),
            store: Mutex::new(store),
            writers: WriterRegistry::with_reference_writers(),
            predefined: PredefinedRegistry::with_builtin(),
            limits: config.limits,
            busy: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
        };
        generator.check_formats(&generator.settings());
        Ok(generator)
    }

    fn check_formats(&self, settings: &ChannelSettings) {
        if !self.writers.has_waveform(&settings.waveform_format) {
            warn!(format = %settings.waveform_format, "No writer registered for waveform format");
        }
        if !self.writers.has_sequence(&settings.sequence_format) {
            warn!(format = %settings.sequence_format, "No writer registered for sequence format");
        }
    }

    /// Writer registry, for registering destination formats.
    pub fn writers(&self) -> &WriterRegistry {
        &self.writers
    }

    /// Predefined generator registry.
    pub fn predefined(&self) -> &PredefinedRegistry {
        &self.predefined
    }

    pub fn predefined_methods(&self) -> Vec<PredefinedMethod> {
        self.predefined.list()
    }

    pub fn pulsed_file_dir(&self) -> std::path::PathBuf {
        self.store.lock().root().to_path_buf()
    }

    // ==================== Settings ====================

    /// Current channel settings.
    pub fn settings(&self) -> ChannelSettings {
        self.settings.read().clone()
    }

    /// Replace the channel settings.
    ///
    /// The laser channel is normalized first. Invalid settings are rejected
    /// and leave the current ones in place. Returns the applied settings.
    pub fn set_settings(&self, settings: ChannelSettings) -> Result<ChannelSettings> {
        if self.is_busy() {
            warn!("Settings change rejected while sampling");
            return Err(SamplingError::Busy.into());
        }
        let settings = settings.normalized();
        settings.validate()?;
        self.check_formats(&settings);

        *self.settings.write() = settings.clone();
        info!(
            analog = settings.analog_channels(),
            digital = settings.digital_channels(),
            sample_rate = settings.sample_rate,
            laser = ?settings.laser_channel,
            "Channel settings updated"
        );
        Ok(settings)
    }

    // ==================== Assets ====================

    pub fn save_block(&self, name: &str, block: Block) -> Result<()> {
        self.store.lock().save_block(name, block)
    }

    pub fn save_ensemble(&self, name: &str, ensemble: Ensemble) -> Result<()> {
        self.store.lock().save_ensemble(name, ensemble)
    }

    pub fn save_sequence(&self, name: &str, sequence: Sequence) -> Result<()> {
        self.store.lock().save_sequence(name, sequence)
    }

    pub fn load_block(&self, name: &str) -> Result<Block> {
        self.store.lock().load_block(name).cloned()
    }

    /// Make an ensemble current and adopt its channel metadata as settings.
    ///
    /// If the ensemble's metadata does not form valid settings, the current
    /// settings are kept.
    pub fn load_ensemble(&self, name: &str) -> Result<Ensemble> {
        let ensemble = self.store.lock().load_ensemble(name)?.clone();

        let applied = ensemble.settings(&self.settings()).normalized();
        match applied.validate() {
            Ok(()) => {
                *self.settings.write() = applied;
                info!(ensemble = %name, "Applied ensemble channel settings");
            }
            Err(e) => {
                warn!(ensemble = %name, error = %e, "Ensemble metadata not applied to settings");
            }
        }
        Ok(ensemble)
    }

    pub fn load_sequence(&self, name: &str) -> Result<Sequence> {
        self.store.lock().load_sequence(name).cloned()
    }

    pub fn delete_block(&self, name: &str) -> Result<Block> {
        self.store.lock().delete_block(name)
    }

    pub fn delete_ensemble(&self, name: &str) -> Result<Ensemble> {
        self.store.lock().delete_ensemble(name)
    }

    pub fn delete_sequence(&self, name: &str) -> Result<Sequence> {
        self.store.lock().delete_sequence(name)
    }

    /// Delete an asset of `kind`.
    pub fn delete(&self, kind: AssetKind, name: &str) -> Result<()> {
        match kind {
            AssetKind::Block => self.delete_block(name).map(|_| ()),
            AssetKind::Ensemble => self.delete_ensemble(name).map(|_| ()),
            AssetKind::Sequence => self.delete_sequence(name).map(|_| ()),
        }
    }

    pub fn block(&self, name: &str) -> Result<Block> {
        self.store.lock().block(name).cloned()
    }

    pub fn ensemble(&self, name: &str) -> Result<Ensemble> {
        self.store.lock().ensemble(name).cloned()
    }

    pub fn sequence(&self, name: &str) -> Result<Sequence> {
        self.store.lock().sequence(name).cloned()
    }

    pub fn list_blocks(&self) -> Vec<String> {
        self.store.lock().blocks().names()
    }

    pub fn list_ensembles(&self) -> Vec<String> {
        self.store.lock().ensembles().names()
    }

    pub fn list_sequences(&self) -> Vec<String> {
        self.store.lock().sequences().names()
    }

    pub fn current_block(&self) -> Option<String> {
        self.store.lock().blocks().current().map(str::to_string)
    }

    pub fn current_ensemble(&self) -> Option<String> {
        self.store.lock().ensembles().current().map(str::to_string)
    }

    pub fn current_sequence(&self) -> Option<String> {
        self.store.lock().sequences().current().map(str::to_string)
    }

    /// Stored sequence, or else ensemble, called `name`.
    pub fn saved_asset(&self, name: &str) -> Option<LoadedAsset> {
        match self.store.lock().saved_asset(name)? {
            SavedAsset::Ensemble(e) => Some(LoadedAsset::Ensemble(e.clone())),
            SavedAsset::Sequence(s) => Some(LoadedAsset::Sequence(s.clone())),
        }
    }

    // ==================== Sampling ====================

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Ask a running sampling call to stop after the current element.
    pub fn cancel(&self) {
        if self.is_busy() {
            info!("Cancellation requested");
            self.cancel.store(true, Ordering::Release);
        }
    }

    fn sampler_options(&self, settings: &ChannelSettings) -> SamplerOptions<'_> {
        SamplerOptions {
            analog_channels: settings.analog_channels(),
            digital_channels: settings.digital_channels(),
            max_monolithic_samples: self.limits.max_monolithic_samples,
            cancel: Some(&self.cancel),
        }
    }

    fn sample_ensemble_locked(
        &self,
        settings: &ChannelSettings,
        name: &str,
        mode: SamplingMode,
        offset_bin: u64,
        write: bool,
    ) -> Result<SampleOutput> {
        let writer = self.writers.waveform(&settings.waveform_format)?;
        let store = self.store.lock();
        let ensemble = store.ensemble(name)?;
        let resolved = ResolvedEnsemble::resolve(ensemble, store.blocks())?;
        let waveform_dir = store.waveform_dir();
        let sampler = EnsembleSampler::new(
            &resolved,
            writer.as_ref(),
            &waveform_dir,
            self.sampler_options(settings),
        );
        sampler.sample(mode, offset_bin, write, "")
    }

    fn sample_sequence_locked(
        &self,
        settings: &ChannelSettings,
        name: &str,
        mode: SamplingMode,
    ) -> Result<SequenceSampleOutput> {
        let waveform_writer = self.writers.waveform(&settings.waveform_format)?;
        let sequence_writer = self.writers.sequence(&settings.sequence_format)?;
        let mut store = self.store.lock();
        let mut sequence = store.sequence(name)?.clone();

        let output = SequenceSampler::new(
            &store,
            waveform_writer.as_ref(),
            sequence_writer.as_ref(),
            self.sampler_options(settings),
        )
        .sample(&sequence, mode)?;

        sequence.sampled_ensembles = output.sampled_ensembles.clone();
        store.save_sequence(name, sequence)?;
        Ok(output)
    }

    /// Sample a stored ensemble.
    ///
    /// Sample rate and amplitudes come from the ensemble's own metadata, so a
    /// later [`set_settings`](Self::set_settings) only affects an ensemble
    /// once it is saved again. The current settings decide the expected
    /// channel counts.
    ///
    /// Fails with [`SamplingError::Busy`] while another sampling call runs.
    pub fn sample_ensemble(
        &self,
        name: &str,
        mode: SamplingMode,
        offset_bin: u64,
        write: bool,
    ) -> Result<SampleOutput> {
        let _busy = BusyGuard::acquire(&self.busy, &self.cancel)?;
        let start = Instant::now();
        let settings = self.settings();

        let result = self.sample_ensemble_locked(&settings, name, mode, offset_bin, write);

        match &result {
            Ok(output) => info!(
                ensemble = %name,
                files = output.files.len(),
                offset_bin = output.offset_bin,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Ensemble sampling complete"
            ),
            Err(e) => error!(ensemble = %name, error = %e, "Ensemble sampling failed"),
        }
        result
    }

    /// Sample a stored sequence, write its step table and store the
    /// produced file map on the sequence.
    pub fn sample_sequence(&self, name: &str, mode: SamplingMode) -> Result<SequenceSampleOutput> {
        let _busy = BusyGuard::acquire(&self.busy, &self.cancel)?;
        let start = Instant::now();
        let settings = self.settings();

        let result = self.sample_sequence_locked(&settings, name, mode);

        match &result {
            Ok(output) => info!(
                sequence = %name,
                steps = output.steps.len(),
                waveforms = output.sampled_ensembles.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Sequence sampling complete"
            ),
            Err(e) => error!(sequence = %name, error = %e, "Sequence sampling failed"),
        }
        result
    }

    /// [`sample_ensemble`](Self::sample_ensemble) on the blocking pool.
    pub async fn sample_ensemble_async(
        self: Arc<Self>,
        name: String,
        mode: SamplingMode,
        offset_bin: u64,
        write: bool,
    ) -> Result<SampleOutput> {
        tokio::task::spawn_blocking(move || self.sample_ensemble(&name, mode, offset_bin, write))
            .await
            .map_err(join_error)?
    }

    /// [`sample_sequence`](Self::sample_sequence) on the blocking pool.
    pub async fn sample_sequence_async(
        self: Arc<Self>,
        name: String,
        mode: SamplingMode,
    ) -> Result<SequenceSampleOutput> {
        tokio::task::spawn_blocking(move || self.sample_sequence(&name, mode))
            .await
            .map_err(join_error)?
    }

    // ==================== Predefined ====================

    /// Run a predefined generator and commit what it built.
    ///
    /// Nothing is stored unless the generator succeeds. A generator that
    /// panics is reported as [`Error::Generation`]. Returns the committed
    /// assets.
    pub fn generate_predefined_sequence(
        &self,
        name: &str,
        args: &PredefinedArgs,
    ) -> Result<Vec<(AssetKind, String)>> {
        let failed = |message: String| {
            error!(generator = %name, error = %message, "Predefined generation failed");
            Error::Generation {
                name: name.to_string(),
                message,
            }
        };

        let method = self
            .predefined
            .get(name)
            .ok_or_else(|| failed("no such predefined generator".into()))?;
        let settings = self.settings();
        let mut staging = AssetStaging::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            (method.func)(&settings, args, &mut staging)
        }));
        match outcome {
            Ok(result) => result.map_err(|e| failed(e.to_string()))?,
            Err(payload) => return Err(failed(panic_message(payload.as_ref()))),
        }

        let staged: Vec<(AssetKind, String)> = staging
            .staged()
            .into_iter()
            .map(|(kind, asset)| (kind, asset.to_string()))
            .collect();
        self.store
            .lock()
            .commit(staging)
            .map_err(|e| failed(e.to_string()))?;

        info!(generator = %name, assets = staged.len(), "Predefined sequence generated");
        Ok(staged)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(io::Error::other(format!("sampling task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AssetError, ValidationError};
    use crate::pulse::StepParameters;
    use crate::test_utils::{
        constant_block, sine_block, single_channel_config, single_channel_ensemble,
        RecordingWriter,
    };
    use serde_json::json;
    use std::path::Path;

    fn generator(dir: &Path) -> (SequenceGenerator, Arc<RecordingWriter>) {
        let generator = SequenceGenerator::new(single_channel_config(dir, 1e9, "mock")).unwrap();
        let writer = RecordingWriter::new("mock");
        generator.writers().register_waveform(writer.clone());
        generator.writers().register_sequence(writer.clone());
        (generator, writer)
    }

    fn with_ensemble(generator: &SequenceGenerator) {
        generator
            .save_block("B", constant_block("B", 1e-6, 0.5))
            .unwrap();
        generator
            .save_ensemble("E", single_channel_ensemble("E", "B", 1e9, false))
            .unwrap();
    }

    // ==================== Construction ====================

    #[test]
    fn test_new_creates_store() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        assert!(dir.path().join("sampled_hardware_files").is_dir());
        assert!(!generator.is_busy());
        assert!(generator.predefined().contains("rabi"));
        assert_eq!(generator.pulsed_file_dir(), dir.path());
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = single_channel_config(dir.path(), 1e9, "mock");
        config.settings.sample_rate = -1.0;
        assert!(SequenceGenerator::new(config).is_err());
    }

    #[test]
    fn test_new_applies_laser_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = single_channel_config(dir.path(), 1e9, "mock");
        config.settings.laser_channel = Some("d_ch7".into());
        let generator = SequenceGenerator::new(config).unwrap();
        assert_eq!(generator.settings().laser_channel.as_deref(), Some("d_ch1"));
    }

    // ==================== Settings ====================

    #[test]
    fn test_set_settings_validates() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        let before = generator.settings();

        let mut bad = before.clone();
        bad.amplitude_dict.clear();
        assert!(matches!(
            generator.set_settings(bad),
            Err(Error::Validation(ValidationError::Field { .. }))
        ));
        assert_eq!(generator.settings(), before);

        let mut good = before.clone();
        good.sample_rate = 2e9;
        good.laser_channel = Some("d_ch7".into());
        let applied = generator.set_settings(good).unwrap();
        assert_eq!(applied.laser_channel.as_deref(), Some("d_ch1"));
        assert_eq!(generator.settings().sample_rate, 2e9);
    }

    #[test]
    fn test_load_ensemble_applies_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        with_ensemble(&generator);
        let mut ensemble = generator.ensemble("E").unwrap();
        ensemble.sample_rate = 5e8;
        ensemble.amplitude_dict.insert("a_ch1".into(), 0.25);
        generator.save_ensemble("E2", ensemble).unwrap();

        generator.load_ensemble("E2").unwrap();
        let settings = generator.settings();
        assert_eq!(settings.sample_rate, 5e8);
        assert_eq!(settings.amplitude_dict["a_ch1"], 0.25);
        assert_eq!(settings.waveform_format, "mock");
        assert_eq!(generator.current_ensemble().as_deref(), Some("E2"));
    }

    // ==================== Assets ====================

    #[test]
    fn test_asset_listing_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        with_ensemble(&generator);

        assert_eq!(generator.list_blocks(), vec!["B"]);
        assert_eq!(generator.list_ensembles(), vec!["E"]);
        assert!(generator.list_sequences().is_empty());
        assert_eq!(generator.current_block().as_deref(), Some("B"));
        assert!(matches!(generator.saved_asset("E"), Some(LoadedAsset::Ensemble(_))));

        generator.delete(AssetKind::Ensemble, "E").unwrap();
        assert!(generator.list_ensembles().is_empty());
        assert!(generator.current_ensemble().is_none());
        assert!(matches!(
            generator.delete(AssetKind::Ensemble, "E"),
            Err(Error::Asset(AssetError::NotFound { .. }))
        ));
    }

    // ==================== Sampling ====================

    #[test]
    fn test_sample_ensemble_returns_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, writer) = generator(dir.path());
        with_ensemble(&generator);

        let out = generator
            .sample_ensemble("E", SamplingMode::Monolithic, 0, false)
            .unwrap();
        assert_eq!(out.analog.unwrap().dim(), (1, 1000));
        assert_eq!(out.offset_bin, 0);
        assert!(writer.chunk_calls().is_empty());
        assert!(!generator.is_busy());
    }

    #[test]
    fn test_busy_rejects_second_call() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, writer) = generator(dir.path());
        with_ensemble(&generator);

        {
            let _busy = BusyGuard::acquire(&generator.busy, &generator.cancel).unwrap();
            assert!(generator.is_busy());
            assert!(matches!(
                generator.sample_ensemble("E", SamplingMode::Chunked, 0, true),
                Err(Error::Sampling(SamplingError::Busy))
            ));
            assert!(matches!(
                generator.sample_sequence("S", SamplingMode::Chunked),
                Err(Error::Sampling(SamplingError::Busy))
            ));
            assert!(generator.set_settings(generator.settings()).is_err());
        }
        assert!(!generator.is_busy());
        assert!(writer.chunk_calls().is_empty());
        assert!(generator
            .sample_ensemble("E", SamplingMode::Chunked, 0, true)
            .is_ok());
    }

    #[test]
    fn test_mismatch_leaves_generator_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, writer) = generator(dir.path());
        generator
            .save_block("B", constant_block("B", 1e-6, 0.5))
            .unwrap();
        let mut ensemble = single_channel_ensemble("E", "B", 1e9, false);
        ensemble.analog_channels = 2;
        generator.save_ensemble("E", ensemble).unwrap();

        let result = generator.sample_ensemble("E", SamplingMode::Monolithic, 3, true);
        assert!(matches!(
            result,
            Err(Error::Sampling(SamplingError::ChannelMismatch { .. }))
        ));
        assert!(!generator.is_busy());
        assert!(writer.chunk_calls().is_empty());
        let waveforms = std::fs::read_dir(dir.path().join("sampled_hardware_files"))
            .unwrap()
            .count();
        assert_eq!(waveforms, 0);
    }

    #[test]
    fn test_unknown_writer_format() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        with_ensemble(&generator);
        generator.writers().unregister_waveform("mock");

        assert!(matches!(
            generator.sample_ensemble("E", SamplingMode::Monolithic, 0, true),
            Err(Error::Sampling(SamplingError::UnknownFormat(_)))
        ));
        assert!(!generator.is_busy());
    }

    #[test]
    fn test_cancel_when_idle_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        with_ensemble(&generator);

        generator.cancel();
        assert!(generator
            .sample_ensemble("E", SamplingMode::Chunked, 0, true)
            .is_ok());
    }

    #[test]
    fn test_raw_files_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = single_channel_config(dir.path(), 1e9, "raw");
        config.settings.sequence_format = "rawseq".into();
        let generator = SequenceGenerator::new(config).unwrap();
        with_ensemble(&generator);

        let out = generator
            .sample_ensemble("E", SamplingMode::Chunked, 0, true)
            .unwrap();
        assert_eq!(out.files, vec!["E_ch1.f32", "E_ch1.dig"]);
        let analog = dir.path().join("sampled_hardware_files").join("E_ch1.f32");
        assert_eq!(std::fs::metadata(analog).unwrap().len(), 4000);
    }

    #[test]
    fn test_sample_sequence_caches_files() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, writer) = generator(dir.path());
        with_ensemble(&generator);
        let mut seq = Sequence::new("S", false);
        seq.push_step("E", StepParameters::default())
            .push_step("E", StepParameters::default())
            .push_step("E", StepParameters::default());
        generator.save_sequence("S", seq).unwrap();

        let out = generator
            .sample_sequence("S", SamplingMode::Chunked)
            .unwrap();
        assert_eq!(out.steps.len(), 3);
        assert_eq!(writer.waveforms_started().get("E"), Some(&1));
        assert_eq!(writer.sequence_calls().len(), 1);

        let reopened = AssetStore::open(dir.path()).unwrap();
        let cached = &reopened.sequence("S").unwrap().sampled_ensembles;
        assert_eq!(cached.get("E"), Some(&vec!["E_ch1.mock".to_string()]));
        assert!(!generator.is_busy());
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        generator.save_block("B", sine_block("B", 20e6)).unwrap();
        generator
            .save_ensemble("E", single_channel_ensemble("E", "B", 1e9, true))
            .unwrap();
        let mut seq = Sequence::new("S", true);
        seq.push_step("E", StepParameters::default())
            .push_step("E", StepParameters::default());
        generator.save_sequence("S", seq).unwrap();
        let generator = Arc::new(generator);

        let out = generator
            .clone()
            .sample_ensemble_async("E".into(), SamplingMode::Monolithic, 4, false)
            .await
            .unwrap();
        assert_eq!(out.offset_bin, 4 + 13);

        let seq_out = generator
            .clone()
            .sample_sequence_async("S".into(), SamplingMode::Chunked)
            .await
            .unwrap();
        assert_eq!(seq_out.offset_bin, 26);
        assert!(!generator.is_busy());
    }

    // ==================== Predefined ====================

    #[test]
    fn test_generate_laser_on() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        let args = PredefinedArgs::new(vec![json!("laser"), json!(2e-6)]);

        let staged = generator
            .generate_predefined_sequence("laser_on", &args)
            .unwrap();
        assert_eq!(
            staged,
            vec![
                (AssetKind::Block, "laser".to_string()),
                (AssetKind::Ensemble, "laser".to_string())
            ]
        );
        let out = generator
            .sample_ensemble("laser", SamplingMode::Monolithic, 0, false)
            .unwrap();
        assert!(out.digital.unwrap().iter().all(|&v| v));
        assert_eq!(out.analog.unwrap().ncols(), 2000);
    }

    #[test]
    fn test_generate_rabi_grows_pulse() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        let args = PredefinedArgs::new(vec![
            json!("rabi"),
            json!(10e-9),
            json!(10e-9),
            json!(3),
            json!(0.5),
            json!(100e6),
            json!(20e-9),
            json!(5e-9),
        ]);
        generator.generate_predefined_sequence("rabi", &args).unwrap();

        let out = generator
            .sample_ensemble("rabi", SamplingMode::Monolithic, 0, false)
            .unwrap();
        // (10 + 20 + 30) microwave + 3 * (20 + 5)
        assert_eq!(out.analog.unwrap().ncols(), 135);
    }

    #[test]
    fn test_failed_generation_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        generator.predefined().register("broken", &[], |_, _, staging| {
            staging.save_block("half", constant_block("half", 1e-6, 0.1));
            Err(Error::Config("boom".into()))
        });

        let err = generator
            .generate_predefined_sequence("broken", &PredefinedArgs::default())
            .unwrap_err();
        assert!(matches!(err, Error::Generation { ref name, .. } if name == "broken"));
        assert!(generator.list_blocks().is_empty());

        assert!(matches!(
            generator.generate_predefined_sequence("missing", &PredefinedArgs::default()),
            Err(Error::Generation { .. })
        ));
    }
    #[test]
    fn test_panicking_generation_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        generator.predefined().register("panics", &[], |_, _, staging| {
            staging.save_block("half", constant_block("half", 1e-6, 0.1));
            let empty: Vec<u32> = Vec::new();
            let _ = empty[3];
            Ok(())
        });

        let err = generator
            .generate_predefined_sequence("panics", &PredefinedArgs::default())
            .unwrap_err();
        match err {
            Error::Generation { name, message } => {
                assert_eq!(name, "panics");
                assert!(message.contains("index out of bounds"), "{}", message);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(generator.list_blocks().is_empty());
        assert!(!generator.is_busy());

        let args = PredefinedArgs::new(vec![json!("laser"), json!(1e-6)]);
        generator
            .generate_predefined_sequence("laser_on", &args)
            .unwrap();
        assert_eq!(generator.list_blocks(), vec!["laser"]);
    }
}
