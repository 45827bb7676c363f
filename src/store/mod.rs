// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Asset store for blocks, ensembles and sequences.
//!
//! Directory layout under the pulsed-file root:
//!
//! ```text
//! pulse_block_objects/block_dict.blk
//! pulse_ensemble_objects/ensemble_dict.ens
//! sequence_objects/sequence_dict.sequ
//! sampled_hardware_files/            <- writer output
//! ```

pub mod persist;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::{AssetKind, Result};
use crate::pulse::{Block, Ensemble, Sequence};

pub use persist::{MapSnapshot, PersistedMap};

const BLOCK_DIR: &str = "pulse_block_objects";
const ENSEMBLE_DIR: &str = "pulse_ensemble_objects";
const SEQUENCE_DIR: &str = "sequence_objects";
const WAVEFORM_DIR: &str = "sampled_hardware_files";

/// A stored ensemble or sequence.
#[derive(Debug, Clone, Copy)]
pub enum SavedAsset<'a> {
    Ensemble(&'a Ensemble),
    Sequence(&'a Sequence),
}

/// Owner of the canonical copies of all assets.
#[derive(Debug)]
pub struct AssetStore {
    root: PathBuf,
    blocks: PersistedMap<Block>,
    ensembles: PersistedMap<Ensemble>,
    sequences: PersistedMap<Sequence>,
}

impl AssetStore {
    /// Open (creating directories as needed) the store rooted at `root`.
    ///
    /// Unreadable asset maps start empty.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for sub in [BLOCK_DIR, ENSEMBLE_DIR, SEQUENCE_DIR, WAVEFORM_DIR] {
            fs::create_dir_all(root.join(sub))?;
        }

        let store = Self {
            blocks: PersistedMap::open(AssetKind::Block, root.join(BLOCK_DIR), "block_dict.blk"),
            ensembles: PersistedMap::open(
                AssetKind::Ensemble,
                root.join(ENSEMBLE_DIR),
                "ensemble_dict.ens",
            ),
            sequences: PersistedMap::open(
                AssetKind::Sequence,
                root.join(SEQUENCE_DIR),
                "sequence_dict.sequ",
            ),
            root,
        };
        info!(
            root = %store.root.display(),
            blocks = store.blocks.len(),
            ensembles = store.ensembles.len(),
            sequences = store.sequences.len(),
            "Opened asset store"
        );
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory receiving sampled waveform and sequence files.
    pub fn waveform_dir(&self) -> PathBuf {
        self.root.join(WAVEFORM_DIR)
    }

    pub fn blocks(&self) -> &PersistedMap<Block> {
        &self.blocks
    }

    pub fn ensembles(&self) -> &PersistedMap<Ensemble> {
        &self.ensembles
    }

    pub fn sequences(&self) -> &PersistedMap<Sequence> {
        &self.sequences
    }

    pub fn block(&self, name: &str) -> Result<&Block> {
        Ok(self.blocks.get(name)?)
    }

    pub fn ensemble(&self, name: &str) -> Result<&Ensemble> {
        Ok(self.ensembles.get(name)?)
    }

    pub fn sequence(&self, name: &str) -> Result<&Sequence> {
        Ok(self.sequences.get(name)?)
    }

    /// Store `block` under `name`, replacing any previous one.
    pub fn save_block(&mut self, name: &str, mut block: Block) -> Result<()> {
        block.name = name.to_string();
        self.blocks.insert(name, block)?;
        info!(name = %name, "Saved block");
        Ok(())
    }

    /// Store `ensemble` under `name`, replacing any previous one.
    pub fn save_ensemble(&mut self, name: &str, mut ensemble: Ensemble) -> Result<()> {
        ensemble.name = name.to_string();
        for block in ensemble.block_names() {
            if !self.blocks.contains(block) {
                warn!(ensemble = %name, block = %block, "Ensemble references unknown block");
            }
        }
        self.ensembles.insert(name, ensemble)?;
        info!(name = %name, "Saved ensemble");
        Ok(())
    }

    /// Store `sequence` under `name`, replacing any previous one.
    pub fn save_sequence(&mut self, name: &str, mut sequence: Sequence) -> Result<()> {
        sequence.name = name.to_string();
        for ensemble in sequence.distinct_ensembles() {
            if !self.ensembles.contains(ensemble) {
                warn!(sequence = %name, ensemble = %ensemble, "Sequence references unknown ensemble");
            }
        }
        self.sequences.insert(name, sequence)?;
        info!(name = %name, "Saved sequence");
        Ok(())
    }

    /// Make a stored block current and return it.
    pub fn load_block(&mut self, name: &str) -> Result<&Block> {
        self.blocks.set_current(name)?;
        self.block(name)
    }

    /// Make a stored ensemble current and return it.
    pub fn load_ensemble(&mut self, name: &str) -> Result<&Ensemble> {
        self.ensembles.set_current(name)?;
        self.ensemble(name)
    }

    /// Make a stored sequence current and return it.
    pub fn load_sequence(&mut self, name: &str) -> Result<&Sequence> {
        self.sequences.set_current(name)?;
        self.sequence(name)
    }

    pub fn delete_block(&mut self, name: &str) -> Result<Block> {
        let block = self.blocks.remove(name)?;
        info!(name = %name, "Deleted block");
        Ok(block)
    }

    pub fn delete_ensemble(&mut self, name: &str) -> Result<Ensemble> {
        let ensemble = self.ensembles.remove(name)?;
        info!(name = %name, "Deleted ensemble");
        Ok(ensemble)
    }

    pub fn delete_sequence(&mut self, name: &str) -> Result<Sequence> {
        let sequence = self.sequences.remove(name)?;
        info!(name = %name, "Deleted sequence");
        Ok(sequence)
    }

    /// Look up a sequence, then an ensemble, by name.
    pub fn saved_asset(&self, name: &str) -> Option<SavedAsset<'_>> {
        if name.is_empty() {
            return None;
        }
        if let Ok(sequence) = self.sequences.get(name) {
            return Some(SavedAsset::Sequence(sequence));
        }
        if let Ok(ensemble) = self.ensembles.get(name) {
            return Some(SavedAsset::Ensemble(ensemble));
        }
        warn!(name = %name, "No sequence or ensemble found in saved assets");
        None
    }

    /// Apply the saves collected in `staging`.
    ///
    /// Blocks are committed before ensembles, ensembles before sequences.
    /// If any save fails, all three maps are put back to their state before
    /// the commit.
    pub fn commit(&mut self, staging: AssetStaging) -> Result<()> {
        let blocks = self.blocks.snapshot();
        let ensembles = self.ensembles.snapshot();
        let sequences = self.sequences.snapshot();

        let result = self.apply(staging);
        if let Err(e) = &result {
            warn!(error = %e, "Commit failed, rolling back staged assets");
            let restored = [
                self.blocks.restore(blocks),
                self.ensembles.restore(ensembles),
                self.sequences.restore(sequences),
            ];
            for err in restored.into_iter().filter_map(|r| r.err()) {
                error!(error = %err, "Failed to persist rolled back asset map");
            }
        }
        result
    }

    fn apply(&mut self, staging: AssetStaging) -> Result<()> {
        for block in staging.blocks {
            let name = block.name.clone();
            self.save_block(&name, block)?;
        }
        for ensemble in staging.ensembles {
            let name = ensemble.name.clone();
            self.save_ensemble(&name, ensemble)?;
        }
        for sequence in staging.sequences {
            let name = sequence.name.clone();
            self.save_sequence(&name, sequence)?;
        }
        Ok(())
    }
}

/// Saves collected from a predefined generator before they are committed.
#[derive(Debug, Default)]
pub struct AssetStaging {
    blocks: Vec<Block>,
    ensembles: Vec<Ensemble>,
    sequences: Vec<Sequence>,
}

impl AssetStaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_block(&mut self, name: &str, mut block: Block) {
        block.name = name.to_string();
        self.blocks.push(block);
    }

    pub fn save_ensemble(&mut self, name: &str, mut ensemble: Ensemble) {
        ensemble.name = name.to_string();
        self.ensembles.push(ensemble);
    }

    pub fn save_sequence(&mut self, name: &str, mut sequence: Sequence) {
        sequence.name = name.to_string();
        self.sequences.push(sequence);
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.ensembles.is_empty() && self.sequences.is_empty()
    }

    /// Names of the staged assets as `(kind, name)`.
    pub fn staged(&self) -> Vec<(AssetKind, &str)> {
        self.blocks
            .iter()
            .map(|b| (AssetKind::Block, b.name.as_str()))
            .chain(self.ensembles.iter().map(|e| (AssetKind::Ensemble, e.name.as_str())))
            .chain(self.sequences.iter().map(|s| (AssetKind::Sequence, s.name.as_str())))
            .collect()
    }
}
