// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Name-keyed asset map persisted as a single JSON blob.
//!
//! Every mutation rewrites the whole map: it is serialized into a temporary
//! file in the same directory, which then replaces the canonical file. A
//! crash while writing leaves the previous canonical file intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{AssetError, AssetKind};

const TMP_SUFFIX: &str = ".tmp";

/// Persisted map of one asset kind plus its "currently open" pointer.
#[derive(Debug)]
pub struct PersistedMap<T> {
    kind: AssetKind,
    dir: PathBuf,
    file_name: &'static str,
    entries: BTreeMap<String, T>,
    current: Option<String>,
}

impl<T> PersistedMap<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open the map stored in `dir/file_name`.
    ///
    /// A missing or unreadable file yields an empty map.
    pub fn open(kind: AssetKind, dir: impl Into<PathBuf>, file_name: &'static str) -> Self {
        let mut map = Self {
            kind,
            dir: dir.into(),
            file_name,
            entries: BTreeMap::new(),
            current: None,
        };
        map.entries = map.load();
        map
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn canonical_path(&self) -> PathBuf {
        self.dir.join(self.file_name)
    }

    fn load(&self) -> BTreeMap<String, T> {
        let mut candidates: Vec<String> = match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|f| f.contains(self.file_name) && !f.ends_with(TMP_SUFFIX))
                .collect(),
            Err(e) => {
                warn!(kind = %self.kind, dir = %self.dir.display(), error = %e, "Cannot list asset directory");
                Vec::new()
            }
        };
        candidates.sort();

        let Some(chosen) = candidates.last() else {
            warn!(kind = %self.kind, dir = %self.dir.display(), "No serialized asset map found");
            return BTreeMap::new();
        };
        if candidates.len() > 1 {
            warn!(
                kind = %self.kind,
                dir = %self.dir.display(),
                candidates = ?candidates,
                using = %chosen,
                "More than one serialized asset map found"
            );
        }

        let path = self.dir.join(chosen);
        let parsed = fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()));
        match parsed {
            Ok(entries) => {
                debug!(kind = %self.kind, path = %path.display(), "Loaded asset map");
                entries
            }
            Err(e) => {
                error!(
                    kind = %self.kind,
                    path = %path.display(),
                    error = %e,
                    "Failed to deserialize asset map, starting empty"
                );
                BTreeMap::new()
            }
        }
    }

    fn persist(&self) -> Result<(), AssetError> {
        let canonical = self.canonical_path();
        let failure = |e: &dyn std::fmt::Display| {
            error!(kind = %self.kind, path = %canonical.display(), error = %e, "Failed to persist asset map");
            AssetError::Persistence(format!("{}: {}", canonical.display(), e))
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(self.file_name)
            .suffix(TMP_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| failure(&e))?;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut out, &self.entries).map_err(|e| failure(&e))?;
            out.flush().map_err(|e| failure(&e))?;
        }
        tmp.as_file().sync_all().map_err(|e| failure(&e))?;

        if let Err(e) = tmp.persist(&canonical) {
            // Platforms without atomic replace: remove, then rename.
            warn!(kind = %self.kind, error = %e.error, "Atomic replace failed, removing old file first");
            if canonical.exists() {
                fs::remove_file(&canonical).map_err(|e| failure(&e))?;
            }
            e.file.persist(&canonical).map_err(|e| failure(&e.error))?;
        }
        Ok(())
    }

    /// Look up an entry.
    pub fn get(&self, name: &str) -> Result<&T, AssetError> {
        self.entries.get(name).ok_or_else(|| {
            warn!(kind = %self.kind, name = %name, "Asset not found");
            AssetError::NotFound {
                kind: self.kind,
                name: name.to_string(),
            }
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert or replace an entry, make it current and persist.
    ///
    /// The in-memory entry is kept even if persisting fails.
    pub fn insert(&mut self, name: &str, value: T) -> Result<(), AssetError> {
        self.entries.insert(name.to_string(), value);
        self.current = Some(name.to_string());
        self.persist()
    }

    /// Remove an entry and persist.
    ///
    /// Clears the current pointer if it named the removed entry.
    pub fn remove(&mut self, name: &str) -> Result<T, AssetError> {
        let Some(removed) = self.entries.remove(name) else {
            warn!(kind = %self.kind, name = %name, "Asset not found, nothing removed");
            return Err(AssetError::NotFound {
                kind: self.kind,
                name: name.to_string(),
            });
        };
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        self.persist()?;
        Ok(removed)
    }

    /// Names of all entries, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.entries.iter()
    }

    /// Name of the entry last saved or loaded.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Mark an existing entry as current.
    pub fn set_current(&mut self, name: &str) -> Result<(), AssetError> {
        self.get(name)?;
        self.current = Some(name.to_string());
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// In-memory state of a [`PersistedMap`] captured by [`PersistedMap::snapshot`].
#[derive(Debug, Clone)]
pub struct MapSnapshot<T> {
    entries: BTreeMap<String, T>,
    current: Option<String>,
}

impl<T> PersistedMap<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn snapshot(&self) -> MapSnapshot<T> {
        MapSnapshot {
            entries: self.entries.clone(),
            current: self.current.clone(),
        }
    }

    /// Put back a snapshot and persist it.
    ///
    /// The in-memory state is restored even if persisting fails.
    pub fn restore(&mut self, snapshot: MapSnapshot<T>) -> Result<(), AssetError> {
        self.entries = snapshot.entries;
        self.current = snapshot.current;
        self.persist()
    }
}
