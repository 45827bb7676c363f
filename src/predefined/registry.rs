// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Registry of predefined sequence generators.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ChannelSettings;
use crate::error::{Result, ValidationError};
use crate::store::AssetStaging;

/// Signature of a predefined generator.
///
/// Reads the current channel settings and its arguments, stages the
/// blocks, ensembles and sequences it builds.
pub type PredefinedFn =
    Arc<dyn Fn(&ChannelSettings, &PredefinedArgs, &mut AssetStaging) -> Result<()> + Send + Sync>;

/// A registered generator.
#[derive(Clone)]
pub struct PredefinedMethod {
    pub name: String,
    /// Positional parameter names, for listing.
    pub params: Vec<String>,
    pub func: PredefinedFn,
}

impl fmt::Debug for PredefinedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredefinedMethod")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Positional generator arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredefinedArgs {
    values: Vec<Value>,
}

impl PredefinedArgs {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Parse each string as JSON, keeping it as a JSON string when it is not.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Self {
        let values = raw
            .iter()
            .map(|s| {
                let s = s.as_ref();
                serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
            })
            .collect();
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn value(&self, index: usize, field: &str) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            ValidationError::Field {
                field: field.to_string(),
                message: format!("missing argument {}", index),
            }
            .into()
        })
    }

    fn mismatch(field: &str, expected: &str, value: &Value) -> crate::error::Error {
        ValidationError::Field {
            field: field.to_string(),
            message: format!("expected {}, got {}", expected, value),
        }
        .into()
    }

    pub fn f64(&self, index: usize, field: &str) -> Result<f64> {
        let value = self.value(index, field)?;
        value
            .as_f64()
            .ok_or_else(|| Self::mismatch(field, "a number", value))
    }

    pub fn u32(&self, index: usize, field: &str) -> Result<u32> {
        let value = self.value(index, field)?;
        value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| Self::mismatch(field, "an unsigned 32-bit integer", value))
    }

    pub fn str(&self, index: usize, field: &str) -> Result<&str> {
        let value = self.value(index, field)?;
        value
            .as_str()
            .ok_or_else(|| Self::mismatch(field, "a string", value))
    }

    pub fn bool(&self, index: usize, field: &str) -> Result<bool> {
        let value = self.value(index, field)?;
        value
            .as_bool()
            .ok_or_else(|| Self::mismatch(field, "a boolean", value))
    }
}

/// Name-keyed predefined generators.
#[derive(Default)]
pub struct PredefinedRegistry {
    methods: RwLock<HashMap<String, PredefinedMethod>>,
}

impl PredefinedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in generators.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        super::basic::register_builtin(&registry);
        registry
    }

    /// Register a generator, replacing one of the same name.
    pub fn register<F>(&self, name: &str, params: &[&str], func: F)
    where
        F: Fn(&ChannelSettings, &PredefinedArgs, &mut AssetStaging) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        let method = PredefinedMethod {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            func: Arc::new(func),
        };
        let mut methods = self.methods.write();
        if methods.insert(name.to_string(), method).is_some() {
            warn!(name = %name, "Replaced predefined generator");
        } else {
            debug!(name = %name, "Registered predefined generator");
        }
    }

    pub fn get(&self, name: &str) -> Option<PredefinedMethod> {
        self.methods.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.read().contains_key(name)
    }

    /// All registered generators, sorted by name.
    pub fn list(&self) -> Vec<PredefinedMethod> {
        let mut methods: Vec<_> = self.methods.read().values().cloned().collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }
}
