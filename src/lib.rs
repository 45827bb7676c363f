// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pulse-sequence sampling engine
//!
//! This crate turns a hierarchical description of timed pulses (blocks,
//! ensembles, sequences) into per-channel sample streams for arbitrary
//! waveform generators and pulse generators.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           SequenceGenerator              │
//! │   settings · busy flag · cancellation    │
//! ├──────────────────┬──────────────────────┤
//! │   Asset Store    │   Sampling           │
//! │   (JSON, atomic) │   analysis/sampler   │
//! ├──────────────────┴──────────────────────┤
//! │   Writer Registry    Predefined Registry │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management and channel settings
//! - [`pulse`]: Blocks, ensembles, sequences and pulse functions
//! - [`sampling`]: Bin analysis and the ensemble/sequence samplers
//! - [`writer`]: Destination-format writers
//! - [`store`]: Persistent asset store
//! - [`predefined`]: Registered predefined sequence generators
//! - [`generator`]: The generator tying it all together
//! - [`validation`]: Structural checks run before sampling
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod generator;
pub mod predefined;
pub mod pulse;
pub mod sampling;
pub mod store;
pub mod validation;
pub mod writer;

pub use config::{ChannelSettings, Config};
pub use error::{Error, Result};
pub use generator::{LoadedAsset, SequenceGenerator};

#[cfg(test)]
pub mod test_utils;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
