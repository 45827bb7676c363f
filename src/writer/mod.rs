// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Destination-format writers for sampled waveforms and sequences.
//!
//! This module provides the [`WaveformWriter`] and [`SequenceWriter`]
//! traits, a [`WriterRegistry`] keyed by format, and reference
//! implementations:
//!
//! - `raw::RawWriter` (`"raw"`): one little-endian `f32` file per analog
//!   channel and one byte-per-sample file per digital channel
//! - `raw::JsonSequenceWriter` (`"rawseq"`): the step list as JSON
//!
//! Vendor container formats plug in through the same traits.

pub mod raw;
pub mod registry;
pub mod r#trait;

pub use r#trait::{SampleChunk, SequenceStepDescriptor, SequenceWriter, WaveformWriter};
pub use raw::{JsonSequenceWriter, RawWriter};
pub use registry::WriterRegistry;
