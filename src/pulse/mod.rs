// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Declarative pulse objects.
//!
//! The object graph is three levels deep:
//!
//! - [`Block`]: an ordered list of [`BlockElement`]s, each a timed segment
//!   with a constant level per digital channel and a [`PulseFunction`] per
//!   analog channel
//! - [`Ensemble`]: blocks (by name) with repetition counts plus the
//!   channel metadata needed to sample them
//! - [`Sequence`]: ensembles (by name) with per-step playback parameters
//!
//! Ensembles and sequences hold names, not copies, of what they reference.

pub mod function;
pub mod sequence;
pub mod types;

pub use function::PulseFunction;
pub use sequence::{Sequence, SequenceStep, StepParameters};
pub use types::{Block, BlockElement, BlockRef, Ensemble};
