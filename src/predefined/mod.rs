// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Predefined sequence generators.
//!
//! A generator is a named function that builds blocks, ensembles and
//! sequences from the current channel settings and positional arguments.
//! Generators are registered explicitly with [`PredefinedRegistry::register`].

pub mod basic;
pub mod registry;

pub use basic::register_builtin;
pub use registry::{PredefinedArgs, PredefinedFn, PredefinedMethod, PredefinedRegistry};
