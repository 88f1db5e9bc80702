// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error taxonomy for the acceleration-structure core.
//!
//! `DegenerateTriangle` and `BudgetExceeded` from the design taxonomy are
//! not variants here: both are recoverable and are surfaced instead through
//! [`crate::stats::BuildStats`] and [`crate::stats::OptimizerReport`].

use thiserror::Error;

/// Fatal conditions raised while building or converting a hierarchy.
#[derive(Debug, Error)]
pub enum BvhError {
    /// No triangles were provided. Callers decide how to handle an empty scene.
    #[error("no triangles provided")]
    EmptyInput,

    /// A data-model invariant was found to be violated. This indicates a
    /// programmer error in the builder/optimizer/converter, never bad input
    /// data.
    #[error("BVH invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, BvhError>;
