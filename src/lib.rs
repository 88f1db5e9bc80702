// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Acceleration-structure core for a GPU path tracer: SAH/SBVH construction,
//! an insertion-based BVH optimizer, and BVH4/CWBVH wide-node collapse.
//!
//! The single entry point is [`accel::build::build_hierarchy`]; everything
//! else under [`accel`] is either a collaborator it calls or independently
//! usable (e.g. [`accel::persist`] for the on-disk blob format).

pub mod accel;
pub mod config;
pub mod constants;
pub mod error;
pub mod stats;

pub use accel::build::{build_hierarchy, BuildOutput, Hierarchy};
pub use accel::node::{Bvh2Node, Bvh4Node, Bvh8Node};
pub use accel::triangle::Triangle;
pub use config::{BvhConfig, BvhType};
pub use error::{BvhError, Result};
