// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration threaded explicitly through every builder, optimizer and
//! converter call. There is no global/singleton configuration: the upstream
//! C++ source this core is modeled on reads a process-wide `cpu_config`
//! instance, but the design notes call for an explicit value instead.

use serde::{Deserialize, Serialize};

/// Selects the starting builder (object-split only vs. spatial-split) and
/// the output branching factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BvhType {
    /// Binary SAH-based BVH.
    Bvh,
    /// Binary SAH-based Spatial BVH.
    Sbvh,
    /// Quaternary BVH, built by collapsing [`BvhType::Bvh`].
    Bvh4,
    /// Quaternary BVH, built by collapsing [`BvhType::Sbvh`].
    Sbvh4,
    /// Compressed-wide 8-way BVH, built by collapsing [`BvhType::Bvh`].
    Bvh8,
    /// Compressed-wide 8-way BVH, built by collapsing [`BvhType::Sbvh`].
    Sbvh8,
}

impl BvhType {
    /// Whether this variant starts from the spatial-split (SBVH) builder.
    pub fn uses_spatial_splits(self) -> bool {
        matches!(self, Self::Sbvh | Self::Sbvh4 | Self::Sbvh8)
    }

    /// The output node width after conversion: 2 (no conversion), 4 or 8.
    pub fn target_width(self) -> u8 {
        match self {
            Self::Bvh | Self::Sbvh => 2,
            Self::Bvh4 | Self::Sbvh4 => 4,
            Self::Bvh8 | Self::Sbvh8 => 8,
        }
    }
}

/// Build-time configuration. Defaults mirror the upstream `CPUConfig`
/// numeric defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhConfig {
    pub bvh_type: BvhType,
    pub enable_bvh_optimization: bool,

    /// SAH traversal cost constant (`C_trav`).
    pub sah_cost_node: f32,
    /// SAH leaf/intersection cost constant (`C_leaf`).
    pub sah_cost_leaf: f32,

    /// Restricted spatial-split threshold: a spatial split is only
    /// considered when the object-split overlap surface area exceeds this
    /// fraction of the root's surface area.
    pub sbvh_alpha: f32,

    /// Optimizer wall-clock budget, in milliseconds.
    pub bvh_optimizer_max_time_ms: u64,
    /// Optimizer batch-count budget.
    pub bvh_optimizer_max_num_batches: u32,

    /// Leaves may hold at most this many primitives before a split is forced.
    pub leaf_max_primitives: usize,

    /// Seed for the optimizer's PRNG. Same seed + triangles + config always
    /// produces byte-identical output.
    pub optimizer_seed: u64,
}

impl Default for BvhConfig {
    fn default() -> Self {
        Self {
            bvh_type: BvhType::Bvh8,
            enable_bvh_optimization: false,
            sah_cost_node: 4.0,
            sah_cost_leaf: 1.0,
            sbvh_alpha: 1e-5,
            bvh_optimizer_max_time_ms: 60_000,
            bvh_optimizer_max_num_batches: 1000,
            leaf_max_primitives: 1,
            optimizer_seed: 0,
        }
    }
}
