// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tuning constants for the acceleration-structure core that aren't part of
//! the per-build [`crate::config::BvhConfig`] (fixed constants rather than
//! user-configurable).

/// Bin count for the spatial-split sweep (C2), used directly by
/// [`crate::accel::partition`]. 256 is the commonly cited default for this
/// kind of binned SAH sweep.
pub const BVH_SPATIAL_SPLIT_BINS: usize = 256;

/// Tolerance used when checking CWBVH quantization conservativeness
/// (Inv. 4) and AABB-tightness property tests.
pub const AABB_EPS: f32 = 1e-4;
