// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Split selection: object splits (used by both builders) and spatial
//! splits plus the Stich et al. unsplit test (SBVH only).

use glam::Vec3;

use crate::accel::aabb::{Aabb, clip_triangle_to_slab};
use crate::accel::triangle::{PrimitiveRef, Triangle};
use crate::config::BvhConfig;
use crate::constants::BVH_SPATIAL_SPLIT_BINS as SPATIAL_SPLIT_BINS;

/// Splits within this relative fraction of each other are considered tied;
/// the tie-break favors the object split (fewer refs, simpler leaves).
const TIE_EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    Object,
    Spatial,
}

/// The outcome of evaluating a candidate set of refs: split along the
/// chosen axis, or give up and become a leaf.
pub enum PartitionOutcome {
    Leaf,
    Split {
        axis: usize,
        kind: SplitKind,
        left_aabb: Aabb,
        right_aabb: Aabb,
    },
}

/// `cost(k)` for an object split at position `k`, in the normalized SAH
/// form: `C_trav + (SA(B_L)*k + SA(B_R)*(n-k)) * C_leaf / SA(B)`.
fn object_split_cost(
    left_sa: f32,
    left_n: usize,
    right_sa: f32,
    right_n: usize,
    parent_sa: f32,
    cfg: &BvhConfig,
) -> f32 {
    if parent_sa <= 0.0 {
        return f32::INFINITY;
    }
    cfg.sah_cost_node
        + (left_sa * left_n as f32 + right_sa * right_n as f32) * cfg.sah_cost_leaf / parent_sa
}

fn leaf_cost(count: usize, cfg: &BvhConfig) -> f32 {
    count as f32 * cfg.sah_cost_leaf
}

/// Result of [`best_object_split_on_sorted_axis`]: the SAH-minimal cut
/// position `k` (items `[0, k)` go left) along with its cost.
pub struct ObjectSplit {
    pub k: usize,
    pub cost: f32,
    pub left_aabb: Aabb,
    pub right_aabb: Aabb,
}

/// Sweeps a slice of refs already sorted by centroid along `axis` and
/// returns the SAH-minimal cut, if any.
///
/// `n >= 2` is required; the caller is expected to have already handled the
/// single/empty-ref cases.
pub fn best_object_split_on_sorted_axis(
    refs: &[PrimitiveRef],
    parent_aabb: &Aabb,
    cfg: &BvhConfig,
) -> Option<ObjectSplit> {
    let n = refs.len();
    if n < 2 {
        return None;
    }

    // Right-to-left sweep: right_aabb[k] / right_count[k] describe refs[k..n].
    let mut right_aabb = vec![Aabb::EMPTY; n + 1];
    for i in (0..n).rev() {
        right_aabb[i] = right_aabb[i + 1].union(refs[i].aabb);
    }

    let parent_sa = parent_aabb.surface_area();
    let mut left_aabb = Aabb::EMPTY;
    let mut best: Option<ObjectSplit> = None;

    for k in 1..n {
        left_aabb = left_aabb.union(refs[k - 1].aabb);
        let right = right_aabb[k];
        let cost = object_split_cost(
            left_aabb.surface_area(),
            k,
            right.surface_area(),
            n - k,
            parent_sa,
            cfg,
        );
        if best.as_ref().is_none_or(|b| cost < b.cost) {
            best = Some(ObjectSplit {
                k,
                cost,
                left_aabb,
                right_aabb: right,
            });
        }
    }

    best
}

/// Chooses the best object split across all three axes. `refs_by_axis[a]`
/// must be `refs` sorted by centroid along axis `a`.
pub struct BestObjectSplit {
    pub axis: usize,
    pub k: usize,
    pub cost: f32,
    pub left_aabb: Aabb,
    pub right_aabb: Aabb,
}

pub fn best_object_split(
    refs_by_axis: &[Vec<PrimitiveRef>; 3],
    parent_aabb: &Aabb,
    cfg: &BvhConfig,
) -> Option<BestObjectSplit> {
    let mut best: Option<BestObjectSplit> = None;
    for axis in 0..3 {
        if let Some(split) = best_object_split_on_sorted_axis(&refs_by_axis[axis], parent_aabb, cfg)
        {
            if best.as_ref().is_none_or(|b| split.cost < b.cost) {
                best = Some(BestObjectSplit {
                    axis,
                    k: split.k,
                    cost: split.cost,
                    left_aabb: split.left_aabb,
                    right_aabb: split.right_aabb,
                });
            }
        }
    }
    best
}

/// One bin of the spatial-split sweep.
#[derive(Clone, Copy)]
struct Bin {
    aabb: Aabb,
    entry: u32,
    exit: u32,
}

impl Default for Bin {
    fn default() -> Self {
        Self {
            aabb: Aabb::EMPTY,
            entry: 0,
            exit: 0,
        }
    }
}

pub struct SpatialSplit {
    pub axis: usize,
    pub cost: f32,
    pub plane: f32,
    pub left_aabb: Aabb,
    pub right_aabb: Aabb,
}

/// Stich et al. spatial-split search: bins `refs`'s clipped AABBs along
/// each axis, sweeps cumulative bounds from both ends, and returns the
/// cheapest split plane across all three axes (restricted by `sbvh_alpha`
/// against `root_sa`).
pub fn best_spatial_split(
    refs: &[PrimitiveRef],
    triangles: &[Triangle],
    parent_aabb: &Aabb,
    root_sa: f32,
    object_split_overlap_sa: f32,
    cfg: &BvhConfig,
) -> Option<SpatialSplit> {
    if root_sa <= 0.0 {
        return None;
    }
    if object_split_overlap_sa / root_sa <= cfg.sbvh_alpha {
        return None;
    }

    let parent_sa = parent_aabb.surface_area();
    let mut best: Option<SpatialSplit> = None;

    for axis in 0..3 {
        let lo = match axis {
            0 => parent_aabb.min.x,
            1 => parent_aabb.min.y,
            _ => parent_aabb.min.z,
        };
        let hi = match axis {
            0 => parent_aabb.max.x,
            1 => parent_aabb.max.y,
            _ => parent_aabb.max.z,
        };
        let extent = hi - lo;
        if extent <= 1e-12 {
            continue;
        }

        let bin_width = extent / SPATIAL_SPLIT_BINS as f32;
        let mut bins = vec![Bin::default(); SPATIAL_SPLIT_BINS];

        let bin_of = |v: f32| {
            (((v - lo) / bin_width) as isize)
                .clamp(0, SPATIAL_SPLIT_BINS as isize - 1) as usize
        };

        for r in refs {
            let tri = &triangles[r.triangle_id as usize];
            let entry_bin = bin_of(axis_component(r.aabb.min, axis));
            let exit_bin = bin_of(axis_component(r.aabb.max, axis));
            bins[entry_bin].entry += 1;
            bins[exit_bin].exit += 1;
            for b in entry_bin..=exit_bin {
                let plane_lo = lo + b as f32 * bin_width;
                let plane_hi = lo + (b + 1) as f32 * bin_width;
                if let Some(clipped) = clip_triangle_to_slab(tri, axis, plane_lo, plane_hi) {
                    bins[b].aabb = bins[b].aabb.union(clipped);
                }
            }
        }

        let mut right_aabb = vec![Aabb::EMPTY; SPATIAL_SPLIT_BINS + 1];
        let mut right_count = vec![0u32; SPATIAL_SPLIT_BINS + 1];
        for i in (0..SPATIAL_SPLIT_BINS).rev() {
            right_aabb[i] = right_aabb[i + 1].union(bins[i].aabb);
            right_count[i] = right_count[i + 1] + bins[i].exit;
        }

        let mut left_aabb = Aabb::EMPTY;
        let mut left_count = 0u32;
        for i in 0..SPATIAL_SPLIT_BINS - 1 {
            left_aabb = left_aabb.union(bins[i].aabb);
            left_count += bins[i].entry;
            let right_c = right_count[i + 1];
            if left_count == 0 || right_c == 0 {
                continue;
            }

            let cost = object_split_cost(
                left_aabb.surface_area(),
                left_count as usize,
                right_aabb[i + 1].surface_area(),
                right_c as usize,
                parent_sa,
                cfg,
            );
            if best.as_ref().is_none_or(|b| cost < b.cost) {
                best = Some(SpatialSplit {
                    axis,
                    cost,
                    plane: lo + (i + 1) as f32 * bin_width,
                    left_aabb,
                    right_aabb: right_aabb[i + 1],
                });
            }
        }
    }

    best
}

fn axis_component(v: Vec3, axis: usize) -> f32 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsplitDecision {
    Left,
    Right,
    Split,
}

/// Stich et al. unsplit test: for a ref straddling the spatial-split plane,
/// decide whether it's cheaper to force it entirely into one child or to
/// actually split it into two refs.
pub fn unsplit(
    straddling_aabb: Aabb,
    left_bounds_without: Aabb,
    right_bounds_without: Aabb,
    left_count: usize,
    right_count: usize,
    cfg: &BvhConfig,
) -> UnsplitDecision {
    let left_with_all = left_bounds_without.union(straddling_aabb);
    let right_with_all = right_bounds_without.union(straddling_aabb);

    let cost_split = left_with_all.surface_area() * (left_count + 1) as f32
        + right_with_all.surface_area() * (right_count + 1) as f32;
    let cost_left = left_with_all.surface_area() * (left_count + 1) as f32
        + right_bounds_without.surface_area() * right_count as f32;
    let cost_right = left_bounds_without.surface_area() * left_count as f32
        + right_with_all.surface_area() * (right_count + 1) as f32;

    if cost_left <= cost_right && cost_left <= cost_split * (1.0 - TIE_EPS) {
        UnsplitDecision::Left
    } else if cost_right <= cost_split * (1.0 - TIE_EPS) {
        UnsplitDecision::Right
    } else {
        UnsplitDecision::Split
    }
}

/// Decides whether to accept an object split, a spatial split, or emit a
/// leaf, applying the tie-break rule (object wins within `TIE_EPS`) and the
/// leaf-size gate.
pub fn choose_outcome(
    object: Option<&BestObjectSplit>,
    spatial: Option<&SpatialSplit>,
    count: usize,
    cfg: &BvhConfig,
) -> PartitionOutcome {
    let leaf = leaf_cost(count, cfg);

    let object_cost = object.map(|o| o.cost);
    let spatial_cost = spatial.map(|s| s.cost);

    let use_spatial = match (object_cost, spatial_cost) {
        (Some(oc), Some(sc)) => sc < oc * (1.0 - TIE_EPS),
        (None, Some(_)) => true,
        _ => false,
    };

    let chosen_cost = if use_spatial { spatial_cost } else { object_cost };

    match chosen_cost {
        Some(cost) if cost < leaf || count > cfg.leaf_max_primitives => {
            if use_spatial {
                let s = spatial.unwrap();
                PartitionOutcome::Split {
                    axis: s.axis,
                    kind: SplitKind::Spatial,
                    left_aabb: s.left_aabb,
                    right_aabb: s.right_aabb,
                }
            } else {
                let o = object.unwrap();
                PartitionOutcome::Split {
                    axis: o.axis,
                    kind: SplitKind::Object,
                    left_aabb: o.left_aabb,
                    right_aabb: o.right_aabb,
                }
            }
        }
        _ => PartitionOutcome::Leaf,
    }
}
