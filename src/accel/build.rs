// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Top-level orchestration: the single public entry point that picks a
//! builder by `BvhType`, runs the optimizer when configured, and converts
//! to the requested hierarchy width.

use crate::accel::builder::{sah, sbvh};
use crate::accel::node::Bvh2Node;
use crate::accel::optimizer;
use crate::accel::triangle::Triangle;
use crate::accel::{wide4, wide8};
use crate::config::{BvhConfig, BvhType};
use crate::error::{BvhError, Result};
use crate::stats::{BuildStats, OptimizerReport};

/// The converted acceleration structure, tagged by width. `Binary` is the
/// `BVH2` the builder produced (optionally optimized); `Wide4`/`Wide8` are
/// the collapsed forms.
#[derive(Debug, Clone)]
pub enum Hierarchy {
    Binary(Vec<Bvh2Node>),
    Wide4(Vec<crate::accel::node::Bvh4Node>),
    Wide8(Vec<crate::accel::node::Bvh8Node>),
}

impl Hierarchy {
    pub fn node_count(&self) -> usize {
        match self {
            Self::Binary(n) => n.len(),
            Self::Wide4(n) => n.len(),
            Self::Wide8(n) => n.len(),
        }
    }
}

/// Full result of a build: the hierarchy, the triangle-index permutation
/// leaves index into, build diagnostics, and the optimizer's report (a
/// no-op report when `cfg.bvh_optimizer_max_num_batches == 0`).
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub hierarchy: Hierarchy,
    pub triangle_indices: Vec<u32>,
    pub build_stats: BuildStats,
    pub optimizer_report: OptimizerReport,
}

/// Builds, optionally optimizes, and converts `triangles` per `cfg`.
///
/// Returns `Err(BvhError::EmptyInput)` for an empty slice; all other
/// degeneracies (zero-area triangles, optimizer budget exhaustion) are
/// surfaced through `BuildStats`/`OptimizerReport` rather than as errors.
pub fn build_hierarchy(triangles: &[Triangle], cfg: &BvhConfig) -> Result<BuildOutput> {
    if triangles.is_empty() {
        return Err(BvhError::EmptyInput);
    }

    let (mut nodes, triangle_indices, build_stats) = if cfg.bvh_type.uses_spatial_splits() {
        sbvh::build(triangles, cfg)
    } else {
        sah::build(triangles, cfg)
    };

    let optimizer_report = if cfg.enable_bvh_optimization {
        optimizer::optimize(&mut nodes, cfg)
    } else {
        let cost = {
            let mut stack = vec![0usize];
            let mut total = 0.0;
            while let Some(i) = stack.pop() {
                let n = nodes[i];
                if n.is_leaf() {
                    total += n.aabb().surface_area() * n.count as f32 * cfg.sah_cost_leaf;
                } else {
                    total += n.aabb().surface_area() * cfg.sah_cost_node;
                    stack.push(n.left as usize);
                    stack.push(n.right() as usize);
                }
            }
            total
        };
        OptimizerReport {
            batches_run: 0,
            budget_exceeded: false,
            initial_cost: cost,
            final_cost: cost,
        }
    };

    check_invariants(&nodes);

    let hierarchy = match cfg.bvh_type.target_width() {
        2 => Hierarchy::Binary(nodes),
        4 => Hierarchy::Wide4(wide4::convert(&nodes, 0)),
        8 => {
            let (wide_nodes, reordered_indices) = wide8::convert(&nodes, 0, &triangle_indices);
            return Ok(BuildOutput {
                hierarchy: Hierarchy::Wide8(wide_nodes),
                triangle_indices: reordered_indices,
                build_stats,
                optimizer_report,
            });
        }
        w => unreachable!("BvhType::target_width returned unsupported width {w}"),
    };

    Ok(BuildOutput {
        hierarchy,
        triangle_indices,
        build_stats,
        optimizer_report,
    })
}

/// Debug-only sanity check for sibling adjacency: every internal node's
/// right child must sit immediately after its left. A violation here is a
/// builder/optimizer bug, not a caller error, so it aborts rather than
/// returning `BvhError::InvariantViolation`.
fn check_invariants(nodes: &[Bvh2Node]) {
    if cfg!(debug_assertions) {
        for n in nodes {
            if !n.is_leaf() {
                debug_assert_eq!(n.right(), n.left + 1, "sibling adjacency violated");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn two_triangles() -> Vec<Triangle> {
        vec![
            Triangle::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
            Triangle::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0), Vec3::new(5.0, 1.0, 0.0)),
        ]
    }

    #[test]
    fn empty_input_is_rejected() {
        let cfg = BvhConfig::default();
        let err = build_hierarchy(&[], &cfg).unwrap_err();
        assert!(matches!(err, BvhError::EmptyInput));
    }

    #[test]
    fn default_config_produces_a_wide8_hierarchy() {
        let triangles = two_triangles();
        let cfg = BvhConfig::default();
        let out = build_hierarchy(&triangles, &cfg).unwrap();
        assert!(matches!(out.hierarchy, Hierarchy::Wide8(_)));
        assert_eq!(out.triangle_indices.len(), 2);
    }

    #[test]
    fn bvh_type_selects_binary_output() {
        let triangles = two_triangles();
        let cfg = BvhConfig { bvh_type: BvhType::Bvh, ..BvhConfig::default() };
        let out = build_hierarchy(&triangles, &cfg).unwrap();
        assert!(matches!(out.hierarchy, Hierarchy::Binary(_)));
    }

    #[test]
    fn optimization_disabled_by_default_but_still_reports_cost() {
        let triangles = two_triangles();
        let cfg = BvhConfig { bvh_type: BvhType::Bvh, ..BvhConfig::default() };
        let out = build_hierarchy(&triangles, &cfg).unwrap();
        assert_eq!(out.optimizer_report.batches_run, 0);
        assert!(out.optimizer_report.initial_cost > 0.0);
        assert_eq!(out.optimizer_report.initial_cost, out.optimizer_report.final_cost);
    }

    #[test]
    fn optimization_enabled_runs_at_least_one_batch() {
        let triangles = two_triangles();
        let cfg = BvhConfig {
            bvh_type: BvhType::Bvh,
            enable_bvh_optimization: true,
            ..BvhConfig::default()
        };
        let out = build_hierarchy(&triangles, &cfg).unwrap();
        // A two-leaf tree is too small to restructure (`optimize` early-outs
        // for `nodes.len() < 3`), so this only exercises the enabled path.
        assert_eq!(out.optimizer_report.batches_run, 0);
    }
}
