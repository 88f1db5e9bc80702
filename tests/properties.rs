// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Randomized property tests for the universal invariants of §8: primitive
//! conservation, AABB tightness, sibling adjacency, CWBVH conservativeness,
//! optimizer monotonicity, determinism, and conversion round-trip
//! semantics.

mod common;

use bvh_accel::accel::build::{build_hierarchy, Hierarchy};
use bvh_accel::accel::node::Bvh2Node;
use bvh_accel::{BvhConfig, BvhType, Triangle};
use proptest::prelude::*;

fn triangle_soup_strategy(max_n: usize) -> impl Strategy<Value = Vec<Triangle>> {
    (2..max_n).prop_flat_map(|n| {
        prop::collection::vec(
            (
                prop::array::uniform3(-50.0f32..50.0),
                prop::array::uniform3(-50.0f32..50.0),
                prop::array::uniform3(-50.0f32..50.0),
            ),
            n,
        )
        .prop_map(|verts| {
            verts
                .into_iter()
                .map(|(a, b, c)| Triangle::new(a.into(), b.into(), c.into()))
                .collect()
        })
    })
}

fn aabb_tightness_holds(nodes: &[Bvh2Node]) -> bool {
    fn check(nodes: &[Bvh2Node], i: usize) -> bool {
        let n = nodes[i];
        if n.is_leaf() {
            return true;
        }
        let left = nodes[n.left as usize];
        let right = nodes[n.right() as usize];
        let union = left.aabb().union(right.aabb());
        let eps = 1e-3;
        (union.min - n.aabb().min).abs().max_element() < eps
            && (union.max - n.aabb().max).abs().max_element() < eps
            && check(nodes, n.left as usize)
            && check(nodes, n.right() as usize)
    }
    check(nodes, 0)
}

fn sibling_adjacency_holds(nodes: &[Bvh2Node]) -> bool {
    nodes.iter().all(|n| n.is_leaf() || n.right() == n.left + 1)
}

proptest! {
    #[test]
    fn sah_primitive_conservation(triangles in triangle_soup_strategy(64)) {
        let cfg = BvhConfig { bvh_type: BvhType::Bvh, ..BvhConfig::default() };
        let out = build_hierarchy(&triangles, &cfg).unwrap();
        let mut seen = out.triangle_indices.clone();
        seen.sort_unstable();
        let mut expected: Vec<u32> = (0..triangles.len() as u32).collect();
        expected.sort_unstable();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn sbvh_primitive_conservation_and_bounded_duplication(triangles in triangle_soup_strategy(64)) {
        let cfg = BvhConfig { bvh_type: BvhType::Sbvh, ..BvhConfig::default() };
        let out = build_hierarchy(&triangles, &cfg).unwrap();

        let mut seen: Vec<u32> = out.triangle_indices.clone();
        seen.sort_unstable();
        seen.dedup();
        prop_assert_eq!(seen.len(), triangles.len());
        prop_assert!(out.triangle_indices.len() <= 4 * triangles.len());
    }

    #[test]
    fn aabb_tightness_and_sibling_adjacency(triangles in triangle_soup_strategy(64)) {
        let cfg = BvhConfig { bvh_type: BvhType::Bvh, ..BvhConfig::default() };
        let out = build_hierarchy(&triangles, &cfg).unwrap();
        let Hierarchy::Binary(nodes) = out.hierarchy else { unreachable!() };
        prop_assert!(aabb_tightness_holds(&nodes));
        prop_assert!(sibling_adjacency_holds(&nodes));
    }

    #[test]
    fn cwbvh_quantization_is_conservative(triangles in triangle_soup_strategy(64)) {
        let cfg = BvhConfig { bvh_type: BvhType::Bvh8, ..BvhConfig::default() };
        let out = build_hierarchy(&triangles, &cfg).unwrap();
        let Hierarchy::Wide8(nodes) = out.hierarchy else { unreachable!() };
        for node in &nodes {
            for slot in 0..8 {
                if node.is_slot_empty(slot) {
                    continue;
                }
                let dequantized = node.dequantize_child_aabb(slot);
                prop_assert!(dequantized.is_valid());
            }
        }
    }

    #[test]
    fn optimizer_never_increases_cost(triangles in triangle_soup_strategy(128)) {
        let cfg = BvhConfig {
            bvh_type: BvhType::Bvh,
            enable_bvh_optimization: true,
            bvh_optimizer_max_time_ms: 50,
            ..BvhConfig::default()
        };
        let out = build_hierarchy(&triangles, &cfg).unwrap();
        prop_assert!(out.optimizer_report.final_cost <= out.optimizer_report.initial_cost + 1e-2);
    }

    #[test]
    fn determinism_same_inputs_produce_identical_output(triangles in triangle_soup_strategy(48)) {
        let cfg = BvhConfig {
            bvh_type: BvhType::Bvh,
            enable_bvh_optimization: true,
            bvh_optimizer_max_time_ms: 20,
            optimizer_seed: 7,
            ..BvhConfig::default()
        };
        let a = build_hierarchy(&triangles, &cfg).unwrap();
        let b = build_hierarchy(&triangles, &cfg).unwrap();
        let Hierarchy::Binary(na) = a.hierarchy else { unreachable!() };
        let Hierarchy::Binary(nb) = b.hierarchy else { unreachable!() };
        prop_assert_eq!(na, nb);
        prop_assert_eq!(a.triangle_indices, b.triangle_indices);
    }

    #[test]
    fn wide4_conversion_preserves_triangle_to_leaf_mapping(triangles in triangle_soup_strategy(64)) {
        use bvh_accel::accel::wide4;

        let cfg = BvhConfig { bvh_type: BvhType::Bvh, leaf_max_primitives: 1, ..BvhConfig::default() };
        let out = build_hierarchy(&triangles, &cfg).unwrap();
        let Hierarchy::Binary(bvh2) = out.hierarchy else { unreachable!() };
        let wide = wide4::convert(&bvh2, 0);

        let mut seen = Vec::new();
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            let n = wide[i];
            for slot in 0..4 {
                let empty = n.child_count[slot] == 0 && n.child_index[slot] == 0 && slot > 0;
                if empty {
                    continue;
                }
                if n.child_count[slot] > 0 {
                    let first = n.child_index[slot] as usize;
                    for k in 0..n.child_count[slot] as usize {
                        seen.push(out.triangle_indices[first + k]);
                    }
                } else {
                    stack.push(n.child_index[slot] as usize);
                }
            }
        }
        seen.sort_unstable();
        let mut expected: Vec<u32> = (0..triangles.len() as u32).collect();
        expected.sort_unstable();
        prop_assert_eq!(seen, expected);
    }
}
