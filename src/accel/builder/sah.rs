// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Top-down binary SAH builder (C3): object splits only, one ref per
//! triangle, output siblings always adjacent.

use crate::accel::aabb::Aabb;
use crate::accel::bitset::SideSet;
use crate::accel::node::Bvh2Node;
use crate::accel::partition::{PartitionOutcome, best_object_split, choose_outcome};
use crate::accel::triangle::{PrimitiveRef, Triangle};
use crate::config::BvhConfig;
use crate::stats::BuildStats;

/// Builds a `BVH2` over `triangles` using object splits only. `triangles`
/// must be non-empty; the caller is responsible for the `EmptyInput` check.
pub fn build(triangles: &[Triangle], cfg: &BvhConfig) -> (Vec<Bvh2Node>, Vec<u32>, BuildStats) {
    let n = triangles.len();
    debug_assert!(n > 0);

    let mut stats = BuildStats::default();
    stats.degenerate_triangle_count = triangles.iter().filter(|t| t.is_degenerate()).count() as u32;
    for (i, t) in triangles.iter().enumerate() {
        if t.is_degenerate() {
            log::warn!("triangle {i} has a zero-area AABB; admitted as a degenerate leaf");
        }
    }

    let mut builder = Builder {
        triangles,
        cfg,
        nodes: vec![Bvh2Node::ZERO; 2 * n - 1],
        next_pair: 1,
        output_indices: Vec::with_capacity(n),
        side: SideSet::new(n),
        scratch: Vec::with_capacity(n),
        stats,
    };

    let arrays = sorted_index_arrays(triangles);
    builder.build_rec(0, arrays);

    // `leaf_max_primitives > 1` can stop recursion well short of the
    // pessimistic `2n-1` allocation; truncate to the pairs actually
    // emitted so trailing `Bvh2Node::ZERO` entries never reach the output
    // (a ZERO node decodes as an internal node pointing at the root).
    builder.nodes.truncate(builder.next_pair);

    log::info!(
        "SAH build: {} triangles, {} nodes, {} object splits",
        n,
        builder.nodes.len(),
        builder.stats.object_splits
    );

    (builder.nodes, builder.output_indices, builder.stats)
}

fn sorted_index_arrays(triangles: &[Triangle]) -> [Vec<u32>; 3] {
    std::array::from_fn(|axis| {
        let mut ids: Vec<u32> = (0..triangles.len() as u32).collect();
        ids.sort_by(|&a, &b| {
            let ca = axis_component(triangles[a as usize].aabb().center(), axis);
            let cb = axis_component(triangles[b as usize].aabb().center(), axis);
            ca.partial_cmp(&cb).unwrap()
        });
        ids
    })
}

fn axis_component(v: glam::Vec3, axis: usize) -> f32 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

fn union_of(ids: &[u32], triangles: &[Triangle]) -> Aabb {
    ids.iter()
        .fold(Aabb::EMPTY, |acc, &id| acc.union(triangles[id as usize].aabb()))
}

struct Builder<'a> {
    triangles: &'a [Triangle],
    cfg: &'a BvhConfig,
    nodes: Vec<Bvh2Node>,
    next_pair: usize,
    output_indices: Vec<u32>,
    side: SideSet,
    scratch: Vec<u32>,
    stats: BuildStats,
}

impl<'a> Builder<'a> {
    fn build_rec(&mut self, node_idx: usize, mut arrays: [Vec<u32>; 3]) {
        let count = arrays[0].len();
        let parent_aabb = union_of(&arrays[0], self.triangles);

        if count <= 1 {
            self.emit_leaf(node_idx, &arrays[0], parent_aabb);
            return;
        }

        let refs_by_axis: [Vec<PrimitiveRef>; 3] = std::array::from_fn(|a| {
            arrays[a]
                .iter()
                .map(|&id| PrimitiveRef::from_triangle(id, self.triangles))
                .collect()
        });

        let object = best_object_split(&refs_by_axis, &parent_aabb, self.cfg);
        let outcome = choose_outcome(object.as_ref(), None, count, self.cfg);

        match outcome {
            PartitionOutcome::Leaf => self.emit_leaf(node_idx, &arrays[0], parent_aabb),
            PartitionOutcome::Split { axis, .. } => {
                let o = object.expect("split outcome implies an object split was found");

                for (i, &id) in arrays[axis].iter().enumerate() {
                    self.side.set(id, i < o.k);
                }
                for a in 0..3 {
                    self.side.stable_partition(&mut arrays[a], &mut self.scratch);
                }

                self.stats.object_splits += 1;

                let left_idx = self.next_pair;
                self.next_pair += 2;

                self.nodes[node_idx] = Bvh2Node {
                    aabb_min: parent_aabb.min.into(),
                    left: left_idx as u32,
                    aabb_max: parent_aabb.max.into(),
                    count: 0,
                };

                let [ax, ay, az] = arrays;
                let (lx, rx) = ax.split_at(o.k);
                let (ly, ry) = ay.split_at(o.k);
                let (lz, rz) = az.split_at(o.k);

                let left_arrays = [lx.to_vec(), ly.to_vec(), lz.to_vec()];
                let right_arrays = [rx.to_vec(), ry.to_vec(), rz.to_vec()];

                self.build_rec(left_idx, left_arrays);
                self.build_rec(left_idx + 1, right_arrays);
            }
        }
    }

    fn emit_leaf(&mut self, node_idx: usize, ids: &[u32], aabb: Aabb) {
        let first = self.output_indices.len() as u32;
        self.output_indices.extend_from_slice(ids);
        self.nodes[node_idx] = Bvh2Node {
            aabb_min: aabb.min.into(),
            left: first,
            aabb_max: aabb.max.into(),
            count: ids.len() as u32,
        };
    }
}
