// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! 4-way converter (C6): collapses a `BVH2` into a `BVH4` by greedily
//! inlining the widest-surface-area expandable child into its node slot
//! list until 4 slots are filled or no internal child remains.

use crate::accel::node::{Bvh2Node, Bvh4Node};

/// Converts the `BVH2` rooted at `root` into a flat `BVH4` node array,
/// root first.
pub fn convert(bvh2: &[Bvh2Node], root: usize) -> Vec<Bvh4Node> {
    let mut out = Vec::new();
    build_rec(bvh2, root, &mut out);
    out
}

fn build_rec(bvh2: &[Bvh2Node], node_idx: usize, out: &mut Vec<Bvh4Node>) -> u32 {
    let out_idx = out.len();
    out.push(Bvh4Node::ZERO);

    let mut slots: Vec<usize> = vec![node_idx];
    loop {
        if slots.len() >= 4 {
            break;
        }
        let expandable = slots
            .iter()
            .enumerate()
            .filter(|(_, &s)| !bvh2[s].is_leaf())
            .max_by(|(_, &a), (_, &b)| {
                bvh2[a]
                    .aabb()
                    .surface_area()
                    .partial_cmp(&bvh2[b].aabb().surface_area())
                    .unwrap()
            });
        let Some((pos, &s)) = expandable else {
            break;
        };
        slots.remove(pos);
        slots.push(bvh2[s].left as usize);
        slots.push(bvh2[s].right() as usize);
    }

    let parent_aabb = bvh2[node_idx].aabb();
    let mut node = Bvh4Node {
        aabb_min: parent_aabb.min.into(),
        aabb_max: parent_aabb.max.into(),
        ..Bvh4Node::ZERO
    };

    for (slot_i, &s) in slots.iter().enumerate().take(4) {
        let child = bvh2[s];
        node.child_aabb_min[slot_i] = child.aabb_min;
        node.child_aabb_max[slot_i] = child.aabb_max;
        if child.is_leaf() {
            node.child_index[slot_i] = child.left;
            node.child_count[slot_i] = child.count;
        } else {
            node.child_index[slot_i] = build_rec(bvh2, s, out);
            node.child_count[slot_i] = 0;
        }
    }

    out[out_idx] = node;
    out_idx as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::builder::sah;
    use crate::accel::triangle::Triangle;
    use crate::config::BvhConfig;
    use glam::Vec3;

    fn grid_triangles(n: usize) -> Vec<Triangle> {
        (0..n)
            .map(|i| {
                let x = (i as f32) * 2.0;
                Triangle::new(
                    Vec3::new(x, 0.0, 0.0),
                    Vec3::new(x + 1.0, 0.0, 0.0),
                    Vec3::new(x, 1.0, 0.0),
                )
            })
            .collect()
    }

    #[test]
    fn every_triangle_id_reachable_through_wide4_leaves() {
        let triangles = grid_triangles(13);
        let cfg = BvhConfig { leaf_max_primitives: 1, ..BvhConfig::default() };
        let (bvh2, indices, _stats) = sah::build(&triangles, &cfg);
        let wide = convert(&bvh2, 0);

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
                        seen.push(indices[first + k]);
                    }
                } else {
                    stack.push(n.child_index[slot] as usize);
                }
            }
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), triangles.len());
    }

    #[test]
    fn two_triangle_bvh_collapses_to_single_wide4_node() {
        let triangles = grid_triangles(2);
        let cfg = BvhConfig::default();
        let (bvh2, _indices, _stats) = sah::build(&triangles, &cfg);
        let wide = convert(&bvh2, 0);
        assert_eq!(wide.len(), 1);
        assert_eq!(wide[0].filled_slots(), 2);
    }
}
