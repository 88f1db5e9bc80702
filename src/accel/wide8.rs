// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! 8-way compressed-wide (CWBVH) converter (C7): the same greedy collapse
//! as C6, generalized to 8 slots, followed by octant-order assignment and
//! per-node quantization.
//!
//! Uses the *unary mask* meta convention documented on
//! [`crate::accel::node::Bvh8Node`]: self-describing per slot, no
//! cross-referencing a running offset table. Children are laid out
//! contiguously per node (`base_index_child`) in slot order, and triangles
//! similarly (`base_index_triangle`), matching the layout
//! `original_source/Src/BVH/BVH.cpp`'s `BVH8Converter` produces for its GPU
//! traversal kernel.

use glam::Vec3;

use crate::accel::aabb::Aabb;
use crate::accel::node::{Bvh2Node, Bvh8Node};

const MAX_SLOTS: usize = 8;
/// The unary meta mask can represent at most 3 triangles per leaf slot
/// (`((1 << 3) - 1) << 5` is the widest count the high 3 bits encode).
const MAX_LEAF_TRIS_PER_SLOT: u32 = 3;

/// A candidate occupant of one of a wide node's up-to-8 slots, before it's
/// finalized into either a leaf-meta entry or a recursively-converted
/// internal child.
#[derive(Clone, Copy)]
enum Slot {
    /// An as-yet-unconverted `BVH2` node.
    Node(usize),
    /// A sub-range of a `BVH2` leaf's triangles, produced when a leaf has
    /// more primitives than one CWBVH slot can encode. Reuses the parent
    /// leaf's AABB rather than re-deriving a tighter one, since the
    /// converter only sees index ranges, not triangle geometry.
    LeafChunk { aabb: Aabb, first: u32, count: u32 },
}

impl Slot {
    fn aabb(self, bvh2: &[Bvh2Node]) -> Aabb {
        match self {
            Self::Node(i) => bvh2[i].aabb(),
            Self::LeafChunk { aabb, .. } => aabb,
        }
    }

    /// `Some((left, right))` when this slot can still be expanded into two
    /// smaller pieces (an internal `BVH2` node, or an oversized leaf/chunk
    /// that needs further splitting); `None` once it's a single leaf slot
    /// with `count <= MAX_LEAF_TRIS_PER_SLOT`.
    fn split(self, bvh2: &[Bvh2Node]) -> Option<(Slot, Slot)> {
        match self {
            Self::Node(i) => {
                let n = bvh2[i];
                if !n.is_leaf() {
                    Some((Slot::Node(n.left as usize), Slot::Node(n.right() as usize)))
                } else if n.count > MAX_LEAF_TRIS_PER_SLOT {
                    Some(split_leaf(n.aabb(), n.left, n.count))
                } else {
                    None
                }
            }
            Self::LeafChunk { aabb, first, count } => {
                if count > MAX_LEAF_TRIS_PER_SLOT {
                    Some(split_leaf(aabb, first, count))
                } else {
                    None
                }
            }
        }
    }

    /// The `(first, count)` triangle range for an atomic leaf slot.
    fn leaf_range(self, bvh2: &[Bvh2Node]) -> (u32, u32) {
        match self {
            Self::Node(i) => (bvh2[i].left, bvh2[i].count),
            Self::LeafChunk { first, count, .. } => (first, count),
        }
    }
}

fn split_leaf(aabb: Aabb, first: u32, count: u32) -> (Slot, Slot) {
    let half = count / 2;
    (
        Slot::LeafChunk { aabb, first, count: half },
        Slot::LeafChunk { aabb, first: first + half, count: count - half },
    )
}

/// Converts the `BVH2` rooted at `root` into a flat CWBVH node array plus
/// a (possibly reordered) triangle-index permutation, following the
/// node's `triangle_indices` through `base_index_triangle`.
pub fn convert(bvh2: &[Bvh2Node], root: usize, triangle_indices: &[u32]) -> (Vec<Bvh8Node>, Vec<u32>) {
    let mut out_nodes = vec![Bvh8Node::ZERO];
    let mut out_triangles = Vec::with_capacity(triangle_indices.len());
    build_into(bvh2, Slot::Node(root), 0, triangle_indices, &mut out_nodes, &mut out_triangles);
    (out_nodes, out_triangles)
}

/// Writes the wide node for `source` into `out_nodes[out_idx]` (already
/// reserved by the caller), recursing into any slot that's still
/// expandable once the greedy widening stops (internal children, and
/// oversized leaves that didn't fully fit within 8 slots).
fn build_into(
    bvh2: &[Bvh2Node],
    source: Slot,
    out_idx: usize,
    triangle_indices: &[u32],
    out_nodes: &mut Vec<Bvh8Node>,
    out_triangles: &mut Vec<u32>,
) {
    let mut slots: Vec<Slot> = vec![source];
    loop {
        if slots.len() >= MAX_SLOTS {
            break;
        }
        let expandable = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.split(bvh2).is_some())
            .max_by(|(_, a), (_, b)| {
                a.aabb(bvh2).surface_area().partial_cmp(&b.aabb(bvh2).surface_area()).unwrap()
            });
        let Some((pos, &s)) = expandable else { break };
        let (l, r) = s.split(bvh2).unwrap();
        slots.remove(pos);
        slots.push(l);
        slots.push(r);
    }

    let parent_aabb = source.aabb(bvh2);
    let parent_center = parent_aabb.center();
    let centers: Vec<Vec3> = slots.iter().map(|s| s.aabb(bvh2).center()).collect();
    let positions = assign_octants(&centers, parent_center);

    let mut ordered: [Option<Slot>; MAX_SLOTS] = [None; MAX_SLOTS];
    for (slot, &pos) in slots.iter().zip(&positions) {
        ordered[pos] = Some(*slot);
    }

    // Reserve a contiguous block of internal-child node slots up front so
    // `base_index_child` can address them by simple offset.
    let internal_positions: Vec<usize> = (0..MAX_SLOTS)
        .filter(|&p| matches!(ordered[p], Some(s) if s.split(bvh2).is_some()))
        .collect();
    let base_index_child = out_nodes.len() as u32;
    for _ in &internal_positions {
        out_nodes.push(Bvh8Node::ZERO);
    }

    let base_index_triangle = out_triangles.len() as u32;
    let mut meta = [0u8; MAX_SLOTS];
    let mut imask = 0u8;
    let mut child_aabbs = [Aabb::EMPTY; MAX_SLOTS];

    // Leaf slots first, in slot order, so every local offset lands in this
    // node's own contiguous triangle block. Internal children are expanded
    // in a second pass below — their recursive calls append to the shared
    // `out_triangles` vec too, and doing that first would inflate the
    // offsets of any leaf slot ordered after them.
    for pos in 0..MAX_SLOTS {
        let Some(s) = ordered[pos] else { continue };
        child_aabbs[pos] = s.aabb(bvh2);
        if s.split(bvh2).is_none() {
            let (first, count) = s.leaf_range(bvh2);
            let local_offset = (out_triangles.len() as u32 - base_index_triangle) as u8;
            for k in 0..count {
                out_triangles.push(triangle_indices[(first + k) as usize]);
            }
            let unary = ((1u32 << count) - 1) << 5;
            meta[pos] = local_offset | unary as u8;
        }
    }

    let mut internal_rank = 0u32;
    for pos in 0..MAX_SLOTS {
        let Some(s) = ordered[pos] else { continue };
        if s.split(bvh2).is_some() {
            imask |= 1 << pos;
            meta[pos] = (24 + internal_rank) as u8 | 0b1110_0000;
            let child_out_idx = (base_index_child + internal_rank) as usize;
            build_into(bvh2, s, child_out_idx, triangle_indices, out_nodes, out_triangles);
            internal_rank += 1;
        }
    }

    let node = quantize(parent_aabb, &child_aabbs, meta, imask, base_index_child, base_index_triangle);
    out_nodes[out_idx] = node;
}

/// Assigns each slot (by centroid relative to `parent_center`) to one of
/// the 8 sign-octants, resolving collisions by greedily preferring the
/// child with the strongest signed projection onto its preferred octant's
/// direction.
fn assign_octants(centers: &[Vec3], parent_center: Vec3) -> Vec<usize> {
    let n = centers.len();
    let offsets: Vec<Vec3> = centers.iter().map(|&c| c - parent_center).collect();
    let preferred_octant: Vec<usize> = offsets.iter().map(|&d| octant_of(d)).collect();
    let preferred_proj: Vec<f32> = offsets
        .iter()
        .zip(&preferred_octant)
        .map(|(&d, &o)| d.dot(octant_direction(o)))
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| preferred_proj[b].partial_cmp(&preferred_proj[a]).unwrap());

    let mut occupied = [false; MAX_SLOTS];
    let mut assignment = vec![0usize; n];
    for i in order {
        let pref = preferred_octant[i];
        if !occupied[pref] {
            occupied[pref] = true;
            assignment[i] = pref;
            continue;
        }
        let mut best_oct = 0usize;
        let mut best_proj = f32::NEG_INFINITY;
        for (o, occ) in occupied.iter().enumerate() {
            if *occ {
                continue;
            }
            let proj = offsets[i].dot(octant_direction(o));
            if proj > best_proj {
                best_proj = proj;
                best_oct = o;
            }
        }
        occupied[best_oct] = true;
        assignment[i] = best_oct;
    }
    assignment
}

fn octant_of(d: Vec3) -> usize {
    (d.x >= 0.0) as usize | (((d.y >= 0.0) as usize) << 1) | (((d.z >= 0.0) as usize) << 2)
}

fn octant_direction(octant: usize) -> Vec3 {
    Vec3::new(
        if octant & 1 != 0 { 1.0 } else { -1.0 },
        if octant & 2 != 0 { 1.0 } else { -1.0 },
        if octant & 4 != 0 { 1.0 } else { -1.0 },
    )
}

/// Quantizes `child_aabbs` relative to `parent_aabb`, bumping the exponent
/// until every filled slot's dequantized box conservatively contains the
/// exact one (Inv. 4).
fn quantize(
    parent_aabb: Aabb,
    child_aabbs: &[Aabb; MAX_SLOTS],
    meta: [u8; MAX_SLOTS],
    imask: u8,
    base_index_child: u32,
    base_index_triangle: u32,
) -> Bvh8Node {
    let p = parent_aabb.min;
    let extent = parent_aabb.extent();

    let mut exponent = [0u8; 3];
    for axis in 0..3 {
        let e = axis_component(extent, axis);
        let raw = if e <= 0.0 { 0 } else { ((e / 255.0).log2().ceil() as i32).max(0) };
        exponent[axis] = (raw + 127).clamp(0, 255) as u8;
    }

    let mut qlo = [[0u8; MAX_SLOTS]; 3];
    let mut qhi = [[0u8; MAX_SLOTS]; 3];

    for _ in 0..8 {
        let scale = [scale_of(exponent[0]), scale_of(exponent[1]), scale_of(exponent[2])];
        let mut conservative = true;

        for slot in 0..MAX_SLOTS {
            if meta[slot] == 0 {
                continue;
            }
            let child = child_aabbs[slot];
            for axis in 0..3 {
                let lo = axis_component(child.min - p, axis) / scale[axis];
                let hi = axis_component(child.max - p, axis) / scale[axis];
                let qlo_v = lo.floor().clamp(0.0, 255.0);
                let qhi_v = hi.ceil().clamp(0.0, 255.0);
                qlo[axis][slot] = qlo_v as u8;
                qhi[axis][slot] = qhi_v as u8;

                let dequant_lo = p_axis(p, axis) + qlo_v * scale[axis];
                let dequant_hi = p_axis(p, axis) + qhi_v * scale[axis];
                if dequant_lo > axis_component(child.min, axis) + 1e-3
                    || dequant_hi < axis_component(child.max, axis) - 1e-3
                {
                    conservative = false;
                }
            }
        }

        if conservative {
            break;
        }
        for e in &mut exponent {
            *e = e.saturating_add(1);
        }
    }

    Bvh8Node {
        p: p.into(),
        e: exponent,
        imask,
        base_index_child,
        base_index_triangle,
        meta,
        qlo,
        qhi,
    }
}

fn scale_of(exponent_byte: u8) -> f32 {
    f32::from_bits((exponent_byte as u32) << 23)
}

fn axis_component(v: Vec3, axis: usize) -> f32 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

fn p_axis(p: Vec3, axis: usize) -> f32 {
    axis_component(p, axis)
}
