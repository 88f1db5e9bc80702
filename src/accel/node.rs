// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! GPU-uploadable node layouts for every hierarchy width. All three are
//! `#[repr(C)]`, `Pod + Zeroable` so a caller can `bytemuck::cast_slice`
//! them straight into a GPU buffer or a persisted blob on disk.

use bytemuck::{Pod, Zeroable};

use crate::accel::aabb::Aabb;

/// A binary BVH node. If `count == 0` the node is internal: `left` is the
/// index of its left child, and the right child is always at `left + 1`
/// (sibling adjacency, Inv. 5). Otherwise the node is a leaf and
/// `[left, left + count)` indexes into the triangle-index permutation.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct Bvh2Node {
    pub aabb_min: [f32; 3],
    pub left: u32,
    pub aabb_max: [f32; 3],
    pub count: u32,
}

impl Bvh2Node {
    pub const ZERO: Self = Self {
        aabb_min: [0.0; 3],
        left: 0,
        aabb_max: [0.0; 3],
        count: 0,
    };

    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }

    pub fn right(&self) -> u32 {
        debug_assert!(!self.is_leaf());
        self.left + 1
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.aabb_min.into(), self.aabb_max.into())
    }
}

/// A 4-wide node. Unfilled slots are encoded as `child_count[i] == 0 &&
/// child_index[i] == 0`. `child_index[i]` is either the index of an
/// internal `Bvh4Node` or, when `child_count[i] > 0`, the first index into
/// the triangle permutation for that leaf slot. Slot order is unspecified —
/// the GPU traversal kernel handles any order.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct Bvh4Node {
    pub aabb_min: [f32; 3],
    pub _pad0: f32,
    pub aabb_max: [f32; 3],
    pub _pad1: f32,
    pub child_aabb_min: [[f32; 3]; 4],
    pub child_aabb_max: [[f32; 3]; 4],
    pub child_index: [u32; 4],
    pub child_count: [u32; 4],
}

impl Bvh4Node {
    pub const ZERO: Self = Self {
        aabb_min: [0.0; 3],
        _pad0: 0.0,
        aabb_max: [0.0; 3],
        _pad1: 0.0,
        child_aabb_min: [[0.0; 3]; 4],
        child_aabb_max: [[0.0; 3]; 4],
        child_index: [0; 4],
        child_count: [0; 4],
    };

    pub fn filled_slots(&self) -> usize {
        (0..4)
            .filter(|&i| self.child_count[i] != 0 || self.child_index[i] != 0)
            .count()
    }
}

/// Compressed-wide (CWBVH) 8-way node, quantized layout. Exactly 80 bytes:
/// `p`(12) + `e`(3) + `imask`(1) + `base_index_child`(4) +
/// `base_index_triangle`(4) + `meta`(8) + `qlo`(24) + `qhi`(24).
///
/// Meta encoding (resolving the Open Question in favor of the
/// self-describing convention, see DESIGN.md): for a leaf child, the low 5
/// bits are the triangle offset within this node's triangle block and the
/// high 3 bits are a unary mask `((1 << count) - 1) << 5`; for an internal
/// child, the low 5 bits are `24 + child_slot_in_parent` and the high 3
/// bits are all set. An empty slot has `meta == 0`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct Bvh8Node {
    pub p: [f32; 3],
    pub e: [u8; 3],
    pub imask: u8,
    pub base_index_child: u32,
    pub base_index_triangle: u32,
    pub meta: [u8; 8],
    pub qlo: [[u8; 8]; 3],
    pub qhi: [[u8; 8]; 3],
}

impl Bvh8Node {
    pub const ZERO: Self = Self {
        p: [0.0; 3],
        e: [0; 3],
        imask: 0,
        base_index_child: 0,
        base_index_triangle: 0,
        meta: [0; 8],
        qlo: [[0; 8]; 3],
        qhi: [[0; 8]; 3],
    };

    pub fn is_slot_internal(&self, slot: usize) -> bool {
        (self.imask >> slot) & 1 != 0
    }

    pub fn is_slot_empty(&self, slot: usize) -> bool {
        self.meta[slot] == 0
    }

    /// Dequantizes the AABB stored for `slot`.
    pub fn dequantize_child_aabb(&self, slot: usize) -> crate::accel::aabb::Aabb {
        use glam::Vec3;
        let p = Vec3::from(self.p);
        let scale = |exp: u8| f32::from_bits((exp as u32) << 23);
        let sx = scale(self.e[0]);
        let sy = scale(self.e[1]);
        let sz = scale(self.e[2]);
        let min = Vec3::new(
            p.x + self.qlo[0][slot] as f32 * sx,
            p.y + self.qlo[1][slot] as f32 * sy,
            p.z + self.qlo[2][slot] as f32 * sz,
        );
        let max = Vec3::new(
            p.x + self.qhi[0][slot] as f32 * sx,
            p.y + self.qhi[1][slot] as f32 * sy,
            p.z + self.qhi[2][slot] as f32 * sz,
        );
        crate::accel::aabb::Aabb::new(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bvh8_node_is_exactly_80_bytes() {
        assert_eq!(std::mem::size_of::<Bvh8Node>(), 80);
    }

    #[test]
    fn bvh2_right_child_follows_left() {
        let node = Bvh2Node {
            left: 4,
            count: 0,
            ..Bvh2Node::ZERO
        };
        assert_eq!(node.right(), 5);
    }
}
