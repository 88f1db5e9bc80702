// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Input triangle geometry and the primitive reference the partition kernel
//! and builders operate on.

use glam::Vec3;

use crate::accel::aabb::Aabb;

/// A triangle in object space. The public build entry point takes a slice
/// of these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
}

impl Triangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// The triangle's exact bounding box. A zero-area triangle (collinear or
    /// repeated vertices) still produces a valid, possibly flat, AABB — see
    /// `DegenerateTriangle` in the error taxonomy.
    pub fn aabb(&self) -> Aabb {
        Aabb::from_point(self.v0).expand(self.v1).expand(self.v2)
    }

    pub fn is_degenerate(&self) -> bool {
        self.aabb().surface_area() <= 0.0
    }
}

/// `(triangle_id, aabb)`. For the SAH builder the aabb always equals the
/// triangle's own AABB; for SBVH it may be a clipped sub-box produced by a
/// spatial split. Multiple refs may share a `triangle_id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveRef {
    pub triangle_id: u32,
    pub aabb: Aabb,
}

impl PrimitiveRef {
    pub fn new(triangle_id: u32, aabb: Aabb) -> Self {
        Self { triangle_id, aabb }
    }

    pub fn from_triangle(triangle_id: u32, triangles: &[Triangle]) -> Self {
        Self {
            triangle_id,
            aabb: triangles[triangle_id as usize].aabb(),
        }
    }
}
