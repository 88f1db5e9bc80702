// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Axis-aligned bounding box algebra and the triangle-clip primitive used by
//! spatial splits.

use glam::Vec3;

use crate::accel::triangle::Triangle;

/// Axis-aligned bounding box: `min <= max` componentwise, or the `EMPTY`
/// sentinel (`+inf`/`-inf`) when it encloses nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn expand(self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// Intersection of two AABBs. May come out invalid (`min > max` on some
    /// axis) if the boxes don't overlap; check [`Aabb::is_valid`] before
    /// trusting its surface area.
    pub fn intersect(self, other: Self) -> Self {
        Self {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    /// Surface area used for the SAH cost metric. Zero for an empty or
    /// degenerate (negative-extent) box.
    pub fn surface_area(&self) -> f32 {
        let d = self.max - self.min;
        if d.x < 0.0 || d.y < 0.0 || d.z < 0.0 {
            return 0.0;
        }
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns the index of the longest axis (0=x, 1=y, 2=z).
    pub fn longest_axis(&self) -> usize {
        let d = self.extent();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// `true` when `min <= max` on every axis.
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// `true` for the canonical empty box (as opposed to merely degenerate).
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// `true` when `self` contains `other` on every axis, within `eps` —
    /// used to check CWBVH quantization conservativeness (Inv. 4).
    pub fn contains_aabb(&self, other: &Self, eps: f32) -> bool {
        self.min.x <= other.min.x + eps
            && self.min.y <= other.min.y + eps
            && self.min.z <= other.min.z + eps
            && self.max.x >= other.max.x - eps
            && self.max.y >= other.max.y - eps
            && self.max.z >= other.max.z - eps
    }
}

fn axis_component(v: Vec3, axis: usize) -> f32 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

/// Clips a triangle against the slab `lo <= axis <= hi` and returns the AABB
/// of the resulting (possibly degenerate) polygon. Returns `None` only when
/// the triangle lies entirely outside the slab. Edges parallel to either
/// plane collapse to a zero-thickness sliver on that axis but the returned
/// box is still valid (`min <= max`) and lies within `[lo, hi]` on `axis`.
pub fn clip_triangle_to_slab(tri: &Triangle, axis: usize, lo: f32, hi: f32) -> Option<Aabb> {
    let mut poly: Vec<Vec3> = vec![tri.v0, tri.v1, tri.v2];
    poly = clip_half_plane(&poly, axis, lo, true);
    if poly.is_empty() {
        return None;
    }
    poly = clip_half_plane(&poly, axis, hi, false);
    if poly.is_empty() {
        return None;
    }

    let mut aabb = Aabb::EMPTY;
    for p in &poly {
        aabb = aabb.expand(*p);
    }
    // The polygon clip is exact up to floating point error; re-clamp the
    // slab axis so callers can rely on the result staying inside [lo, hi].
    let mut min = aabb.min;
    let mut max = aabb.max;
    match axis {
        0 => {
            min.x = min.x.max(lo);
            max.x = max.x.min(hi);
        }
        1 => {
            min.y = min.y.max(lo);
            max.y = max.y.min(hi);
        }
        _ => {
            min.z = min.z.max(lo);
            max.z = max.z.min(hi);
        }
    }
    Some(Aabb::new(min, max))
}

/// Clips a convex polygon against a single half-plane: `component(axis) >=
/// bound` when `is_lower`, `component(axis) <= bound` otherwise.
fn clip_half_plane(poly: &[Vec3], axis: usize, bound: f32, is_lower: bool) -> Vec<Vec3> {
    if poly.is_empty() {
        return Vec::new();
    }

    let inside = |p: Vec3| {
        let c = axis_component(p, axis);
        if is_lower { c >= bound } else { c <= bound }
    };

    let mut out = Vec::with_capacity(poly.len() + 1);
    for i in 0..poly.len() {
        let curr = poly[i];
        let next = poly[(i + 1) % poly.len()];
        let curr_in = inside(curr);
        let next_in = inside(next);

        if curr_in {
            out.push(curr);
        }
        if curr_in != next_in {
            let c0 = axis_component(curr, axis);
            let c1 = axis_component(next, axis);
            let denom = c1 - c0;
            let t = if denom.abs() < 1e-12 {
                0.0
            } else {
                (bound - c0) / denom
            };
            out.push(curr.lerp(next, t.clamp(0.0, 1.0)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_grows_to_cover_both_boxes() {
        let a = Aabb::new(Vec3::ZERO, Vec3::splat(1.0));
        let b = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        let u = a.union(b);
        assert_eq!(u.min, Vec3::ZERO);
        assert_eq!(u.max, Vec3::splat(3.0));
    }

    #[test]
    fn surface_area_of_unit_cube_is_six() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!((a.surface_area() - 6.0).abs() < 1e-6);
    }

    #[test]
    fn empty_has_zero_surface_area() {
        assert_eq!(Aabb::EMPTY.surface_area(), 0.0);
    }

    #[test]
    fn clip_triangle_fully_inside_slab_is_unchanged() {
        let tri = Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let clipped = clip_triangle_to_slab(&tri, 0, -1.0, 2.0).unwrap();
        let exact = tri.aabb();
        assert!((clipped.min - exact.min).length() < 1e-6);
        assert!((clipped.max - exact.max).length() < 1e-6);
    }

    #[test]
    fn clip_triangle_straddling_plane_stays_inside_each_half() {
        let tri = Triangle::new(
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let left = clip_triangle_to_slab(&tri, 0, -2.0, 0.0).unwrap();
        let right = clip_triangle_to_slab(&tri, 0, 0.0, 2.0).unwrap();
        assert!(left.max.x <= 0.0 + 1e-6);
        assert!(right.min.x >= 0.0 - 1e-6);
        assert!(left.is_valid());
        assert!(right.is_valid());
    }

    #[test]
    fn clip_triangle_outside_slab_returns_none() {
        let tri = Triangle::new(
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(6.0, 0.0, 0.0),
            Vec3::new(5.0, 1.0, 0.0),
        );
        assert!(clip_triangle_to_slab(&tri, 0, -1.0, 1.0).is_none());
    }

    #[test]
    fn clip_triangle_with_edge_parallel_to_plane_is_valid() {
        // Edge v0-v1 lies exactly on the split plane x=0.
        let tri = Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let left = clip_triangle_to_slab(&tri, 0, -1.0, 0.0).unwrap();
        assert!(left.is_valid());
        assert!(left.max.x <= 1e-6);
    }
}
