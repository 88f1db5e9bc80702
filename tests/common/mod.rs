// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Shared triangle-soup generators for the property and scenario tests.

use bvh_accel::Triangle;
use glam::Vec3;

/// Deterministic, non-degenerate triangle soup: `n` small triangles spread
/// out along a spiral so bounding boxes overlap somewhat without all being
/// collinear (a fully collinear soup never exercises an axis split on y/z).
pub fn spiral_soup(n: usize) -> Vec<Triangle> {
    (0..n)
        .map(|i| {
            let t = i as f32;
            let angle = t * 0.37;
            let radius = 1.0 + t * 0.05;
            let cx = angle.cos() * radius;
            let cy = angle.sin() * radius;
            let cz = (t * 0.11).sin() * 2.0;
            Triangle::new(
                Vec3::new(cx, cy, cz),
                Vec3::new(cx + 0.3, cy, cz),
                Vec3::new(cx, cy + 0.3, cz + 0.1),
            )
        })
        .collect()
}

/// A single long, thin triangle spanning `[-half, half]` on `axis`, used to
/// force spatial splits.
pub fn long_sliver(axis: usize, half: f32) -> Triangle {
    let mut a = Vec3::ZERO;
    let mut b = Vec3::ZERO;
    let mut c = Vec3::ZERO;
    set_axis(&mut a, axis, -half);
    set_axis(&mut b, axis, half);
    set_axis(&mut c, axis, -half);
    let other = (axis + 1) % 3;
    set_axis(&mut c, other, 1.0);
    Triangle::new(a, b, c)
}

fn set_axis(v: &mut Vec3, axis: usize, value: f32) {
    match axis {
        0 => v.x = value,
        1 => v.y = value,
        _ => v.z = value,
    }
}
