//! Additional planar math helpers layered on top of `glam`.

use glam::{Mat2, Vec2};

/// 2D cross product of two vectors (the z component of the 3D cross).
#[inline]
pub fn cross_vv(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a vector and a scalar: `v x s`.
#[inline]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Cross product of a scalar and a vector: `s x v`.
#[inline]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Inverse of a 2x2 matrix, or zero when it is singular.
pub fn inverse_or_zero(m: Mat2) -> Mat2 {
    let det = m.determinant();
    if det.abs() > f32::EPSILON {
        m.inverse()
    } else {
        Mat2::ZERO
    }
}
