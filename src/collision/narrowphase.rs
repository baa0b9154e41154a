//! Distance and contact evaluation between convex cores (points and segments).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    collision::shapes::{DistanceProxy, Shape},
    core::types::Transform,
};

const FEATURE_FACE: u32 = 2;

/// Closest points between two cores, ignoring skin radii.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreDistance {
    pub point_a: Vec2,
    pub point_b: Vec2,
    pub distance: f32,
    /// Unit vector from A toward B.
    pub normal: Vec2,
    /// Feature pair key: vertex 0, vertex 1 or face, for each side.
    pub id: u32,
}

/// Contact point in world space between two skinned cores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub normal: Vec2,
    pub point: Vec2,
    /// Signed surface distance; negative when overlapping.
    pub separation: f32,
    pub id: u32,
}

/// Persistent contact point with accumulated impulses for warm starting.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ManifoldPoint {
    pub point: Vec2,
    pub separation: f32,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub id: u32,
}

/// Narrow-phase result for a fixture pair. One point is produced per pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifold {
    pub normal: Vec2,
    pub point: Option<ManifoldPoint>,
}

impl Manifold {
    pub fn point_count(&self) -> usize {
        usize::from(self.point.is_some())
    }
}

/// Closest points between segments `p1q1` and `p2q2` (Ericson, RTCD 5.1.9).
fn closest_segment_params(p1: Vec2, q1: Vec2, p2: Vec2, q2: Vec2) -> (f32, f32) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a <= f32::EPSILON && e <= f32::EPSILON {
        return (0.0, 0.0);
    }
    if a <= f32::EPSILON {
        return (0.0, (f / e).clamp(0.0, 1.0));
    }

    let c = d1.dot(r);
    if e <= f32::EPSILON {
        return ((-c / a).clamp(0.0, 1.0), 0.0);
    }

    let b = d1.dot(d2);
    let denom = a * e - b * b;
    let mut s = if denom != 0.0 {
        ((b * f - c * e) / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut t = (b * s + f) / e;
    if t < 0.0 {
        t = 0.0;
        s = (-c / a).clamp(0.0, 1.0);
    } else if t > 1.0 {
        t = 1.0;
        s = ((b - c) / a).clamp(0.0, 1.0);
    }
    (s, t)
}

fn feature(count: usize, param: f32) -> u32 {
    if count < 2 || param <= 0.0 {
        0
    } else if param >= 1.0 {
        1
    } else {
        FEATURE_FACE
    }
}

/// Normal used when the cores touch or cross.
fn fallback_normal(a: [Vec2; 2], count_a: usize, b: [Vec2; 2], count_b: usize) -> Vec2 {
    let center_a = 0.5 * (a[0] + a[1]);
    let center_b = 0.5 * (b[0] + b[1]);
    let toward_b = center_b - center_a;

    let edge = if count_a > 1 {
        Some(a[1] - a[0])
    } else if count_b > 1 {
        Some(b[1] - b[0])
    } else {
        None
    };

    match edge {
        Some(e) => {
            let n = Vec2::new(e.y, -e.x).normalize_or_zero();
            if n.dot(toward_b) < 0.0 {
                -n
            } else {
                n
            }
        }
        None => {
            let n = toward_b.normalize_or_zero();
            if n == Vec2::ZERO {
                Vec2::X
            } else {
                n
            }
        }
    }
}

/// Distance between the cores of two proxies.
pub fn core_distance(
    proxy_a: &DistanceProxy,
    xf_a: &Transform,
    proxy_b: &DistanceProxy,
    xf_b: &Transform,
) -> CoreDistance {
    let a = proxy_a.world_vertices(xf_a);
    let b = proxy_b.world_vertices(xf_b);
    let (s, t) = closest_segment_params(a[0], a[1], b[0], b[1]);
    let point_a = a[0] + (a[1] - a[0]) * s;
    let point_b = b[0] + (b[1] - b[0]) * t;

    let d = point_b - point_a;
    let distance = d.length();
    let normal = if distance > f32::EPSILON {
        d / distance
    } else {
        fallback_normal(a, proxy_a.count, b, proxy_b.count)
    };

    CoreDistance {
        point_a,
        point_b,
        distance,
        normal,
        id: (feature(proxy_a.count, s) << 4) | feature(proxy_b.count, t),
    }
}

/// Contact geometry between two proxies at the given transforms.
pub fn contact_point(
    proxy_a: &DistanceProxy,
    xf_a: &Transform,
    proxy_b: &DistanceProxy,
    xf_b: &Transform,
) -> ContactPoint {
    let core = core_distance(proxy_a, xf_a, proxy_b, xf_b);
    let surface_a = core.point_a + core.normal * proxy_a.radius;
    let surface_b = core.point_b - core.normal * proxy_b.radius;
    ContactPoint {
        normal: core.normal,
        point: 0.5 * (surface_a + surface_b),
        separation: core.distance - proxy_a.radius - proxy_b.radius,
        id: core.id,
    }
}

/// Builds the manifold for a shape pair. Impulses start at zero.
pub fn evaluate(
    shape_a: &dyn Shape,
    xf_a: &Transform,
    shape_b: &dyn Shape,
    xf_b: &Transform,
) -> Manifold {
    let cp = contact_point(
        &shape_a.distance_proxy(),
        xf_a,
        &shape_b.distance_proxy(),
        xf_b,
    );
    Manifold {
        normal: cp.normal,
        point: (cp.separation <= 0.0).then_some(ManifoldPoint {
            point: cp.point,
            separation: cp.separation,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
            id: cp.id,
        }),
    }
}

/// Boolean overlap test used for sensors.
pub fn test_overlap(
    shape_a: &dyn Shape,
    xf_a: &Transform,
    shape_b: &dyn Shape,
    xf_b: &Transform,
) -> bool {
    let proxy_a = shape_a.distance_proxy();
    let proxy_b = shape_b.distance_proxy();
    let core = core_distance(&proxy_a, xf_a, &proxy_b, xf_b);
    core.distance - proxy_a.radius - proxy_b.radius < 10.0 * f32::EPSILON
}
