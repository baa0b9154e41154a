use std::fmt::Debug;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    collision::queries::{RayCastInput, RayCastOutput},
    config::POLYGON_RADIUS,
    core::types::{MassData, Transform},
    utils::debug_draw::{Color, DebugDraw},
};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn is_valid(&self) -> bool {
        let d = self.max - self.min;
        d.x >= 0.0 && d.y >= 0.0 && self.min.is_finite() && self.max.is_finite()
    }

    pub fn center(&self) -> Vec2 {
        0.5 * (self.min + self.max)
    }

    pub fn extents(&self) -> Vec2 {
        0.5 * (self.max - self.min)
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn extended(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(other.min.x > self.max.x
            || other.min.y > self.max.y
            || self.min.x > other.max.x
            || self.min.y > other.max.y)
    }

    /// Slab test. Returns the entry fraction along the ray.
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<f32> {
        let d = input.p2 - input.p1;
        let mut t_min = f32::MIN;
        let mut t_max = f32::MAX;

        for axis in 0..2 {
            let origin = input.p1[axis];
            let dir = d[axis];
            if dir.abs() < f32::EPSILON {
                if origin < self.min[axis] || self.max[axis] < origin {
                    return None;
                }
            } else {
                let inv_d = 1.0 / dir;
                let mut t1 = (self.min[axis] - origin) * inv_d;
                let mut t2 = (self.max[axis] - origin) * inv_d;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }

        if t_max < 0.0 || input.max_fraction < t_min {
            return None;
        }
        Some(t_min.max(0.0))
    }
}

/// Convex core of a shape: a point or a segment, inflated by `radius`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceProxy {
    pub vertices: [Vec2; 2],
    pub count: usize,
    pub radius: f32,
}

impl DistanceProxy {
    pub fn point(p: Vec2, radius: f32) -> Self {
        Self {
            vertices: [p, p],
            count: 1,
            radius,
        }
    }

    pub fn segment(v1: Vec2, v2: Vec2, radius: f32) -> Self {
        Self {
            vertices: [v1, v2],
            count: 2,
            radius,
        }
    }

    /// Core vertices mapped through `xf`. A point core repeats its vertex.
    pub fn world_vertices(&self, xf: &Transform) -> [Vec2; 2] {
        let v1 = xf.apply(self.vertices[0]);
        let v2 = if self.count > 1 {
            xf.apply(self.vertices[1])
        } else {
            v1
        };
        [v1, v2]
    }

    /// Largest distance from `center` to a core vertex.
    pub fn bound_radius(&self, center: Vec2) -> f32 {
        self.vertices[..self.count]
            .iter()
            .map(|v| v.distance(center))
            .fold(0.0, f32::max)
    }
}

/// Discriminant for shape-specific handling outside the trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Circle,
    Segment,
}

/// Geometry attached to a fixture.
pub trait Shape: Debug + Send + Sync {
    fn kind(&self) -> ShapeKind;

    /// Skin radius around the convex core.
    fn radius(&self) -> f32;

    fn compute_aabb(&self, xf: &Transform) -> Aabb;

    fn compute_mass(&self, density: f32) -> MassData;

    fn distance_proxy(&self) -> DistanceProxy;

    fn test_point(&self, xf: &Transform, point: Vec2) -> bool;

    fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput>;

    fn draw(&self, xf: &Transform, color: Color, draw: &mut dyn DebugDraw);
}

/// Solid disc.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    pub fn new(radius: f32) -> Self {
        Self {
            center: Vec2::ZERO,
            radius,
        }
    }

    pub fn with_center(mut self, center: Vec2) -> Self {
        self.center = center;
        self
    }
}

impl Shape for Circle {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Circle
    }

    fn radius(&self) -> f32 {
        self.radius
    }

    fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let p = xf.apply(self.center);
        Aabb::new(p - Vec2::splat(self.radius), p + Vec2::splat(self.radius))
    }

    fn compute_mass(&self, density: f32) -> MassData {
        let mass = density * std::f32::consts::PI * self.radius * self.radius;
        MassData {
            mass,
            center: self.center,
            inertia: mass * (0.5 * self.radius * self.radius + self.center.length_squared()),
        }
    }

    fn distance_proxy(&self) -> DistanceProxy {
        DistanceProxy::point(self.center, self.radius)
    }

    fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        let center = xf.apply(self.center);
        (point - center).length_squared() <= self.radius * self.radius
    }

    fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let position = xf.apply(self.center);
        let s = input.p1 - position;
        let b = s.length_squared() - self.radius * self.radius;

        // Solve |s + t * r| = radius for the smallest t.
        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.length_squared();
        let sigma = c * c - rr * b;
        if sigma < 0.0 || rr < f32::EPSILON {
            return None;
        }

        let a = -(c + sigma.sqrt());
        if 0.0 <= a && a <= input.max_fraction * rr {
            let fraction = a / rr;
            Some(RayCastOutput {
                normal: (s + r * fraction).normalize_or_zero(),
                fraction,
            })
        } else {
            None
        }
    }

    fn draw(&self, xf: &Transform, color: Color, draw: &mut dyn DebugDraw) {
        draw.draw_solid_circle(xf.apply(self.center), self.radius, xf.q.x_axis(), color);
    }
}

/// Two-sided line segment with a thin skin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub v1: Vec2,
    pub v2: Vec2,
}

impl Segment {
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        Self { v1, v2 }
    }
}

impl Shape for Segment {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Segment
    }

    fn radius(&self) -> f32 {
        POLYGON_RADIUS
    }

    fn compute_aabb(&self, xf: &Transform) -> Aabb {
        Aabb::from_points(xf.apply(self.v1), xf.apply(self.v2)).extended(POLYGON_RADIUS)
    }

    fn compute_mass(&self, _density: f32) -> MassData {
        MassData {
            mass: 0.0,
            center: 0.5 * (self.v1 + self.v2),
            inertia: 0.0,
        }
    }

    fn distance_proxy(&self) -> DistanceProxy {
        DistanceProxy::segment(self.v1, self.v2, POLYGON_RADIUS)
    }

    fn test_point(&self, _xf: &Transform, _point: Vec2) -> bool {
        false
    }

    fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // Work in the segment's frame.
        let p1 = xf.apply_inverse(input.p1);
        let p2 = xf.apply_inverse(input.p2);
        let d = p2 - p1;

        let e = self.v2 - self.v1;
        let normal = Vec2::new(e.y, -e.x).normalize_or_zero();

        let numerator = normal.dot(self.v1 - p1);
        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + d * t;
        let rr = e.length_squared();
        if rr == 0.0 {
            return None;
        }

        let s = (q - self.v1).dot(e) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let local_normal = if numerator > 0.0 { -normal } else { normal };
        Some(RayCastOutput {
            normal: xf.q.apply(local_normal),
            fraction: t,
        })
    }

    fn draw(&self, xf: &Transform, color: Color, draw: &mut dyn DebugDraw) {
        draw.draw_segment(xf.apply(self.v1), xf.apply(self.v2), color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn circle_mass_about_offset_center() {
        let circle = Circle::new(0.5).with_center(Vec2::new(1.0, 0.0));
        let md = circle.compute_mass(2.0);
        let mass = 2.0 * std::f32::consts::PI * 0.25;
        assert_relative_eq!(md.mass, mass);
        assert_relative_eq!(md.inertia, mass * (0.125 + 1.0));
    }

    #[test]
    fn circle_ray_cast_hits_front_face() {
        let circle = Circle::new(1.0);
        let xf = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        let input = RayCastInput::new(Vec2::ZERO, Vec2::new(10.0, 0.0));
        let hit = circle.ray_cast(&input, &xf).expect("ray should hit");
        assert_relative_eq!(hit.fraction, 0.4);
        assert_relative_eq!(hit.normal.x, -1.0);
    }

    #[test]
    fn segment_ray_cast_is_two_sided() {
        let segment = Segment::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let xf = Transform::default();
        let down = RayCastInput::new(Vec2::new(0.0, 2.0), Vec2::new(0.0, -2.0));
        let up = RayCastInput::new(Vec2::new(0.0, -2.0), Vec2::new(0.0, 2.0));
        let hit_down = segment.ray_cast(&down, &xf).unwrap();
        let hit_up = segment.ray_cast(&up, &xf).unwrap();
        assert_relative_eq!(hit_down.fraction, 0.5);
        assert_relative_eq!(hit_down.normal.y, 1.0);
        assert_relative_eq!(hit_up.normal.y, -1.0);

        let miss = RayCastInput::new(Vec2::new(3.0, 2.0), Vec2::new(3.0, -2.0));
        assert!(segment.ray_cast(&miss, &xf).is_none());
    }

    #[test]
    fn aabb_slab_test_respects_max_fraction() {
        let aabb = Aabb::new(Vec2::new(4.0, -1.0), Vec2::new(6.0, 1.0));
        let mut input = RayCastInput::new(Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert_relative_eq!(aabb.ray_cast(&input).unwrap(), 0.4);
        input.max_fraction = 0.3;
        assert!(aabb.ray_cast(&input).is_none());
        assert!(aabb.overlaps(&aabb.extended(1.0)));
        assert!(aabb.extended(1.0).contains(&aabb));
    }
}
