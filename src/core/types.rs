use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Rotation stored as sine/cosine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rot {
    pub s: f32,
    pub c: f32,
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot {
    pub const IDENTITY: Self = Self { s: 0.0, c: 1.0 };

    pub fn new(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Rotates a vector.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotates a vector.
    #[inline]
    pub fn apply_inverse(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }
}

/// Position and orientation of a body frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub fn new(p: Vec2, angle: f32) -> Self {
        Self {
            p,
            q: Rot::new(angle),
        }
    }

    /// Maps a local point to world space.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.apply(v) + self.p
    }

    /// Maps a world point to local space.
    #[inline]
    pub fn apply_inverse(&self, v: Vec2) -> Vec2 {
        self.q.apply_inverse(v - self.p)
    }

    /// Frame whose center of mass sits at `center` with the given angle.
    pub fn from_center(center: Vec2, angle: f32, local_center: Vec2) -> Self {
        let q = Rot::new(angle);
        Self {
            p: center - q.apply(local_center),
            q,
        }
    }
}

/// Motion of a body over one step, used for continuous collision.
///
/// The center of mass moves linearly from `c0` to `c` and the angle from
/// `a0` to `a`. `alpha0` is the fraction of the step already consumed by
/// earlier time-of-impact events.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sweep {
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c: Vec2,
    pub a0: f32,
    pub a: f32,
    pub alpha0: f32,
}

impl Sweep {
    /// Interpolated transform at `beta` in `[0, 1]` of the remaining sweep.
    pub fn transform_at(&self, beta: f32) -> Transform {
        let c = self.c0 * (1.0 - beta) + self.c * beta;
        let a = (1.0 - beta) * self.a0 + beta * self.a;
        Transform::from_center(c, a, self.local_center)
    }

    /// Moves the start of the sweep forward to step fraction `alpha`.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0, "sweep already fully consumed");
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += (self.c - self.c0) * beta;
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Keeps the angles bounded without changing the sweep.
    pub fn normalize(&mut self) {
        let two_pi = std::f32::consts::TAU;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

/// Island-local body pose used by the solvers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Position {
    pub c: Vec2,
    pub a: f32,
}

/// Island-local body velocity used by the solvers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Velocity {
    pub v: Vec2,
    pub w: f32,
}

/// Mass, center of mass and rotational inertia about the shape origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MassData {
    pub mass: f32,
    pub center: Vec2,
    pub inertia: f32,
}

/// Friction mixing rule: geometric mean, so a frictionless side wins.
pub fn mix_friction(friction_a: f32, friction_b: f32) -> f32 {
    (friction_a * friction_b).sqrt()
}

/// Restitution mixing rule: the bouncier side wins.
pub fn mix_restitution(restitution_a: f32, restitution_b: f32) -> f32 {
    restitution_a.max(restitution_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn transform_round_trips_points() {
        let xf = Transform::new(Vec2::new(1.0, 2.0), 0.7);
        let p = Vec2::new(-3.0, 0.5);
        let back = xf.apply_inverse(xf.apply(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
    }

    #[test]
    fn sweep_advance_keeps_end_pose() {
        let mut sweep = Sweep {
            c0: Vec2::ZERO,
            c: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a: 1.0,
            ..Sweep::default()
        };
        sweep.advance(0.5);
        assert_relative_eq!(sweep.c0.x, 5.0);
        assert_relative_eq!(sweep.a0, 0.5);
        assert_relative_eq!(sweep.alpha0, 0.5);

        // Half of the remaining interval is three quarters of the step.
        sweep.advance(0.75);
        assert_relative_eq!(sweep.c0.x, 7.5);
        assert_relative_eq!(sweep.c.x, 10.0);
        let xf = sweep.transform_at(1.0);
        assert_relative_eq!(xf.p.x, 10.0);
    }

    #[test]
    fn normalize_preserves_angular_travel() {
        let mut sweep = Sweep {
            a0: 7.0,
            a: 7.5,
            ..Sweep::default()
        };
        sweep.normalize();
        assert!(sweep.a0 >= 0.0 && sweep.a0 < std::f32::consts::TAU);
        assert_relative_eq!(sweep.a - sweep.a0, 0.5, epsilon = 1e-5);
    }
}
