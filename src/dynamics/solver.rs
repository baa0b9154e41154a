//! Sequential-impulse contact solver working on island-local buffers.

use glam::Vec2;

use crate::{
    collision::{
        contact::ContactImpulse,
        narrowphase::{contact_point, Manifold},
        shapes::DistanceProxy,
    },
    config::{
        BAUMGARTE, LINEAR_SLOP, MAX_LINEAR_CORRECTION, TOI_BAUMGARTE, VELOCITY_THRESHOLD,
    },
    core::types::{Position, Transform, Velocity},
    utils::math::{cross_sv, cross_vv},
};

/// Parameters of one solver pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    pub dt: f32,
    pub inv_dt: f32,
    /// `dt * inv_dt0`, used to rescale warm-start impulses after a dt change.
    pub dt_ratio: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
}

impl TimeStep {
    pub fn new(dt: f32, velocity_iterations: usize, position_iterations: usize) -> Self {
        Self {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: 1.0,
            velocity_iterations,
            position_iterations,
            warm_starting: true,
        }
    }
}

/// Island state handed to joints during a solve.
pub struct SolverData<'a> {
    pub step: TimeStep,
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

/// Snapshot of a touching contact, copied out of the graph before solving.
#[derive(Debug, Clone, Copy)]
pub struct ContactConstraintDef {
    pub index_a: usize,
    pub index_b: usize,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_inertia_a: f32,
    pub inv_inertia_b: f32,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub friction: f32,
    pub restitution: f32,
    pub manifold: Manifold,
}

#[derive(Debug, Clone, Copy)]
struct ContactConstraint {
    def: ContactConstraintDef,
    active: bool,
    normal: Vec2,
    tangent: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    normal_mass: f32,
    tangent_mass: f32,
    velocity_bias: f32,
    normal_impulse: f32,
    tangent_impulse: f32,
}

fn transform_of(position: &Position, local_center: Vec2) -> Transform {
    Transform::from_center(position.c, position.a, local_center)
}

/// Solves one island's contacts by sequential impulses.
///
/// Each contact carries a single point. The contact geometry is
/// re-evaluated from the current positions at velocity init and on every
/// position iteration, so the manifold only contributes the stored impulses.
#[derive(Debug)]
pub struct ContactSolver {
    step: TimeStep,
    constraints: Vec<ContactConstraint>,
}

impl ContactSolver {
    pub fn new(step: TimeStep, defs: &[ContactConstraintDef]) -> Self {
        let constraints = defs
            .iter()
            .map(|def| {
                let (normal_impulse, tangent_impulse) = match def.manifold.point {
                    Some(point) if step.warm_starting => (
                        step.dt_ratio * point.normal_impulse,
                        step.dt_ratio * point.tangent_impulse,
                    ),
                    _ => (0.0, 0.0),
                };
                ContactConstraint {
                    def: *def,
                    active: def.manifold.point.is_some(),
                    normal: def.manifold.normal,
                    tangent: Vec2::ZERO,
                    r_a: Vec2::ZERO,
                    r_b: Vec2::ZERO,
                    normal_mass: 0.0,
                    tangent_mass: 0.0,
                    velocity_bias: 0.0,
                    normal_impulse,
                    tangent_impulse,
                }
            })
            .collect();
        Self { step, constraints }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Computes effective masses and restitution bias from the current state.
    pub fn initialize_velocity_constraints(
        &mut self,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        for vc in self.constraints.iter_mut().filter(|vc| vc.active) {
            let def = &vc.def;
            let (m_a, m_b, i_a, i_b) = (
                def.inv_mass_a,
                def.inv_mass_b,
                def.inv_inertia_a,
                def.inv_inertia_b,
            );
            let pos_a = positions[def.index_a];
            let pos_b = positions[def.index_b];
            let vel_a = velocities[def.index_a];
            let vel_b = velocities[def.index_b];

            let xf_a = transform_of(&pos_a, def.local_center_a);
            let xf_b = transform_of(&pos_b, def.local_center_b);
            let cp = contact_point(&def.proxy_a, &xf_a, &def.proxy_b, &xf_b);

            vc.normal = cp.normal;
            vc.tangent = Vec2::new(cp.normal.y, -cp.normal.x);
            vc.r_a = cp.point - pos_a.c;
            vc.r_b = cp.point - pos_b.c;

            let rn_a = cross_vv(vc.r_a, vc.normal);
            let rn_b = cross_vv(vc.r_b, vc.normal);
            let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
            vc.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

            let rt_a = cross_vv(vc.r_a, vc.tangent);
            let rt_b = cross_vv(vc.r_b, vc.tangent);
            let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
            vc.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

            let dv = vel_b.v + cross_sv(vel_b.w, vc.r_b) - vel_a.v - cross_sv(vel_a.w, vc.r_a);
            let v_rel = vc.normal.dot(dv);
            vc.velocity_bias = if v_rel < -VELOCITY_THRESHOLD {
                -def.restitution * v_rel
            } else {
                0.0
            };
        }
    }

    /// Applies the impulses carried over from the previous step.
    pub fn warm_start(&self, velocities: &mut [Velocity]) {
        for vc in self.constraints.iter().filter(|vc| vc.active) {
            let p = vc.normal_impulse * vc.normal + vc.tangent_impulse * vc.tangent;
            apply_impulse(&vc.def, vc.r_a, vc.r_b, p, velocities);
        }
    }

    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in self.constraints.iter_mut().filter(|vc| vc.active) {
            let def = vc.def;

            // Friction first: its bound depends on the normal impulse.
            let dv = relative_velocity(&def, vc.r_a, vc.r_b, velocities);
            let vt = dv.dot(vc.tangent);
            let lambda = vc.tangent_mass * -vt;
            let max_friction = def.friction * vc.normal_impulse;
            let new_impulse = (vc.tangent_impulse + lambda).clamp(-max_friction, max_friction);
            let lambda = new_impulse - vc.tangent_impulse;
            vc.tangent_impulse = new_impulse;
            apply_impulse(&def, vc.r_a, vc.r_b, lambda * vc.tangent, velocities);

            let dv = relative_velocity(&def, vc.r_a, vc.r_b, velocities);
            let vn = dv.dot(vc.normal);
            let lambda = -vc.normal_mass * (vn - vc.velocity_bias);
            let new_impulse = (vc.normal_impulse + lambda).max(0.0);
            let lambda = new_impulse - vc.normal_impulse;
            vc.normal_impulse = new_impulse;
            apply_impulse(&def, vc.r_a, vc.r_b, lambda * vc.normal, velocities);
        }
    }

    /// Final accumulated impulses, in constraint order.
    pub fn impulses(&self) -> impl Iterator<Item = ContactImpulse> + '_ {
        self.constraints.iter().map(|vc| ContactImpulse {
            normal_impulse: vc.normal_impulse,
            tangent_impulse: vc.tangent_impulse,
        })
    }

    /// Writes the accumulated impulses into the manifolds for warm starting.
    pub fn store_impulses(&self, manifolds: &mut [Manifold]) {
        for (vc, manifold) in self.constraints.iter().zip(manifolds.iter_mut()) {
            if let Some(point) = manifold.point.as_mut() {
                point.normal_impulse = vc.normal_impulse;
                point.tangent_impulse = vc.tangent_impulse;
            }
        }
    }

    /// One Baumgarte pass over the positions. Returns true once the largest
    /// penetration is within three slops.
    pub fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        let min_separation = self.position_pass(positions, BAUMGARTE, |def| {
            (def.inv_mass_a, def.inv_inertia_a, def.inv_mass_b, def.inv_inertia_b)
        });
        min_separation >= -3.0 * LINEAR_SLOP
    }

    /// Position pass of a TOI sub-step. Only the two impact bodies move.
    pub fn solve_toi_position_constraints(
        &self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let min_separation = self.position_pass(positions, TOI_BAUMGARTE, |def| {
            let moves = |index| index == toi_index_a || index == toi_index_b;
            let (m_a, i_a) = if moves(def.index_a) {
                (def.inv_mass_a, def.inv_inertia_a)
            } else {
                (0.0, 0.0)
            };
            let (m_b, i_b) = if moves(def.index_b) {
                (def.inv_mass_b, def.inv_inertia_b)
            } else {
                (0.0, 0.0)
            };
            (m_a, i_a, m_b, i_b)
        });
        min_separation >= -1.5 * LINEAR_SLOP
    }

    fn position_pass<F>(&self, positions: &mut [Position], baumgarte: f32, masses: F) -> f32
    where
        F: Fn(&ContactConstraintDef) -> (f32, f32, f32, f32),
    {
        let mut min_separation = 0.0_f32;
        for pc in self.constraints.iter().filter(|pc| pc.active) {
            let def = &pc.def;
            let (m_a, i_a, m_b, i_b) = masses(def);
            let pos_a = positions[def.index_a];
            let pos_b = positions[def.index_b];

            let xf_a = transform_of(&pos_a, def.local_center_a);
            let xf_b = transform_of(&pos_b, def.local_center_b);
            let cp = contact_point(&def.proxy_a, &xf_a, &def.proxy_b, &xf_b);

            let r_a = cp.point - pos_a.c;
            let r_b = cp.point - pos_b.c;
            min_separation = min_separation.min(cp.separation);

            let c = (baumgarte * (cp.separation + LINEAR_SLOP)).clamp(-MAX_LINEAR_CORRECTION, 0.0);
            let rn_a = cross_vv(r_a, cp.normal);
            let rn_b = cross_vv(r_b, cp.normal);
            let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
            let impulse = if k > 0.0 { -c / k } else { 0.0 };
            let p = impulse * cp.normal;

            let a = &mut positions[def.index_a];
            a.c -= m_a * p;
            a.a -= i_a * cross_vv(r_a, p);
            let b = &mut positions[def.index_b];
            b.c += m_b * p;
            b.a += i_b * cross_vv(r_b, p);
        }
        min_separation
    }

    pub fn step(&self) -> &TimeStep {
        &self.step
    }
}

fn relative_velocity(def: &ContactConstraintDef, r_a: Vec2, r_b: Vec2, velocities: &[Velocity]) -> Vec2 {
    let a = velocities[def.index_a];
    let b = velocities[def.index_b];
    b.v + cross_sv(b.w, r_b) - a.v - cross_sv(a.w, r_a)
}

fn apply_impulse(def: &ContactConstraintDef, r_a: Vec2, r_b: Vec2, p: Vec2, velocities: &mut [Velocity]) {
    let a = &mut velocities[def.index_a];
    a.v -= def.inv_mass_a * p;
    a.w -= def.inv_inertia_a * cross_vv(r_a, p);
    let b = &mut velocities[def.index_b];
    b.v += def.inv_mass_b * p;
    b.w += def.inv_inertia_b * cross_vv(r_b, p);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::narrowphase::ManifoldPoint;
    use approx::assert_relative_eq;

    fn head_on(restitution: f32, stored: f32) -> (ContactConstraintDef, Vec<Position>, Vec<Velocity>) {
        let def = ContactConstraintDef {
            index_a: 0,
            index_b: 1,
            inv_mass_a: 1.0,
            inv_mass_b: 1.0,
            inv_inertia_a: 0.0,
            inv_inertia_b: 0.0,
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            proxy_a: DistanceProxy::point(Vec2::ZERO, 0.5),
            proxy_b: DistanceProxy::point(Vec2::ZERO, 0.5),
            friction: 0.5,
            restitution,
            manifold: Manifold {
                normal: Vec2::X,
                point: Some(ManifoldPoint {
                    normal_impulse: stored,
                    ..ManifoldPoint::default()
                }),
            },
        };
        let positions = vec![
            Position { c: Vec2::new(-0.49, 0.0), a: 0.0 },
            Position { c: Vec2::new(0.49, 0.0), a: 0.0 },
        ];
        let velocities = vec![
            Velocity { v: Vec2::new(2.0, 0.0), w: 0.0 },
            Velocity { v: Vec2::new(-2.0, 0.0), w: 0.0 },
        ];
        (def, positions, velocities)
    }

    #[test]
    fn inelastic_contact_stops_approach() {
        let (def, positions, mut velocities) = head_on(0.0, 0.0);
        let mut solver = ContactSolver::new(TimeStep::new(1.0 / 60.0, 8, 3), &[def]);
        solver.initialize_velocity_constraints(&positions, &velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }
        assert_relative_eq!(velocities[0].v.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(velocities[1].v.x, 0.0, epsilon = 1e-5);
        let impulse = solver.impulses().next().unwrap();
        assert_relative_eq!(impulse.normal_impulse, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn restitution_reverses_approach() {
        let (def, positions, mut velocities) = head_on(1.0, 0.0);
        let mut solver = ContactSolver::new(TimeStep::new(1.0 / 60.0, 8, 3), &[def]);
        solver.initialize_velocity_constraints(&positions, &velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }
        assert_relative_eq!(velocities[0].v.x, -2.0, epsilon = 1e-4);
        assert_relative_eq!(velocities[1].v.x, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn warm_start_scales_by_dt_ratio_or_resets() {
        let (def, _, _) = head_on(0.0, 3.0);
        let mut step = TimeStep::new(1.0 / 60.0, 8, 3);
        step.dt_ratio = 0.5;
        let solver = ContactSolver::new(step, &[def]);
        assert_relative_eq!(solver.impulses().next().unwrap().normal_impulse, 1.5);

        step.warm_starting = false;
        let solver = ContactSolver::new(step, &[def]);
        assert_eq!(solver.impulses().next().unwrap().normal_impulse, 0.0);
    }

    #[test]
    fn position_pass_pushes_apart() {
        let (def, mut positions, _) = head_on(0.0, 0.0);
        let solver = ContactSolver::new(TimeStep::new(1.0 / 60.0, 8, 3), &[def]);
        let before = positions[1].c.x - positions[0].c.x;
        for _ in 0..10 {
            solver.solve_position_constraints(&mut positions);
        }
        assert!(positions[1].c.x - positions[0].c.x > before);
    }

    #[test]
    fn toi_pass_moves_only_impact_bodies() {
        let (def, mut positions, _) = head_on(0.0, 0.0);
        let solver = ContactSolver::new(TimeStep::new(1.0 / 60.0, 8, 3), &[def]);
        let anchored = positions[0].c;
        solver.solve_toi_position_constraints(&mut positions, 1, usize::MAX);
        assert_eq!(positions[0].c, anchored);
        assert!(positions[1].c.x > 0.49);
    }
}
