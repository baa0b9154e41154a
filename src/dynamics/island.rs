//! Island discovery and the per-island solve.

use std::collections::HashMap;
use std::ops::Range;

use glam::Vec2;

use crate::{
    collision::{
        contact::{ContactFlags, ContactImpulse},
        narrowphase::Manifold,
    },
    config::{
        ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, MAX_ROTATION, MAX_TRANSLATION,
        TIME_TO_SLEEP,
    },
    core::{
        body::{Body, BodyType},
        constraints::{ConstraintBody, Joint},
        graph::{BodyId, ContactId, InteractionGraph, JointId},
        types::{Position, Sweep, Velocity},
    },
    dynamics::solver::{ContactConstraintDef, ContactSolver, SolverData, TimeStep},
    utils::profiling::{ScopedTimer, SolverTimings},
};

/// Slices of the builder's flat buffers belonging to one island.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandRange {
    pub bodies: Range<usize>,
    pub contacts: Range<usize>,
    pub joints: Range<usize>,
}

/// Partitions awake bodies into islands connected by touching contacts and
/// joints.
///
/// Buffers are kept between steps so discovery does not allocate once the
/// world has warmed up.
#[derive(Debug, Default)]
pub struct IslandBuilder {
    bodies: Vec<BodyId>,
    contacts: Vec<ContactId>,
    joints: Vec<JointId>,
    ranges: Vec<IslandRange>,
    stack: Vec<BodyId>,
}

impl IslandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn islands(&self) -> &[IslandRange] {
        &self.ranges
    }

    pub fn bodies(&self, range: &IslandRange) -> &[BodyId] {
        &self.bodies[range.bodies.clone()]
    }

    pub fn contacts(&self, range: &IslandRange) -> &[ContactId] {
        &self.contacts[range.contacts.clone()]
    }

    pub fn joints(&self, range: &IslandRange) -> &[JointId] {
        &self.joints[range.joints.clone()]
    }

    /// Discovers every island reachable from an awake, active, non-static
    /// seed. Visited bodies are woken.
    ///
    /// Static bodies end each island with their flag cleared so they can join
    /// the next one; they never propagate the search. Non-static bodies keep
    /// their island flag, which marks them as moved for the fixture sync.
    pub fn build(&mut self, graph: &mut InteractionGraph) -> usize {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
        self.ranges.clear();
        self.stack.clear();

        for (_, body) in graph.bodies.iter_mut() {
            body.island_flag = false;
        }
        for (_, contact) in graph.contacts.iter_mut() {
            contact.flags.remove(ContactFlags::ISLAND);
        }
        for (_, joint) in graph.joints.iter_mut() {
            joint.island_flag = false;
        }

        for seed in graph.body_list.ids(&graph.bodies) {
            let Some(body) = graph.bodies.get_mut(seed) else {
                continue;
            };
            if body.island_flag || !body.awake || !body.active || body.is_static() {
                continue;
            }
            body.island_flag = true;
            self.stack.push(seed);

            let body_start = self.bodies.len();
            let contact_start = self.contacts.len();
            let joint_start = self.joints.len();

            while let Some(id) = self.stack.pop() {
                self.visit(graph, id, body_start);
            }

            for &id in &self.bodies[body_start..] {
                if let Some(body) = graph.bodies.get_mut(id) {
                    if body.is_static() {
                        body.island_flag = false;
                    }
                }
            }

            self.ranges.push(IslandRange {
                bodies: body_start..self.bodies.len(),
                contacts: contact_start..self.contacts.len(),
                joints: joint_start..self.joints.len(),
            });
        }

        log::trace!(
            "built {} islands over {} bodies",
            self.ranges.len(),
            self.bodies.len()
        );
        self.ranges.len()
    }

    fn visit(&mut self, graph: &mut InteractionGraph, id: BodyId, body_start: usize) {
        let Some(body) = graph.bodies.get_mut(id) else {
            return;
        };
        body.island_index = self.bodies.len() - body_start;
        self.bodies.push(id);
        body.awake = true;

        if body.is_static() {
            return;
        }

        let contact_edges = body.contact_edges.clone();
        let joint_edges = body.joint_edges.clone();

        for edge in contact_edges.iter().rev() {
            let Some(contact) = graph.contacts.get(edge.contact) else {
                continue;
            };
            if contact.flags.contains(ContactFlags::ISLAND)
                || !contact.is_enabled()
                || !contact.is_touching()
                || graph.involves_sensor(contact)
            {
                continue;
            }
            if let Some(contact) = graph.contacts.get_mut(edge.contact) {
                contact.flags.insert(ContactFlags::ISLAND);
            }
            self.contacts.push(edge.contact);
            self.push_body(graph, edge.other);
        }

        for edge in joint_edges.iter().rev() {
            let Some(joint) = graph.joints.get(edge.joint) else {
                continue;
            };
            if joint.island_flag {
                continue;
            }
            let other_active = graph.bodies.get(edge.other).is_some_and(|b| b.active);
            if !other_active {
                continue;
            }
            if let Some(joint) = graph.joints.get_mut(edge.joint) {
                joint.island_flag = true;
            }
            self.joints.push(edge.joint);
            self.push_body(graph, edge.other);
        }
    }

    fn push_body(&mut self, graph: &mut InteractionGraph, id: BodyId) {
        if let Some(other) = graph.bodies.get_mut(id) {
            if !other.island_flag {
                other.island_flag = true;
                self.stack.push(id);
            }
        }
    }
}

/// Island-local copy of the body state the solver reads and writes.
#[derive(Debug, Clone, Copy)]
pub struct IslandBody {
    pub id: BodyId,
    pub body_type: BodyType,
    pub sweep: Sweep,
    pub velocity: Velocity,
    pub force: Vec2,
    pub torque: f32,
    pub inv_mass: f32,
    pub inv_inertia: f32,
    pub gravity_scale: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub sleeping_allowed: bool,
    pub sleep_time: f32,
    pub awake: bool,
}

impl IslandBody {
    pub fn from_body(id: BodyId, body: &Body) -> Self {
        Self {
            id,
            body_type: body.body_type,
            sweep: body.sweep,
            velocity: Velocity {
                v: body.linear_velocity,
                w: body.angular_velocity,
            },
            force: body.force,
            torque: body.torque,
            inv_mass: body.inv_mass,
            inv_inertia: body.inv_inertia,
            gravity_scale: body.gravity_scale,
            linear_damping: body.linear_damping,
            angular_damping: body.angular_damping,
            sleeping_allowed: body.sleeping_allowed,
            sleep_time: body.sleep_time,
            awake: body.awake,
        }
    }

    fn constraint_body(&self, index: usize) -> ConstraintBody {
        ConstraintBody {
            index,
            local_center: self.sweep.local_center,
            inv_mass: self.inv_mass,
            inv_inertia: self.inv_inertia,
        }
    }

    /// Copies the solved state back. Static bodies are left untouched.
    pub fn write_back(&self, body: &mut Body) {
        if body.is_static() {
            return;
        }
        body.sweep = self.sweep;
        body.linear_velocity = self.velocity.v;
        body.angular_velocity = self.velocity.w;
        body.sleep_time = self.sleep_time;
        body.synchronize_transform();
        if !self.awake {
            body.set_awake(false);
        }
    }
}

/// A joint borrowed from the graph for the duration of an island solve.
pub struct JointSlot<'a> {
    pub id: JointId,
    pub joint: &'a mut dyn Joint,
    pub body_a: usize,
    pub body_b: usize,
}

/// Self-contained work item: one island with copied bodies and contacts.
///
/// Islands share no mutable state, so a batch of them can be solved on a
/// thread pool and written back afterwards.
pub struct Island<'a> {
    pub bodies: Vec<IslandBody>,
    pub id_map: HashMap<BodyId, usize>,
    pub contacts: Vec<ContactId>,
    pub constraints: Vec<ContactConstraintDef>,
    pub manifolds: Vec<Manifold>,
    pub impulses: Vec<ContactImpulse>,
    pub joints: Vec<JointSlot<'a>>,
    pub timings: SolverTimings,
    positions: Vec<Position>,
}

impl<'a> Island<'a> {
    /// Snapshots the given bodies and contacts. Contacts whose bodies are not
    /// part of `body_ids` are skipped.
    pub fn gather(graph: &InteractionGraph, body_ids: &[BodyId], contact_ids: &[ContactId]) -> Self {
        let mut bodies = Vec::with_capacity(body_ids.len());
        let mut id_map = HashMap::with_capacity(body_ids.len());
        for &id in body_ids {
            if let Some(body) = graph.bodies.get(id) {
                id_map.insert(id, bodies.len());
                bodies.push(IslandBody::from_body(id, body));
            }
        }

        let mut island = Self {
            bodies,
            id_map,
            contacts: Vec::with_capacity(contact_ids.len()),
            constraints: Vec::with_capacity(contact_ids.len()),
            manifolds: Vec::with_capacity(contact_ids.len()),
            impulses: Vec::new(),
            joints: Vec::new(),
            timings: SolverTimings::default(),
            positions: Vec::new(),
        };
        for &id in contact_ids {
            island.push_contact(graph, id);
        }
        island
    }

    /// Adds a touching contact whose bodies are already in the island.
    pub fn push_contact(&mut self, graph: &InteractionGraph, id: ContactId) {
        let Some(contact) = graph.contacts.get(id) else {
            return;
        };
        let (Some(&index_a), Some(&index_b)) = (
            self.id_map.get(&contact.body_a),
            self.id_map.get(&contact.body_b),
        ) else {
            return;
        };
        let (Some(fixture_a), Some(fixture_b)) = (
            graph.fixtures.get(contact.fixture_a),
            graph.fixtures.get(contact.fixture_b),
        ) else {
            return;
        };
        let a = &self.bodies[index_a];
        let b = &self.bodies[index_b];
        self.constraints.push(ContactConstraintDef {
            index_a,
            index_b,
            inv_mass_a: a.inv_mass,
            inv_mass_b: b.inv_mass,
            inv_inertia_a: a.inv_inertia,
            inv_inertia_b: b.inv_inertia,
            local_center_a: a.sweep.local_center,
            local_center_b: b.sweep.local_center,
            proxy_a: fixture_a.shape.distance_proxy(),
            proxy_b: fixture_b.shape.distance_proxy(),
            friction: contact.friction,
            restitution: contact.restitution,
            manifold: contact.manifold,
        });
        self.manifolds.push(contact.manifold);
        self.contacts.push(id);
    }

    /// Registers a joint. Returns false when either body is missing.
    pub fn push_joint(&mut self, slot: JointSlot<'a>) -> bool {
        if slot.body_a >= self.bodies.len() || slot.body_b >= self.bodies.len() {
            return false;
        }
        self.joints.push(slot);
        true
    }

    pub fn index_of(&self, id: BodyId) -> Option<usize> {
        self.id_map.get(&id).copied()
    }

    /// Integrates, solves constraints and updates the sleep timers of one island.
    ///
    /// Returns true when the island fell asleep.
    pub fn solve(&mut self, step: &TimeStep, gravity: Vec2, allow_sleep: bool) -> bool {
        let h = step.dt;

        self.positions.clear();
        let mut velocities = Vec::with_capacity(self.bodies.len());
        for body in &mut self.bodies {
            // Start of the sweep for continuous collision.
            body.sweep.c0 = body.sweep.c;
            body.sweep.a0 = body.sweep.a;

            let mut v = body.velocity.v;
            let mut w = body.velocity.w;
            if body.body_type == BodyType::Dynamic {
                v += h * (body.gravity_scale * gravity + body.inv_mass * body.force);
                w += h * body.inv_inertia * body.torque;
                v *= 1.0 / (1.0 + h * body.linear_damping);
                w *= 1.0 / (1.0 + h * body.angular_damping);
            }
            self.positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            velocities.push(Velocity { v, w });
        }

        let mut contact_solver = ContactSolver::new(*step, &self.constraints);
        let mut data = SolverData {
            step: *step,
            positions: &mut self.positions,
            velocities: &mut velocities,
        };

        {
            let _timer = ScopedTimer::new(&mut self.timings.init);
            contact_solver.initialize_velocity_constraints(data.positions, data.velocities);
            if step.warm_starting {
                contact_solver.warm_start(data.velocities);
            }
            for slot in &mut self.joints {
                let body_a = self.bodies[slot.body_a].constraint_body(slot.body_a);
                let body_b = self.bodies[slot.body_b].constraint_body(slot.body_b);
                slot.joint.init_velocity_constraints(&body_a, &body_b, &mut data);
            }
        }

        {
            let _timer = ScopedTimer::new(&mut self.timings.velocity);
            for _ in 0..step.velocity_iterations {
                for slot in &mut self.joints {
                    slot.joint.solve_velocity_constraints(&mut data);
                }
                contact_solver.solve_velocity_constraints(data.velocities);
            }
            contact_solver.store_impulses(&mut self.manifolds);
        }

        integrate_positions(data.positions, data.velocities, h);

        let mut position_solved = false;
        {
            let _timer = ScopedTimer::new(&mut self.timings.position);
            for _ in 0..step.position_iterations {
                let contacts_okay = contact_solver.solve_position_constraints(data.positions);
                let mut joints_okay = true;
                for slot in &mut self.joints {
                    joints_okay &= slot.joint.solve_position_constraints(&mut data);
                }
                if contacts_okay && joints_okay {
                    position_solved = true;
                    break;
                }
            }
        }

        for ((body, position), velocity) in self
            .bodies
            .iter_mut()
            .zip(self.positions.iter())
            .zip(velocities.iter())
        {
            body.sweep.c = position.c;
            body.sweep.a = position.a;
            body.velocity = *velocity;
        }
        self.impulses = contact_solver.impulses().collect();

        allow_sleep && self.update_sleep(h, position_solved)
    }

    /// Puts the island to sleep once every member has rested long enough.
    fn update_sleep(&mut self, h: f32, position_solved: bool) -> bool {
        let lin_tol_sq = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
        let ang_tol_sq = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

        let mut min_sleep_time = f32::MAX;
        for body in self
            .bodies
            .iter_mut()
            .filter(|body| body.body_type != BodyType::Static)
        {
            if !body.sleeping_allowed
                || body.velocity.w * body.velocity.w > ang_tol_sq
                || body.velocity.v.length_squared() > lin_tol_sq
            {
                body.sleep_time = 0.0;
                min_sleep_time = 0.0;
            } else {
                body.sleep_time += h;
                min_sleep_time = min_sleep_time.min(body.sleep_time);
            }
        }

        if min_sleep_time >= TIME_TO_SLEEP && position_solved {
            for body in &mut self.bodies {
                body.awake = false;
            }
            return true;
        }
        false
    }

    /// Resolves a time-of-impact sub-step. Only the two impact bodies are
    /// moved by the position pass, then velocities are solved without warm
    /// starting and the whole sub-island is integrated over `sub_step.dt`.
    pub fn solve_toi(&mut self, sub_step: &TimeStep, toi_index_a: usize, toi_index_b: usize) {
        self.positions.clear();
        let mut velocities = Vec::with_capacity(self.bodies.len());
        for body in &self.bodies {
            self.positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            velocities.push(body.velocity);
        }

        let mut contact_solver = ContactSolver::new(*sub_step, &self.constraints);

        for _ in 0..sub_step.position_iterations {
            if contact_solver.solve_toi_position_constraints(
                &mut self.positions,
                toi_index_a,
                toi_index_b,
            ) {
                break;
            }
        }

        // The impact bodies restart their sweeps from the corrected pose.
        for index in [toi_index_a, toi_index_b] {
            let body = &mut self.bodies[index];
            body.sweep.c0 = self.positions[index].c;
            body.sweep.a0 = self.positions[index].a;
        }

        contact_solver.initialize_velocity_constraints(&self.positions, &velocities);
        for _ in 0..sub_step.velocity_iterations {
            contact_solver.solve_velocity_constraints(&mut velocities);
        }

        integrate_positions(&mut self.positions, &mut velocities, sub_step.dt);

        for ((body, position), velocity) in self
            .bodies
            .iter_mut()
            .zip(self.positions.iter())
            .zip(velocities.iter())
        {
            body.sweep.c = position.c;
            body.sweep.a = position.a;
            body.velocity = *velocity;
        }
        self.impulses = contact_solver.impulses().collect();
    }
}

/// Explicit Euler position update with per-step motion clamps.
fn integrate_positions(positions: &mut [Position], velocities: &mut [Velocity], h: f32) {
    for (position, velocity) in positions.iter_mut().zip(velocities.iter_mut()) {
        let translation = h * velocity.v;
        if translation.length_squared() > MAX_TRANSLATION * MAX_TRANSLATION {
            velocity.v *= MAX_TRANSLATION / translation.length();
        }
        let rotation = h * velocity.w;
        if rotation * rotation > MAX_ROTATION * MAX_ROTATION {
            velocity.w *= MAX_ROTATION / rotation.abs();
        }
        position.c += h * velocity.v;
        position.a += h * velocity.w;
    }
}
