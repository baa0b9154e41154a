use std::time::Instant;

use crate::{
    collision::{
        contact::Contact,
        queries::{RayCastInput, RaycastHit},
        shapes::Aabb,
    },
    config::WorldSettings,
    core::{
        body::{Body, BodyDef},
        constraints::{Joint, JointDef, JointRecord},
        fixture::{Filter, Fixture, FixtureDef},
        graph::{BodyId, ContactId, FixtureId, InteractionGraph, JointId},
        types::Transform,
    },
    dynamics::{island::IslandBuilder, solver::TimeStep},
    error::{ensure_finite, WorldError, WorldResult},
    utils::{
        debug_draw::{Color, DebugDraw, DrawFlags},
        logging::{StageSpan, StepStage},
        profiling,
        profiling::Profile,
    },
};
use glam::Vec2;

mod callbacks;
mod contact_manager;
mod continuous;
mod dynamics_manager;

pub use callbacks::{ContactFilter, ContactListener, DefaultContactFilter, DestructionListener};
pub use contact_manager::ContactManager;

/// Whether the world is inside [`World::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum StepPhase {
    #[default]
    Idle,
    Stepping,
}

/// Owns every body, fixture, contact and joint and advances them in time.
///
/// Topology and configuration changes are rejected with
/// [`WorldError::Locked`] while a step is in progress.
pub struct World {
    graph: InteractionGraph,
    contact_manager: ContactManager,
    island_builder: IslandBuilder,
    destruction_listener: Option<Box<dyn DestructionListener>>,
    settings: WorldSettings,
    phase: StepPhase,
    new_fixture: bool,
    /// Inverse of the previous step's dt, `0` before the first step.
    inv_dt0: f32,
    /// False while sub-stepping has left a TOI pass unfinished.
    step_complete: bool,
    profile: Profile,
}

impl Default for World {
    fn default() -> Self {
        Self::from_settings(WorldSettings::default())
    }
}

impl World {
    pub fn new(gravity: Vec2) -> Self {
        Self::from_settings(WorldSettings::default().with_gravity(gravity))
    }

    pub fn with_settings(settings: WorldSettings) -> WorldResult<Self> {
        settings.validate()?;
        Ok(Self::from_settings(settings))
    }

    fn from_settings(settings: WorldSettings) -> Self {
        Self {
            graph: InteractionGraph::new(),
            contact_manager: ContactManager::default(),
            island_builder: IslandBuilder::new(),
            destruction_listener: None,
            settings,
            phase: StepPhase::Idle,
            new_fixture: false,
            inv_dt0: 0.0,
            step_complete: true,
            profile: Profile::default(),
        }
    }

    fn ensure_unlocked(&self) -> WorldResult<()> {
        if self.is_locked() {
            Err(WorldError::Locked)
        } else {
            Ok(())
        }
    }

    pub fn is_locked(&self) -> bool {
        self.phase == StepPhase::Stepping
    }

    /// True unless sub-stepping left continuous collision mid-way.
    pub fn is_step_complete(&self) -> bool {
        self.step_complete
    }

    // ----------------------------------------------------------------------
    // Topology
    // ----------------------------------------------------------------------

    pub fn create_body(&mut self, def: &BodyDef) -> WorldResult<BodyId> {
        self.ensure_unlocked()?;
        def.validate()?;
        let id = self.graph.insert_body(Body::new(def));
        log::debug!("created {:?} body {id:?}", def.body_type);
        Ok(id)
    }

    /// Destroys a body with its joints, contacts and fixtures. The
    /// destruction listener hears about each joint and fixture first.
    pub fn destroy_body(&mut self, id: BodyId) -> WorldResult<()> {
        self.ensure_unlocked()?;
        let body = self.graph.bodies.get(id).ok_or(WorldError::InvalidHandle("body"))?;
        let joints: Vec<JointId> = body.joint_edges.iter().rev().map(|edge| edge.joint).collect();
        let fixtures: Vec<FixtureId> = body.fixtures.iter().rev().copied().collect();

        for joint in joints {
            if let Some(listener) = self.destruction_listener.as_deref_mut() {
                listener.joint_destroyed(joint);
            }
            self.remove_joint(joint);
        }

        self.contact_manager.destroy_body_contacts(&mut self.graph, id);

        for fixture in fixtures {
            if let Some(listener) = self.destruction_listener.as_deref_mut() {
                listener.fixture_destroyed(fixture);
            }
            if let Some(mut f) = self.graph.fixtures.remove(fixture) {
                f.destroy_proxy(&mut self.contact_manager.broad_phase);
            }
        }
        if let Some(body) = self.graph.bodies.get_mut(id) {
            body.fixtures.clear();
        }

        self.graph.remove_body(id);
        log::debug!("destroyed body {id:?}");
        Ok(())
    }

    /// Attaches a fixture. Contacts for it appear at the start of the next step.
    pub fn create_fixture(&mut self, body: BodyId, def: FixtureDef) -> WorldResult<FixtureId> {
        self.ensure_unlocked()?;
        def.validate()?;
        let (xf, active) = {
            let b = self.graph.bodies.get(body).ok_or(WorldError::InvalidHandle("body"))?;
            (b.xf, b.active)
        };
        let density = def.density;
        let id = self.graph.fixtures.insert(Fixture::new(body, def));
        if active {
            if let Some(fixture) = self.graph.fixtures.get_mut(id) {
                fixture.create_proxy(&mut self.contact_manager.broad_phase, &xf, id);
            }
        }

        if let Some(b) = self.graph.bodies.get_mut(body) {
            b.fixtures.push(id);
            if density > 0.0 {
                b.reset_mass_data(&self.graph.fixtures);
            }
        }
        self.new_fixture = true;
        Ok(id)
    }

    pub fn destroy_fixture(&mut self, id: FixtureId) -> WorldResult<()> {
        self.ensure_unlocked()?;
        let body = self.graph.fixtures.get(id).ok_or(WorldError::InvalidHandle("fixture"))?.body;

        let contacts: Vec<ContactId> = self
            .graph
            .bodies
            .get(body)
            .map(|b| {
                b.contact_edges
                    .iter()
                    .map(|edge| edge.contact)
                    .filter(|&c| {
                        self.graph
                            .contacts
                            .get(c)
                            .is_some_and(|c| c.fixture_a == id || c.fixture_b == id)
                    })
                    .collect()
            })
            .unwrap_or_default();
        for contact in contacts {
            self.contact_manager.destroy(&mut self.graph, contact);
        }

        if let Some(mut fixture) = self.graph.fixtures.remove(id) {
            fixture.destroy_proxy(&mut self.contact_manager.broad_phase);
        }
        if let Some(b) = self.graph.bodies.get_mut(body) {
            b.fixtures.retain(|&f| f != id);
            b.reset_mass_data(&self.graph.fixtures);
        }
        Ok(())
    }

    /// Builds and registers a joint. Unless the definition asks for
    /// `collide_connected`, existing contacts between the bodies are
    /// re-filtered on the next collide pass.
    pub fn create_joint<D: JointDef>(&mut self, def: D) -> WorldResult<JointId> {
        self.ensure_unlocked()?;
        let (body_a, body_b, collide_connected) = (def.body_a(), def.body_b(), def.collide_connected());
        if !self.graph.bodies.contains(body_a) || !self.graph.bodies.contains(body_b) {
            return Err(WorldError::InvalidHandle("body"));
        }
        if body_a == body_b {
            return Err(WorldError::SameBody);
        }

        let joint = def.build()?;
        let id = self
            .graph
            .insert_joint(JointRecord::new(joint, body_a, body_b, collide_connected));
        if !collide_connected {
            self.graph.flag_contacts_between(body_a, body_b);
        }
        log::debug!("created joint {id:?} between {body_a:?} and {body_b:?}");
        Ok(id)
    }

    /// Removes a joint and wakes both bodies.
    pub fn destroy_joint(&mut self, id: JointId) -> WorldResult<()> {
        self.ensure_unlocked()?;
        if !self.graph.joints.contains(id) {
            return Err(WorldError::InvalidHandle("joint"));
        }
        self.remove_joint(id);
        Ok(())
    }

    fn remove_joint(&mut self, id: JointId) {
        let Some(record) = self.graph.remove_joint(id) else {
            return;
        };
        for body in [record.body_a, record.body_b] {
            if let Some(body) = self.graph.bodies.get_mut(body) {
                body.set_awake(true);
            }
        }
        if !record.collide_connected {
            self.graph.flag_contacts_between(record.body_a, record.body_b);
        }
    }

    // ----------------------------------------------------------------------
    // Body state that touches the broad-phase
    // ----------------------------------------------------------------------

    /// Teleports a body. New contacts are found immediately.
    pub fn set_body_transform(&mut self, id: BodyId, position: Vec2, angle: f32) -> WorldResult<()> {
        self.ensure_unlocked()?;
        ensure_finite("position.x", position.x)?;
        ensure_finite("position.y", position.y)?;
        ensure_finite("angle", angle)?;
        let body = self.graph.bodies.get_mut(id).ok_or(WorldError::InvalidHandle("body"))?;
        body.set_transform(position, angle);
        let xf = body.xf;
        let fixtures = body.fixtures.clone();
        for fixture in fixtures {
            if let Some(f) = self.graph.fixtures.get_mut(fixture) {
                f.synchronize(&mut self.contact_manager.broad_phase, &xf, &xf);
            }
        }
        self.contact_manager.find_new_contacts(&mut self.graph);
        Ok(())
    }

    /// Inactive bodies keep their fixtures but leave the broad-phase and
    /// lose all contacts.
    pub fn set_body_active(&mut self, id: BodyId, flag: bool) -> WorldResult<()> {
        self.ensure_unlocked()?;
        let body = self.graph.bodies.get_mut(id).ok_or(WorldError::InvalidHandle("body"))?;
        if body.active == flag {
            return Ok(());
        }
        body.active = flag;
        let xf = body.xf;
        let fixtures = body.fixtures.clone();

        if flag {
            for fixture in fixtures {
                if let Some(f) = self.graph.fixtures.get_mut(fixture) {
                    f.create_proxy(&mut self.contact_manager.broad_phase, &xf, fixture);
                }
            }
            self.new_fixture = true;
        } else {
            for fixture in fixtures {
                if let Some(f) = self.graph.fixtures.get_mut(fixture) {
                    f.destroy_proxy(&mut self.contact_manager.broad_phase);
                }
            }
            self.contact_manager.destroy_body_contacts(&mut self.graph, id);
        }
        Ok(())
    }

    pub fn set_body_awake(&mut self, id: BodyId, flag: bool) -> WorldResult<()> {
        let body = self.graph.bodies.get_mut(id).ok_or(WorldError::InvalidHandle("body"))?;
        body.set_awake(flag);
        Ok(())
    }

    /// Replaces a fixture's filter and re-filters its contacts.
    pub fn set_fixture_filter(&mut self, id: FixtureId, filter: Filter) -> WorldResult<()> {
        self.ensure_unlocked()?;
        let fixture = self.graph.fixtures.get_mut(id).ok_or(WorldError::InvalidHandle("fixture"))?;
        fixture.filter = filter;
        let proxy = fixture.proxy;
        self.graph.flag_contacts_of_fixture(id);
        if let Some(proxy) = proxy {
            self.contact_manager.broad_phase.touch_proxy(proxy);
        }
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Settings and hooks
    // ----------------------------------------------------------------------

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn gravity(&self) -> Vec2 {
        self.settings.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) -> WorldResult<()> {
        self.ensure_unlocked()?;
        ensure_finite("gravity.x", gravity.x)?;
        ensure_finite("gravity.y", gravity.y)?;
        self.settings.gravity = gravity;
        Ok(())
    }

    /// Disabling sleep wakes every body.
    pub fn set_allow_sleeping(&mut self, flag: bool) -> WorldResult<()> {
        self.ensure_unlocked()?;
        if flag == self.settings.allow_sleep {
            return Ok(());
        }
        self.settings.allow_sleep = flag;
        if !flag {
            for (_, body) in self.graph.bodies.iter_mut() {
                body.set_awake(true);
            }
        }
        Ok(())
    }

    pub fn set_warm_starting(&mut self, flag: bool) -> WorldResult<()> {
        self.ensure_unlocked()?;
        self.settings.warm_starting = flag;
        Ok(())
    }

    /// Turning continuous physics off abandons any impacts left pending by
    /// sub-stepping, so the next step runs a full solve.
    pub fn set_continuous_physics(&mut self, flag: bool) -> WorldResult<()> {
        self.ensure_unlocked()?;
        self.settings.continuous_physics = flag;
        if !flag {
            self.step_complete = true;
        }
        Ok(())
    }

    /// With sub-stepping each step resolves at most one time of impact.
    pub fn set_sub_stepping(&mut self, flag: bool) -> WorldResult<()> {
        self.ensure_unlocked()?;
        self.settings.sub_stepping = flag;
        Ok(())
    }

    pub fn set_auto_clear_forces(&mut self, flag: bool) -> WorldResult<()> {
        self.ensure_unlocked()?;
        self.settings.auto_clear_forces = flag;
        Ok(())
    }

    /// Solve independent islands on the rayon pool. Has no effect without the
    /// `parallel` feature.
    pub fn set_parallel_islands(&mut self, flag: bool) -> WorldResult<()> {
        self.ensure_unlocked()?;
        self.settings.parallel_islands = flag;
        Ok(())
    }

    pub fn set_destruction_listener(
        &mut self,
        listener: Option<Box<dyn DestructionListener>>,
    ) -> WorldResult<()> {
        self.ensure_unlocked()?;
        self.destruction_listener = listener;
        Ok(())
    }

    pub fn set_contact_filter(&mut self, filter: Box<dyn ContactFilter>) -> WorldResult<()> {
        self.ensure_unlocked()?;
        self.contact_manager.set_filter(filter);
        Ok(())
    }

    pub fn set_contact_listener(&mut self, listener: Option<Box<dyn ContactListener>>) -> WorldResult<()> {
        self.ensure_unlocked()?;
        self.contact_manager.set_listener(listener);
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Stepping
    // ----------------------------------------------------------------------

    /// Advances the simulation by `dt` seconds.
    ///
    /// Runs, in order: pending contact creation, the narrow phase, the
    /// discrete island solve, and continuous collision. A non-positive `dt`
    /// only refreshes contacts.
    pub fn step(&mut self, dt: f32, velocity_iterations: usize, position_iterations: usize) {
        if !dt.is_finite() {
            log::warn!("ignoring step with non-finite dt {dt}");
            return;
        }
        let _span = StageSpan::enter(StepStage::Step);
        let started = Instant::now();
        self.profile.reset();

        if self.new_fixture {
            self.contact_manager.find_new_contacts(&mut self.graph);
            self.new_fixture = false;
        }

        self.phase = StepPhase::Stepping;

        let mut step = TimeStep::new(dt, velocity_iterations, position_iterations);
        step.dt_ratio = self.inv_dt0 * dt;
        step.warm_starting = self.settings.warm_starting;

        {
            let _span = StageSpan::enter(StepStage::Collide);
            let _timer = profiling::ScopedTimer::new(&mut self.profile.collide);
            self.contact_manager.collide(&mut self.graph);
        }

        if self.step_complete && step.dt > 0.0 {
            let _span = StageSpan::enter(StepStage::Solve);
            let solve_started = Instant::now();
            self.solve(&step);
            self.profile.solve = solve_started.elapsed();
        }

        if self.settings.continuous_physics && step.dt > 0.0 {
            let _span = StageSpan::enter(StepStage::Continuous);
            let toi_started = Instant::now();
            self.solve_toi(&step);
            self.profile.solve_toi = toi_started.elapsed();
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        if self.settings.auto_clear_forces {
            self.clear_forces();
        }

        self.phase = StepPhase::Idle;

        self.profile.step = started.elapsed();
        self.profile.body_count = self.graph.body_count();
        self.profile.contact_count = self.graph.contact_count();
        self.profile.report();
    }

    /// Zeroes accumulated forces and torques on every body.
    pub fn clear_forces(&mut self) {
        for (_, body) in self.graph.bodies.iter_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    // ----------------------------------------------------------------------
    // Queries
    // ----------------------------------------------------------------------

    /// Reports every fixture whose fat box overlaps `aabb` until the
    /// callback returns false.
    pub fn query_aabb<F>(&self, aabb: &Aabb, mut callback: F)
    where
        F: FnMut(FixtureId) -> bool,
    {
        self.contact_manager.broad_phase.query(aabb, |fixture| callback(fixture));
    }

    /// Casts a ray from `p1` to `p2`.
    ///
    /// The callback returns the new maximum fraction: `0` stops the cast, a
    /// negative value ignores the hit, `1` continues unclipped and `hit.fraction`
    /// clips the ray to the closest hit so far.
    pub fn ray_cast<F>(&self, p1: Vec2, p2: Vec2, mut callback: F)
    where
        F: FnMut(RaycastHit) -> f32,
    {
        let input = RayCastInput::new(p1, p2);
        self.contact_manager.broad_phase.ray_cast(&input, |sub_input, id| {
            let Some(fixture) = self.graph.fixtures.get(id) else {
                return sub_input.max_fraction;
            };
            let Some(body) = self.graph.bodies.get(fixture.body) else {
                return sub_input.max_fraction;
            };
            match fixture.ray_cast(sub_input, &body.xf) {
                Some(output) => callback(RaycastHit {
                    fixture: id,
                    point: sub_input.point_at(output.fraction),
                    normal: output.normal,
                    fraction: output.fraction,
                }),
                None => sub_input.max_fraction,
            }
        });
    }

    /// Every fixture hit by the ray, nearest first.
    pub fn ray_cast_all(&self, p1: Vec2, p2: Vec2) -> Vec<RaycastHit> {
        let mut hits = Vec::new();
        self.ray_cast(p1, p2, |hit| {
            hits.push(hit);
            1.0
        });
        hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
        hits
    }

    pub fn ray_cast_closest(&self, p1: Vec2, p2: Vec2) -> Option<RaycastHit> {
        let mut closest: Option<RaycastHit> = None;
        self.ray_cast(p1, p2, |hit| {
            let fraction = hit.fraction;
            closest = Some(hit);
            fraction
        });
        closest
    }

    /// Moves the world origin to `new_origin`, for worlds that drift far
    /// from zero.
    pub fn shift_origin(&mut self, new_origin: Vec2) -> WorldResult<()> {
        self.ensure_unlocked()?;
        ensure_finite("new_origin.x", new_origin.x)?;
        ensure_finite("new_origin.y", new_origin.y)?;
        for (_, body) in self.graph.bodies.iter_mut() {
            body.shift_origin(new_origin);
        }
        for (_, record) in self.graph.joints.iter_mut() {
            record.joint.shift_origin(new_origin);
        }
        self.contact_manager.broad_phase.shift_origin(new_origin);
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Accessors
    // ----------------------------------------------------------------------

    pub fn graph(&self) -> &InteractionGraph {
        &self.graph
    }

    pub fn contact_manager(&self) -> &ContactManager {
        &self.contact_manager
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.graph.bodies.get(id)
    }

    /// Mutable access for velocities, forces and flags. Use
    /// [`World::set_body_transform`] to move a body.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.graph.bodies.get_mut(id)
    }

    pub fn fixture(&self, id: FixtureId) -> Option<&Fixture> {
        self.graph.fixtures.get(id)
    }

    pub fn fixture_mut(&mut self, id: FixtureId) -> Option<&mut Fixture> {
        self.graph.fixtures.get_mut(id)
    }

    pub fn contact(&self, id: ContactId) -> Option<&Contact> {
        self.graph.contacts.get(id)
    }

    pub fn joint(&self, id: JointId) -> Option<&JointRecord> {
        self.graph.joints.get(id)
    }

    /// Downcasts a joint to its concrete type.
    pub fn joint_as<T: Joint + 'static>(&self, id: JointId) -> Option<&T> {
        self.graph.joints.get(id)?.joint.as_any().downcast_ref::<T>()
    }

    pub fn joint_as_mut<T: Joint + 'static>(&mut self, id: JointId) -> Option<&mut T> {
        let record = self.graph.joints.get_mut(id)?;
        if let Some(body) = self.graph.bodies.get_mut(record.body_a) {
            body.set_awake(true);
        }
        if let Some(body) = self.graph.bodies.get_mut(record.body_b) {
            body.set_awake(true);
        }
        record.joint.as_any_mut().downcast_mut::<T>()
    }

    /// World anchors of a joint.
    pub fn joint_anchors(&self, id: JointId) -> Option<(Vec2, Vec2)> {
        let record = self.graph.joints.get(id)?;
        let a = self.graph.bodies.get(record.body_a)?;
        let b = self.graph.bodies.get(record.body_b)?;
        Some((record.joint.anchor_a(a), record.joint.anchor_b(b)))
    }

    /// Bodies, newest first.
    pub fn body_ids(&self) -> Vec<BodyId> {
        self.graph.body_ids()
    }

    /// Contacts, newest first.
    pub fn contact_ids(&self) -> Vec<ContactId> {
        self.graph.contact_ids()
    }

    /// Joints, newest first.
    pub fn joint_ids(&self) -> Vec<JointId> {
        self.graph.joint_ids()
    }

    pub fn body_count(&self) -> usize {
        self.graph.body_count()
    }

    pub fn fixture_count(&self) -> usize {
        self.graph.fixture_count()
    }

    pub fn contact_count(&self) -> usize {
        self.graph.contact_count()
    }

    pub fn joint_count(&self) -> usize {
        self.graph.joint_count()
    }

    pub fn proxy_count(&self) -> usize {
        self.contact_manager.broad_phase.proxy_count()
    }

    // ----------------------------------------------------------------------
    // Debug drawing
    // ----------------------------------------------------------------------

    pub fn draw_debug(&self, draw: &mut dyn DebugDraw, flags: DrawFlags) {
        if flags.shapes {
            for (_, body) in self.graph.bodies.iter() {
                let color = if !body.active {
                    Color::INACTIVE
                } else if body.is_static() {
                    Color::STATIC
                } else if !body.is_dynamic() {
                    Color::KINEMATIC
                } else if !body.awake {
                    Color::ASLEEP
                } else {
                    Color::AWAKE
                };
                for fixture in body.fixtures.iter().filter_map(|&f| self.graph.fixtures.get(f)) {
                    fixture.shape.draw(&body.xf, color, draw);
                }
            }
        }

        if flags.joints {
            for (_, record) in self.graph.joints.iter() {
                let (Some(a), Some(b)) = (
                    self.graph.bodies.get(record.body_a),
                    self.graph.bodies.get(record.body_b),
                ) else {
                    continue;
                };
                let (p1, p2) = (record.joint.anchor_a(a), record.joint.anchor_b(b));
                draw.draw_segment(a.xf.p, p1, Color::JOINT);
                draw.draw_segment(p1, p2, Color::JOINT);
                draw.draw_segment(b.xf.p, p2, Color::JOINT);
            }
        }

        if flags.aabbs {
            for (_, body) in self.graph.bodies.iter().filter(|(_, b)| b.active) {
                for fixture in body.fixtures.iter().filter_map(|&f| self.graph.fixtures.get(f)) {
                    let Some(aabb) = fixture
                        .proxy
                        .and_then(|proxy| self.contact_manager.broad_phase.fat_aabb(proxy))
                    else {
                        continue;
                    };
                    let vertices = [
                        aabb.min,
                        Vec2::new(aabb.max.x, aabb.min.y),
                        aabb.max,
                        Vec2::new(aabb.min.x, aabb.max.y),
                    ];
                    draw.draw_polygon(&vertices, Color::AABB);
                }
            }
        }

        if flags.center_of_mass {
            for (_, body) in self.graph.bodies.iter() {
                let xf = Transform {
                    p: body.world_center(),
                    q: body.xf.q,
                };
                draw.draw_transform(&xf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::Circle;

    fn ball(world: &mut World, position: Vec2) -> BodyId {
        let body = world.create_body(&BodyDef::dynamic().position(position)).unwrap();
        world
            .create_fixture(body, FixtureDef::new(Circle::new(0.5)).density(1.0))
            .unwrap();
        body
    }

    #[test]
    fn topology_changes_are_rejected_while_stepping() {
        let mut world = World::default();
        let body = ball(&mut world, Vec2::ZERO);

        world.phase = StepPhase::Stepping;
        assert_eq!(world.create_body(&BodyDef::dynamic()), Err(WorldError::Locked));
        assert_eq!(world.destroy_body(body), Err(WorldError::Locked));
        assert_eq!(world.set_gravity(Vec2::ZERO), Err(WorldError::Locked));
        assert_eq!(world.shift_origin(Vec2::ONE), Err(WorldError::Locked));
        assert_eq!(world.body_count(), 1);

        world.phase = StepPhase::Idle;
        assert!(world.destroy_body(body).is_ok());
        assert!(!world.is_locked());
    }

    #[test]
    fn first_step_has_zero_dt_ratio() {
        let mut world = World::default();
        ball(&mut world, Vec2::ZERO);
        assert_eq!(world.inv_dt0, 0.0);
        world.step(0.5, 8, 3);
        assert_eq!(world.inv_dt0, 2.0);
        // A zero step keeps the previous ratio source.
        world.step(0.0, 8, 3);
        assert_eq!(world.inv_dt0, 2.0);
    }

    #[test]
    fn stale_handles_are_reported() {
        let mut world = World::default();
        let body = ball(&mut world, Vec2::ZERO);
        world.destroy_body(body).unwrap();
        assert_eq!(world.destroy_body(body), Err(WorldError::InvalidHandle("body")));
        assert!(world.create_fixture(body, FixtureDef::new(Circle::new(1.0))).is_err());
        assert_eq!(world.fixture_count(), 0);
        assert_eq!(world.proxy_count(), 0);
    }

    #[test]
    fn non_finite_step_is_ignored() {
        let mut world = World::default();
        let body = ball(&mut world, Vec2::ZERO);
        world.step(f32::NAN, 8, 3);
        assert_eq!(world.body(body).unwrap().position(), Vec2::ZERO);
        assert!(!world.is_locked());
    }
}
