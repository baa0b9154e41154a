use std::sync::Arc;

use approx::assert_relative_eq;
use parking_lot::Mutex;
use planar_accelerator::*;

fn zero_gravity_world() -> World {
    World::new(Vec2::ZERO)
}

fn ball(world: &mut World, def: BodyDef, radius: f32) -> (BodyId, FixtureId) {
    let body = world.create_body(&def).expect("valid body");
    let fixture = world
        .create_fixture(body, FixtureDef::new(Circle::new(radius)).density(1.0))
        .expect("valid fixture");
    (body, fixture)
}

#[derive(Debug, Clone, PartialEq)]
enum Goodbye {
    Joint(JointId),
    Fixture(FixtureId),
}

struct Recorder(Arc<Mutex<Vec<Goodbye>>>);

impl DestructionListener for Recorder {
    fn joint_destroyed(&mut self, joint: JointId) {
        self.0.lock().push(Goodbye::Joint(joint));
    }

    fn fixture_destroyed(&mut self, fixture: FixtureId) {
        self.0.lock().push(Goodbye::Fixture(fixture));
    }
}

#[test]
fn destroying_a_body_cascades_to_joints_contacts_and_fixtures() {
    let mut world = zero_gravity_world();
    let events = Arc::new(Mutex::new(Vec::new()));
    world
        .set_destruction_listener(Some(Box::new(Recorder(events.clone()))))
        .unwrap();

    let (x, x_fixture) = ball(&mut world, BodyDef::dynamic(), 0.5);
    let (y, _) = ball(&mut world, BodyDef::dynamic().position(Vec2::new(0.8, 0.0)), 0.5);
    let (z, _) = ball(&mut world, BodyDef::dynamic().position(Vec2::new(10.0, 0.0)), 0.5);

    world.step(1.0 / 60.0, 8, 3);
    assert_eq!(world.contact_count(), 1);

    let xy = world.create_joint(FrictionJointDef::new(x, y)).unwrap();
    let xz = world.create_joint(FrictionJointDef::new(x, z)).unwrap();

    world.destroy_body(x).unwrap();

    let events = events.lock().clone();
    assert_eq!(events.len(), 3);
    assert!(events.contains(&Goodbye::Joint(xy)));
    assert!(events.contains(&Goodbye::Joint(xz)));
    assert_eq!(events[2], Goodbye::Fixture(x_fixture));

    assert_eq!(world.body_count(), 2);
    assert_eq!(world.joint_count(), 0);
    assert_eq!(world.contact_count(), 0);
    assert_eq!(world.fixture_count(), 2);
    assert_eq!(world.proxy_count(), 2);
    assert!(world.graph().validate_edges());
    for other in [y, z] {
        let body = world.body(other).unwrap();
        assert_eq!(body.contact_edges().count(), 0);
        assert_eq!(body.joint_edges().count(), 0);
        assert!(body.is_awake());
    }
}

#[test]
fn explicit_joint_destruction_is_not_reported() {
    let mut world = zero_gravity_world();
    let events = Arc::new(Mutex::new(Vec::new()));
    world
        .set_destruction_listener(Some(Box::new(Recorder(events.clone()))))
        .unwrap();

    let (a, _) = ball(&mut world, BodyDef::dynamic(), 0.5);
    let (b, _) = ball(&mut world, BodyDef::dynamic().position(Vec2::new(3.0, 0.0)), 0.5);
    let joint = world.create_joint(FrictionJointDef::new(a, b)).unwrap();
    world.destroy_joint(joint).unwrap();

    assert!(events.lock().is_empty());
    assert_eq!(
        world.destroy_joint(joint),
        Err(WorldError::InvalidHandle("joint"))
    );
}

#[test]
fn shifting_the_origin_back_and_forth_restores_positions() {
    let mut world = World::default();
    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(
            ground,
            FixtureDef::new(Segment::new(Vec2::new(-20.0, 0.0), Vec2::new(20.0, 0.0))),
        )
        .unwrap();
    let (ball_id, fixture) = ball(&mut world, BodyDef::dynamic().position(Vec2::new(1.0, 0.5)), 0.5);
    world.step(1.0 / 60.0, 8, 3);

    let before = world.body(ball_id).unwrap().position();
    let shift = Vec2::new(100.0, -50.0);

    world.shift_origin(shift).unwrap();
    let shifted = world.body(ball_id).unwrap().position();
    assert_relative_eq!(shifted.x, before.x - shift.x, epsilon = 1e-4);
    assert_relative_eq!(shifted.y, before.y - shift.y, epsilon = 1e-4);

    let mut found = Vec::new();
    world.query_aabb(&Aabb::new(shifted - Vec2::ONE, shifted + Vec2::ONE), |f| {
        found.push(f);
        true
    });
    assert!(found.contains(&fixture));

    world.shift_origin(-shift).unwrap();
    let restored = world.body(ball_id).unwrap().position();
    assert_relative_eq!(restored.x, before.x, epsilon = 1e-4);
    assert_relative_eq!(restored.y, before.y, epsilon = 1e-4);

    // The resting contact survives the round trip.
    world.step(1.0 / 60.0, 8, 3);
    assert_eq!(world.contact_count(), 1);
}

#[test]
fn ray_casts_report_hits_in_order() {
    let mut world = zero_gravity_world();
    let mut fixtures = Vec::new();
    for x in [8.0, 2.0, 5.0] {
        let (_, fixture) = ball(&mut world, BodyDef::default().position(Vec2::new(x, 0.0)), 0.5);
        fixtures.push(fixture);
    }

    let hits = world.ray_cast_all(Vec2::ZERO, Vec2::new(10.0, 0.0));
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].fixture, fixtures[1]);
    assert_eq!(hits[1].fixture, fixtures[2]);
    assert_eq!(hits[2].fixture, fixtures[0]);
    assert_relative_eq!(hits[0].fraction, 0.15, epsilon = 1e-4);

    let closest = world
        .ray_cast_closest(Vec2::ZERO, Vec2::new(10.0, 0.0))
        .expect("ray should hit");
    assert_eq!(closest.fixture, fixtures[1]);
    assert_relative_eq!(closest.point.x, 1.5, epsilon = 1e-4);
    assert_relative_eq!(closest.normal.x, -1.0, epsilon = 1e-4);

    assert!(world.ray_cast_closest(Vec2::new(0.0, 3.0), Vec2::new(10.0, 3.0)).is_none());
}

#[test]
fn aabb_query_stops_when_asked() {
    let mut world = zero_gravity_world();
    let mut fixtures = Vec::new();
    for x in [2.0, 5.0, 8.0] {
        let (_, fixture) = ball(&mut world, BodyDef::default().position(Vec2::new(x, 0.0)), 0.5);
        fixtures.push(fixture);
    }

    let mut found = Vec::new();
    world.query_aabb(&Aabb::new(Vec2::new(4.0, -1.0), Vec2::new(6.0, 1.0)), |f| {
        found.push(f);
        true
    });
    assert_eq!(found, vec![fixtures[1]]);

    let mut visited = 0;
    world.query_aabb(&Aabb::new(Vec2::splat(-10.0), Vec2::splat(10.0)), |_| {
        visited += 1;
        false
    });
    assert_eq!(visited, 1);
}

#[test]
fn deactivated_bodies_leave_the_broad_phase() {
    let mut world = zero_gravity_world();
    let (a, _) = ball(&mut world, BodyDef::dynamic(), 0.5);
    ball(&mut world, BodyDef::dynamic().position(Vec2::new(0.8, 0.0)), 0.5);
    world.step(1.0 / 60.0, 8, 3);
    assert_eq!(world.contact_count(), 1);

    world.set_body_active(a, false).unwrap();
    assert_eq!(world.contact_count(), 0);
    assert_eq!(world.proxy_count(), 1);
    assert!(!world.body(a).unwrap().is_active());

    world.set_body_active(a, true).unwrap();
    assert_eq!(world.proxy_count(), 2);
    world.step(1.0 / 60.0, 8, 3);
    assert_eq!(world.contact_count(), 1);
}

#[test]
fn teleporting_finds_contacts_immediately() {
    let mut world = zero_gravity_world();
    let (a, _) = ball(&mut world, BodyDef::dynamic(), 0.5);
    ball(&mut world, BodyDef::dynamic().position(Vec2::new(5.0, 0.0)), 0.5);
    world.step(1.0 / 60.0, 8, 3);
    assert_eq!(world.contact_count(), 0);

    world.set_body_transform(a, Vec2::new(4.2, 0.0), 0.0).unwrap();
    assert_eq!(world.contact_count(), 1);
    assert!(world.set_body_transform(a, Vec2::new(f32::NAN, 0.0), 0.0).is_err());
}

#[test]
fn invalid_settings_are_rejected() {
    let settings = WorldSettings::default().with_gravity(Vec2::new(f32::INFINITY, 0.0));
    assert!(World::with_settings(settings).is_err());

    let mut world = World::default();
    assert!(world.set_gravity(Vec2::new(0.0, f32::NAN)).is_err());
    assert_eq!(world.gravity(), Vec2::new(0.0, -10.0));
}

#[derive(Default)]
struct CountingDraw {
    circles: usize,
    segments: usize,
    polygons: usize,
    transforms: usize,
}

impl DebugDraw for CountingDraw {
    fn draw_polygon(&mut self, _vertices: &[Vec2], _color: Color) {
        self.polygons += 1;
    }

    fn draw_circle(&mut self, _center: Vec2, _radius: f32, _color: Color) {
        self.circles += 1;
    }

    fn draw_solid_circle(&mut self, _center: Vec2, _radius: f32, _axis: Vec2, _color: Color) {
        self.circles += 1;
    }

    fn draw_segment(&mut self, _p1: Vec2, _p2: Vec2, _color: Color) {
        self.segments += 1;
    }

    fn draw_transform(&mut self, _xf: &Transform) {
        self.transforms += 1;
    }
}

#[test]
fn debug_draw_emits_every_requested_layer() {
    let mut world = zero_gravity_world();
    let (a, _) = ball(&mut world, BodyDef::dynamic(), 0.5);
    let (b, _) = ball(&mut world, BodyDef::dynamic().position(Vec2::new(3.0, 0.0)), 0.5);
    world.create_joint(FrictionJointDef::new(a, b)).unwrap();

    let mut draw = CountingDraw::default();
    world.draw_debug(
        &mut draw,
        DrawFlags {
            shapes: true,
            joints: true,
            aabbs: true,
            center_of_mass: true,
        },
    );
    assert_eq!(draw.circles, 2);
    assert_eq!(draw.segments, 3);
    assert_eq!(draw.polygons, 2);
    assert_eq!(draw.transforms, 2);
}
