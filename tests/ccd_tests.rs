use planar_accelerator::config::MAX_SUB_STEPS;
use planar_accelerator::*;

const DT: f32 = 1.0 / 60.0;

fn body_with_circle(world: &mut World, def: BodyDef, radius: f32) -> BodyId {
    let body = world.create_body(&def).unwrap();
    world
        .create_fixture(body, FixtureDef::new(Circle::new(radius)).density(1.0))
        .unwrap();
    body
}

fn wall(world: &mut World) -> BodyId {
    let wall = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(
            wall,
            FixtureDef::new(Segment::new(Vec2::new(0.0, -10.0), Vec2::new(0.0, 10.0))),
        )
        .unwrap();
    wall
}

#[test]
fn head_on_bullet_does_not_tunnel() {
    let mut world = World::new(Vec2::ZERO);
    let a = body_with_circle(
        &mut world,
        BodyDef::dynamic()
            .position(Vec2::new(-2.0, 0.0))
            .linear_velocity(Vec2::new(240.0, 0.0))
            .bullet(true),
        0.5,
    );
    let b = body_with_circle(
        &mut world,
        BodyDef::dynamic()
            .position(Vec2::new(2.0, 0.0))
            .linear_velocity(Vec2::new(-240.0, 0.0)),
        0.5,
    );

    world.step(DT, 8, 3);

    let pa = world.body(a).unwrap().position();
    let pb = world.body(b).unwrap().position();
    assert!(pa.x < pb.x, "bodies passed through each other: {pa} {pb}");
    assert!(pa.distance(pb) > 0.98, "distance {}", pa.distance(pb));
    assert!(world.profile().toi_events >= 1);
}

#[test]
fn fast_non_bullets_tunnel_through_each_other() {
    let mut world = World::new(Vec2::ZERO);
    let a = body_with_circle(
        &mut world,
        BodyDef::dynamic()
            .position(Vec2::new(-2.5, 0.0))
            .linear_velocity(Vec2::new(240.0, 0.0)),
        0.25,
    );
    body_with_circle(
        &mut world,
        BodyDef::dynamic()
            .position(Vec2::new(2.5, 0.0))
            .linear_velocity(Vec2::new(-240.0, 0.0)),
        0.25,
    );

    world.step(DT, 8, 3);
    world.step(DT, 8, 3);

    // Plain dynamic pairs get no time of impact; only bullets sweep against them.
    assert!(world.body(a).unwrap().position().x > 0.0);
    assert_eq!(world.profile().toi_events, 0);
}

#[test]
fn fast_ball_stops_at_static_wall() {
    let mut world = World::new(Vec2::ZERO);
    wall(&mut world);
    let ball = body_with_circle(
        &mut world,
        BodyDef::dynamic()
            .position(Vec2::new(-1.5, 0.0))
            .linear_velocity(Vec2::new(300.0, 0.0)),
        0.25,
    );

    world.step(DT, 8, 3);

    let x = world.body(ball).unwrap().position().x;
    assert!(x < 0.0, "ball crossed the wall: x = {x}");
    assert!(x > -0.3, "ball stopped early: x = {x}");
}

#[test]
fn disabling_continuous_physics_allows_tunneling() {
    let mut world = World::new(Vec2::ZERO);
    world.set_continuous_physics(false).unwrap();
    wall(&mut world);
    let ball = body_with_circle(
        &mut world,
        BodyDef::dynamic()
            .position(Vec2::new(-1.5, 0.0))
            .linear_velocity(Vec2::new(300.0, 0.0)),
        0.25,
    );

    world.step(DT, 8, 3);
    world.step(DT, 8, 3);

    assert!(world.body(ball).unwrap().position().x > 0.0);
}

#[test]
fn impact_counts_stay_within_the_sub_step_cap() {
    let mut world = World::new(Vec2::ZERO);
    wall(&mut world);
    let mut balls = Vec::new();
    for i in 0..5 {
        let y = -2.0 + i as f32;
        balls.push(body_with_circle(
            &mut world,
            BodyDef::dynamic()
                .position(Vec2::new(-1.5, y))
                .linear_velocity(Vec2::new(300.0, 0.0))
                .bullet(i % 2 == 0),
            0.25,
        ));
    }

    for _ in 0..3 {
        world.step(DT, 8, 3);
        for id in world.contact_ids() {
            assert!(world.contact(id).unwrap().toi_count() <= MAX_SUB_STEPS);
        }
    }
    for ball in balls {
        assert!(world.body(ball).unwrap().position().x < 0.0);
    }
}

#[test]
fn sub_stepping_resolves_one_impact_per_step() {
    let mut world = World::new(Vec2::ZERO);
    world.set_sub_stepping(true).unwrap();
    wall(&mut world);
    let ball = body_with_circle(
        &mut world,
        BodyDef::dynamic()
            .position(Vec2::new(-1.5, 0.0))
            .linear_velocity(Vec2::new(300.0, 0.0)),
        0.25,
    );

    world.step(DT, 8, 3);
    assert!(!world.is_step_complete());
    assert_eq!(world.profile().toi_events, 1);
    assert!(world.body(ball).unwrap().position().x < 0.0);

    let mut steps = 0;
    while !world.is_step_complete() && steps < 20 {
        world.step(DT, 8, 3);
        steps += 1;
    }
    assert!(world.is_step_complete());
    assert!(world.body(ball).unwrap().position().x < 0.0);
}

#[test]
fn disabling_continuous_physics_finishes_a_pending_step() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    world.set_sub_stepping(true).unwrap();
    wall(&mut world);
    body_with_circle(
        &mut world,
        BodyDef::dynamic()
            .position(Vec2::new(-1.5, 0.0))
            .linear_velocity(Vec2::new(300.0, 0.0)),
        0.25,
    );
    let faller = body_with_circle(
        &mut world,
        BodyDef::dynamic().position(Vec2::new(-20.0, 50.0)),
        0.25,
    );

    world.step(DT, 8, 3);
    assert!(!world.is_step_complete());

    world.set_continuous_physics(false).unwrap();
    assert!(world.is_step_complete());
    let before = world.body(faller).unwrap().position().y;
    for _ in 0..60 {
        world.step(DT, 8, 3);
    }
    assert!(world.is_step_complete());
    assert!(world.body(faller).unwrap().position().y < before - 1.0);
}
