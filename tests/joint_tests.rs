use approx::assert_relative_eq;
use planar_accelerator::*;

const DT: f32 = 1.0 / 60.0;

/// A static anchor body and a sliding ball joined by a friction joint.
fn sliding_ball(max_force: f32, max_torque: f32) -> (World, BodyId, JointId) {
    let mut world = World::new(Vec2::ZERO);
    let anchor = world.create_body(&BodyDef::default()).unwrap();
    let ball = world
        .create_body(
            &BodyDef::dynamic()
                .linear_velocity(Vec2::new(10.0, 0.0))
                .angular_velocity(2.0),
        )
        .unwrap();
    world
        .create_fixture(ball, FixtureDef::new(Circle::new(0.5)).density(1.0))
        .unwrap();

    let def = FrictionJointDef::new(anchor, ball)
        .initialize(world.body(anchor).unwrap(), world.body(ball).unwrap(), Vec2::ZERO)
        .max_force(max_force)
        .max_torque(max_torque);
    let joint = world.create_joint(def).unwrap();
    (world, ball, joint)
}

#[test]
fn linear_impulse_is_capped_by_max_force() {
    let (mut world, ball, joint) = sliding_ball(1.0, 0.0);
    let mass = world.body(ball).unwrap().mass();

    world.step(DT, 8, 3);

    let friction = world.joint_as::<FrictionJoint>(joint).unwrap();
    assert_relative_eq!(friction.linear_impulse().length(), DT * 1.0, epsilon = 1e-6);
    assert_relative_eq!(friction.linear_impulse().y, 0.0, epsilon = 1e-6);

    let velocity = world.body(ball).unwrap().linear_velocity();
    assert_relative_eq!(velocity.x, 10.0 - DT / mass, epsilon = 1e-4);
}

#[test]
fn angular_impulse_is_capped_by_max_torque() {
    let (mut world, ball, joint) = sliding_ball(0.0, 0.5);
    let inertia = world.body(ball).unwrap().inertia();

    world.step(DT, 8, 3);

    let friction = world.joint_as::<FrictionJoint>(joint).unwrap();
    assert_relative_eq!(friction.angular_impulse(), -DT * 0.5, epsilon = 1e-6);
    let omega = world.body(ball).unwrap().angular_velocity();
    assert_relative_eq!(omega, 2.0 - DT * 0.5 / inertia, epsilon = 1e-4);
}

#[test]
fn zero_budget_joint_applies_nothing() {
    let (mut world, ball, joint) = sliding_ball(0.0, 0.0);

    world.step(DT, 8, 3);

    let friction = world.joint_as::<FrictionJoint>(joint).unwrap();
    assert_eq!(friction.linear_impulse(), Vec2::ZERO);
    assert_eq!(friction.angular_impulse(), 0.0);
    let body = world.body(ball).unwrap();
    assert_relative_eq!(body.linear_velocity().x, 10.0, epsilon = 1e-6);
    assert_relative_eq!(body.angular_velocity(), 2.0, epsilon = 1e-6);
}

#[test]
fn large_budget_stops_the_body() {
    let (mut world, ball, joint) = sliding_ball(1.0e4, 1.0e4);

    world.step(DT, 8, 3);

    let body = world.body(ball).unwrap();
    assert_relative_eq!(body.linear_velocity().length(), 0.0, epsilon = 1e-4);
    assert_relative_eq!(body.angular_velocity(), 0.0, epsilon = 1e-4);

    let reaction = world.joint(joint).unwrap().joint().reaction_force(1.0 / DT);
    // The anchor pushes back against the motion.
    assert!(reaction.x < 0.0);
}

#[test]
fn limits_are_validated() {
    let (mut world, _, joint) = sliding_ball(1.0, 1.0);
    let friction = world.joint_as_mut::<FrictionJoint>(joint).unwrap();
    assert!(friction.set_max_force(-1.0).is_err());
    assert!(friction.set_max_torque(f32::NAN).is_err());
    assert!(friction.set_max_force(3.0).is_ok());
    assert_eq!(world.joint_as::<FrictionJoint>(joint).unwrap().max_force(), 3.0);

    let a = world.create_body(&BodyDef::dynamic()).unwrap();
    assert_eq!(
        world.create_joint(FrictionJointDef::new(a, a)),
        Err(WorldError::SameBody)
    );
    assert!(world
        .create_joint(FrictionJointDef::new(a, a).max_force(-2.0))
        .is_err());
}

#[test]
fn joint_disables_collision_between_its_bodies() {
    let mut world = World::new(Vec2::ZERO);
    let mut balls = Vec::new();
    for x in [0.0, 0.9] {
        let body = world
            .create_body(&BodyDef::dynamic().position(Vec2::new(x, 0.0)))
            .unwrap();
        world
            .create_fixture(body, FixtureDef::new(Circle::new(0.5)).density(1.0))
            .unwrap();
        balls.push(body);
    }
    world.step(DT, 8, 3);
    assert_eq!(world.contact_count(), 1);

    world.create_joint(FrictionJointDef::new(balls[0], balls[1])).unwrap();
    world.step(DT, 8, 3);
    assert_eq!(world.contact_count(), 0);

    // A colliding joint leaves contacts alone.
    let mut world = World::new(Vec2::ZERO);
    let a = world.create_body(&BodyDef::dynamic()).unwrap();
    world
        .create_fixture(a, FixtureDef::new(Circle::new(0.5)).density(1.0))
        .unwrap();
    let b = world
        .create_body(&BodyDef::dynamic().position(Vec2::new(0.9, 0.0)))
        .unwrap();
    world
        .create_fixture(b, FixtureDef::new(Circle::new(0.5)).density(1.0))
        .unwrap();
    world
        .create_joint(FrictionJointDef::new(a, b).collide_connected(true))
        .unwrap();
    world.step(DT, 8, 3);
    assert_eq!(world.contact_count(), 1);
}

/// A ball held in place by a friction joint against a steady push.
fn pushed_ball(push: Vec2) -> (World, BodyId, JointId) {
    let mut world = World::new(Vec2::ZERO);
    world.set_allow_sleeping(false).unwrap();
    let anchor = world.create_body(&BodyDef::default()).unwrap();
    let ball = world.create_body(&BodyDef::dynamic()).unwrap();
    world
        .create_fixture(ball, FixtureDef::new(Circle::new(0.5)).density(1.0))
        .unwrap();
    let def = FrictionJointDef::new(anchor, ball)
        .initialize(world.body(anchor).unwrap(), world.body(ball).unwrap(), Vec2::ZERO)
        .max_force(push.length() * 4.0)
        .max_torque(1.0);
    let joint = world.create_joint(def).unwrap();
    (world, ball, joint)
}

fn push_and_step(world: &mut World, ball: BodyId, push: Vec2, velocity_iterations: usize) {
    world.body_mut(ball).unwrap().apply_force_to_center(push, true);
    world.step(DT, velocity_iterations, 3);
}

#[test]
fn warm_started_joint_repeats_its_impulse() {
    let push = Vec2::new(3.0, -1.0);
    let (mut world, ball, joint) = pushed_ball(push);

    push_and_step(&mut world, ball, push, 8);
    let first = world.joint_as::<FrictionJoint>(joint).unwrap().linear_impulse();
    assert_relative_eq!(first.x, -push.x * DT, epsilon = 1e-5);
    assert_relative_eq!(first.y, -push.y * DT, epsilon = 1e-5);

    push_and_step(&mut world, ball, push, 8);
    let second = world.joint_as::<FrictionJoint>(joint).unwrap().linear_impulse();
    assert_relative_eq!(second.x, first.x, epsilon = 1e-6);
    assert_relative_eq!(second.y, first.y, epsilon = 1e-6);

    // With no velocity iterations the warm start alone holds the ball.
    push_and_step(&mut world, ball, push, 0);
    let carried = world.joint_as::<FrictionJoint>(joint).unwrap().linear_impulse();
    assert_relative_eq!(carried.x, first.x, epsilon = 1e-6);
    assert_relative_eq!(carried.y, first.y, epsilon = 1e-6);
    assert_relative_eq!(world.body(ball).unwrap().linear_velocity().length(), 0.0, epsilon = 1e-4);
}

#[test]
fn disabling_warm_starting_resets_joint_impulses() {
    let push = Vec2::new(3.0, -1.0);
    let (mut world, ball, joint) = pushed_ball(push);
    push_and_step(&mut world, ball, push, 8);
    push_and_step(&mut world, ball, push, 8);
    assert!(world.joint_as::<FrictionJoint>(joint).unwrap().linear_impulse().length() > 0.0);

    world.set_warm_starting(false).unwrap();
    push_and_step(&mut world, ball, push, 0);

    let friction = world.joint_as::<FrictionJoint>(joint).unwrap();
    assert_eq!(friction.linear_impulse(), Vec2::ZERO);
    assert_eq!(friction.angular_impulse(), 0.0);
    // Nothing held the ball back this time.
    let mass = world.body(ball).unwrap().mass();
    let velocity = world.body(ball).unwrap().linear_velocity();
    assert_relative_eq!(velocity.x, push.x * DT / mass, epsilon = 1e-5);
    assert_relative_eq!(velocity.y, push.y * DT / mass, epsilon = 1e-5);

    // The next solve rebuilds the impulse from zero.
    push_and_step(&mut world, ball, push, 8);
    assert!(world.joint_as::<FrictionJoint>(joint).unwrap().linear_impulse().length() > 0.0);
}
