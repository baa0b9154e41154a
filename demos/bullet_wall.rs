use planar_accelerator::{
    config::{DEFAULT_POSITION_ITERATIONS, DEFAULT_TIME_STEP, DEFAULT_VELOCITY_ITERATIONS},
    utils::logging::warn_if_step_budget_exceeded,
    *,
};

/// Fires a handful of bullets at a thin wall and reports where they stopped.
fn main() -> Result<(), WorldError> {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let ground = world.create_body(&BodyDef::default())?;
    world.create_fixture(
        ground,
        FixtureDef::new(Segment::new(Vec2::new(-20.0, 0.0), Vec2::new(20.0, 0.0))),
    )?;
    world.create_fixture(
        ground,
        FixtureDef::new(Segment::new(Vec2::new(5.0, 0.0), Vec2::new(5.0, 10.0))),
    )?;

    let mut bullets = Vec::new();
    for i in 0..5 {
        let bullet = world.create_body(
            &BodyDef::dynamic()
                .position(Vec2::new(-5.0, 1.0 + i as f32 * 1.5))
                .linear_velocity(Vec2::new(500.0, 0.0))
                .bullet(true),
        )?;
        world.create_fixture(bullet, FixtureDef::new(Circle::new(0.1)).density(5.0))?;
        bullets.push(bullet);
    }

    for _ in 0..120 {
        world.step(
            DEFAULT_TIME_STEP,
            DEFAULT_VELOCITY_ITERATIONS,
            DEFAULT_POSITION_ITERATIONS,
        );
        warn_if_step_budget_exceeded(world.profile(), DEFAULT_TIME_STEP * 1000.0);
    }

    for (i, bullet) in bullets.iter().enumerate() {
        if let Some(body) = world.body(*bullet) {
            println!(
                "bullet {i}: x = {:.3}, y = {:.3}, awake = {}",
                body.position().x,
                body.position().y,
                body.is_awake()
            );
        }
    }
    println!("contacts: {}, joints: {}", world.contact_count(), world.joint_count());
    Ok(())
}
