use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use planar_accelerator::*;

#[test]
fn world_is_send_and_sync() {
    fn assert_sync_send<T: Sync + Send>() {}
    assert_sync_send::<World>();
}

/// Several independent stacks of balls on separate static floors, with a
/// friction joint in every other stack.
fn scattered_stacks(parallel: bool) -> (World, Vec<BodyId>) {
    let mut world = World::default();
    world.set_parallel_islands(parallel).unwrap();
    let mut balls = Vec::new();

    for stack in 0..6 {
        let x = stack as f32 * 10.0;
        let floor = world
            .create_body(&BodyDef::default().position(Vec2::new(x, 0.0)))
            .unwrap();
        world
            .create_fixture(
                floor,
                FixtureDef::new(Segment::new(Vec2::new(-3.0, 0.0), Vec2::new(3.0, 0.0))),
            )
            .unwrap();

        let mut previous = None;
        for level in 0..4 {
            let ball = world
                .create_body(
                    &BodyDef::dynamic().position(Vec2::new(x + 0.1 * level as f32, 0.5 + level as f32)),
                )
                .unwrap();
            world
                .create_fixture(
                    ball,
                    FixtureDef::new(Circle::new(0.5)).density(1.0).friction(0.4),
                )
                .unwrap();
            if stack % 2 == 0 {
                if let Some(previous) = previous {
                    world
                        .create_joint(FrictionJointDef::new(previous, ball).max_force(2.0))
                        .unwrap();
                }
            }
            previous = Some(ball);
            balls.push(ball);
        }
    }
    (world, balls)
}

#[test]
fn parallel_islands_match_sequential_results() {
    let (mut sequential, seq_balls) = scattered_stacks(false);
    let (mut parallel, par_balls) = scattered_stacks(true);

    for _ in 0..120 {
        sequential.step(1.0 / 60.0, 8, 3);
        parallel.step(1.0 / 60.0, 8, 3);
    }

    assert_eq!(sequential.profile().island_count, parallel.profile().island_count);
    for (a, b) in seq_balls.iter().zip(&par_balls) {
        let a = sequential.body(*a).unwrap();
        let b = parallel.body(*b).unwrap();
        assert_eq!(a.position(), b.position());
        assert_eq!(a.angle(), b.angle());
        assert_eq!(a.linear_velocity(), b.linear_velocity());
        assert_eq!(a.is_awake(), b.is_awake());
    }
}

#[test]
fn shared_world_steps_across_threads() {
    let (world, balls) = scattered_stacks(true);
    let world = Arc::new(Mutex::new(world));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let world = Arc::clone(&world);
            thread::spawn(move || {
                world.lock().step(1.0 / 60.0, 8, 3);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let world = world.lock();
    assert!(balls
        .iter()
        .all(|&ball| world.body(ball).unwrap().position().is_finite()));
}
