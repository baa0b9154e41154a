use std::time::{Duration, Instant};

/// Timing breakdown of the most recent step.
#[derive(Debug, Default, Clone, Copy)]
pub struct Profile {
    pub step: Duration,
    pub collide: Duration,
    pub solve: Duration,
    pub solve_init: Duration,
    pub solve_velocity: Duration,
    pub solve_position: Duration,
    pub broadphase: Duration,
    pub solve_toi: Duration,

    pub body_count: usize,
    pub contact_count: usize,
    pub island_count: usize,
    pub toi_events: usize,
}

impl Profile {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Emits the breakdown at debug level.
    pub fn report(&self) {
        let total_us = self.step.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        log::debug!(
            "step {:.2} ms | bodies {} contacts {} islands {} toi {}",
            self.step.as_secs_f32() * 1000.0,
            self.body_count,
            self.contact_count,
            self.island_count,
            self.toi_events
        );
        for (label, duration) in [
            ("collide", self.collide),
            ("solve", self.solve),
            ("  init", self.solve_init),
            ("  velocity", self.solve_velocity),
            ("  position", self.solve_position),
            ("broadphase", self.broadphase),
            ("solve_toi", self.solve_toi),
        ] {
            log::debug!(
                "  {label:<12} {:.2} ms ({:.1}%)",
                duration.as_secs_f32() * 1000.0,
                (duration.as_micros() as f32 / total_us) * 100.0
            );
        }
    }
}

/// Per-island timings, merged into the world [`Profile`] after solving.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolverTimings {
    pub init: Duration,
    pub velocity: Duration,
    pub position: Duration,
}

impl SolverTimings {
    pub fn merge_into(&self, profile: &mut Profile) {
        profile.solve_init += self.init;
        profile.solve_velocity += self.velocity;
        profile.solve_position += self.position;
    }
}

/// Adds the elapsed time of a scope to a duration slot.
pub struct ScopedTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
