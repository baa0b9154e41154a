use log::{log_enabled, warn, Level};
use std::time::Instant;

use crate::utils::profiling::Profile;

/// Stages of a world step as they appear in trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStage {
    Step,
    Collide,
    Solve,
    Continuous,
}

impl StepStage {
    pub fn label(self) -> &'static str {
        match self {
            StepStage::Step => "step",
            StepStage::Collide => "step.collide",
            StepStage::Solve => "step.solve",
            StepStage::Continuous => "step.toi",
        }
    }
}

/// Traces entry and exit of one step stage. Does nothing unless trace
/// logging is on.
pub struct StageSpan {
    stage: StepStage,
    start: Option<Instant>,
}

impl StageSpan {
    pub fn enter(stage: StepStage) -> Self {
        let start = log_enabled!(Level::Trace).then(|| {
            log::trace!("enter {}", stage.label());
            Instant::now()
        });
        Self { stage, start }
    }
}

impl Drop for StageSpan {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            log::trace!("leave {} ({} µs)", self.stage.label(), start.elapsed().as_micros());
        }
    }
}

/// Warns when the last step ran longer than `budget_ms`, naming its slowest
/// stage. Returns whether the budget was exceeded.
pub fn warn_if_step_budget_exceeded(profile: &Profile, budget_ms: f32) -> bool {
    let step_ms = profile.step.as_secs_f32() * 1000.0;
    if step_ms <= budget_ms {
        return false;
    }
    let (stage, slowest) = [
        (StepStage::Collide, profile.collide),
        (StepStage::Solve, profile.solve),
        (StepStage::Continuous, profile.solve_toi),
    ]
    .into_iter()
    .max_by_key(|&(_, duration)| duration)
    .unwrap_or((StepStage::Step, profile.step));
    warn!(
        "step took {step_ms:.2} ms (budget {budget_ms:.2} ms), mostly in {} ({:.2} ms)",
        stage.label(),
        slowest.as_secs_f32() * 1000.0
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn budget_check_compares_total_step_time() {
        let profile = Profile {
            step: Duration::from_millis(20),
            solve: Duration::from_millis(15),
            ..Profile::default()
        };
        assert!(warn_if_step_budget_exceeded(&profile, 16.0));
        assert!(!warn_if_step_budget_exceeded(&profile, 25.0));
        assert!(!warn_if_step_budget_exceeded(&Profile::default(), 0.0));
    }

    #[test]
    fn stage_labels_are_namespaced_under_step() {
        for stage in [StepStage::Collide, StepStage::Solve, StepStage::Continuous] {
            assert!(stage.label().starts_with("step."));
        }
        let _span = StageSpan::enter(StepStage::Step);
    }
}
