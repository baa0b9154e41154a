//! Time of impact by conservative advancement over two sweeps.

use crate::{
    collision::{narrowphase::core_distance, shapes::DistanceProxy},
    config::{LINEAR_SLOP, MAX_TOI_ITERATIONS},
    core::types::Sweep,
};

#[derive(Debug, Clone, Copy)]
pub struct ToiInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Upper bound of the sweep parameter to search.
    pub t_max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToiState {
    Unknown,
    Failed,
    Overlapped,
    Touching,
    Separated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f32,
    pub iterations: usize,
}

/// Finds the first sweep parameter at which the shapes come within
/// `LINEAR_SLOP` of touching.
///
/// Each iteration measures the core distance and advances by the largest
/// step that cannot close more than the remaining gap, bounding closing speed
/// by the projected linear motion plus the rotational sweep of each core.
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let sweep_a = normalized(input.sweep_a);
    let sweep_b = normalized(input.sweep_b);
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;

    let bound_a = proxy_a.bound_radius(sweep_a.local_center);
    let bound_b = proxy_b.bound_radius(sweep_b.local_center);
    let delta_a = sweep_a.c - sweep_a.c0;
    let delta_b = sweep_b.c - sweep_b.c0;
    let spin = (sweep_a.a - sweep_a.a0).abs() * bound_a + (sweep_b.a - sweep_b.a0).abs() * bound_b;

    let mut t = 0.0;
    for iteration in 0..MAX_TOI_ITERATIONS {
        let xf_a = sweep_a.transform_at(t);
        let xf_b = sweep_b.transform_at(t);
        let core = core_distance(proxy_a, &xf_a, proxy_b, &xf_b);

        if core.distance <= 0.0 {
            return ToiOutput {
                state: ToiState::Overlapped,
                t: 0.0,
                iterations: iteration + 1,
            };
        }

        if core.distance < target + tolerance {
            return ToiOutput {
                state: ToiState::Touching,
                t,
                iterations: iteration + 1,
            };
        }

        let closing_speed = (delta_a - delta_b).dot(core.normal) + spin;
        if closing_speed <= f32::EPSILON {
            return ToiOutput {
                state: ToiState::Separated,
                t: input.t_max,
                iterations: iteration + 1,
            };
        }

        t += (core.distance - target) / closing_speed;
        if t >= input.t_max {
            return ToiOutput {
                state: ToiState::Separated,
                t: input.t_max,
                iterations: iteration + 1,
            };
        }
    }

    log::debug!("time of impact did not converge, last t = {t}");
    ToiOutput {
        state: ToiState::Failed,
        t,
        iterations: MAX_TOI_ITERATIONS,
    }
}

fn normalized(mut sweep: Sweep) -> Sweep {
    sweep.normalize();
    sweep
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn linear_sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            c0: from,
            c: to,
            ..Sweep::default()
        }
    }

    #[test]
    fn head_on_circles_touch_midway() {
        let input = ToiInput {
            proxy_a: DistanceProxy::point(Vec2::ZERO, 0.5),
            proxy_b: DistanceProxy::point(Vec2::ZERO, 0.5),
            sweep_a: linear_sweep(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0)),
            sweep_b: linear_sweep(Vec2::new(2.0, 0.0), Vec2::new(-2.0, 0.0)),
            t_max: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Touching);
        let expected = (4.0 - (1.0 - 3.0 * LINEAR_SLOP)) / 8.0;
        assert!((output.t - expected).abs() < 1e-3, "t = {}", output.t);
    }

    #[test]
    fn diverging_shapes_separate() {
        let input = ToiInput {
            proxy_a: DistanceProxy::point(Vec2::ZERO, 0.5),
            proxy_b: DistanceProxy::point(Vec2::ZERO, 0.5),
            sweep_a: linear_sweep(Vec2::new(-2.0, 0.0), Vec2::new(-4.0, 0.0)),
            sweep_b: linear_sweep(Vec2::new(2.0, 0.0), Vec2::new(4.0, 0.0)),
            t_max: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Separated);
        assert_eq!(output.t, 1.0);
    }

    #[test]
    fn fast_circle_against_thin_segment() {
        let input = ToiInput {
            proxy_a: DistanceProxy::segment(Vec2::new(0.0, -5.0), Vec2::new(0.0, 5.0), 0.01),
            proxy_b: DistanceProxy::point(Vec2::ZERO, 0.25),
            sweep_a: linear_sweep(Vec2::ZERO, Vec2::ZERO),
            sweep_b: linear_sweep(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)),
            t_max: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Touching);
        assert!(output.t > 0.4 && output.t < 0.5, "t = {}", output.t);
    }
}
