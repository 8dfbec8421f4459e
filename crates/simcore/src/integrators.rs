use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::{PlantState, SimContext};

/// A generic integration strategy trait.
///
/// The derivative function receives the evaluation time and state and returns
/// `[d position/dt, d velocity/dt]`. It may be called several times per step and is
/// allowed to mutate whatever it captures (a controller, for instance).
pub trait Integrator {
    /// Advances the state from `ctx.t` to `ctx.t + ctx.dt`.
    fn step<F>(&self, ctx: &SimContext, state: PlantState, derivative: F) -> PlantState
    where
        F: FnMut(f64, &PlantState) -> Vector2<f64>;
}

/// Semi-implicit Euler integrator (Symplectic Euler).
/// This is first-order accurate but conserves energy better than explicit Euler.
/// Evaluates the derivative exactly once per step.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemiImplicitEuler;

impl Integrator for SemiImplicitEuler {
    fn step<F>(&self, ctx: &SimContext, state: PlantState, mut derivative: F) -> PlantState
    where
        F: FnMut(f64, &PlantState) -> Vector2<f64>,
    {
        let dt = ctx.dt;
        let d = derivative(ctx.t, &state);

        // Semi-implicit: use the NEW velocity to update position.
        let velocity = state.velocity + d[1] * dt;
        let position = state.position + velocity * dt;
        PlantState { position, velocity }
    }
}

/// Fourth-order Runge-Kutta integrator.
/// More accurate than Euler methods but evaluates the derivative four times per step.
#[derive(Debug, Clone, Copy, Default)]
pub struct RungeKutta4;

impl Integrator for RungeKutta4 {
    fn step<F>(&self, ctx: &SimContext, state: PlantState, mut derivative: F) -> PlantState
    where
        F: FnMut(f64, &PlantState) -> Vector2<f64>,
    {
        let dt = ctx.dt;
        let half = 0.5 * dt;
        let y = state.to_vector();

        let k1 = derivative(ctx.t, &state);
        let k2 = derivative(ctx.t + half, &PlantState::from(y + k1 * half));
        let k3 = derivative(ctx.t + half, &PlantState::from(y + k2 * half));
        let k4 = derivative(ctx.t + dt, &PlantState::from(y + k3 * dt));

        PlantState::from(y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0))
    }
}

/// Integrator selection for configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    SemiImplicitEuler,
    #[default]
    RungeKutta4,
}

impl IntegratorKind {
    /// Number of derivative evaluations per step
    pub fn evaluations_per_step(self) -> usize {
        match self {
            IntegratorKind::SemiImplicitEuler => 1,
            IntegratorKind::RungeKutta4 => 4,
        }
    }
}

impl Integrator for IntegratorKind {
    fn step<F>(&self, ctx: &SimContext, state: PlantState, derivative: F) -> PlantState
    where
        F: FnMut(f64, &PlantState) -> Vector2<f64>,
    {
        match self {
            IntegratorKind::SemiImplicitEuler => SemiImplicitEuler.step(ctx, state, derivative),
            IntegratorKind::RungeKutta4 => RungeKutta4.step(ctx, state, derivative),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn constant_acceleration(_t: f64, s: &PlantState) -> Vector2<f64> {
        Vector2::new(s.velocity, 2.0)
    }

    #[test]
    fn test_semi_implicit_euler() {
        let state = PlantState::new(0.0, 1.0);
        let ctx = SimContext { dt: 0.1, t: 0.0 };

        let next = SemiImplicitEuler.step(&ctx, state, constant_acceleration);

        // Velocity first, then position with the new velocity
        assert_abs_diff_eq!(next.velocity, 1.2, epsilon = 1e-12);
        assert_abs_diff_eq!(next.position, 0.12, epsilon = 1e-12);
    }

    #[test]
    fn test_rk4_exact_for_constant_acceleration() {
        let mut state = PlantState::new(0.0, 1.0);
        let dt = 0.1;
        for i in 0..10 {
            let ctx = SimContext { dt, t: i as f64 * dt };
            state = RungeKutta4.step(&ctx, state, constant_acceleration);
        }

        // x = v0 t + a t^2 / 2 at t = 1
        assert_abs_diff_eq!(state.position, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(state.velocity, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rk4_harmonic_oscillator_accuracy() {
        let omega = 2.0;
        let mut state = PlantState::new(1.0, 0.0);
        let dt = 0.01;
        let steps = 100;
        for i in 0..steps {
            let ctx = SimContext { dt, t: i as f64 * dt };
            state = RungeKutta4.step(&ctx, state, |_t, s| {
                Vector2::new(s.velocity, -omega * omega * s.position)
            });
        }

        let t = dt * steps as f64;
        assert_abs_diff_eq!(state.position, (omega * t).cos(), epsilon = 1e-8);
        assert_abs_diff_eq!(state.velocity, -omega * (omega * t).sin(), epsilon = 1e-8);
    }

    #[test]
    fn test_evaluation_counts_and_times() {
        let ctx = SimContext { dt: 0.2, t: 1.0 };
        for kind in [IntegratorKind::SemiImplicitEuler, IntegratorKind::RungeKutta4] {
            let mut times = Vec::new();
            kind.step(&ctx, PlantState::default(), |t, s| {
                times.push(t);
                Vector2::new(s.velocity, 0.0)
            });
            assert_eq!(times.len(), kind.evaluations_per_step());
            assert_eq!(times[0], 1.0);
        }
    }

    #[test]
    fn test_default_kind_is_rk4() {
        assert_eq!(IntegratorKind::default(), IntegratorKind::RungeKutta4);
    }
}
