//! Fixed-horizon trajectory simulation of the controlled conveyor

use control::{AdaptiveConfig, AdaptiveController, ControllerError, Gains};
use serde::{Deserialize, Serialize};
use simcore::{Integrator, IntegratorKind, PlantState, SimContext, SimError, step_count};
use thiserror::Error;

use crate::conveyor::{ConveyorConfig, ConveyorHarness};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Configuration for a complete simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Controller gains and period. The period is also the integration step.
    pub controller: AdaptiveConfig,
    pub conveyor: ConveyorConfig,
    /// Simulated duration (s)
    pub horizon: f64,
    pub initial_state: PlantState,
    pub integrator: IntegratorKind,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            controller: AdaptiveConfig::default(),
            conveyor: ConveyorConfig::default(),
            horizon: 600.0,
            initial_state: PlantState::default(),
            integrator: IntegratorKind::default(),
        }
    }
}

impl SimulationConfig {
    /// Set simulated duration
    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = horizon;
        self
    }

    /// Set integration method
    pub fn with_integrator(mut self, integrator: IntegratorKind) -> Self {
        self.integrator = integrator;
        self
    }

    /// Set initial position and velocity
    pub fn with_initial_state(mut self, position: f64, velocity: f64) -> Self {
        self.initial_state = PlantState::new(position, velocity);
        self
    }

    /// Number of integration steps needed to cover the horizon
    pub fn steps(&self) -> Result<usize, SimulationError> {
        Ok(step_count(self.horizon, self.controller.dt)?)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        self.controller.validate()?;
        self.conveyor.validate()?;
        self.steps()?;
        Ok(())
    }
}

/// One sample of the output series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub time: f64,
    pub position: f64,
    pub velocity: f64,
    pub setpoint: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl TrajectoryRecord {
    pub fn gains(&self) -> Gains {
        Gains {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
        }
    }

    pub fn tracking_error(&self) -> f64 {
        self.setpoint - self.position
    }
}

/// Records reserved up front by [`Simulation::run`]; longer runs grow on demand
const PREALLOCATED_RECORDS: usize = 1 << 16;

/// Ordered series of samples, one per integration step plus the initial state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trajectory {
    records: Vec<TrajectoryRecord>,
}

/// Aggregate figures over a trajectory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySummary {
    pub duration: f64,
    pub final_gains: Gains,
    pub final_error: f64,
    pub max_abs_error: f64,
    pub rms_error: f64,
}

impl Trajectory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: TrajectoryRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TrajectoryRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrajectoryRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TrajectoryRecord> {
        self.records.last()
    }

    /// Extract one column of the series
    pub fn column(&self, f: impl Fn(&TrajectoryRecord) -> f64) -> Vec<f64> {
        self.records.iter().map(f).collect()
    }

    pub fn summary(&self) -> Option<TrajectorySummary> {
        let first = self.records.first()?;
        let last = self.records.last()?;

        let mut max_abs_error: f64 = 0.0;
        let mut sum_sq = 0.0;
        for record in &self.records {
            let e = record.tracking_error();
            max_abs_error = max_abs_error.max(e.abs());
            sum_sq += e * e;
        }

        Some(TrajectorySummary {
            duration: last.time - first.time,
            final_gains: last.gains(),
            final_error: last.tracking_error(),
            max_abs_error,
            rms_error: (sum_sq / self.records.len() as f64).sqrt(),
        })
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a TrajectoryRecord;
    type IntoIter = std::slice::Iter<'a, TrajectoryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Controlled conveyor advanced step by step.
///
/// Owns the controller; the integrator evaluates the plant (and therefore the
/// controller) as many times per step as its method requires.
#[derive(Debug)]
pub struct Simulation {
    controller: AdaptiveController,
    harness: ConveyorHarness,
    integrator: IntegratorKind,
    state: PlantState,
    dt: f64,
    step_index: usize,
}

impl Simulation {
    pub fn new(config: &SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let controller = AdaptiveController::new(config.controller.clone())?;
        let harness = ConveyorHarness::new(config.conveyor.clone())?;
        Ok(Self {
            dt: controller.dt(),
            controller,
            harness,
            integrator: config.integrator,
            state: config.initial_state,
            step_index: 0,
        })
    }

    pub fn time(&self) -> f64 {
        self.step_index as f64 * self.dt
    }

    pub fn state(&self) -> PlantState {
        self.state
    }

    pub fn controller(&self) -> &AdaptiveController {
        &self.controller
    }

    pub fn harness(&self) -> &ConveyorHarness {
        &self.harness
    }

    /// Sample at the current time
    pub fn record(&self) -> TrajectoryRecord {
        let t = self.time();
        let gains = self.controller.gains();
        TrajectoryRecord {
            time: t,
            position: self.state.position,
            velocity: self.state.velocity,
            setpoint: self.harness.setpoint(t),
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
        }
    }

    /// Advance by one integration step and return the sample at the new time
    pub fn step(&mut self) -> TrajectoryRecord {
        let ctx = SimContext {
            dt: self.dt,
            t: self.time(),
        };
        let Self {
            controller,
            harness,
            integrator,
            state,
            ..
        } = self;

        *state = integrator.step(&ctx, *state, |t, s| harness.derivative(t, s, controller));
        self.step_index += 1;
        self.record()
    }

    /// Run `steps` integration steps, returning the initial sample followed by one
    /// sample per step.
    pub fn run(&mut self, steps: usize) -> Trajectory {
        let mut trajectory =
            Trajectory::with_capacity(steps.saturating_add(1).min(PREALLOCATED_RECORDS));
        trajectory.push(self.record());
        for _ in 0..steps {
            trajectory.push(self.step());
        }
        trajectory
    }
}

/// Simulate the configured horizon from the initial state.
pub fn simulate(config: &SimulationConfig) -> Result<Trajectory, SimulationError> {
    let mut simulation = Simulation::new(config)?;
    let steps = config.steps()?;
    log::debug!(
        "simulating {} s in {} steps of {} s with {:?}",
        config.horizon,
        steps,
        config.controller.dt,
        config.integrator
    );

    let trajectory = simulation.run(steps);

    if let Some(summary) = trajectory.summary() {
        log::debug!(
            "simulation finished: final error {:.6}, max |error| {:.6}, gains {:?}",
            summary.final_error,
            summary.max_abs_error,
            summary.final_gains
        );
    }
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn short_config(horizon: f64) -> SimulationConfig {
        SimulationConfig::default().with_horizon(horizon)
    }

    #[test]
    fn test_default_config_matches_reference_run() {
        let config = SimulationConfig::default();
        assert_eq!(config.horizon, 600.0);
        assert_eq!(config.controller.dt, 0.01);
        assert_eq!(config.initial_state, PlantState::new(0.0, 0.0));
        assert_eq!(config.integrator, IntegratorKind::RungeKutta4);
        assert_eq!(config.steps(), Ok(60_000));
    }

    #[test]
    fn test_series_layout() {
        let trajectory = simulate(&short_config(1.0)).expect("valid config");

        assert_eq!(trajectory.len(), 101);
        let first = trajectory.records()[0];
        assert_eq!(first.time, 0.0);
        assert_eq!(first.position, 0.0);
        assert_eq!(first.velocity, 0.0);
        assert_eq!(first.gains(), Gains { kp: 1.0, ki: 0.0, kd: 0.0 });

        for (k, record) in trajectory.iter().enumerate() {
            assert_abs_diff_eq!(record.time, k as f64 * 0.01, epsilon = 1e-12);
            assert_abs_diff_eq!(
                record.setpoint,
                1.0 + 0.2 * (0.1 * record.time).sin(),
                epsilon = 1e-12
            );
            assert!(record.gains().within_bounds());
        }
    }

    #[test]
    fn test_acceleration_limit_bounds_velocity() {
        let trajectory = simulate(&short_config(2.0)).expect("valid config");
        for record in &trajectory {
            // |dv/dt| <= 0.1 from rest
            assert!(record.velocity.abs() <= 0.1 * record.time + 1e-9);
        }
        // Far below the setpoint the belt accelerates forward at the limit
        let last = trajectory.last().expect("non-empty");
        assert_abs_diff_eq!(last.velocity, 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(last.position, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_euler_evaluates_controller_once_per_step() {
        let config = short_config(0.05).with_integrator(IntegratorKind::SemiImplicitEuler);
        let mut sim = Simulation::new(&config).expect("valid config");
        sim.run(config.steps().expect("valid config"));
        assert_eq!(sim.controller().error_history().len(), 5);

        let config = short_config(0.05);
        let mut sim = Simulation::new(&config).expect("valid config");
        sim.run(config.steps().expect("valid config"));
        assert_eq!(sim.controller().error_history().len(), 20);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let config = short_config(3.0);
        let a = simulate(&config).expect("valid config");
        let b = simulate(&config).expect("valid config");
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = SimulationConfig::default();
        config.controller.dt = 0.0;
        assert!(matches!(
            simulate(&config),
            Err(SimulationError::Controller(ControllerError::InvalidTimestep(_)))
        ));

        let config = short_config(-1.0);
        assert!(matches!(
            Simulation::new(&config),
            Err(SimulationError::Sim(SimError::InvalidHorizon(_)))
        ));
    }

    #[test]
    fn test_rejects_unrepresentable_step_count() {
        let mut config = short_config(1e300);
        config.controller.dt = 1e-300;
        assert!(matches!(
            config.validate(),
            Err(SimulationError::Sim(SimError::TooManySteps { .. }))
        ));
        assert!(matches!(
            simulate(&config),
            Err(SimulationError::Sim(SimError::TooManySteps { .. }))
        ));

        let mut config = short_config(1e6);
        config.controller.dt = 1e-9;
        assert!(matches!(
            Simulation::new(&config),
            Err(SimulationError::Sim(SimError::TooManySteps { .. }))
        ));
    }

    #[test]
    fn test_summary() {
        let mut trajectory = Trajectory::default();
        assert!(trajectory.summary().is_none());

        for (t, position) in [(0.0, 0.0), (1.0, 0.5), (2.0, 1.0)] {
            trajectory.push(TrajectoryRecord {
                time: t,
                position,
                velocity: 0.0,
                setpoint: 1.0,
                kp: 1.0,
                ki: 0.0,
                kd: 0.0,
            });
        }
        let summary = trajectory.summary().expect("non-empty");
        assert_eq!(summary.duration, 2.0);
        assert_eq!(summary.final_error, 0.0);
        assert_eq!(summary.max_abs_error, 1.0);
        assert_abs_diff_eq!(summary.rms_error, (1.25f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: SimulationConfig = serde_json::from_str(
            r#"{ "horizon": 12.5, "controller": { "kp": 0.5 }, "integrator": "semi_implicit_euler" }"#,
        )
        .expect("valid json");

        assert_eq!(config.horizon, 12.5);
        assert_eq!(config.controller.kp, 0.5);
        assert_eq!(config.controller.dt, 0.01);
        assert_eq!(config.integrator, IntegratorKind::SemiImplicitEuler);
        assert_eq!(config.conveyor, ConveyorConfig::default());
    }
}
