//! Conveyor belt plant driven by the adaptive controller
//!
//! The controller output is interpreted as a commanded belt speed. The plant tracks it
//! with an acceleration bounded by the drive, against time-varying viscous friction,
//! while a sinusoidal disturbance perturbs the command.

use control::AdaptiveController;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use simcore::{PlantState, SimError};

/// `offset + amplitude * f(frequency * t)` for `f` = sin or cos
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sinusoid {
    pub offset: f64,
    pub amplitude: f64,
    /// Angular frequency (rad/s)
    pub frequency: f64,
}

impl Sinusoid {
    pub const fn new(offset: f64, amplitude: f64, frequency: f64) -> Self {
        Self {
            offset,
            amplitude,
            frequency,
        }
    }

    pub fn sin_at(&self, t: f64) -> f64 {
        self.offset + self.amplitude * (self.frequency * t).sin()
    }

    pub fn cos_at(&self, t: f64) -> f64 {
        self.offset + self.amplitude * (self.frequency * t).cos()
    }
}

/// Configuration for the conveyor plant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConveyorConfig {
    /// Commanded speed limit (m/s)
    pub max_speed: f64,
    /// Drive acceleration limit (m/s^2)
    pub max_acceleration: f64,
    /// Position target, evaluated with sin
    pub setpoint: Sinusoid,
    /// Additive speed disturbance, evaluated with sin
    pub disturbance: Sinusoid,
    /// Viscous friction coefficient, evaluated with cos
    pub friction: Sinusoid,
}

impl Default for ConveyorConfig {
    fn default() -> Self {
        Self {
            max_speed: 2.0,
            max_acceleration: 0.1,
            setpoint: Sinusoid::new(1.0, 0.2, 0.1),
            disturbance: Sinusoid::new(0.0, 0.1, 0.5),
            friction: Sinusoid::new(0.05, 0.02, 0.3),
        }
    }
}

impl ConveyorConfig {
    /// Set speed and acceleration limits
    pub fn with_limits(mut self, max_speed: f64, max_acceleration: f64) -> Self {
        self.max_speed = max_speed;
        self.max_acceleration = max_acceleration;
        self
    }

    pub fn validate(&self) -> Result<(), SimError> {
        for (name, value) in [
            ("max_speed", self.max_speed),
            ("max_acceleration", self.max_acceleration),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidLimit { name, value });
            }
        }
        Ok(())
    }
}

/// Turns controller output into the plant state derivative.
///
/// Holds no state besides its configuration; the controller is borrowed per call.
#[derive(Debug, Clone)]
pub struct ConveyorHarness {
    config: ConveyorConfig,
}

impl ConveyorHarness {
    pub fn new(config: ConveyorConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ConveyorConfig {
        &self.config
    }

    pub fn setpoint(&self, t: f64) -> f64 {
        self.config.setpoint.sin_at(t)
    }

    pub fn disturbance(&self, t: f64) -> f64 {
        self.config.disturbance.sin_at(t)
    }

    pub fn friction(&self, t: f64) -> f64 {
        self.config.friction.cos_at(t)
    }

    /// State derivative `[velocity, acceleration]` at time `t`.
    ///
    /// Runs exactly one controller cycle per call.
    pub fn derivative(
        &self,
        t: f64,
        state: &PlantState,
        controller: &mut AdaptiveController,
    ) -> Vector2<f64> {
        let max_speed = self.config.max_speed;
        let max_acceleration = self.config.max_acceleration;

        let setpoint = self.setpoint(t);
        let desired_speed = controller.compute(setpoint, state.position) + self.disturbance(t);
        let desired_speed = desired_speed.clamp(-max_speed, max_speed);

        // Acceleration needed to reach the commanded speed within one control period
        let mut acceleration = (desired_speed - state.velocity) / controller.dt();
        acceleration -= self.friction(t) * state.velocity;
        let acceleration = acceleration.clamp(-max_acceleration, max_acceleration);

        Vector2::new(state.velocity, acceleration)
    }
}
