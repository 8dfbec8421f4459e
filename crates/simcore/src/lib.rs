//! Core simulation types shared by the controller and plant crates
//!
//! This crate provides:
//! - Plant state and step context passed between models
//! - The `Model` trait implemented by every stateful simulation component
//! - Fixed-step integrators driven by a derivative function

pub mod integrators;

pub use integrators::*;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position/velocity pair of a single-axis plant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlantState {
    pub position: f64,
    pub velocity: f64,
}

impl PlantState {
    pub fn new(position: f64, velocity: f64) -> Self {
        PlantState { position, velocity }
    }

    /// State as a column vector `[position, velocity]`
    pub fn to_vector(self) -> Vector2<f64> {
        Vector2::new(self.position, self.velocity)
    }
}

impl From<Vector2<f64>> for PlantState {
    fn from(v: Vector2<f64>) -> Self {
        PlantState {
            position: v[0],
            velocity: v[1],
        }
    }
}

impl From<PlantState> for Vector2<f64> {
    fn from(state: PlantState) -> Self {
        state.to_vector()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimContext {
    pub dt: f64,
    pub t: f64,
}

pub trait Model {
    fn reset(&mut self);
}

/// Errors raised while validating a simulation setup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("integration step must be positive and finite, got {0}")]
    InvalidStep(f64),
    #[error("simulation horizon must be positive and finite, got {0}")]
    InvalidHorizon(f64),
    #[error("limit `{name}` must be positive and finite, got {value}")]
    InvalidLimit { name: &'static str, value: f64 },
    #[error("horizon {horizon} s at step {dt} s exceeds {max} integration steps", max = MAX_STEPS)]
    TooManySteps { horizon: f64, dt: f64 },
}

/// Upper bound on the number of fixed steps in one run
pub const MAX_STEPS: usize = 10_000_000;

/// Check that a step size is usable by the integrators.
pub fn validate_step(dt: f64) -> Result<f64, SimError> {
    if dt.is_finite() && dt > 0.0 {
        Ok(dt)
    } else {
        log::trace!("rejected integration step {dt}");
        Err(SimError::InvalidStep(dt))
    }
}

/// Number of fixed steps of size `dt` covering `horizon`, at most [`MAX_STEPS`].
pub fn step_count(horizon: f64, dt: f64) -> Result<usize, SimError> {
    let dt = validate_step(dt)?;
    if !(horizon.is_finite() && horizon > 0.0) {
        return Err(SimError::InvalidHorizon(horizon));
    }
    let steps = (horizon / dt).round();
    // NaN-safe: only finite counts in range pass
    if !(steps <= MAX_STEPS as f64) {
        return Err(SimError::TooManySteps { horizon, dt });
    }
    log::trace!("{horizon} s at {dt} s is {steps} steps");
    Ok(steps as usize)
}
