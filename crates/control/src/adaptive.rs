//! Adaptive PID Controller
//!
//! A PID controller that retunes its own gains every cycle from statistics of the
//! recent error history. Gains, integral and output are all hard-bounded.
//!
//! Adaptation law, applied once per `compute` when at least
//! [`MIN_ADAPTATION_SAMPLES`] errors are recorded:
//! - Kp grows by [`GAIN_GROWTH`] while the error trend over the last [`TREND_WINDOW`]
//!   errors is small relative to their magnitude, otherwise shrinks by [`KP_SHRINK`].
//! - Ki grows while the absolute error sum over the last [`SUM_WINDOW`] errors exceeds
//!   `5 * integral_limit`, otherwise shrinks by [`KI_KD_SHRINK`].
//! - Kd grows while the last error step exceeds 10% of the last error magnitude,
//!   otherwise shrinks by [`KI_KD_SHRINK`].

use serde::{Deserialize, Serialize};
use simcore::Model;
use thiserror::Error;

use crate::history::ErrorHistory;

/// Symmetric clamp applied to the controller output
pub const OUTPUT_LIMIT: f64 = 10.0;
/// Symmetric clamp applied to the integral accumulator
pub const INTEGRAL_LIMIT: f64 = 2.0;
/// Integral decay factor used while the proportional term is saturated
pub const INTEGRAL_DECAY: f64 = 0.9;
/// Stored for configuration parity; the adaptation law does not read it
pub const ADAPTATION_RATE: f64 = 0.001;

pub const MIN_ADAPTATION_SAMPLES: usize = 10;
pub const TREND_WINDOW: usize = 10;
pub const SUM_WINDOW: usize = 20;

pub const GAIN_GROWTH: f64 = 1.05;
pub const KP_SHRINK: f64 = 0.95;
pub const KI_KD_SHRINK: f64 = 0.99;

pub const KP_RANGE: GainRange = GainRange::new(0.1, 3.0);
pub const KI_RANGE: GainRange = GainRange::new(0.0, 0.5);
pub const KD_RANGE: GainRange = GainRange::new(0.0, 5.0);

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ControllerError {
    #[error("control period must be positive and finite, got {0}")]
    InvalidTimestep(f64),
}

/// Closed interval a gain is held within
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRange {
    pub min: f64,
    pub max: f64,
}

impl GainRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Proportional, integral and derivative gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Gains {
    pub fn within_bounds(&self) -> bool {
        KP_RANGE.contains(self.kp) && KI_RANGE.contains(self.ki) && KD_RANGE.contains(self.kd)
    }
}

/// Configuration for an adaptive PID controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Initial proportional gain
    pub kp: f64,
    /// Initial integral gain
    pub ki: f64,
    /// Initial derivative gain
    pub kd: f64,
    /// Control period (s)
    pub dt: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            dt: 0.01,
        }
    }
}

impl AdaptiveConfig {
    /// Set initial gains
    pub fn with_gains(mut self, kp: f64, ki: f64, kd: f64) -> Self {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self
    }

    /// Set control period
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.dt.is_finite() && self.dt > 0.0 {
            Ok(())
        } else {
            Err(ControllerError::InvalidTimestep(self.dt))
        }
    }
}

/// Error statistics the adaptation law is driven by
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorStatistics {
    /// |e[-1]|
    pub magnitude: f64,
    /// |e[-1] - e[-2]|
    pub change: f64,
    /// Sum of |e| over the last `SUM_WINDOW` errors
    pub sum: f64,
    /// Sum of consecutive differences over the last `TREND_WINDOW` errors
    pub trend: f64,
    /// Sum of |e| over the last `TREND_WINDOW` errors
    pub trend_scale: f64,
}

impl ErrorStatistics {
    /// Returns `None` until enough errors are recorded for adaptation
    pub fn from_history<const N: usize>(history: &ErrorHistory<N>) -> Option<Self> {
        if history.len() < MIN_ADAPTATION_SAMPLES {
            return None;
        }
        let last = history.nth_back(0)?;
        let previous = history.nth_back(1)?;

        let sum = history.recent(SUM_WINDOW).map(f64::abs).fold(0.0, |acc, e| acc + e);
        let trend = history
            .recent(TREND_WINDOW)
            .zip(history.recent(TREND_WINDOW).skip(1))
            .map(|(a, b)| b - a)
            .fold(0.0, |acc, d| acc + d);
        let trend_scale = history
            .recent(TREND_WINDOW)
            .map(f64::abs)
            .fold(0.0, |acc, e| acc + e);

        Some(Self {
            magnitude: last.abs(),
            change: (last - previous).abs(),
            sum,
            trend,
            trend_scale,
        })
    }
}

/// Self-tuning PID controller.
///
/// Owned by exactly one control loop: every state change goes through `&mut self`.
#[derive(Debug)]
pub struct AdaptiveController {
    gains: Gains,
    dt: f64,
    integral: f64,
    previous_error: f64,
    output_limit: f64,
    integral_limit: f64,
    adaptation_rate: f64,
    history: ErrorHistory,
}

impl Default for AdaptiveController {
    fn default() -> Self {
        Self::build(AdaptiveConfig::default())
    }
}

impl AdaptiveController {
    /// Create a controller, rejecting a non-positive or non-finite control period.
    ///
    /// Initial gains outside their ranges are clamped into them here, so the
    /// bounds already hold during the warm-up before adaptation starts instead of
    /// only after the first adaptation step.
    pub fn new(config: AdaptiveConfig) -> Result<Self, ControllerError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: AdaptiveConfig) -> Self {
        let gains = Gains {
            kp: KP_RANGE.clamp(config.kp),
            ki: KI_RANGE.clamp(config.ki),
            kd: KD_RANGE.clamp(config.kd),
        };
        if gains.kp != config.kp || gains.ki != config.ki || gains.kd != config.kd {
            log::warn!(
                "initial gains (kp={}, ki={}, kd={}) clamped to (kp={}, ki={}, kd={})",
                config.kp,
                config.ki,
                config.kd,
                gains.kp,
                gains.ki,
                gains.kd
            );
        }
        log::debug!(
            "adaptive controller created: kp={} ki={} kd={} dt={}",
            gains.kp,
            gains.ki,
            gains.kd,
            config.dt
        );
        Self {
            gains,
            dt: config.dt,
            integral: 0.0,
            previous_error: 0.0,
            output_limit: OUTPUT_LIMIT,
            integral_limit: INTEGRAL_LIMIT,
            adaptation_rate: ADAPTATION_RATE,
            history: ErrorHistory::new(),
        }
    }

    /// Run one control cycle and return the saturated output.
    ///
    /// Must be called once per control period; the controller has no clock of its own.
    pub fn compute(&mut self, setpoint: f64, measured_value: f64) -> f64 {
        let error = setpoint - measured_value;
        self.history.push(error);

        self.adapt_parameters();

        // Proportional term
        let p_term = self.gains.kp * error;

        // Saturation of P (not of the total output) gates integration
        if p_term > -self.output_limit && p_term < self.output_limit {
            self.integral += error * self.dt;
        } else {
            self.integral *= INTEGRAL_DECAY;
        }
        self.integral = self.integral.clamp(-self.integral_limit, self.integral_limit);
        let i_term = self.gains.ki * self.integral;

        // Unfiltered derivative on error
        let derivative = (error - self.previous_error) / self.dt;
        let d_term = self.gains.kd * derivative;

        let output = (p_term + i_term + d_term).clamp(-self.output_limit, self.output_limit);

        self.previous_error = error;
        output
    }

    /// Apply one step of the adaptation law to the gains.
    ///
    /// Called by `compute` before the gains are used; a no-op until
    /// `MIN_ADAPTATION_SAMPLES` errors have been recorded.
    pub fn adapt_parameters(&mut self) {
        let Some(stats) = ErrorStatistics::from_history(&self.history) else {
            return;
        };

        if stats.trend.abs() < 0.1 * stats.trend_scale {
            self.gains.kp *= GAIN_GROWTH;
        } else {
            self.gains.kp *= KP_SHRINK;
        }

        if stats.sum.abs() > 5.0 * self.integral_limit {
            self.gains.ki *= GAIN_GROWTH;
        } else {
            self.gains.ki *= KI_KD_SHRINK;
        }

        if stats.change > 0.1 * stats.magnitude {
            self.gains.kd *= GAIN_GROWTH;
        } else {
            self.gains.kd *= KI_KD_SHRINK;
        }

        self.gains.kp = KP_RANGE.clamp(self.gains.kp);
        self.gains.ki = KI_RANGE.clamp(self.gains.ki);
        self.gains.kd = KD_RANGE.clamp(self.gains.kd);

        log::trace!(
            "gains adapted: kp={:.6} ki={:.6} kd={:.6} (trend={:.6}, sum={:.6}, change={:.6})",
            self.gains.kp,
            self.gains.ki,
            self.gains.kd,
            stats.trend,
            stats.sum,
            stats.change
        );
    }

    /// Clear integral, previous error and error history. Gains are kept.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
        self.history.clear();
        log::debug!("adaptive controller reset");
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn kp(&self) -> f64 {
        self.gains.kp
    }

    pub fn ki(&self) -> f64 {
        self.gains.ki
    }

    pub fn kd(&self) -> f64 {
        self.gains.kd
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Get the current integral accumulator value
    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn previous_error(&self) -> f64 {
        self.previous_error
    }

    pub fn output_limit(&self) -> f64 {
        self.output_limit
    }

    pub fn integral_limit(&self) -> f64 {
        self.integral_limit
    }

    pub fn adaptation_rate(&self) -> f64 {
        self.adaptation_rate
    }

    pub fn error_history(&self) -> &ErrorHistory {
        &self.history
    }
}

impl Model for AdaptiveController {
    fn reset(&mut self) {
        AdaptiveController::reset(self);
    }
}
