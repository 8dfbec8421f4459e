//! Control systems for the conveyor plant
//!
//! This crate provides:
//! - A self-tuning PID controller with anti-windup and output saturation
//! - The bounded error history the controller adapts its gains from

pub mod adaptive;
pub mod history;

pub use adaptive::*;
pub use history::*;
