//! Conveyor belt simulation with adaptive PID control
//!
//! Usage: `conveyor-sim [config.json]`
//!
//! Runs the configured horizon, logs a summary and writes the requested artifacts
//! (CSV/JSON series, PNG plot).

mod config;
mod error;
mod output;
mod plot;

use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use crate::config::AppConfig;
use crate::error::AppError;

fn run(config: AppConfig) -> Result<(), AppError> {
    let sim = &config.simulation;
    log::info!(
        "simulating {} s (dt = {} s, {:?}, {} derivative evaluations per step)",
        sim.horizon,
        sim.controller.dt,
        sim.integrator,
        sim.integrator.evaluations_per_step()
    );

    let trajectory = mechanics::simulate(sim)?;

    if let Some(summary) = trajectory.summary() {
        log::info!(
            "final gains kp={:.4} ki={:.4} kd={:.4}",
            summary.final_gains.kp,
            summary.final_gains.ki,
            summary.final_gains.kd
        );
        log::info!(
            "tracking error: final {:.6}, max |e| {:.6}, rms {:.6}",
            summary.final_error,
            summary.max_abs_error,
            summary.rms_error
        );
    }

    if let Some(path) = &config.output.csv {
        output::save_csv(&trajectory, path)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(path) = &config.output.json {
        output::save_json(&trajectory, path)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(path) = &config.output.plot {
        plot::draw_trajectory(&trajectory, path).map_err(|e| AppError::Plot(e.to_string()))?;
        println!("Simulation complete. Results saved to '{}'", path.display());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    TermLogger::init(
        config.level_filter()?,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .map_err(AppError::from)?;
    match &config_path {
        Some(path) => log::info!("loaded configuration from {path}"),
        None => log::info!("no configuration file given, using defaults"),
    }

    run(config)?;
    Ok(())
}
