use control::{AdaptiveConfig, AdaptiveController};
use std::fs::File;
use std::io::Write;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dt = 0.01;
    let t_end = 20.0;
    let setpoint = 1.0;

    let mut ctrl = AdaptiveController::new(AdaptiveConfig::default().with_dt(dt))?;

    // Pure integrator plant: the controller output is the velocity
    let mut position = 0.0;

    let mut csv = File::create("adaptive_step_response.csv")?;
    writeln!(csv, "t,position,output,integral,kp,ki,kd")?;

    let steps = (t_end / dt) as usize;
    for k in 0..steps {
        let t = k as f64 * dt;
        let output = ctrl.compute(setpoint, position);
        position += output * dt;

        writeln!(
            csv,
            "{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            t,
            position,
            output,
            ctrl.integral(),
            ctrl.kp(),
            ctrl.ki(),
            ctrl.kd()
        )?;
    }

    println!("Wrote adaptive_step_response.csv");
    Ok(())
}
