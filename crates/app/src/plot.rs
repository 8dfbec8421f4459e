use std::path::Path;

use mechanics::Trajectory;
use plotters::prelude::*;

/// Min/max over all series, widened when flat so the axis is drawable
fn value_range(series: &[&[f64]]) -> (f64, f64) {
    let (min, max) = series
        .iter()
        .flat_map(|s| s.iter().copied())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() || !max.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = ((max - min) * 0.05).max(1e-3);
    (min - pad, max + pad)
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    title: &str,
    y_label: &str,
    time: &[f64],
    series: &[(&str, &[f64], RGBColor)],
) -> Result<(), Box<dyn std::error::Error>>
where
    DB::ErrorType: 'static,
{
    let t_min = time.first().copied().unwrap_or(0.0);
    let t_max = time.last().copied().unwrap_or(1.0).max(t_min + 1e-9);
    let values: Vec<&[f64]> = series.iter().map(|(_, v, _)| *v).collect();
    let (y_min, y_max) = value_range(&values);

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("Arial", 22))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d(t_min..t_max, y_min..y_max)?;

    chart.configure_mesh().x_desc("Time").y_desc(y_label).draw()?;

    for (label, values, color) in series {
        let color = *color;
        chart
            .draw_series(LineSeries::new(
                time.iter().copied().zip(values.iter().copied()),
                &color,
            ))?
            .label(*label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

/// Position against setpoint, velocity, and gains over time, stacked vertically
pub fn draw_trajectory(
    trajectory: &Trajectory,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let time = trajectory.column(|r| r.time);
    let position = trajectory.column(|r| r.position);
    let setpoint = trajectory.column(|r| r.setpoint);
    let velocity = trajectory.column(|r| r.velocity);
    let kp = trajectory.column(|r| r.kp);
    let ki = trajectory.column(|r| r.ki);
    let kd = trajectory.column(|r| r.kd);

    let root = BitMapBackend::new(path, (1400, 1200)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((3, 1));

    draw_panel(
        &panels[0],
        "Position Over Time with Adaptive PID Control",
        "Position",
        &time,
        &[
            ("Position", position.as_slice(), RED),
            ("Setpoint", setpoint.as_slice(), BLUE),
        ],
    )?;
    draw_panel(
        &panels[1],
        "Velocity Over Time with Adaptive PID Control",
        "Velocity",
        &time,
        &[("Velocity", velocity.as_slice(), GREEN)],
    )?;
    draw_panel(
        &panels[2],
        "Adaptive PID Parameters Over Time",
        "PID Parameters",
        &time,
        &[
            ("Kp", kp.as_slice(), RED),
            ("Ki", ki.as_slice(), GREEN),
            ("Kd", kd.as_slice(), BLUE),
        ],
    )?;

    root.present()?;
    Ok(())
}
