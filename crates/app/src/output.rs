use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use mechanics::Trajectory;

use crate::error::AppError;

pub const CSV_HEADER: &str = "time,position,velocity,setpoint,kp,ki,kd";

pub fn write_csv<W: Write>(trajectory: &Trajectory, mut out: W) -> std::io::Result<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for r in trajectory {
        writeln!(
            out,
            "{:.6},{:.9},{:.9},{:.9},{:.9},{:.9},{:.9}",
            r.time, r.position, r.velocity, r.setpoint, r.kp, r.ki, r.kd
        )?;
    }
    out.flush()
}

pub fn save_csv(trajectory: &Trajectory, path: &Path) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    write_csv(trajectory, BufWriter::new(file)).map_err(|e| AppError::io(path, e))
}

pub fn save_json(trajectory: &Trajectory, path: &Path) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer(&mut out, trajectory)?;
    out.flush().map_err(|e| AppError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechanics::TrajectoryRecord;

    fn sample() -> Trajectory {
        let mut trajectory = Trajectory::default();
        trajectory.push(TrajectoryRecord {
            time: 0.0,
            position: 0.0,
            velocity: 0.0,
            setpoint: 1.0,
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
        });
        trajectory.push(TrajectoryRecord {
            time: 0.01,
            position: 0.000005,
            velocity: 0.001,
            setpoint: 1.001,
            kp: 1.05,
            ki: 0.0,
            kd: 0.0,
        });
        trajectory
    }

    #[test]
    fn test_csv_layout() {
        let mut buf = Vec::new();
        write_csv(&sample(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[2],
            "0.010000,0.000005000,0.001000000,1.001000000,1.050000000,0.000000000,0.000000000"
        );
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let path = std::env::temp_dir().join("conveyor_sim_output_test.json");
        let trajectory = sample();
        save_json(&trajectory, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: Trajectory = serde_json::from_str(&text).unwrap();
        assert_eq!(back, trajectory);
        // Serialised as a plain array of records
        assert!(text.starts_with('['));

        std::fs::remove_file(&path).ok();
    }
}
