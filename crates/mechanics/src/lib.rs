pub mod conveyor;
pub mod simulation;

pub use conveyor::{ConveyorConfig, ConveyorHarness, Sinusoid};
pub use simulation::{
    Simulation, SimulationConfig, SimulationError, Trajectory, TrajectoryRecord,
    TrajectorySummary, simulate,
};
