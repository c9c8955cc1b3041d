//! Spot Dance - choreography upload and execution for legged robots
//!
//! Uploads choreographed routines and animation clips to a robot, starts
//! execution, and tracks it to completion or failure. The robot is reached
//! only through the capability traits in [`client`]; transport and session
//! handling belong to whoever implements them.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use spot_dance::{ChaConverter, DanceController, SimulatedRobot};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let robot = Arc::new(SimulatedRobot::new());
//!     let mut controller = DanceController::new(robot.clone(), robot, Arc::new(ChaConverter::new()));
//!
//!     let routine = std::fs::read_to_string("demos/routines/two_step.csq")?;
//!     let response = controller.execute_dance(&routine).await?;
//!     println!("{}: {}", response.success, response.message);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **DanceController**: the execution workflow and operator operations
//! - **RoutineDefinition**: strictly parsed routine plus duration estimate
//! - **poller**: timed-retry loop bounding completion polling
//! - **RobotControl / ChoreographyClient / AnimationConverter**: robot seams
//! - **DanceTelemetry**: sink for structured status and outcome events
//! - **SimulatedRobot**: in-process robot for the CLI and tests

pub mod animation;
pub mod client;
pub mod config;
pub mod dance;
pub mod error;
pub mod json_output;
pub mod logging;
pub mod poller;
pub mod routine;
pub mod sim;
pub mod status;
pub mod telemetry;
pub mod text_format;

// High-level exports for easy usage
pub use dance::DanceController;
pub use config::{DaemonConfig, DanceConfig, SimulatorConfig};
pub use error::{ClientError, CommandTimedOut, DanceFailure, Result, SpotDanceError};
pub use json_output::{DanceResponse, ListResponse};
pub use routine::{Move, RoutineDefinition};
pub use status::{ChoreographyStatus, ExecuteStatus};

// Capability and component exports
pub use animation::{AnimatedMove, ChaConverter, ConversionError};
pub use client::{
    AnimationConverter, ChoreographyClient, ExecuteResponse, ExecutionRequest, MoveInfo, RobotControl,
    SequenceInfo, StatusSample,
};
pub use poller::{poll_until_terminal, PollOutcome, PollSchedule, PollTick};
pub use sim::{CallCounts, SimulatedRobot};
pub use telemetry::{ConsoleTelemetry, DanceTelemetry, NoOpTelemetry, OutcomeEvent, StatusSampleEvent};
pub use text_format::ParseError;
