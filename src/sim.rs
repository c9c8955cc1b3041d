//! Simulated robot
//!
//! In-process implementation of [`RobotControl`] and [`ChoreographyClient`].
//! Models estop and power state, license checks, routine validation and an
//! execution timeline driven by `tokio::time`, and counts every call so
//! callers can see which operations reached the robot.

use crate::{
    animation::AnimatedMove,
    client::{
        ChoreographyClient, ClientResult, ExecuteResponse, ExecutionRequest, MoveInfo, RobotControl, SequenceInfo,
        StatusSample,
    },
    config::SimulatorConfig,
    error::ClientError,
    routine::RoutineDefinition,
    status::{ChoreographyStatus, ExecuteStatus},
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Moves every simulated robot knows out of the box
pub const BUILTIN_MOVES: &[&str] = &[
    "body_hold",
    "bourree",
    "butt_circle",
    "chicken_head",
    "figure8",
    "hop",
    "jump",
    "kneel_circles",
    "pace_2step",
    "rotate_body",
    "running_man",
    "step",
    "sway",
    "twerk",
];

/// Number of calls received per operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub is_estopped: usize,
    pub power_on: usize,
    pub upload_animated_move: usize,
    pub list_all_sequences: usize,
    pub list_all_moves: usize,
    pub upload_choreography: usize,
    pub execute_choreography: usize,
    pub get_choreography_status: usize,
}

#[derive(Debug, Clone)]
struct Execution {
    routine: String,
    slices_per_minute: f64,
    started: Instant,
    duration: Duration,
}

#[derive(Debug)]
struct SimState {
    estopped: bool,
    powered: bool,
    licensed: bool,
    time_scale: f64,
    stall: bool,
    fault_status: Option<ChoreographyStatus>,
    execute_status: Option<ExecuteStatus>,
    known_moves: Vec<String>,
    animations: Vec<String>,
    sequences: Vec<RoutineDefinition>,
    execution: Option<Execution>,
    calls: CallCounts,
}

impl SimState {
    fn knows_move(&self, move_type: &str) -> bool {
        self.known_moves.iter().any(|m| m == move_type) || self.animations.iter().any(|a| a == move_type)
    }

    fn validate(&self, routine: &RoutineDefinition, non_strict: bool) -> Vec<String> {
        let mut warnings = Vec::new();
        if routine.name.is_empty() {
            warnings.push("Sequence has no name".to_string());
        }
        let mut expected_start = 0;
        for (index, m) in routine.moves.iter().enumerate() {
            if !self.knows_move(&m.move_type) {
                warnings.push(format!("Move {} ('{}') is not a known move", index, m.move_type));
            }
            if m.requested_slices <= 0 {
                warnings.push(format!(
                    "Move {} ('{}') requests {} slices",
                    index, m.move_type, m.requested_slices
                ));
            }
            if !non_strict && m.start_slice != expected_start {
                warnings.push(format!(
                    "Move {} ('{}') starts at slice {}, expected {}",
                    index, m.move_type, m.start_slice, expected_start
                ));
            }
            expected_start = m.start_slice.saturating_add(m.requested_slices);
        }
        warnings
    }
}

/// An in-process robot
#[derive(Debug)]
pub struct SimulatedRobot {
    state: Mutex<SimState>,
}

impl Default for SimulatedRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRobot {
    /// A powered-down, licensed robot that knows the built-in moves
    pub fn new() -> Self {
        Self::from_config(&SimulatorConfig::default())
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        let known_moves = config
            .known_moves
            .clone()
            .unwrap_or_else(|| BUILTIN_MOVES.iter().map(|m| m.to_string()).collect());
        let sequences = config
            .preloaded_sequences
            .iter()
            .flatten()
            .map(|name| RoutineDefinition {
                name: name.clone(),
                slices_per_minute: 0.0,
                moves: Vec::new(),
                choreography_info: None,
            })
            .collect();

        Self {
            state: Mutex::new(SimState {
                estopped: config.estopped(),
                powered: false,
                licensed: config.licensed(),
                time_scale: config.time_scale(),
                stall: config.stall(),
                fault_status: config.fault_status.map(ChoreographyStatus::from_code),
                execute_status: config.execute_status.map(ExecuteStatus::from_code),
                known_moves,
                animations: Vec::new(),
                sequences,
                execution: None,
                calls: CallCounts::default(),
            }),
        }
    }

    pub async fn set_estopped(&self, estopped: bool) {
        let mut state = self.state.lock().await;
        state.estopped = estopped;
        if estopped {
            state.powered = false;
        }
    }

    pub async fn set_licensed(&self, licensed: bool) {
        self.state.lock().await.licensed = licensed;
    }

    pub async fn set_stall(&self, stall: bool) {
        self.state.lock().await.stall = stall;
    }

    /// Report `status` halfway through the routine instead of completing it
    pub async fn set_fault_status(&self, status: Option<ChoreographyStatus>) {
        self.state.lock().await.fault_status = status;
    }

    /// Force the result code of execute requests
    pub async fn set_execute_status(&self, status: Option<ExecuteStatus>) {
        self.state.lock().await.execute_status = status;
    }

    pub async fn calls(&self) -> CallCounts {
        self.state.lock().await.calls.clone()
    }

    pub async fn is_powered(&self) -> bool {
        self.state.lock().await.powered
    }

    pub async fn sequence(&self, name: &str) -> Option<RoutineDefinition> {
        let state = self.state.lock().await;
        state.sequences.iter().find(|s| s.name == name).cloned()
    }
}

#[async_trait]
impl RobotControl for SimulatedRobot {
    async fn is_estopped(&self) -> ClientResult<bool> {
        let mut state = self.state.lock().await;
        state.calls.is_estopped += 1;
        Ok(state.estopped)
    }

    async fn power_on(&self) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        state.calls.power_on += 1;
        if state.estopped {
            return Err(ClientError::Rpc("cannot power on motors while estopped".to_string()));
        }
        if !state.powered {
            info!("Simulated robot powered on");
        }
        state.powered = true;
        Ok(())
    }
}

#[async_trait]
impl ChoreographyClient for SimulatedRobot {
    async fn upload_animated_move(&self, animation: &AnimatedMove, name: &str) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        state.calls.upload_animated_move += 1;
        if !state.licensed {
            return Err(ClientError::Authorization(
                "robot license does not include choreography".to_string(),
            ));
        }
        if animation.keyframes.is_empty() {
            return Err(ClientError::Validation {
                message: "Animation is invalid".to_string(),
                warnings: vec![format!("Animation '{}' has no keyframes", name)],
            });
        }
        if !state.animations.iter().any(|a| a == name) {
            state.animations.push(name.to_string());
        }
        Ok(())
    }

    async fn list_all_sequences(&self) -> ClientResult<Vec<SequenceInfo>> {
        let mut state = self.state.lock().await;
        state.calls.list_all_sequences += 1;
        Ok(state
            .sequences
            .iter()
            .map(|s| SequenceInfo { name: s.name.clone() })
            .collect())
    }

    async fn list_all_moves(&self) -> ClientResult<Vec<MoveInfo>> {
        let mut state = self.state.lock().await;
        state.calls.list_all_moves += 1;
        Ok(state
            .known_moves
            .iter()
            .chain(state.animations.iter())
            .map(|name| MoveInfo {
                name: name.clone(),
                is_extendable: false,
            })
            .collect())
    }

    async fn upload_choreography(&self, routine: &RoutineDefinition, non_strict: bool) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        state.calls.upload_choreography += 1;
        if !state.licensed {
            return Err(ClientError::Authorization(
                "robot license does not include choreography".to_string(),
            ));
        }

        let warnings = state.validate(routine, non_strict);
        if !warnings.is_empty() {
            return Err(ClientError::Validation {
                message: "Choreography sequence is invalid".to_string(),
                warnings,
            });
        }

        state.sequences.retain(|s| s.name != routine.name);
        state.sequences.push(routine.clone());
        debug!("Simulated robot stored routine '{}'", routine.name);
        Ok(())
    }

    async fn execute_choreography(&self, request: &ExecutionRequest) -> ClientResult<ExecuteResponse> {
        let mut state = self.state.lock().await;
        state.calls.execute_choreography += 1;

        if let Some(status) = state.execute_status {
            return Ok(ExecuteResponse { status });
        }
        if state.estopped || !state.powered {
            return Ok(ExecuteResponse {
                status: ExecuteStatus::RobotCommandIssues,
            });
        }
        let routine = match state.sequences.iter().find(|s| s.name == request.routine_name) {
            Some(routine) => routine.clone(),
            None => {
                return Ok(ExecuteResponse {
                    status: ExecuteStatus::InvalidUploadedChoreography,
                })
            }
        };

        let runtime = routine.estimated_seconds().unwrap_or(0.0) * state.time_scale;
        state.execution = Some(Execution {
            routine: routine.name.clone(),
            slices_per_minute: routine.slices_per_minute,
            started: Instant::now(),
            duration: Duration::try_from_secs_f64(runtime).unwrap_or(Duration::MAX),
        });
        info!("Simulated robot dancing '{}' for {:.2}s", routine.name, runtime);
        Ok(ExecuteResponse {
            status: ExecuteStatus::Ok,
        })
    }

    async fn get_choreography_status(&self) -> ClientResult<StatusSample> {
        let mut state = self.state.lock().await;
        state.calls.get_choreography_status += 1;

        let execution = match &state.execution {
            Some(execution) => execution.clone(),
            None => {
                return Ok(StatusSample {
                    status: ChoreographyStatus::Unknown,
                    current_slice: None,
                })
            }
        };

        if state.estopped {
            return Ok(StatusSample {
                status: ChoreographyStatus::PoweredOff,
                current_slice: None,
            });
        }

        let elapsed = execution.started.elapsed();
        let current_slice = Some(elapsed.as_secs_f64() * execution.slices_per_minute / 60.0 / state.time_scale);
        let status = match state.fault_status {
            _ if state.stall => ChoreographyStatus::Dancing,
            Some(fault) if elapsed >= execution.duration / 2 => fault,
            _ if elapsed >= execution.duration => ChoreographyStatus::CompletedSequence,
            _ => ChoreographyStatus::Dancing,
        };
        debug!("Simulated status for '{}': {}", execution.routine, status);
        Ok(StatusSample { status, current_slice })
    }
}
