//! Dance Controller
//!
//! Orchestrates the choreography workflow on a robot: precondition checks,
//! routine parsing and upload, power on, execution start, and completion
//! polling bounded by the routine's own estimated runtime.
//!
//! Every failure except a completion timeout is reported as an unsuccessful
//! [`DanceResponse`]. A timeout leaves the robot in an unknown state and is
//! returned as [`CommandTimedOut`] so callers must handle it explicitly.

use crate::{
    client::{AnimationConverter, ChoreographyClient, ClientResult, ExecutionRequest, RobotControl, StatusSample},
    config::DanceConfig,
    error::{CommandTimedOut, DanceFailure},
    json_output::{current_timestamp, DanceResponse, ListResponse},
    poller::{poll_until_terminal, PollOutcome, PollSchedule, PollTick},
    routine::RoutineDefinition,
    telemetry::{DanceTelemetry, NoOpTelemetry, OutcomeEvent, StatusSampleEvent},
};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Routines always start from the top
const START_SLICE: i32 = 0;
/// Let the service accept routines that only produce recoverable warnings
const NON_STRICT_UPLOAD: bool = true;

/// Why an execution attempt stopped early
#[derive(Debug)]
enum Interrupt {
    Failed(DanceFailure),
    TimedOut(CommandTimedOut),
}

impl From<DanceFailure> for Interrupt {
    fn from(failure: DanceFailure) -> Self {
        Interrupt::Failed(failure)
    }
}

fn unclassified(err: impl Display) -> Interrupt {
    Interrupt::Failed(DanceFailure::Unclassified(err.to_string()))
}

/// Uploads and executes choreography on one robot session.
///
/// `execute_dance` takes `&mut self`, so a controller can have at most one
/// execution in flight.
pub struct DanceController {
    robot: Arc<dyn RobotControl>,
    choreography: Arc<dyn ChoreographyClient>,
    converter: Arc<dyn AnimationConverter>,
    telemetry: Arc<dyn DanceTelemetry>,
    poll_interval: Duration,
    completion_grace: Duration,
}

impl DanceController {
    pub fn new(
        robot: Arc<dyn RobotControl>,
        choreography: Arc<dyn ChoreographyClient>,
        converter: Arc<dyn AnimationConverter>,
    ) -> Self {
        let defaults = DanceConfig::default();
        Self {
            robot,
            choreography,
            converter,
            telemetry: Arc::new(NoOpTelemetry),
            poll_interval: defaults.poll_interval(),
            completion_grace: defaults.completion_grace(),
        }
    }

    /// Apply polling settings from configuration
    pub fn with_config(mut self, config: &DanceConfig) -> Self {
        self.poll_interval = config.poll_interval();
        self.completion_grace = config.completion_grace();
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn DanceTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Convert an animation clip and upload it as a named move
    pub async fn upload_animation(&self, animation_name: &str, animation_file_content: &str) -> DanceResponse {
        if animation_name.is_empty() || animation_name.contains(['/', '\\']) || animation_name.starts_with('.') {
            return DanceResponse::failure(format!("Invalid animation name '{}'", animation_name));
        }

        // Removed when dropped, on every return path
        let staging = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => return DanceResponse::failure(format!("Failed to stage animation file: {}", e)),
        };
        let path = staging.path().join(format!("{}.cha", animation_name));
        if let Err(e) = tokio::fs::write(&path, animation_file_content).await {
            return DanceResponse::failure(format!("Failed to stage animation file: {}", e));
        }

        let animation = match self.converter.convert(&path) {
            Ok(animation) => animation,
            Err(e) => {
                warn!("Animation '{}' could not be converted: {}", animation_name, e);
                return DanceResponse::failure(format!(
                    "Animation conversion failed: unable to convert '{}': {}",
                    animation_name, e
                ));
            }
        };

        info!(
            "Uploading animation '{}' ({} keyframes)",
            animation_name,
            animation.keyframe_count()
        );
        match self.choreography.upload_animated_move(&animation, animation_name).await {
            Ok(()) => DanceResponse::success("Success"),
            Err(e) => {
                error!("Animation upload failed: {}", e);
                DanceResponse::failure(format!("Animation upload failed: {}", e))
            }
        }
    }

    /// Names of all uploaded routines, in service order
    pub async fn list_all_dances(&self) -> ListResponse {
        match self.choreography.list_all_sequences().await {
            Ok(sequences) => ListResponse::success(sequences.into_iter().map(|s| s.name).collect()),
            Err(e) => {
                warn!("Listing routines failed: {}", e);
                ListResponse::failure(format!("list_all_sequences failed: {}", e))
            }
        }
    }

    /// Names of all available moves, in service order
    pub async fn list_all_moves(&self) -> ListResponse {
        match self.choreography.list_all_moves().await {
            Ok(moves) => ListResponse::success(moves.into_iter().map(|m| m.name).collect()),
            Err(e) => {
                warn!("Listing moves failed: {}", e);
                ListResponse::failure(format!("list_all_moves failed: {}", e))
            }
        }
    }

    /// Upload and execute a routine, waiting for it to finish
    pub async fn execute_dance(&mut self, routine_text: &str) -> Result<DanceResponse, CommandTimedOut> {
        let execution_id = Uuid::new_v4();

        let routine = match self.prepare(routine_text).await {
            Ok(routine) => routine,
            Err(failure) => {
                warn!("Dance {} rejected: {}", execution_id, failure);
                self.report(execution_id, None, Some(failure.kind()), &failure.to_string())
                    .await;
                return Ok(DanceResponse::failure(failure.to_string()));
            }
        };

        match self.perform(execution_id, &routine).await {
            Ok(()) => {
                info!("Routine '{}' completed", routine.name);
                self.report(execution_id, Some(&routine.name), None, "success").await;
                Ok(DanceResponse::success("success"))
            }
            Err(Interrupt::Failed(failure)) => {
                warn!("Routine '{}' failed: {}", routine.name, failure);
                self.report(
                    execution_id,
                    Some(&routine.name),
                    Some(failure.kind()),
                    &failure.to_string(),
                )
                .await;
                Ok(DanceResponse::failure(failure.to_string()))
            }
            Err(Interrupt::TimedOut(timeout)) => {
                error!("Routine '{}' state unknown: {}", routine.name, timeout);
                self.report(execution_id, Some(&routine.name), Some("timeout"), &timeout.to_string())
                    .await;
                Err(timeout)
            }
        }
    }

    /// Estop check and parse; nothing is sent to the choreography service
    async fn prepare(&self, routine_text: &str) -> Result<RoutineDefinition, DanceFailure> {
        let estopped = self
            .robot
            .is_estopped()
            .await
            .map_err(|e| DanceFailure::Unclassified(e.to_string()))?;
        if estopped {
            return Err(DanceFailure::Estopped);
        }

        let routine = RoutineDefinition::parse(routine_text)?;
        debug!(
            "Parsed routine '{}': {} moves at {} slices/min",
            routine.name,
            routine.moves.len(),
            routine.slices_per_minute
        );
        debug!("Routine '{}':\n{}", routine.name, routine.to_text());
        Ok(routine)
    }

    async fn perform(&self, execution_id: Uuid, routine: &RoutineDefinition) -> Result<(), Interrupt> {
        self.choreography
            .upload_choreography(routine, NON_STRICT_UPLOAD)
            .await
            .map_err(DanceFailure::from_upload_error)?;
        info!("Uploaded routine '{}' ({} moves)", routine.name, routine.moves.len());

        self.robot.power_on().await.map_err(unclassified)?;

        let request = ExecutionRequest {
            routine_name: routine.name.clone(),
            client_start_time: current_timestamp(),
            start_slice: START_SLICE,
        };
        let response = self
            .choreography
            .execute_choreography(&request)
            .await
            .map_err(unclassified)?;
        if !response.status.is_ok() {
            return Err(DanceFailure::ExecutionStart(response.status).into());
        }

        let estimate = routine.estimated_duration().map_err(unclassified)?;
        let schedule = PollSchedule::for_estimate(estimate, self.poll_interval, self.completion_grace);
        info!(
            "Executing routine '{}' (execution {}), expected to take {:.2}s",
            routine.name,
            execution_id,
            estimate.as_secs_f64()
        );

        let routine_name = routine.name.as_str();
        let outcome = poll_until_terminal(
            schedule,
            move |tick| self.sample_status(execution_id, routine_name, tick),
            |sample: &StatusSample| sample.status.is_terminal(),
        )
        .await
        .map_err(unclassified)?;

        match outcome {
            PollOutcome::Terminal { sample, .. } if sample.status.is_success() => Ok(()),
            PollOutcome::Terminal { sample, .. } => Err(DanceFailure::Runtime(sample.status).into()),
            PollOutcome::TimedOut { samples, elapsed } => Err(Interrupt::TimedOut(CommandTimedOut {
                routine: routine.name.clone(),
                elapsed_secs: elapsed.as_secs_f64(),
                samples,
            })),
        }
    }

    /// Fetch one status sample and log it before it is classified
    async fn sample_status(&self, execution_id: Uuid, routine: &str, tick: PollTick) -> ClientResult<StatusSample> {
        let sample = self.choreography.get_choreography_status().await?;
        info!("Choreography status: {}", sample.status);

        let event = StatusSampleEvent {
            execution_id,
            routine: routine.to_string(),
            attempt: tick.attempt,
            elapsed_secs: tick.elapsed.as_secs_f64(),
            status: sample.status,
            status_code: sample.status.code(),
            current_slice: sample.current_slice,
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.telemetry.publish_status(&event).await {
            debug!("Failed to publish status sample: {}", e);
        }
        Ok(sample)
    }

    async fn report(&self, execution_id: Uuid, routine: Option<&str>, failure_kind: Option<&str>, message: &str) {
        let event = OutcomeEvent {
            execution_id,
            routine: routine.map(str::to_string),
            success: failure_kind.is_none(),
            failure_kind: failure_kind.map(str::to_string),
            message: message.to_string(),
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.telemetry.publish_outcome(&event).await {
            debug!("Failed to publish outcome: {}", e);
        }
    }
}
