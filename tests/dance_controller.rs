//! Integration tests for the dance execution workflow.
//!
//! These tests drive `DanceController` end-to-end against scripted robot
//! doubles and the simulated robot, on tokio's paused clock so multi-second
//! routines run instantly:
//! - Precondition and parse failures never reach the service
//! - Upload error classification (license, warnings, generic)
//! - Execution start and runtime status failures
//! - Completion polling bounded by the estimated runtime, and timeouts

use async_trait::async_trait;
use spot_dance::{
    AnimatedMove, AnimationConverter, ChaConverter, ChoreographyClient, ChoreographyStatus, ClientError,
    ConversionError, DanceConfig, DanceController, DanceTelemetry, ExecuteResponse, ExecuteStatus, ExecutionRequest,
    MoveInfo, OutcomeEvent, RobotControl, RoutineDefinition, SequenceInfo, SimulatedRobot, StatusSample,
    StatusSampleEvent,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// Test Helpers
// =============================================================================

/// Two moves of 10 and 20 slices at 300 slices/min: 6.0 seconds
const ROUTINE: &str = r#"
name: "two_step"
slices_per_minute: 300
moves {
  type: "bourree"
  start_slice: 0
  requested_slices: 10
}
moves {
  type: "sway"
  start_slice: 10
  requested_slices: 20
}
"#;

#[derive(Clone)]
enum Timeline {
    /// Dancing until the duration has passed since execute, then this status
    FinishAfter(Duration, ChoreographyStatus),
    /// Dancing forever
    Never,
    /// Status requests fail
    Broken,
}

#[derive(Default, Debug, Clone)]
struct Calls {
    is_estopped: usize,
    power_on: usize,
    upload_animated_move: usize,
    upload_choreography: usize,
    execute_choreography: usize,
    get_choreography_status: usize,
    uploaded: Vec<String>,
    executed: Vec<ExecutionRequest>,
}

struct ScriptedRobot {
    estopped: bool,
    power_error: Option<ClientError>,
    upload_error: Option<ClientError>,
    execute_status: ExecuteStatus,
    timeline: Timeline,
    sequences: Result<Vec<&'static str>, ClientError>,
    started: Mutex<Option<Instant>>,
    calls: Mutex<Calls>,
}

impl ScriptedRobot {
    fn completing() -> Self {
        Self {
            estopped: false,
            power_error: None,
            upload_error: None,
            execute_status: ExecuteStatus::Ok,
            timeline: Timeline::FinishAfter(Duration::from_secs(6), ChoreographyStatus::CompletedSequence),
            sequences: Ok(vec!["one", "two", "three"]),
            started: Mutex::new(None),
            calls: Mutex::new(Calls::default()),
        }
    }

    fn calls(&self) -> Calls {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RobotControl for ScriptedRobot {
    async fn is_estopped(&self) -> Result<bool, ClientError> {
        self.calls.lock().unwrap().is_estopped += 1;
        Ok(self.estopped)
    }

    async fn power_on(&self) -> Result<(), ClientError> {
        self.calls.lock().unwrap().power_on += 1;
        match &self.power_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChoreographyClient for ScriptedRobot {
    async fn upload_animated_move(&self, _animation: &AnimatedMove, name: &str) -> Result<(), ClientError> {
        let mut calls = self.calls.lock().unwrap();
        calls.upload_animated_move += 1;
        calls.uploaded.push(name.to_string());
        match &self.upload_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn list_all_sequences(&self) -> Result<Vec<SequenceInfo>, ClientError> {
        self.sequences
            .clone()
            .map(|names| names.into_iter().map(|n| SequenceInfo { name: n.to_string() }).collect())
    }

    async fn list_all_moves(&self) -> Result<Vec<MoveInfo>, ClientError> {
        Err(ClientError::Rpc("service unavailable".to_string()))
    }

    async fn upload_choreography(&self, routine: &RoutineDefinition, non_strict: bool) -> Result<(), ClientError> {
        assert!(non_strict, "routines are uploaded in non-strict mode");
        let mut calls = self.calls.lock().unwrap();
        calls.upload_choreography += 1;
        calls.uploaded.push(routine.name.clone());
        match &self.upload_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn execute_choreography(&self, request: &ExecutionRequest) -> Result<ExecuteResponse, ClientError> {
        let mut calls = self.calls.lock().unwrap();
        calls.execute_choreography += 1;
        calls.executed.push(request.clone());
        *self.started.lock().unwrap() = Some(Instant::now());
        Ok(ExecuteResponse {
            status: self.execute_status,
        })
    }

    async fn get_choreography_status(&self) -> Result<StatusSample, ClientError> {
        self.calls.lock().unwrap().get_choreography_status += 1;
        let started = self.started.lock().unwrap().unwrap_or_else(Instant::now);
        let status = match &self.timeline {
            Timeline::FinishAfter(after, status) if started.elapsed() >= *after => *status,
            Timeline::FinishAfter(..) | Timeline::Never => ChoreographyStatus::Dancing,
            Timeline::Broken => return Err(ClientError::Rpc("status stream closed".to_string())),
        };
        Ok(StatusSample {
            status,
            current_slice: None,
        })
    }
}

/// Converter that records the staged path and optionally fails
struct RecordingConverter {
    fail: bool,
    seen: Mutex<Option<(PathBuf, String)>>,
}

impl AnimationConverter for RecordingConverter {
    fn convert(&self, path: &Path) -> Result<AnimatedMove, ConversionError> {
        let content = std::fs::read_to_string(path).unwrap();
        *self.seen.lock().unwrap() = Some((path.to_path_buf(), content));
        if self.fail {
            return Err(ConversionError::NoKeyframes);
        }
        ChaConverter::new().convert(path)
    }
}

#[derive(Default)]
struct RecordingTelemetry {
    statuses: Mutex<Vec<StatusSampleEvent>>,
    outcomes: Mutex<Vec<OutcomeEvent>>,
}

#[async_trait]
impl DanceTelemetry for RecordingTelemetry {
    async fn publish_status(&self, event: &StatusSampleEvent) -> anyhow::Result<()> {
        self.statuses.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn publish_outcome(&self, event: &OutcomeEvent) -> anyhow::Result<()> {
        self.outcomes.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn controller_for(robot: Arc<ScriptedRobot>) -> DanceController {
    DanceController::new(robot.clone(), robot, Arc::new(ChaConverter::new()))
}

// =============================================================================
// Preconditions and parsing
// =============================================================================

#[tokio::test]
async fn test_estopped_robot_fails_without_service_calls() {
    let robot = Arc::new(ScriptedRobot {
        estopped: true,
        ..ScriptedRobot::completing()
    });
    let mut controller = controller_for(robot.clone());

    let response = controller.execute_dance(ROUTINE).await.unwrap();

    assert!(!response.success);
    assert!(response.message.contains("E-Stop"));
    let calls = robot.calls();
    assert_eq!(calls.upload_choreography, 0);
    assert_eq!(calls.execute_choreography, 0);
    assert_eq!(calls.power_on, 0);
}

#[tokio::test]
async fn test_malformed_routine_reports_parser_detail() {
    let robot = Arc::new(ScriptedRobot::completing());
    let mut controller = controller_for(robot.clone());

    for text in [
        "name: \"broken\"\nmoves {\n  type: \"sway\"\n",
        "name: \"x\" tempo: 120",
        "slices_per_minute: \"fast\"",
    ] {
        let expected_detail = RoutineDefinition::parse(text).unwrap_err().to_string();
        let response = controller.execute_dance(text).await.unwrap();
        assert!(!response.success);
        assert!(response.message.starts_with("Failed to load choreography"));
        assert!(
            response.message.contains(&expected_detail),
            "{} should contain {}",
            response.message,
            expected_detail
        );
    }
    assert_eq!(robot.calls().upload_choreography, 0);
}

#[tokio::test]
async fn test_deeply_nested_routine_is_a_parse_failure() {
    let robot = Arc::new(ScriptedRobot::completing());
    let mut controller = controller_for(robot.clone());

    let text = format!("moves {{ type: \"x\" p {}", "{ a ".repeat(200_000));
    let response = controller.execute_dance(&text).await.unwrap();

    assert!(!response.success);
    assert!(response.message.starts_with("Failed to load choreography"));
    assert!(response.message.contains("Max recursion depth is 100"));
    assert_eq!(robot.calls().upload_choreography, 0);
}

// =============================================================================
// Upload classification
// =============================================================================

#[tokio::test]
async fn test_missing_license_is_reported_without_execute() {
    let robot = Arc::new(ScriptedRobot {
        upload_error: Some(ClientError::Authorization("no choreography license".to_string())),
        ..ScriptedRobot::completing()
    });
    let mut controller = controller_for(robot.clone());

    let response = controller.execute_dance(ROUTINE).await.unwrap();

    assert!(!response.success);
    assert!(response.message.contains("license"));
    assert_eq!(robot.calls().execute_choreography, 0);
}

#[tokio::test]
async fn test_validation_warnings_are_concatenated_in_order() {
    let robot = Arc::new(ScriptedRobot {
        upload_error: Some(ClientError::Validation {
            message: "sequence invalid".to_string(),
            warnings: vec!["move 0 unknown".to_string(), "move 1 too short".to_string()],
        }),
        ..ScriptedRobot::completing()
    });
    let mut controller = controller_for(robot.clone());

    let response = controller.execute_dance(ROUTINE).await.unwrap();

    assert!(!response.success);
    assert!(response.message.contains("The following warnings were produced"));
    assert!(response.message.ends_with("move 0 unknown; move 1 too short"));
    assert_eq!(robot.calls().power_on, 0);
}

#[tokio::test]
async fn test_other_upload_errors_are_wrapped() {
    let robot = Arc::new(ScriptedRobot {
        upload_error: Some(ClientError::Rpc("deadline exceeded".to_string())),
        ..ScriptedRobot::completing()
    });
    let mut controller = controller_for(robot);

    let response = controller.execute_dance(ROUTINE).await.unwrap();

    assert!(!response.success);
    assert!(response.message.starts_with("Choreography sequence upload failed"));
    assert!(response.message.contains("deadline exceeded"));
}

// =============================================================================
// Execution and polling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_completes_when_completion_is_observed() {
    let robot = Arc::new(ScriptedRobot::completing());
    let telemetry = Arc::new(RecordingTelemetry::default());
    let mut controller = controller_for(robot.clone()).with_telemetry(telemetry.clone());

    let started = Instant::now();
    let response = controller.execute_dance(ROUTINE).await.unwrap();

    assert!(response.success, "{}", response.message);
    assert_eq!(response.message, "success");
    // success exactly when the t=6.0s sample is observed, not before
    assert_eq!(started.elapsed(), Duration::from_secs(6));

    let calls = robot.calls();
    assert_eq!(calls.power_on, 1);
    assert_eq!(calls.get_choreography_status, 31);
    assert_eq!(calls.executed.len(), 1);
    assert_eq!(calls.executed[0].routine_name, "two_step");
    assert_eq!(calls.executed[0].start_slice, 0);

    let statuses = telemetry.statuses.lock().unwrap();
    assert_eq!(statuses.len(), 31);
    assert!(statuses[..30].iter().all(|e| e.status == ChoreographyStatus::Dancing));
    assert_eq!(statuses[30].status, ChoreographyStatus::CompletedSequence);
    assert!(statuses.windows(2).all(|w| w[0].elapsed_secs < w[1].elapsed_secs));

    let outcomes = telemetry.outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].execution_id, statuses[0].execution_id);
}

#[tokio::test(start_paused = true)]
async fn test_zero_poll_interval_does_not_spin() {
    let robot = Arc::new(ScriptedRobot::completing());
    let config = DanceConfig {
        poll_interval_ms: Some(0),
        ..DanceConfig::default()
    };
    let mut controller = controller_for(robot.clone()).with_config(&config);

    let response = controller.execute_dance(ROUTINE).await.unwrap();

    assert!(response.success);
    assert_eq!(robot.calls().get_choreography_status, 31);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_raised_not_returned() {
    let robot = Arc::new(ScriptedRobot {
        timeline: Timeline::Never,
        ..ScriptedRobot::completing()
    });
    let telemetry = Arc::new(RecordingTelemetry::default());
    let mut controller = controller_for(robot.clone()).with_telemetry(telemetry.clone());

    let started = Instant::now();
    let timeout = controller.execute_dance(ROUTINE).await.unwrap_err();

    assert_eq!(timeout.routine, "two_step");
    assert_eq!(timeout.samples, 31);
    assert_eq!(started.elapsed(), Duration::from_millis(6_200));
    assert!(timeout.to_string().contains("stipulated time"));

    let outcomes = telemetry.outcomes.lock().unwrap();
    assert_eq!(outcomes[0].failure_kind.as_deref(), Some("timeout"));
}

#[tokio::test(start_paused = true)]
async fn test_completion_must_be_sampled_inside_window() {
    let robot = Arc::new(ScriptedRobot {
        timeline: Timeline::FinishAfter(Duration::from_millis(6_100), ChoreographyStatus::CompletedSequence),
        ..ScriptedRobot::completing()
    });
    let mut controller = controller_for(robot.clone());

    // the window closes at 6.2s, so the last sample is taken at 6.0s
    let result = controller.execute_dance(ROUTINE).await;
    assert!(result.is_err());

    let robot = Arc::new(ScriptedRobot {
        timeline: Timeline::FinishAfter(Duration::from_millis(5_900), ChoreographyStatus::CompletedSequence),
        ..ScriptedRobot::completing()
    });
    let mut controller = controller_for(robot);
    assert!(controller.execute_dance(ROUTINE).await.unwrap().success);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_failure_status_is_reported_with_raw_value() {
    let robot = Arc::new(ScriptedRobot {
        timeline: Timeline::FinishAfter(Duration::from_secs(2), ChoreographyStatus::Fallen),
        ..ScriptedRobot::completing()
    });
    let mut controller = controller_for(robot.clone());

    let started = Instant::now();
    let response = controller.execute_dance(ROUTINE).await.unwrap();

    assert!(!response.success);
    assert!(response.message.contains("unsuccessful status"));
    assert!(response.message.contains("7 (STATUS_FALLEN)"));
    // no polling after the terminal sample
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert_eq!(robot.calls().get_choreography_status, 11);
}

#[tokio::test]
async fn test_non_ok_execute_status_fails_with_code() {
    let robot = Arc::new(ScriptedRobot {
        execute_status: ExecuteStatus::LeaseError,
        ..ScriptedRobot::completing()
    });
    let mut controller = controller_for(robot.clone());

    let response = controller.execute_dance(ROUTINE).await.unwrap();

    assert!(!response.success);
    assert!(response.message.contains("Issue calling execute_choreography"));
    assert!(response.message.contains("4 (STATUS_LEASE_ERROR)"));
    assert_eq!(robot.calls().get_choreography_status, 0);
}

#[tokio::test]
async fn test_unclassified_errors_use_catch_all_message() {
    let robot = Arc::new(ScriptedRobot {
        power_error: Some(ClientError::Rpc("motor fault".to_string())),
        ..ScriptedRobot::completing()
    });
    let mut controller = controller_for(robot.clone());
    let response = controller.execute_dance(ROUTINE).await.unwrap();
    assert!(!response.success);
    assert!(response.message.starts_with("Error executing dance:"));
    assert!(response.message.contains("motor fault"));
    assert_eq!(robot.calls().execute_choreography, 0);

    let robot = Arc::new(ScriptedRobot {
        timeline: Timeline::Broken,
        ..ScriptedRobot::completing()
    });
    let mut controller = controller_for(robot);
    let response = controller.execute_dance(ROUTINE).await.unwrap();
    assert!(response.message.starts_with("Error executing dance:"));
    assert!(response.message.contains("status stream closed"));
}

#[tokio::test]
async fn test_invalid_rate_is_an_execution_error() {
    let robot = Arc::new(ScriptedRobot::completing());
    let mut controller = controller_for(robot);
    let response = controller
        .execute_dance("name: \"still\" moves { type: \"sway\" requested_slices: 4 }")
        .await
        .unwrap();
    assert!(!response.success);
    assert!(response.message.starts_with("Error executing dance:"));
    assert!(response.message.contains("slices_per_minute"));
}

#[tokio::test]
async fn test_unrepresentable_runtime_is_an_execution_error() {
    let robot = Arc::new(ScriptedRobot::completing());
    let mut controller = controller_for(robot.clone());
    let response = controller
        .execute_dance("name: \"slow\" slices_per_minute: 1e-20 moves { type: \"sway\" requested_slices: 10 }")
        .await
        .unwrap();
    assert!(!response.success);
    assert!(response.message.starts_with("Error executing dance:"));
    assert!(response.message.contains("too long"));
    assert_eq!(robot.calls().get_choreography_status, 0);
}

// =============================================================================
// Animations and listings
// =============================================================================

const CLIP: &str = "controls body\nfrequency 30\ntime body_x\n0.0 0.0\n0.5 0.1\n";

#[tokio::test]
async fn test_upload_animation_stages_and_cleans_up() {
    let robot = Arc::new(ScriptedRobot::completing());
    let converter = Arc::new(RecordingConverter {
        fail: false,
        seen: Mutex::new(None),
    });
    let controller = DanceController::new(robot.clone(), robot.clone(), converter.clone());

    let response = controller.upload_animation("wiggle", CLIP).await;

    assert!(response.success, "{}", response.message);
    assert_eq!(response.message, "Success");
    let (path, content) = converter.seen.lock().unwrap().clone().unwrap();
    assert_eq!(path.file_name().unwrap(), "wiggle.cha");
    assert_eq!(content, CLIP);
    assert!(!path.exists(), "staging file must be removed");
    assert_eq!(robot.calls().uploaded, ["wiggle"]);
}

#[tokio::test]
async fn test_conversion_failure_skips_upload() {
    let robot = Arc::new(ScriptedRobot::completing());
    let converter = Arc::new(RecordingConverter {
        fail: true,
        seen: Mutex::new(None),
    });
    let controller = DanceController::new(robot.clone(), robot.clone(), converter.clone());

    let response = controller.upload_animation("wiggle", "garbage").await;

    assert!(!response.success);
    assert!(response.message.contains("convert"));
    assert_eq!(robot.calls().upload_animated_move, 0);
    let (path, _) = converter.seen.lock().unwrap().clone().unwrap();
    assert!(!path.exists(), "staging file must be removed on failure too");
}

#[tokio::test]
async fn test_animation_upload_error_is_reported() {
    let robot = Arc::new(ScriptedRobot {
        upload_error: Some(ClientError::Authorization("unlicensed".to_string())),
        ..ScriptedRobot::completing()
    });
    let controller = controller_for(robot);

    let response = controller.upload_animation("wiggle", CLIP).await;

    assert!(!response.success);
    assert!(response.message.contains("upload failed"));
    assert!(response.message.contains("unlicensed"));
}

#[tokio::test]
async fn test_invalid_animation_names_are_rejected() {
    let robot = Arc::new(ScriptedRobot::completing());
    let controller = controller_for(robot.clone());
    for name in ["", "../escape", "a/b"] {
        assert!(!controller.upload_animation(name, CLIP).await.success);
    }
    assert_eq!(robot.calls().upload_animated_move, 0);
}

#[tokio::test]
async fn test_listings() {
    let robot = Arc::new(ScriptedRobot::completing());
    let controller = controller_for(robot);

    let dances = controller.list_all_dances().await;
    assert!(dances.success);
    assert_eq!(dances.message, "success");
    assert_eq!(dances.names, ["one", "two", "three"]);

    let moves = controller.list_all_moves().await;
    assert!(!moves.success);
    assert!(moves.message.contains("list_all_moves failed"));
    assert!(moves.message.contains("service unavailable"));
    assert!(moves.names.is_empty());

    let robot = Arc::new(ScriptedRobot {
        sequences: Err(ClientError::Rpc("offline".to_string())),
        ..ScriptedRobot::completing()
    });
    let dances = controller_for(robot).list_all_dances().await;
    assert!(!dances.success);
    assert!(dances.names.is_empty());
}

// =============================================================================
// Against the simulated robot
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_simulated_robot_end_to_end() {
    let robot = Arc::new(SimulatedRobot::new());
    let mut controller = DanceController::new(robot.clone(), robot.clone(), Arc::new(ChaConverter::new()));

    let upload = controller.upload_animation("wiggle", CLIP).await;
    assert!(upload.success, "{}", upload.message);

    let routine = r#"
        name: "with_clip"
        slices_per_minute: 120
        moves { type: "wiggle" start_slice: 0 requested_slices: 4 }
        moves { type: "running_man" start_slice: 4 requested_slices: 8 }
    "#;
    let started = Instant::now();
    let response = controller.execute_dance(routine).await.unwrap();
    assert!(response.success, "{}", response.message);
    assert_eq!(started.elapsed(), Duration::from_secs(6));
    assert!(robot.is_powered().await);

    let dances = controller.list_all_dances().await;
    assert_eq!(dances.names, ["with_clip"]);
    assert!(controller.list_all_moves().await.names.contains(&"wiggle".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_simulated_robot_failures() {
    let robot = Arc::new(SimulatedRobot::new());
    let mut controller = DanceController::new(robot.clone(), robot.clone(), Arc::new(ChaConverter::new()));

    robot.set_licensed(false).await;
    let response = controller.execute_dance(ROUTINE).await.unwrap();
    assert!(response.message.contains("license"));

    robot.set_licensed(true).await;
    robot.set_stall(true).await;
    assert!(controller.execute_dance(ROUTINE).await.is_err());

    robot.set_stall(false).await;
    robot.set_estopped(true).await;
    let calls_before = robot.calls().await;
    let response = controller.execute_dance(ROUTINE).await.unwrap();
    assert!(!response.success);
    let calls_after = robot.calls().await;
    assert_eq!(calls_after.upload_choreography, calls_before.upload_choreography);
    assert_eq!(calls_after.execute_choreography, calls_before.execute_choreography);
}
