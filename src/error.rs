//! Error types for choreography upload and execution

use crate::status::{ChoreographyStatus, ExecuteStatus};
use crate::text_format::ParseError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpotDanceError>;

/// Infrastructure errors (configuration loading, file staging)
#[derive(Error, Debug)]
pub enum SpotDanceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised by the robot-control and choreography capabilities
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The robot license lacks a capability required by the request
    #[error("Unauthenticated: {0}")]
    Authorization(String),

    /// The service rejected the request and reported warnings
    #[error("{message}")]
    Validation {
        message: String,
        warnings: Vec<String>,
    },

    #[error("RPC error: {0}")]
    Rpc(String),
}

/// Raised when a routine does not reach a terminal status inside its
/// estimated duration plus grace margin. The robot state is unknown at this
/// point and needs operator attention.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Call to execute_choreography did not return completion state in stipulated time ({elapsed_secs:.1}s elapsed, {samples} status samples)")]
pub struct CommandTimedOut {
    pub routine: String,
    pub elapsed_secs: f64,
    pub samples: usize,
}

/// Recoverable dance failures. `Display` is the operator-facing message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DanceFailure {
    #[error("Robot is estopped. Please use an external E-Stop client, such as the estop SDK example, to configure E-Stop.")]
    Estopped,

    #[error("Failed to load choreography. Raised exception: {0}")]
    Parse(#[from] ParseError),

    #[error("The robot license must contain 'choreography' permissions to upload and execute dances. Please contact Boston Dynamics Support to get the appropriate license file.")]
    Authorization,

    #[error("Choreography sequence upload failed. The following warnings were produced: {}", .warnings.join("; "))]
    Validation { warnings: Vec<String> },

    #[error("Choreography sequence upload failed: {0}")]
    Upload(String),

    #[error("Issue calling execute_choreography, got response.status: {}", status_code(.0.code(), .0.name()))]
    ExecutionStart(ExecuteStatus),

    #[error("call to execute_choreography returned unsuccessful status: {}", status_code(.0.code(), .0.name()))]
    Runtime(ChoreographyStatus),

    #[error("Error executing dance: {0}")]
    Unclassified(String),
}

impl DanceFailure {
    /// Classify an upload error from the choreography service
    pub fn from_upload_error(err: ClientError) -> Self {
        match err {
            ClientError::Authorization(_) => DanceFailure::Authorization,
            ClientError::Validation { warnings, .. } if !warnings.is_empty() => {
                DanceFailure::Validation { warnings }
            }
            other => DanceFailure::Upload(other.to_string()),
        }
    }

    /// Short machine-readable kind, used in telemetry events
    pub fn kind(&self) -> &'static str {
        match self {
            DanceFailure::Estopped => "precondition",
            DanceFailure::Parse(_) => "parse",
            DanceFailure::Authorization => "authorization",
            DanceFailure::Validation { .. } => "validation",
            DanceFailure::Upload(_) => "upload",
            DanceFailure::ExecutionStart(_) => "execution_start",
            DanceFailure::Runtime(_) => "runtime",
            DanceFailure::Unclassified(_) => "unclassified",
        }
    }
}

fn status_code(code: i32, name: &str) -> String {
    format!("{} ({})", code, name)
}
