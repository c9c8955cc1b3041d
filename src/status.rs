//! Choreography status codes
//!
//! Mirrors the status enumerations reported by the choreography service,
//! keeping the raw numeric code so diagnostics can show exactly what the
//! robot returned.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution state reported by a single status poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoreographyStatus {
    Unknown,
    Dancing,
    CompletedSequence,
    Prepping,
    WaitingForStartTime,
    Validating,
    Interrupted,
    Fallen,
    PoweredOff,
    Other,
    Unrecognized(i32),
}

impl ChoreographyStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::Dancing,
            2 => Self::CompletedSequence,
            3 => Self::Prepping,
            4 => Self::WaitingForStartTime,
            5 => Self::Validating,
            6 => Self::Interrupted,
            7 => Self::Fallen,
            8 => Self::PoweredOff,
            9 => Self::Other,
            other => Self::Unrecognized(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Dancing => 1,
            Self::CompletedSequence => 2,
            Self::Prepping => 3,
            Self::WaitingForStartTime => 4,
            Self::Validating => 5,
            Self::Interrupted => 6,
            Self::Fallen => 7,
            Self::PoweredOff => 8,
            Self::Other => 9,
            Self::Unrecognized(code) => *code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "STATUS_UNKNOWN",
            Self::Dancing => "STATUS_DANCING",
            Self::CompletedSequence => "STATUS_COMPLETED_SEQUENCE",
            Self::Prepping => "STATUS_PREPPING",
            Self::WaitingForStartTime => "STATUS_WAITING_FOR_START_TIME",
            Self::Validating => "STATUS_VALIDATING",
            Self::Interrupted => "STATUS_INTERRUPTED",
            Self::Fallen => "STATUS_FALLEN",
            Self::PoweredOff => "STATUS_POWERED_OFF",
            Self::Other => "STATUS_OTHER",
            Self::Unrecognized(_) => "STATUS_UNRECOGNIZED",
        }
    }

    /// The routine is still being prepared or performed
    pub fn is_ongoing(&self) -> bool {
        matches!(
            self,
            Self::Prepping | Self::Dancing | Self::WaitingForStartTime | Self::Validating
        )
    }

    /// Any status that ends polling, successful or not
    pub fn is_terminal(&self) -> bool {
        !self.is_ongoing()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::CompletedSequence)
    }
}

impl fmt::Display for ChoreographyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Result code of an execute request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteStatus {
    Unknown,
    Ok,
    InvalidUploadedChoreography,
    RobotCommandIssues,
    LeaseError,
    Unrecognized(i32),
}

impl ExecuteStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::Ok,
            2 => Self::InvalidUploadedChoreography,
            3 => Self::RobotCommandIssues,
            4 => Self::LeaseError,
            other => Self::Unrecognized(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Ok => 1,
            Self::InvalidUploadedChoreography => 2,
            Self::RobotCommandIssues => 3,
            Self::LeaseError => 4,
            Self::Unrecognized(code) => *code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "STATUS_UNKNOWN",
            Self::Ok => "STATUS_OK",
            Self::InvalidUploadedChoreography => "STATUS_INVALID_UPLOADED_CHOREOGRAPHY",
            Self::RobotCommandIssues => "STATUS_ROBOT_COMMAND_ISSUES",
            Self::LeaseError => "STATUS_LEASE_ERROR",
            Self::Unrecognized(_) => "STATUS_UNRECOGNIZED",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ExecuteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}
