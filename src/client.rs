//! Robot capability interfaces
//!
//! The dance workflow only talks to the robot through these traits. Session,
//! transport and authentication are owned by whoever constructs the
//! implementations; `crate::sim` provides an in-process robot.

use crate::animation::{AnimatedMove, ConversionError};
use crate::error::ClientError;
use crate::routine::RoutineDefinition;
use crate::status::{ChoreographyStatus, ExecuteStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Emergency-stop and motor power control
#[async_trait]
pub trait RobotControl: Send + Sync {
    async fn is_estopped(&self) -> ClientResult<bool>;

    async fn power_on(&self) -> ClientResult<()>;
}

/// Request to start an uploaded routine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub routine_name: String,
    /// Client wall-clock time (seconds since UNIX epoch) the request was issued
    pub client_start_time: f64,
    pub start_slice: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub status: ExecuteStatus,
}

/// One status sample from the choreography service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSample {
    pub status: ChoreographyStatus,
    /// Slice the robot is currently performing, if it reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_slice: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveInfo {
    pub name: String,
    #[serde(default)]
    pub is_extendable: bool,
}

/// Choreography service operations
#[async_trait]
pub trait ChoreographyClient: Send + Sync {
    async fn upload_animated_move(&self, animation: &AnimatedMove, name: &str) -> ClientResult<()>;

    async fn list_all_sequences(&self) -> ClientResult<Vec<SequenceInfo>>;

    async fn list_all_moves(&self) -> ClientResult<Vec<MoveInfo>>;

    /// Upload a routine. With `non_strict` the service may accept routines
    /// that only produce recoverable warnings.
    async fn upload_choreography(&self, routine: &RoutineDefinition, non_strict: bool) -> ClientResult<()>;

    async fn execute_choreography(&self, request: &ExecutionRequest) -> ClientResult<ExecuteResponse>;

    async fn get_choreography_status(&self) -> ClientResult<StatusSample>;
}

/// Turns a raw animation clip file into its wire asset
pub trait AnimationConverter: Send + Sync {
    fn convert(&self, path: &Path) -> Result<AnimatedMove, ConversionError>;
}
