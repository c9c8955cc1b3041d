//! Telemetry abstraction for dance execution
//!
//! Trait-based sink for structured execution events, so the controller can
//! report status samples and outcomes to any backend without owning global
//! output state.

use crate::status::ChoreographyStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One polled status sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSampleEvent {
    pub execution_id: Uuid,
    pub routine: String,
    pub attempt: usize,
    pub elapsed_secs: f64,
    pub status: ChoreographyStatus,
    pub status_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_slice: Option<f64>,
    pub timestamp: f64,
}

/// Final result of one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeEvent {
    pub execution_id: Uuid,
    pub routine: Option<String>,
    pub success: bool,
    /// Failure classification (`"timeout"` for the unrecoverable case)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,
    pub message: String,
    pub timestamp: f64,
}

/// Sink for execution telemetry
#[async_trait]
pub trait DanceTelemetry: Send + Sync {
    async fn publish_status(&self, event: &StatusSampleEvent) -> anyhow::Result<()>;

    async fn publish_outcome(&self, event: &OutcomeEvent) -> anyhow::Result<()>;

    /// Optional: publish an arbitrary JSON payload
    async fn publish_custom(&self, topic: &str, data: &serde_json::Value) -> anyhow::Result<()> {
        let _ = (topic, data);
        Ok(())
    }
}

/// Discards all telemetry
#[derive(Debug, Clone, Default)]
pub struct NoOpTelemetry;

#[async_trait]
impl DanceTelemetry for NoOpTelemetry {
    async fn publish_status(&self, _event: &StatusSampleEvent) -> anyhow::Result<()> {
        Ok(())
    }

    async fn publish_outcome(&self, _event: &OutcomeEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Prints telemetry to stdout as JSON lines
#[derive(Debug, Clone)]
pub struct ConsoleTelemetry {
    pub pretty_print: bool,
}

impl ConsoleTelemetry {
    pub fn new() -> Self {
        Self { pretty_print: false }
    }

    pub fn pretty() -> Self {
        Self { pretty_print: true }
    }

    fn render<T: Serialize>(&self, data: &T) -> anyhow::Result<String> {
        Ok(if self.pretty_print {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        })
    }
}

impl Default for ConsoleTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DanceTelemetry for ConsoleTelemetry {
    async fn publish_status(&self, event: &StatusSampleEvent) -> anyhow::Result<()> {
        println!("[STATUS] {}", self.render(event)?);
        Ok(())
    }

    async fn publish_outcome(&self, event: &OutcomeEvent) -> anyhow::Result<()> {
        println!("[OUTCOME] {}", self.render(event)?);
        Ok(())
    }

    async fn publish_custom(&self, topic: &str, data: &serde_json::Value) -> anyhow::Result<()> {
        println!("[{}] {}", topic, self.render(data)?);
        Ok(())
    }
}
