//! JSON output for operator responses
//!
//! Serialisable response shapes for the operator-facing operations and
//! helpers to print them as single-line JSON.

use serde::{Deserialize, Serialize};

/// Current wall-clock time as f64 seconds since UNIX epoch, microsecond precision
pub fn current_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Result of an upload or execute request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanceResponse {
    pub success: bool,
    pub message: String,
}

impl DanceResponse {
    pub fn success(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Result of a listing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub success: bool,
    pub message: String,
    pub names: Vec<String>,
}

impl ListResponse {
    pub fn success(names: Vec<String>) -> Self {
        Self {
            success: true,
            message: "success".to_string(),
            names,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            names: Vec::new(),
        }
    }
}

/// Output a JSON event to stdout
pub fn output_event<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{}", json);
    }
}
