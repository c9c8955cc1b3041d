//! Choreography routine definitions
//!
//! A routine is a named, ordered list of moves plus a playback rate in
//! slices per minute. Routines are decoded strictly from text format and
//! are immutable once parsed.

use crate::text_format::{quote, ParseError, TextField, TextMessage, TextValue};
use serde::Serialize;
use std::fmt::Write as _;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const SEQUENCE_TYPE: &str = "ChoreographySequence";
const MOVE_TYPE: &str = "MoveParams";

/// A single move within a routine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Move {
    /// Move-type identifier, e.g. `"bourree"` or `"running_man"`
    pub move_type: String,
    pub start_slice: i32,
    pub requested_slices: i32,
    /// Move-specific parameter blocks, kept verbatim for the service to validate
    #[serde(skip)]
    pub params: TextMessage,
}

/// A parsed choreography routine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutineDefinition {
    pub name: String,
    pub slices_per_minute: f64,
    pub moves: Vec<Move>,
    #[serde(skip)]
    pub choreography_info: Option<TextMessage>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimateError {
    #[error("invalid slices_per_minute {0}: must be a positive, finite rate")]
    InvalidRate(f64),

    #[error("estimated runtime of {0} seconds is too long to wait for")]
    TooLong(f64),
}

impl RoutineDefinition {
    /// Parse a routine from its text-format description
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let message = TextMessage::parse(text)?;
        Self::from_message(message)
    }

    fn from_message(message: TextMessage) -> Result<Self, ParseError> {
        let mut routine = RoutineDefinition {
            name: String::new(),
            slices_per_minute: 0.0,
            moves: Vec::new(),
            choreography_info: None,
        };

        for field in message.fields {
            match field.name.as_str() {
                "name" => routine.name = field.expect_str()?,
                "slices_per_minute" => routine.slices_per_minute = field.expect_f64()?,
                "moves" => match &field.value {
                    TextValue::Message(body) => routine.moves.push(Move::from_message(body)?),
                    TextValue::List(items) => {
                        for item in items {
                            match item {
                                TextValue::Message(body) => routine.moves.push(Move::from_message(body)?),
                                _ => return Err(expected_message(&field)),
                            }
                        }
                    }
                    TextValue::Scalar(_) => return Err(expected_message(&field)),
                },
                "choreography_info" => match &field.value {
                    TextValue::Message(info) => routine.choreography_info = Some(info.clone()),
                    _ => return Err(expected_message(&field)),
                },
                _ => return Err(unknown_field(SEQUENCE_TYPE, &field)),
            }
        }

        Ok(routine)
    }

    /// Sum of requested slices across every move
    pub fn total_slices(&self) -> i64 {
        self.moves.iter().map(|m| i64::from(m.requested_slices)).sum()
    }

    /// Expected wall-clock runtime in seconds if the routine plays uninterrupted
    pub fn estimated_seconds(&self) -> Result<f64, EstimateError> {
        if !self.slices_per_minute.is_finite() || self.slices_per_minute <= 0.0 {
            return Err(EstimateError::InvalidRate(self.slices_per_minute));
        }
        let seconds = self.total_slices() as f64 / self.slices_per_minute * 60.0;
        Ok(seconds.max(0.0))
    }

    pub fn estimated_duration(&self) -> Result<Duration, EstimateError> {
        let seconds = self.estimated_seconds()?;
        Duration::try_from_secs_f64(seconds).map_err(|_| EstimateError::TooLong(seconds))
    }

    /// Render the routine back to text format
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "name: {}", quote(&self.name));
        let _ = writeln!(out, "slices_per_minute: {}", self.slices_per_minute);
        for m in &self.moves {
            let _ = writeln!(out, "moves {{");
            let _ = writeln!(out, "  type: {}", quote(&m.move_type));
            let _ = writeln!(out, "  start_slice: {}", m.start_slice);
            let _ = writeln!(out, "  requested_slices: {}", m.requested_slices);
            m.params.write_text(&mut out, 1);
            let _ = writeln!(out, "}}");
        }
        if let Some(info) = &self.choreography_info {
            let _ = writeln!(out, "choreography_info {{");
            info.write_text(&mut out, 1);
            let _ = writeln!(out, "}}");
        }
        out
    }
}

impl FromStr for RoutineDefinition {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Move {
    fn from_message(message: &TextMessage) -> Result<Self, ParseError> {
        let mut parsed = Move {
            move_type: String::new(),
            start_slice: 0,
            requested_slices: 0,
            params: TextMessage::default(),
        };

        for field in &message.fields {
            match field.name.as_str() {
                "type" => parsed.move_type = field.expect_str()?,
                "start_slice" => parsed.start_slice = field.expect_i32()?,
                "requested_slices" => parsed.requested_slices = field.expect_i32()?,
                _ if matches!(field.value, TextValue::Message(_)) => {
                    parsed.params.fields.push(field.clone());
                }
                _ => return Err(unknown_field(MOVE_TYPE, field)),
            }
        }

        Ok(parsed)
    }
}

fn unknown_field(message_type: &str, field: &TextField) -> ParseError {
    ParseError::new(
        field.line,
        field.column,
        format!("Message type \"{}\" has no field named \"{}\"", message_type, field.name),
    )
}

fn expected_message(field: &TextField) -> ParseError {
    ParseError::new(
        field.line,
        field.column,
        format!("Expected message block for field \"{}\"", field.name),
    )
}
