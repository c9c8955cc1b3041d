//! Animation clip conversion
//!
//! Converts the plain-text animation clip format into the `AnimatedMove`
//! wire asset accepted by the choreography service. A clip consists of
//! option lines, one column header line, then numeric keyframe rows:
//!
//! ```text
//! name wiggle
//! controls legs body
//! frequency 30
//! extendable
//! time body_x body_y body_z
//! 0.0  0.0    0.0    0.0
//! 0.5  0.02   0.0    0.01
//! ```

use crate::client::AnimationConverter;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Option keys that take no arguments
const FLAG_OPTIONS: &[&str] = &[
    "extendable",
    "truncatable",
    "neutral_start",
    "precise_steps",
    "precise_timing",
    "track_swing_trajectories",
    "assume_zero_roll_and_pitch",
    "arm_playback",
    "retime_to_integer_slices",
];

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("failed to read animation file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("animation contains no keyframes")]
    NoKeyframes,

    #[error("line {line}: keyframes must be preceded by a column header line")]
    MissingHeader { line: usize },

    #[error("duplicate column '{name}'")]
    DuplicateColumn { name: String },

    #[error("line {line}: expected {expected} values, found {found}")]
    RowWidth {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: '{value}' is not a number")]
    InvalidNumber { line: usize, value: String },

    #[error("line {line}: unknown option '{key}'")]
    UnknownOption { line: usize, key: String },

    #[error("line {line}: invalid value for option '{key}'")]
    BadOptionValue { line: usize, key: String },

    #[error("animation requires 'frequency', 'bpm' or 'period', or a 'time' column")]
    MissingTiming,
}

/// Wire-format animated move
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimatedMove {
    pub name: String,
    pub controls: Vec<String>,
    pub frequency_hz: Option<f64>,
    pub bpm: Option<f64>,
    pub period_secs: Option<f64>,
    pub flags: Vec<String>,
    pub columns: Vec<String>,
    pub keyframes: Vec<Vec<f64>>,
}

impl AnimatedMove {
    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }
}

/// Converter for plain-text animation clips
#[derive(Debug, Clone, Default)]
pub struct ChaConverter;

impl ChaConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert clip text; `fallback_name` is used when the clip has no `name` option
    pub fn convert_str(&self, fallback_name: &str, text: &str) -> Result<AnimatedMove, ConversionError> {
        // (1-based line number, tokens)
        let lines: Vec<(usize, Vec<&str>)> = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, strip_comment(line).split_whitespace().collect::<Vec<_>>()))
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect();

        let first_row = lines
            .iter()
            .position(|(_, tokens)| tokens.iter().all(|t| t.parse::<f64>().is_ok()))
            .ok_or(ConversionError::NoKeyframes)?;
        if first_row == 0 {
            return Err(ConversionError::MissingHeader { line: lines[0].0 });
        }

        let mut animation = AnimatedMove {
            name: fallback_name.to_string(),
            controls: Vec::new(),
            frequency_hz: None,
            bpm: None,
            period_secs: None,
            flags: Vec::new(),
            columns: Vec::new(),
            keyframes: Vec::new(),
        };

        for (line, tokens) in &lines[..first_row - 1] {
            apply_option(&mut animation, *line, tokens)?;
        }

        let mut seen = HashSet::new();
        for column in &lines[first_row - 1].1 {
            if !seen.insert(*column) {
                return Err(ConversionError::DuplicateColumn {
                    name: column.to_string(),
                });
            }
            animation.columns.push(column.to_string());
        }

        for (line, tokens) in &lines[first_row..] {
            if tokens.len() != animation.columns.len() {
                return Err(ConversionError::RowWidth {
                    line: *line,
                    expected: animation.columns.len(),
                    found: tokens.len(),
                });
            }
            let row = tokens
                .iter()
                .map(|t| {
                    t.parse::<f64>().map_err(|_| ConversionError::InvalidNumber {
                        line: *line,
                        value: t.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            animation.keyframes.push(row);
        }

        let has_time_column = animation.columns.iter().any(|c| c == "time");
        if animation.frequency_hz.is_none()
            && animation.bpm.is_none()
            && animation.period_secs.is_none()
            && !has_time_column
        {
            return Err(ConversionError::MissingTiming);
        }

        Ok(animation)
    }
}

impl AnimationConverter for ChaConverter {
    fn convert(&self, path: &Path) -> Result<AnimatedMove, ConversionError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConversionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fallback_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.convert_str(&fallback_name, &text)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn apply_option(animation: &mut AnimatedMove, line: usize, tokens: &[&str]) -> Result<(), ConversionError> {
    let key = tokens[0];
    let args = &tokens[1..];
    let bad_value = || ConversionError::BadOptionValue {
        line,
        key: key.to_string(),
    };
    let positive = |args: &[&str]| -> Result<f64, ConversionError> {
        match args {
            [value] => value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(bad_value),
            _ => Err(bad_value()),
        }
    };

    match key {
        "name" => match args {
            [name] => animation.name = name.to_string(),
            _ => return Err(bad_value()),
        },
        "controls" => {
            if args.is_empty() {
                return Err(bad_value());
            }
            animation.controls.extend(args.iter().map(|s| s.to_string()));
        }
        "frequency" => animation.frequency_hz = Some(positive(args)?),
        "bpm" => animation.bpm = Some(positive(args)?),
        "period" => animation.period_secs = Some(positive(args)?),
        flag if FLAG_OPTIONS.contains(&flag) => {
            if !args.is_empty() {
                return Err(bad_value());
            }
            animation.flags.push(flag.to_string());
        }
        _ => {
            return Err(ConversionError::UnknownOption {
                line,
                key: key.to_string(),
            })
        }
    }
    Ok(())
}
