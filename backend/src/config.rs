//! Pipeline configuration.
//!
//! Defaults suit the matrices produced by the timetable office. Each knob
//! can be overridden from the environment (a `.env` file is honoured) or
//! from CLI flags.
//!
//! | Field | Variable | Default |
//! |-------|----------|---------|
//! | `cell_separator` | `MATRIX_CELL_SEPARATOR` | `-` |
//! | `max_lab_span` | `MATRIX_MAX_LAB_SPAN` | `2` |
//! | `malformed_block_tolerance` | `MATRIX_MALFORMED_TOLERANCE` | `0.5` |
//! | `column_axis` | `MATRIX_COLUMN_AXIS` | auto-detect |
//! | `skip_validation` | `MATRIX_SKIP_VALIDATION` | `false` |

use serde::{Deserialize, Serialize};
use std::env;

use crate::api::logs::log_warning;
use crate::layout::ColumnAxis;

/// College used when the caller does not name one.
pub const DEFAULT_COLLEGE: &str = "LDRP-ITR";

/// Options for one pipeline invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Separator between subject and faculty in division-lane cells ("DS-JS")
    pub cell_separator: String,

    /// Longest run of identical cells still read as one lab block
    pub max_lab_span: usize,

    /// Fraction of malformed blocks above which the whole run fails
    pub malformed_block_tolerance: f64,

    /// Force the meaning of schedule columns instead of detecting it
    #[serde(default)]
    pub column_axis: Option<ColumnAxis>,

    /// Skip the schema check of the success payload
    #[serde(default)]
    pub skip_validation: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            cell_separator: "-".to_string(),
            max_lab_span: 2,
            malformed_block_tolerance: 0.5,
            column_axis: None,
            skip_validation: false,
        }
    }
}

impl PipelineOptions {
    /// Build options from `MATRIX_*` environment variables over the defaults.
    ///
    /// Unparseable values are reported and ignored.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut options = Self::default();

        if let Ok(sep) = env::var("MATRIX_CELL_SEPARATOR") {
            if sep.is_empty() {
                log_warning("MATRIX_CELL_SEPARATOR is empty, keeping default");
            } else {
                options.cell_separator = sep;
            }
        }
        if let Some(span) = parse_var::<usize>("MATRIX_MAX_LAB_SPAN") {
            options.max_lab_span = span.max(1);
        }
        if let Some(tolerance) = parse_var::<f64>("MATRIX_MALFORMED_TOLERANCE") {
            options.malformed_block_tolerance = tolerance.clamp(0.0, 1.0);
        }
        if let Ok(axis) = env::var("MATRIX_COLUMN_AXIS") {
            match ColumnAxis::from_name(&axis) {
                Some(axis) => options.column_axis = Some(axis),
                None => log_warning(format!("Unknown MATRIX_COLUMN_AXIS '{}', auto-detecting", axis)),
            }
        }
        if let Some(skip) = parse_var::<bool>("MATRIX_SKIP_VALIDATION") {
            options.skip_validation = skip;
        }

        options
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.cell_separator = separator.into();
        self
    }

    pub fn with_column_axis(mut self, axis: ColumnAxis) -> Self {
        self.column_axis = Some(axis);
        self
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log_warning(format!("Ignoring {}='{}': not a valid value", name, raw));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.cell_separator, "-");
        assert_eq!(opts.max_lab_span, 2);
        assert!((opts.malformed_block_tolerance - 0.5).abs() < f64::EPSILON);
        assert!(opts.column_axis.is_none());
        assert!(!opts.skip_validation);
    }

    #[test]
    fn test_builder_helpers() {
        let opts = PipelineOptions::default()
            .with_separator("/")
            .with_column_axis(ColumnAxis::Faculty);
        assert_eq!(opts.cell_separator, "/");
        assert_eq!(opts.column_axis, Some(ColumnAxis::Faculty));
    }

    #[test]
    fn test_options_json_roundtrip_defaults_missing_fields() {
        let opts: PipelineOptions = serde_json::from_str(
            r#"{"cellSeparator": ":", "maxLabSpan": 3, "malformedBlockTolerance": 0.25}"#,
        )
        .unwrap();
        assert_eq!(opts.cell_separator, ":");
        assert_eq!(opts.max_lab_span, 3);
        assert!(opts.column_axis.is_none());
        assert!(!opts.skip_validation);
    }
}
