//! Payloads handed to the hosting service.
//!
//! A run ends in exactly one of these: a [`MatrixResponse`] carrying a
//! non-empty schedule (possibly alongside rejections), or a
//! [`FailureResponse`] with a single failure kind.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{FailureKind, PipelineError};
use crate::models::{MatrixResult, RejectionReport};
use crate::transform::catalog::DivisionCatalog;
use crate::transform::pipeline::MatrixOutcome;

/// Success payload of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixResponse {
    /// Unique run identifier
    pub run_id: Uuid,

    /// Always "success"
    pub status: String,

    pub department: String,
    pub college: String,
    pub processed_at: DateTime<Utc>,

    /// department → faculty → subject → occurrences
    pub schedule: MatrixResult,

    /// college → department → semester → division → subject designations
    pub catalog: DivisionCatalog,

    pub rejections: RejectionReport,
    pub metadata: ResponseMetadata,
}

/// Counters about the run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub blocks_processed: usize,
    pub blocks_malformed: usize,
    pub entries_valid: usize,
    pub entries_rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<&MatrixOutcome> for MatrixResponse {
    fn from(outcome: &MatrixOutcome) -> Self {
        MatrixResponse {
            run_id: outcome.run_id,
            status: "success".to_string(),
            department: outcome.department.clone(),
            college: outcome.college.clone(),
            processed_at: outcome.processed_at,
            schedule: outcome.schedule.clone(),
            catalog: outcome.catalog.clone(),
            rejections: outcome.rejections.clone(),
            metadata: ResponseMetadata {
                blocks_processed: outcome.blocks_processed,
                blocks_malformed: outcome.blocks_malformed,
                entries_valid: outcome.schedule.occurrence_count(),
                entries_rejected: outcome.rejections.entries.len(),
                source: outcome.source.clone(),
            },
        }
    }
}

impl From<MatrixOutcome> for MatrixResponse {
    fn from(outcome: MatrixOutcome) -> Self {
        Self::from(&outcome)
    }
}

/// Failure payload of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    /// Always "error"
    pub status: String,
    pub kind: FailureKind,
    pub detail: String,
    /// HTTP status the hosting service should answer with
    pub http_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejections: Option<RejectionReport>,
}

impl From<&PipelineError> for FailureResponse {
    fn from(err: &PipelineError) -> Self {
        let kind = err.kind();
        FailureResponse {
            status: "error".to_string(),
            kind,
            detail: err.to_string(),
            http_status: http_status(kind),
            rejections: err.rejections().cloned(),
        }
    }
}

/// HTTP status matching a failure kind.
pub fn http_status(kind: FailureKind) -> u16 {
    match kind {
        FailureKind::UnreadableFile => 400,
        FailureKind::EmptyWorkbook | FailureKind::Malformed => 422,
        FailureKind::NoResultsFound => 404,
        FailureKind::VocabularyUnavailable => 503,
        FailureKind::SchemaViolation | FailureKind::Internal => 500,
    }
}

/// Create an error response for failures outside a pipeline run
/// (bad arguments, unreadable vocabulary file).
pub fn error_response(detail: &str) -> Value {
    json!({
        "status": "error",
        "kind": FailureKind::Internal,
        "detail": detail,
        "httpStatus": http_status(FailureKind::Internal),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_results_failure_payload() {
        let err = PipelineError::NoResultsFound {
            rejections: Box::new(RejectionReport::new()),
        };
        let json = serde_json::to_value(FailureResponse::from(&err)).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "NoResultsFound");
        assert_eq!(json["httpStatus"], 404);
        assert!(json["detail"].as_str().unwrap().contains("No results found"));
        assert!(json.get("rejections").is_some());
    }

    #[test]
    fn test_unreadable_failure_has_no_rejections() {
        let err = PipelineError::UnreadableFile("not a zip".to_string());
        let json = serde_json::to_value(FailureResponse::from(&err)).unwrap();
        assert_eq!(json["kind"], "UnreadableFile");
        assert_eq!(json["httpStatus"], 400);
        assert!(json.get("rejections").is_none());
    }

    #[test]
    fn test_error_response() {
        let json = error_response("vocabulary file missing");
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "Internal");
        assert_eq!(json["detail"], "vocabulary file missing");
    }
}
