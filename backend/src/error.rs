//! Error types for the faculty matrix pipeline.
//!
//! One error type per layer, converted upward with `From`:
//!
//! - [`WorkbookError`] - The uploaded file cannot be opened or holds no tables
//! - [`MalformedBlock`] - One table block has an unusable layout (recoverable)
//! - [`VocabularyError`] - Reference vocabularies could not be obtained
//! - [`PipelineError`] - Top-level orchestration failures
//!
//! Entry-level problems (unknown faculty, unknown subject, malformed cells)
//! are not errors: they travel as data in the rejection report.

use serde::Serialize;
use thiserror::Error;

use crate::models::{BlockLocator, RejectionReport, Weekday};

// =============================================================================
// Workbook Errors
// =============================================================================

/// Errors while opening the uploaded workbook.
#[derive(Debug, Error)]
pub enum WorkbookError {
    /// Container could not be opened or decoded.
    #[error("Unreadable file: {0}")]
    UnreadableFile(String),

    /// No sheet holds any cell.
    #[error("Workbook contains no table blocks")]
    EmptyWorkbook,
}

impl From<std::io::Error> for WorkbookError {
    fn from(err: std::io::Error) -> Self {
        Self::UnreadableFile(err.to_string())
    }
}

// =============================================================================
// Block Errors
// =============================================================================

/// Why a table block could not be classified or extracted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockIssue {
    #[error("no header row with day and slot columns")]
    NoHeaderRow,

    #[error("ambiguous header: candidate rows {0:?}")]
    AmbiguousHeader(Vec<usize>),

    #[error("header row {row} has no schedule columns")]
    NoLanes { row: usize },

    #[error("schedule columns mix division and faculty headers")]
    MixedColumnAxis,

    #[error("no division or faculty caption above the day header")]
    MissingCaption,

    #[error("only {found} row(s) with a time slot; looks like metadata")]
    TooFewDataRows { found: usize },

    #[error("row {row} has schedule content but no time slot")]
    MissingSlot { row: usize },

    #[error("row {row} has schedule content but no day")]
    MissingDay { row: usize },

    #[error("slot {slot} on {day} appears on more than one row")]
    DuplicateSlot { day: Weekday, slot: u32 },

    #[error("layout expects {expected_rows}x{expected_cols} cells, grid is {rows}x{cols}")]
    DimensionMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },
}

/// A block rejected as Malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed {locator}: {issue}")]
pub struct MalformedBlock {
    pub locator: BlockLocator,
    pub issue: BlockIssue,
}

impl MalformedBlock {
    pub fn new(locator: &BlockLocator, issue: BlockIssue) -> Self {
        Self {
            locator: locator.clone(),
            issue,
        }
    }
}

// =============================================================================
// Vocabulary Errors
// =============================================================================

/// Errors from a reference vocabulary provider.
#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("Vocabulary IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Vocabulary JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Vocabulary provider failed: {0}")]
    Provider(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Kind of a fatal pipeline failure, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    UnreadableFile,
    EmptyWorkbook,
    Malformed,
    NoResultsFound,
    SchemaViolation,
    VocabularyUnavailable,
    Internal,
}

/// Top-level pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unreadable file: {0}")]
    UnreadableFile(String),

    #[error("Workbook contains no table blocks")]
    EmptyWorkbook,

    /// Block-level failures exceeded the configured tolerance.
    #[error("{malformed} of {total} blocks are malformed")]
    TooManyMalformedBlocks {
        malformed: usize,
        total: usize,
        rejections: Box<RejectionReport>,
    },

    /// Nothing valid was found; the report explains why.
    #[error("No results found in the processed matrix")]
    NoResultsFound { rejections: Box<RejectionReport> },

    /// The success payload did not match its schema.
    #[error("Response failed schema validation: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Vocabulary error: {0}")]
    Vocabulary(#[from] VocabularyError),

    /// A background invocation panicked or was cancelled.
    #[error("Pipeline task failed: {0}")]
    Join(String),
}

impl From<WorkbookError> for PipelineError {
    fn from(err: WorkbookError) -> Self {
        match err {
            WorkbookError::UnreadableFile(detail) => Self::UnreadableFile(detail),
            WorkbookError::EmptyWorkbook => Self::EmptyWorkbook,
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnreadableFile(_) => FailureKind::UnreadableFile,
            Self::EmptyWorkbook => FailureKind::EmptyWorkbook,
            Self::TooManyMalformedBlocks { .. } => FailureKind::Malformed,
            Self::NoResultsFound { .. } => FailureKind::NoResultsFound,
            Self::SchemaViolation(_) => FailureKind::SchemaViolation,
            Self::Vocabulary(_) => FailureKind::VocabularyUnavailable,
            Self::Join(_) => FailureKind::Internal,
        }
    }

    /// Rejection report attached to the failure, if any.
    pub fn rejections(&self) -> Option<&RejectionReport> {
        match self {
            Self::TooManyMalformedBlocks { rejections, .. } => Some(rejections.as_ref()),
            Self::NoResultsFound { rejections } => Some(rejections.as_ref()),
            _ => None,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for workbook loading.
pub type WorkbookResult<T> = Result<T, WorkbookError>;

/// Result type for block-level stages.
pub type BlockResult<T> = Result<T, MalformedBlock>;

/// Result type for vocabulary operations.
pub type VocabularyResult<T> = Result<T, VocabularyError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workbook_error_conversion() {
        let err: PipelineError = WorkbookError::EmptyWorkbook.into();
        assert_eq!(err.kind(), FailureKind::EmptyWorkbook);

        let err: PipelineError = WorkbookError::UnreadableFile("bad zip".into()).into();
        assert_eq!(err.kind(), FailureKind::UnreadableFile);
        assert!(err.to_string().contains("bad zip"));
    }

    #[test]
    fn test_malformed_block_format() {
        let locator = BlockLocator::new("Sheet1", 2);
        let err = MalformedBlock::new(&locator, BlockIssue::TooFewDataRows { found: 1 });
        let msg = err.to_string();
        assert!(msg.contains("Sheet1"));
        assert!(msg.contains("block 2"));
        assert!(msg.contains("1 row(s) with a time slot"));
        assert!(msg.contains("metadata"));
    }

    #[test]
    fn test_no_results_carries_report() {
        let err = PipelineError::NoResultsFound {
            rejections: Box::new(RejectionReport::new()),
        };
        assert_eq!(err.kind(), FailureKind::NoResultsFound);
        assert!(err.rejections().is_some());
        assert!(PipelineError::EmptyWorkbook.rejections().is_none());
    }
}
