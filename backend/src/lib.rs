//! # Faculty Matrix - timetable matrix ingestion and validation
//!
//! Turns an uploaded faculty-scheduling matrix (xlsx, xls, ods or csv) into
//! a validated schedule keyed department → faculty → subject → occurrences,
//! with every entry that could not be resolved reported next to it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐
//! │  Loader  │──▶│  Layout  │──▶│  Extract  │──▶│ Validate  │──▶│ Assemble  │
//! │ (blocks) │   │ (header) │   │ (entries) │   │  (vocab)  │   │ (result)  │
//! └──────────┘   └──────────┘   └───────────┘   └───────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use faculty_matrix::{
//!     run_matrix_pipeline, JsonFileVocabulary, MatrixInput, PipelineOptions, VocabularyStore,
//! };
//!
//! let store = VocabularyStore::from_provider(&JsonFileVocabulary::new("vocabulary.json"))?;
//! let input = MatrixInput::from_file("ce-matrix.xlsx", "CE")?;
//! let outcome = run_matrix_pipeline(&input, &store.snapshot(), &PipelineOptions::from_env())?;
//! println!("{} occurrences", outcome.schedule.occurrence_count());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Layered error types
//! - [`models`] - Entries, resolutions, the nested result
//! - [`config`] - Pipeline options
//! - [`loader`] - Workbook and CSV loading
//! - [`layout`] - Header and axis detection
//! - [`extract`] - Cell to entry extraction
//! - [`validation`] - Vocabulary resolution and the response schema
//! - [`vocabulary`] - Reference vocabularies and the swappable store
//! - [`transform`] - Assembly, catalog and the staged pipeline
//! - [`api`] - Response payloads and log streaming

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Reading
pub mod extract;
pub mod layout;
pub mod loader;

// Validation
pub mod validation;
pub mod vocabulary;

// Transformation
pub mod transform;

// Hosting service interface
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    BlockIssue, FailureKind, MalformedBlock, PipelineError, PipelineResult, VocabularyError,
    WorkbookError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    BlockLocator, CellLocator, LectureType, MatrixResult, Occurrence, RawScheduleEntry,
    Rejection, RejectionReport, Resolution, ResolutionTag, ValidatedEntry, Weekday,
};

// =============================================================================
// Re-exports - Stages
// =============================================================================

pub use config::{PipelineOptions, DEFAULT_COLLEGE};
pub use extract::EntryExtractor;
pub use layout::{detect_layout, ColumnAxis, LayoutDescriptor, Orientation};
pub use loader::{load_workbook, load_workbook_file, FileFormat, RawTableBlock, Workbook};
pub use validation::{normalize_token, TokenValidator};
pub use vocabulary::{
    JsonFileVocabulary, ReferenceVocabulary, StaticVocabulary, VocabularyProvider,
    VocabularySnapshot, VocabularyStore,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    assemble, ingest_many, run_matrix_pipeline, run_matrix_pipeline_async, DivisionCatalog,
    MatrixInput, MatrixOutcome, ResultAssembler, Stage,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, FailureResponse, MatrixResponse, ResponseMetadata};
