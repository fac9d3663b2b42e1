//! High-level pipeline API: uploaded matrix → validated schedule.
//!
//! One invocation runs through the stages
//! `Loading → Detecting → Extracting → Validating → Assembling → Done`
//! and ends in `Failed` on any fatal error. Block-level problems are
//! recorded and only abort the run when more than the tolerated share of
//! blocks is malformed.
//!
//! # Example
//!
//! ```rust,ignore
//! use faculty_matrix::{run_matrix_pipeline, MatrixInput, PipelineOptions, VocabularyStore};
//!
//! let input = MatrixInput::from_file("ce-matrix.xlsx", "CE")?;
//! let store = VocabularyStore::from_provider(&JsonFileVocabulary::new("vocabulary.json"))?;
//! let outcome = run_matrix_pipeline(&input, &store.snapshot(), &PipelineOptions::default())?;
//! println!("{} occurrences", outcome.schedule.occurrence_count());
//! ```

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::api::types::MatrixResponse;
use crate::config::{PipelineOptions, DEFAULT_COLLEGE};
use crate::error::{PipelineError, PipelineResult, WorkbookError};
use crate::extract::EntryExtractor;
use crate::layout::{detect_layout, LayoutDescriptor};
use crate::loader::{load_workbook, FileFormat, RawTableBlock};
use crate::models::{BlockRejection, MatrixResult, RejectionReport, ResolutionTag, ValidatedEntry};
use crate::validation::schema::validate_matrix_response;
use crate::validation::TokenValidator;
use crate::vocabulary::{VocabularySnapshot, VocabularyStore};

use super::assembler::ResultAssembler;
use super::catalog::DivisionCatalog;

/// Pipeline stage, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Detecting,
    Extracting,
    Validating,
    Assembling,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::Detecting => "detecting",
            Self::Extracting => "extracting",
            Self::Validating => "validating",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One uploaded matrix with its run context.
#[derive(Debug, Clone)]
pub struct MatrixInput {
    pub bytes: Vec<u8>,
    pub format: FileFormat,
    pub department: String,
    pub college: String,
    /// File name, for logs and metadata
    pub source: Option<String>,
}

impl MatrixInput {
    pub fn new(bytes: Vec<u8>, format: FileFormat, department: impl Into<String>) -> Self {
        Self {
            bytes,
            format,
            department: department.into(),
            college: DEFAULT_COLLEGE.to_string(),
            source: None,
        }
    }

    pub fn with_college(mut self, college: impl Into<String>) -> Self {
        self.college = college.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Read a matrix from disk, taking the format from the extension.
    pub fn from_file<P: AsRef<Path>>(path: P, department: impl Into<String>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path).ok_or_else(|| {
            PipelineError::UnreadableFile(format!("unsupported file type: {}", path.display()))
        })?;
        let bytes = std::fs::read(path).map_err(WorkbookError::from)?;
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(bytes, format, department).with_source(source))
    }

    fn label(&self) -> &str {
        self.source.as_deref().unwrap_or("upload")
    }
}

/// Successful run.
#[derive(Debug, Clone)]
pub struct MatrixOutcome {
    pub run_id: Uuid,
    pub processed_at: DateTime<Utc>,
    pub department: String,
    pub college: String,
    pub source: Option<String>,
    pub schedule: MatrixResult,
    pub catalog: DivisionCatalog,
    pub rejections: RejectionReport,
    pub blocks_processed: usize,
    pub blocks_malformed: usize,
}

/// Tracks and logs the current stage of one run.
struct StageTracker<'a> {
    label: &'a str,
    current: Stage,
}

impl<'a> StageTracker<'a> {
    fn new(label: &'a str) -> Self {
        Self {
            label,
            current: Stage::Loading,
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.current = stage;
        log_info(format!("[{}] stage: {}", self.label, stage));
    }

    fn fail(&mut self, err: &PipelineError) {
        log_error(format!("[{}] failed while {}: {}", self.label, self.current, err));
        self.current = Stage::Failed;
    }
}

/// Run one matrix through every stage.
pub fn run_matrix_pipeline(
    input: &MatrixInput,
    vocabulary: &VocabularySnapshot,
    options: &PipelineOptions,
) -> PipelineResult<MatrixOutcome> {
    let mut tracker = StageTracker::new(input.label());
    let result = run_stages(input, vocabulary, options, &mut tracker);
    match &result {
        Ok(outcome) => {
            tracker.enter(Stage::Done);
            log_success(format!(
                "[{}] {} occurrences, {} rejected entries, {}/{} blocks malformed",
                input.label(),
                outcome.schedule.occurrence_count(),
                outcome.rejections.entries.len(),
                outcome.blocks_malformed,
                outcome.blocks_processed
            ));
        }
        Err(err) => tracker.fail(err),
    }
    result
}

fn run_stages(
    input: &MatrixInput,
    vocabulary: &VocabularySnapshot,
    options: &PipelineOptions,
    tracker: &mut StageTracker<'_>,
) -> PipelineResult<MatrixOutcome> {
    let run_id = Uuid::new_v4();
    let processed_at = Utc::now();

    // Step 1: Load
    tracker.enter(Stage::Loading);
    log_info(format!("📖 Reading {} ({})...", input.label(), input.format));
    let workbook = load_workbook(&input.bytes, input.format)?;
    let total = workbook.len();
    log_success(format!("{} table block(s)", total));

    let mut assembler = ResultAssembler::new(&input.department);
    let mut malformed = 0;

    // Step 2: Detect layouts
    tracker.enter(Stage::Detecting);
    let mut classified: Vec<(&RawTableBlock, LayoutDescriptor)> = Vec::with_capacity(total);
    for block in workbook.blocks() {
        match detect_layout(block, options) {
            Ok(layout) => {
                log_info_indent(
                    format!(
                        "{}: {:?}, {} lane(s), {} data row(s)",
                        block.locator,
                        layout.orientation,
                        layout.lanes.len(),
                        layout.data_rows.len()
                    ),
                    1,
                );
                classified.push((block, layout));
            }
            Err(err) => {
                malformed += 1;
                log_warning_indent(err.to_string(), 1);
                assembler.reject_block(BlockRejection {
                    locator: err.locator.clone(),
                    reason: err.issue.to_string(),
                });
            }
        }
    }

    // Step 3: Extract
    tracker.enter(Stage::Extracting);
    let mut extractors = Vec::with_capacity(classified.len());
    for (block, layout) in &classified {
        match EntryExtractor::new(block, layout, options) {
            Ok(extractor) => extractors.push(extractor),
            Err(err) => {
                malformed += 1;
                log_warning_indent(err.to_string(), 1);
                assembler.reject_block(BlockRejection {
                    locator: err.locator.clone(),
                    reason: err.issue.to_string(),
                });
            }
        }
    }

    if total > 0 && malformed as f64 / total as f64 > options.malformed_block_tolerance {
        let (_, rejections) = assembler.finish();
        return Err(PipelineError::TooManyMalformedBlocks {
            malformed,
            total,
            rejections: Box::new(rejections),
        });
    }
    if malformed > 0 {
        log_warning(format!("{} of {} block(s) skipped as malformed", malformed, total));
    }

    // Step 4: Validate
    tracker.enter(Stage::Validating);
    let validator = TokenValidator::new(vocabulary);
    let validated: Vec<ValidatedEntry> = extractors
        .iter()
        .flat_map(|extractor| validator.validate_all(extractor.entries()))
        .collect();
    let valid = validated.iter().filter(|v| v.is_valid()).count();
    log_info(format!(
        "{} entries extracted, {} resolved against the vocabularies",
        validated.len(),
        valid
    ));

    // Step 5: Assemble
    tracker.enter(Stage::Assembling);
    assembler.extend(validated);
    let (schedule, rejections) = assembler.finish();
    report_rejections(&rejections);

    if schedule.is_empty() {
        return Err(PipelineError::NoResultsFound {
            rejections: Box::new(rejections),
        });
    }

    let catalog = DivisionCatalog::build(&input.college, &schedule);
    let outcome = MatrixOutcome {
        run_id,
        processed_at,
        department: input.department.clone(),
        college: input.college.clone(),
        source: input.source.clone(),
        schedule,
        catalog,
        rejections,
        blocks_processed: total,
        blocks_malformed: malformed,
    };

    // Step 6: Guard the payload before handing it out
    if !options.skip_validation {
        let payload = serde_json::to_value(MatrixResponse::from(&outcome))
            .map_err(|e| PipelineError::SchemaViolation(vec![e.to_string()]))?;
        validate_matrix_response(&payload).map_err(PipelineError::SchemaViolation)?;
    }

    Ok(outcome)
}

fn report_rejections(rejections: &RejectionReport) {
    if rejections.entries.is_empty() {
        return;
    }
    log_warning(format!(
        "{} rejected: {} unknown faculty, {} unknown subject, {} malformed",
        rejections.entries.len(),
        rejections.count(ResolutionTag::UnknownFaculty),
        rejections.count(ResolutionTag::UnknownSubject),
        rejections.count(ResolutionTag::Malformed)
    ));
    for rejection in rejections.entries.iter().take(5) {
        log_warning_indent(
            format!("{} '{}': {}", rejection.locator, rejection.cell_text, rejection.detail),
            1,
        );
    }
    if rejections.entries.len() > 5 {
        log_warning_indent(format!("... +{}", rejections.entries.len() - 5), 1);
    }
}

/// Run one invocation on the blocking pool with the store's current snapshot.
pub async fn run_matrix_pipeline_async(
    input: MatrixInput,
    store: &VocabularyStore,
    options: PipelineOptions,
) -> PipelineResult<MatrixOutcome> {
    let snapshot = store.snapshot();
    tokio::task::spawn_blocking(move || run_matrix_pipeline(&input, &snapshot, &options)).await?
}

/// Run several invocations concurrently. Results keep the input order.
pub async fn ingest_many(
    inputs: Vec<MatrixInput>,
    store: &VocabularyStore,
    options: &PipelineOptions,
) -> Vec<PipelineResult<MatrixOutcome>> {
    join_all(
        inputs
            .into_iter()
            .map(|input| run_matrix_pipeline_async(input, store, options.clone())),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::models::Weekday;
    use crate::vocabulary::{ReferenceVocabulary, StaticVocabulary};

    fn vocabulary() -> VocabularySnapshot {
        VocabularySnapshot::new(
            ReferenceVocabulary::new(["JS", "AB"]),
            ReferenceVocabulary::new(["DS", "OT"]),
        )
    }

    fn csv_input(content: &str) -> MatrixInput {
        MatrixInput::new(content.as_bytes().to_vec(), FileFormat::Csv, "CE").with_source("ce.csv")
    }

    #[test]
    fn test_single_valid_cell() {
        let input = csv_input("Day,Slot,Div A\nMON,1,DS-JS\nMON,2,\n");
        let outcome =
            run_matrix_pipeline(&input, &vocabulary(), &PipelineOptions::default()).unwrap();

        let occurrences = outcome.schedule.occurrences("CE", "JS", "DS");
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].day, Weekday::Monday);
        assert!(outcome.rejections.is_empty());
        assert_eq!(outcome.college, DEFAULT_COLLEGE);
        assert_eq!(outcome.blocks_processed, 1);
    }

    #[test]
    fn test_unknown_faculty_is_no_results() {
        let input = csv_input("Day,Slot,Div A\nMON,1,DS-XX\nMON,2,\n");
        let err =
            run_matrix_pipeline(&input, &vocabulary(), &PipelineOptions::default()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NoResultsFound);
        let report = err.rejections().unwrap();
        assert_eq!(report.count(ResolutionTag::UnknownFaculty), 1);
    }

    #[test]
    fn test_malformed_single_block_fails_run() {
        let input = csv_input("Timetable\nprepared by office\n");
        let err =
            run_matrix_pipeline(&input, &vocabulary(), &PipelineOptions::default()).unwrap_err();
        match err {
            PipelineError::TooManyMalformedBlocks {
                malformed,
                total,
                rejections,
            } => {
                assert_eq!((malformed, total), (1, 1));
                assert_eq!(rejections.blocks.len(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tolerance_allows_everything() {
        let input = csv_input("Timetable\nprepared by office\n");
        let options = PipelineOptions {
            malformed_block_tolerance: 1.0,
            ..PipelineOptions::default()
        };
        let err = run_matrix_pipeline(&input, &vocabulary(), &options).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NoResultsFound);
        assert_eq!(err.rejections().unwrap().blocks.len(), 1);
    }

    #[test]
    fn test_empty_upload() {
        let err = run_matrix_pipeline(&csv_input(""), &vocabulary(), &PipelineOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::EmptyWorkbook);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ce.csv");
        std::fs::write(&path, "Day,Slot,Div A\nMON,1,DS-JS\nMON,2,OT-AB\n").unwrap();

        let input = MatrixInput::from_file(&path, "CE").unwrap().with_college("LDCE");
        assert_eq!(input.source.as_deref(), Some("ce.csv"));
        let outcome =
            run_matrix_pipeline(&input, &vocabulary(), &PipelineOptions::default()).unwrap();
        assert_eq!(outcome.schedule.occurrence_count(), 2);
        assert!(outcome.catalog.subject("LDCE", "CE", "-", "A", "OT").is_some());
    }

    #[tokio::test]
    async fn test_async_runs_keep_input_order() {
        let store = VocabularyStore::from_provider(&StaticVocabulary::new(["JS"], ["DS"])).unwrap();
        let inputs = vec![
            csv_input("Day,Slot,Div A\nMON,1,DS-JS\nMON,2,\n"),
            MatrixInput::new(b"garbage".to_vec(), FileFormat::Xlsx, "CE"),
            csv_input("Day,Slot,Div B\nTUE,1,DS-JS\nTUE,2,DS-JS\n"),
        ];

        let results = ingest_many(inputs, &store, &PipelineOptions::default()).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().kind(), FailureKind::UnreadableFile);
        let lab = results[2].as_ref().unwrap();
        assert_eq!(lab.schedule.occurrence_count(), 2);
    }
}
