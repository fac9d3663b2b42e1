//! Fold validated entries into the nested schedule and the rejection report.
//!
//! ```text
//! ValidatedEntry stream                 MatrixResult
//! ┌─────────────────────────────┐      ┌──────────────────────────────┐
//! │ Valid  JS/DS  A Mon 1       │  →   │ CE → JS → DS → [A Mon 1]     │
//! │ Valid  JS/DS  A Mon 1 (dup) │  →   │ RejectionReport:             │
//! │ UnknownFaculty  XX/DS       │  →   │   DuplicateOccurrence, XX/DS │
//! └─────────────────────────────┘      └──────────────────────────────┘
//! ```
//!
//! The department is fixed per run. A duplicate occurrence under the same
//! faculty and subject is demoted to Malformed; the first one stays.

use crate::models::{
    BlockRejection, MalformedReason, MatrixResult, Occurrence, Rejection, RejectionReport,
    Resolution, ValidatedEntry,
};

/// Accumulates one run's result. Never fails.
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    department: String,
    result: MatrixResult,
    rejections: RejectionReport,
}

impl ResultAssembler {
    pub fn new(department: impl Into<String>) -> Self {
        Self {
            department: department.into(),
            result: MatrixResult::new(),
            rejections: RejectionReport::new(),
        }
    }

    pub fn push(&mut self, validated: ValidatedEntry) {
        let ids = match &validated.resolution {
            Resolution::Valid(ids) => ids.clone(),
            _ => {
                self.rejections.entries.push(Rejection::from(&validated));
                return;
            }
        };

        let occurrence = Occurrence::from_entry(&validated.entry);
        if self
            .result
            .try_insert(&self.department, &ids.faculty, &ids.subject, occurrence)
            .is_err()
        {
            let demoted = validated.demote(MalformedReason::DuplicateOccurrence);
            self.rejections.entries.push(Rejection::from(&demoted));
        }
    }

    /// Record a block rejected before extraction.
    pub fn reject_block(&mut self, rejection: BlockRejection) {
        self.rejections.blocks.push(rejection);
    }

    pub fn valid_count(&self) -> usize {
        self.result.occurrence_count()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejections.entries.len()
    }

    pub fn finish(self) -> (MatrixResult, RejectionReport) {
        (self.result, self.rejections)
    }
}

impl Extend<ValidatedEntry> for ResultAssembler {
    fn extend<I: IntoIterator<Item = ValidatedEntry>>(&mut self, iter: I) {
        for validated in iter {
            self.push(validated);
        }
    }
}

/// Assemble a whole sequence at once.
pub fn assemble<I>(department: &str, entries: I) -> (MatrixResult, RejectionReport)
where
    I: IntoIterator<Item = ValidatedEntry>,
{
    let mut assembler = ResultAssembler::new(department);
    assembler.extend(entries);
    assembler.finish()
}
