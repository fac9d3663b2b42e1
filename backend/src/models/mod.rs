//! Domain models for the faculty matrix pipeline.
//!
//! This module contains the data structures that flow between the stages:
//!
//! - [`Weekday`] / [`LectureType`] - Schedule vocabulary
//! - [`BlockLocator`] / [`CellLocator`] - Where something came from in the workbook
//! - [`RawScheduleEntry`] - One extracted (cell, slot) before validation
//! - [`ValidatedEntry`] / [`Resolution`] - An entry after vocabulary lookup
//! - [`MatrixResult`] - department → faculty → subject → occurrences
//! - [`RejectionReport`] - Everything that did not make it into the result

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Weekday
// =============================================================================

/// A teaching day. Matrices never schedule Sundays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    /// All teaching days in calendar order.
    pub const ALL: [Weekday; 6] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    /// Parse a day label as it appears in a matrix ("MON", "Tues", "THURSDAY.").
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().trim_end_matches(['.', ':']).to_uppercase();
        match normalized.as_str() {
            "MON" | "MONDAY" => Some(Self::Monday),
            "TUE" | "TUES" | "TUESDAY" => Some(Self::Tuesday),
            "WED" | "WEDNESDAY" => Some(Self::Wednesday),
            "THU" | "THUR" | "THURS" | "THURSDAY" => Some(Self::Thursday),
            "FRI" | "FRIDAY" => Some(Self::Friday),
            "SAT" | "SATURDAY" => Some(Self::Saturday),
            _ => None,
        }
    }

    /// Full English name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Lecture Type
// =============================================================================

/// Kind of teaching session a cell stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LectureType {
    /// Single-slot session.
    Lecture,
    /// Multi-slot practical session.
    Lab,
    /// Tutorial session, marked explicitly in the cell.
    Tutorial,
    /// Cell could not be classified.
    Unknown,
}

impl LectureType {
    /// Recognize a marker word inside a cell ("TUT", "LAB", "PR").
    pub fn from_marker(word: &str) -> Option<Self> {
        let normalized = word.trim_matches(|c: char| !c.is_alphanumeric()).to_uppercase();
        match normalized.as_str() {
            "TUT" | "TUTORIAL" => Some(Self::Tutorial),
            "LAB" | "PR" | "PRACTICAL" => Some(Self::Lab),
            _ => None,
        }
    }
}

// =============================================================================
// Locators
// =============================================================================

/// Position of a table block inside the uploaded workbook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockLocator {
    /// Sheet name (file stem for CSV input).
    pub sheet: String,
    /// Zero-based position of the block in the workbook.
    pub index: usize,
    /// Zero-based sheet row of the block's first grid row.
    pub origin_row: u32,
    /// Zero-based sheet column of the block's first grid column.
    pub origin_col: u32,
}

impl BlockLocator {
    pub fn new(sheet: impl Into<String>, index: usize) -> Self {
        Self {
            sheet: sheet.into(),
            index,
            origin_row: 0,
            origin_col: 0,
        }
    }

    pub fn with_origin(mut self, row: u32, col: u32) -> Self {
        self.origin_row = row;
        self.origin_col = col;
        self
    }

    /// Locate a grid cell of this block in sheet coordinates.
    pub fn cell(&self, row: usize, col: usize) -> CellLocator {
        CellLocator {
            sheet: self.sheet.clone(),
            block: self.index,
            row: self.origin_row + row as u32 + 1,
            column: self.origin_col + col as u32 + 1,
        }
    }
}

impl fmt::Display for BlockLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sheet '{}' (block {})", self.sheet, self.index)
    }
}

/// Position of a single cell, one-based like spreadsheet applications show it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellLocator {
    pub sheet: String,
    pub block: usize,
    pub row: u32,
    pub column: u32,
}

impl CellLocator {
    /// A1-style reference ("C5").
    pub fn a1(&self) -> String {
        format!("{}{}", column_letters(self.column), self.row)
    }
}

impl fmt::Display for CellLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet, self.a1())
    }
}

/// Spreadsheet column letters for a one-based column number (1 → A, 28 → AB).
pub fn column_letters(column: u32) -> String {
    let mut remaining = column;
    let mut letters = Vec::new();
    while remaining > 0 {
        let rem = ((remaining - 1) % 26) as u8;
        letters.push(char::from(b'A' + rem));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

// =============================================================================
// Raw Schedule Entry
// =============================================================================

/// Why the extractor could not classify a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParseIssue {
    /// Content did not follow the cell convention of its lane.
    Unsplittable,
    /// Identical content spans more slots than a lab may cover.
    RunTooLong { span: usize },
}

/// One schedule cell (or one covered slot of a lab block) before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScheduleEntry {
    pub locator: CellLocator,
    /// Division letter(s), e.g. "A", or "ALL".
    pub division: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    pub day: Weekday,
    pub time_slot: u32,
    pub raw_subject_token: String,
    pub raw_faculty_token: String,
    pub lecture_type: LectureType,
    /// Full cell text the tokens were split from.
    pub cell_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_issue: Option<ParseIssue>,
}

// =============================================================================
// Validation outcome
// =============================================================================

/// Which token of an entry a problem refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenField {
    Faculty,
    Subject,
}

/// Reason an entry was tagged Malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MalformedReason {
    /// A token was empty after normalization.
    EmptyToken { field: TokenField },
    /// Cell content did not follow the separator convention.
    Unsplittable,
    /// Identical content ran over more slots than a lab may span.
    RunTooLong { span: usize },
    /// The same occurrence was already recorded for this faculty and subject.
    DuplicateOccurrence,
}

impl From<ParseIssue> for MalformedReason {
    fn from(issue: ParseIssue) -> Self {
        match issue {
            ParseIssue::Unsplittable => Self::Unsplittable,
            ParseIssue::RunTooLong { span } => Self::RunTooLong { span },
        }
    }
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyToken { field: TokenField::Faculty } => f.write_str("empty faculty token"),
            Self::EmptyToken { field: TokenField::Subject } => f.write_str("empty subject token"),
            Self::Unsplittable => f.write_str("cell does not match the expected subject/faculty convention"),
            Self::RunTooLong { span } => write!(f, "identical content spans {} slots", span),
            Self::DuplicateOccurrence => f.write_str("duplicate occurrence for this faculty and subject"),
        }
    }
}

/// Identifiers of a resolved entry, in normalized vocabulary form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIds {
    pub faculty: String,
    pub subject: String,
}

/// Result of resolving an entry against the reference vocabularies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Valid(ResolvedIds),
    /// Faculty token not in the vocabulary; `subject_known` is kept for diagnostics.
    UnknownFaculty { subject_known: bool },
    UnknownSubject,
    Malformed(MalformedReason),
}

/// Serializable tag of a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResolutionTag {
    Valid,
    UnknownFaculty,
    UnknownSubject,
    Malformed,
}

impl Resolution {
    pub fn tag(&self) -> ResolutionTag {
        match self {
            Self::Valid(_) => ResolutionTag::Valid,
            Self::UnknownFaculty { .. } => ResolutionTag::UnknownFaculty,
            Self::UnknownSubject => ResolutionTag::UnknownSubject,
            Self::Malformed(_) => ResolutionTag::Malformed,
        }
    }

    /// Human-readable explanation for rejection reports.
    pub fn detail(&self) -> String {
        match self {
            Self::Valid(_) => "valid".to_string(),
            Self::UnknownFaculty { subject_known: true } => {
                "faculty not in vocabulary (subject known)".to_string()
            }
            Self::UnknownFaculty { subject_known: false } => {
                "faculty not in vocabulary (subject also unknown)".to_string()
            }
            Self::UnknownSubject => "subject not in vocabulary".to_string(),
            Self::Malformed(reason) => reason.to_string(),
        }
    }
}

/// A raw entry with its resolution. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEntry {
    pub entry: RawScheduleEntry,
    pub resolution: Resolution,
}

impl ValidatedEntry {
    pub fn is_valid(&self) -> bool {
        matches!(self.resolution, Resolution::Valid(_))
    }

    /// Demote to Malformed, keeping the raw entry.
    pub fn demote(self, reason: MalformedReason) -> Self {
        Self {
            entry: self.entry,
            resolution: Resolution::Malformed(reason),
        }
    }
}

// =============================================================================
// Matrix Result
// =============================================================================

/// One scheduled session of a faculty member for a subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<u32>,
    pub division: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    pub day: Weekday,
    pub time_slot: u32,
    pub lecture_type: LectureType,
}

/// Identity of an occurrence inside one faculty+subject leaf.
pub type OccurrenceKey = (Option<u32>, String, Option<String>, Weekday, u32);

impl Occurrence {
    pub fn from_entry(entry: &RawScheduleEntry) -> Self {
        Self {
            semester: entry.semester,
            division: entry.division.clone(),
            batch: entry.batch.clone(),
            day: entry.day,
            time_slot: entry.time_slot,
            lecture_type: entry.lecture_type,
        }
    }

    pub fn key(&self) -> OccurrenceKey {
        (
            self.semester,
            self.division.clone(),
            self.batch.clone(),
            self.day,
            self.time_slot,
        )
    }
}

/// subject id → occurrences in extraction order.
pub type SubjectOccurrences = BTreeMap<String, Vec<Occurrence>>;

/// faculty id → subjects.
pub type FacultySchedule = BTreeMap<String, SubjectOccurrences>;

/// Canonical output: department → faculty → subject → occurrences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MatrixResult {
    departments: BTreeMap<String, FacultySchedule>,
}

impl MatrixResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an occurrence unless the same key already exists in its leaf.
    ///
    /// Returns the rejected occurrence on a duplicate.
    pub fn try_insert(
        &mut self,
        department: &str,
        faculty: &str,
        subject: &str,
        occurrence: Occurrence,
    ) -> Result<(), Occurrence> {
        let leaf = self
            .departments
            .entry(department.to_string())
            .or_default()
            .entry(faculty.to_string())
            .or_default()
            .entry(subject.to_string())
            .or_default();

        let key = occurrence.key();
        if leaf.iter().any(|existing| existing.key() == key) {
            return Err(occurrence);
        }
        leaf.push(occurrence);
        Ok(())
    }

    /// True when no occurrence was recorded.
    pub fn is_empty(&self) -> bool {
        self.occurrence_count() == 0
    }

    pub fn occurrence_count(&self) -> usize {
        self.iter().count()
    }

    /// Occurrences of one leaf, empty if the path does not exist.
    pub fn occurrences(&self, department: &str, faculty: &str, subject: &str) -> &[Occurrence] {
        self.departments
            .get(department)
            .and_then(|f| f.get(faculty))
            .and_then(|s| s.get(subject))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Flatten to (department, faculty, subject, occurrence) in map order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str, &Occurrence)> {
        self.departments.iter().flat_map(|(dept, faculties)| {
            faculties.iter().flat_map(move |(faculty, subjects)| {
                subjects.iter().flat_map(move |(subject, occurrences)| {
                    occurrences
                        .iter()
                        .map(move |o| (dept.as_str(), faculty.as_str(), subject.as_str(), o))
                })
            })
        })
    }
}

// =============================================================================
// Rejection Report
// =============================================================================

/// A non-valid entry, kept for caller diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub locator: CellLocator,
    pub division: String,
    pub day: Weekday,
    pub time_slot: u32,
    pub raw_subject_token: String,
    pub raw_faculty_token: String,
    pub cell_text: String,
    pub tag: ResolutionTag,
    pub detail: String,
}

impl From<&ValidatedEntry> for Rejection {
    fn from(validated: &ValidatedEntry) -> Self {
        let entry = &validated.entry;
        Self {
            locator: entry.locator.clone(),
            division: entry.division.clone(),
            day: entry.day,
            time_slot: entry.time_slot,
            raw_subject_token: entry.raw_subject_token.clone(),
            raw_faculty_token: entry.raw_faculty_token.clone(),
            cell_text: entry.cell_text.clone(),
            tag: validated.resolution.tag(),
            detail: validated.resolution.detail(),
        }
    }
}

/// A whole block that was rejected before extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRejection {
    pub locator: BlockLocator,
    pub reason: String,
}

/// Ordered record of everything that did not reach the [`MatrixResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionReport {
    pub entries: Vec<Rejection>,
    pub blocks: Vec<BlockRejection>,
}

impl RejectionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.blocks.is_empty()
    }

    /// Number of rejected entries carrying `tag`.
    pub fn count(&self, tag: ResolutionTag) -> usize {
        self.entries.iter().filter(|r| r.tag == tag).count()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrence(division: &str, day: Weekday, slot: u32) -> Occurrence {
        Occurrence {
            semester: None,
            division: division.to_string(),
            batch: None,
            day,
            time_slot: slot,
            lecture_type: LectureType::Lecture,
        }
    }

    #[test]
    fn test_weekday_labels() {
        assert_eq!(Weekday::from_label("MON"), Some(Weekday::Monday));
        assert_eq!(Weekday::from_label(" tues "), Some(Weekday::Tuesday));
        assert_eq!(Weekday::from_label("THUR"), Some(Weekday::Thursday));
        assert_eq!(Weekday::from_label("Saturday."), Some(Weekday::Saturday));
        assert_eq!(Weekday::from_label("SUN"), None);
        assert_eq!(Weekday::from_label("DAY"), None);
    }

    #[test]
    fn test_lecture_markers() {
        assert_eq!(LectureType::from_marker("TUT"), Some(LectureType::Tutorial));
        assert_eq!(LectureType::from_marker("(lab)"), Some(LectureType::Lab));
        assert_eq!(LectureType::from_marker("DS"), None);
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(28), "AB");
    }

    #[test]
    fn test_cell_locator_is_one_based() {
        let block = BlockLocator::new("CE", 0).with_origin(2, 1);
        let cell = block.cell(0, 0);
        assert_eq!(cell.row, 3);
        assert_eq!(cell.column, 2);
        assert_eq!(cell.to_string(), "CE!B3");
    }

    #[test]
    fn test_try_insert_rejects_duplicate_key() {
        let mut result = MatrixResult::new();
        assert!(result
            .try_insert("CE", "JS", "DS", occurrence("A", Weekday::Monday, 1))
            .is_ok());

        let mut lab = occurrence("A", Weekday::Monday, 1);
        lab.lecture_type = LectureType::Lab;
        assert!(result.try_insert("CE", "JS", "DS", lab).is_err());

        assert!(result
            .try_insert("CE", "JS", "DS", occurrence("B", Weekday::Monday, 1))
            .is_ok());
        assert_eq!(result.occurrence_count(), 2);
        assert_eq!(result.occurrences("CE", "JS", "DS").len(), 2);
    }

    #[test]
    fn test_matrix_result_serializes_as_nested_maps() {
        let mut result = MatrixResult::new();
        result
            .try_insert("CE", "JS", "DS", occurrence("A", Weekday::Monday, 1))
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["CE"]["JS"]["DS"][0]["division"], "A");
        assert_eq!(json["CE"]["JS"]["DS"][0]["day"], "Monday");
        assert_eq!(json["CE"]["JS"]["DS"][0]["timeSlot"], 1);
        assert_eq!(json["CE"]["JS"]["DS"][0]["lectureType"], "Lecture");
        assert!(json["CE"]["JS"]["DS"][0].get("batch").is_none());
    }

    #[test]
    fn test_empty_result() {
        let result = MatrixResult::new();
        assert!(result.is_empty());
        assert!(result.occurrences("CE", "JS", "DS").is_empty());
    }
}
