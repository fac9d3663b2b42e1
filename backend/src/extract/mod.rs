//! Entry extraction: walk a classified block and yield raw schedule entries.
//!
//! Iteration is row-major over the data rows, then lane order. It is lazy
//! and restartable: every call to [`EntryExtractor::entries`] starts over.
//!
//! A vertical run of identical cells in one lane on one day is a lab block
//! when it covers 2..=`max_lab_span` slots; every covered slot becomes its
//! own `Lab` entry. A lone cell is a `Lecture`. Longer runs are `Unknown`.
//! Cells that do not follow the lane's convention are kept with both tokens
//! set to the cell text; the validator rejects them.

pub mod cell;

use std::collections::VecDeque;

use crate::config::PipelineOptions;
use crate::error::{BlockIssue, BlockResult, MalformedBlock};
use crate::layout::{CellFormat, DataRow, Entity, Lane, LayoutDescriptor};
use crate::loader::RawTableBlock;
use crate::models::{LectureType, ParseIssue, RawScheduleEntry, Weekday};

use cell::{parse_class_cell, split_subject_faculty, strip_markers, MarkedText};

/// Division recorded for a faculty-lane cell whose class info is unreadable.
const UNKNOWN_DIVISION: &str = "-";

/// Extracts [`RawScheduleEntry`] values from one block.
#[derive(Debug, Clone, Copy)]
pub struct EntryExtractor<'a> {
    block: &'a RawTableBlock,
    layout: &'a LayoutDescriptor,
    max_lab_span: usize,
}

impl<'a> EntryExtractor<'a> {
    /// Check the descriptor against the block before any cell is read.
    pub fn new(
        block: &'a RawTableBlock,
        layout: &'a LayoutDescriptor,
        options: &PipelineOptions,
    ) -> BlockResult<Self> {
        let mismatch = || {
            MalformedBlock::new(
                &block.locator,
                BlockIssue::DimensionMismatch {
                    expected_rows: layout.grid_rows,
                    expected_cols: layout.grid_cols,
                    rows: block.height(),
                    cols: block.width(),
                },
            )
        };

        if layout.grid_rows != block.height() || layout.grid_cols != block.width() {
            return Err(mismatch());
        }
        if layout.lanes.iter().any(|l| l.column >= block.width())
            || layout.data_rows.iter().any(|r| r.row >= block.height())
        {
            return Err(mismatch());
        }

        for row in &layout.data_rows {
            for lane in &layout.lanes {
                if block.cell(row.row, lane.column).is_none() {
                    continue;
                }
                if layout.owner(lane).is_none() {
                    return Err(MalformedBlock::new(&block.locator, BlockIssue::MissingCaption));
                }
                if layout.day(row, lane).is_none() {
                    let sheet_row = block.locator.cell(row.row, 0).row as usize;
                    return Err(MalformedBlock::new(
                        &block.locator,
                        BlockIssue::MissingDay { row: sheet_row },
                    ));
                }
            }
        }

        Ok(Self {
            block,
            layout,
            max_lab_span: options.max_lab_span,
        })
    }

    /// Lazy iterator over every entry of the block.
    pub fn entries(&self) -> Entries<'a> {
        Entries {
            extractor: *self,
            row: 0,
            lane: 0,
            pending: VecDeque::new(),
        }
    }

    fn text(&self, row: &DataRow, lane: &Lane) -> Option<&'a str> {
        self.block.cell(row.row, lane.column)
    }

    /// Number of consecutive data rows around `index` sharing its day and text.
    fn run_length(&self, index: usize, lane: &Lane) -> usize {
        let rows = &self.layout.data_rows;
        let Some(text) = self.text(&rows[index], lane) else {
            return 0;
        };
        let day = self.layout.day(&rows[index], lane);
        let same = |i: usize| {
            self.layout.day(&rows[i], lane) == day && self.text(&rows[i], lane) == Some(text)
        };

        let before = (0..index).rev().take_while(|&i| same(i)).count();
        let after = (index + 1..rows.len()).take_while(|&i| same(i)).count();
        before + 1 + after
    }

    /// Whether `text` divides into non-empty tokens under the block's cell format.
    fn splits(&self, text: &str) -> bool {
        match &self.layout.cell_format {
            CellFormat::SubjectFaculty { separator } => split_subject_faculty(text, separator)
                .is_some_and(|(subject, faculty)| !subject.is_empty() && !faculty.is_empty()),
            CellFormat::SubjectClassInfo => parse_class_cell(text).is_some(),
        }
    }

    /// Entries for one non-empty cell. A faculty-lane cell addressing
    /// several divisions yields one entry per division segment.
    fn cell_entries(&self, index: usize, lane: &Lane) -> Vec<RawScheduleEntry> {
        let row = &self.layout.data_rows[index];
        let (Some(text), Some(day), Some(owner)) = (
            self.text(row, lane),
            self.layout.day(row, lane),
            self.layout.owner(lane),
        ) else {
            return Vec::new();
        };

        let marked = match strip_markers(text) {
            stripped if stripped.marker.is_none() || self.splits(&stripped.text) => stripped,
            // The "marker" was one of the tokens
            _ => MarkedText::plain(text),
        };
        let span = self.run_length(index, lane);
        let (lecture_type, run_issue) = match marked.marker {
            Some(marker) => (marker, None),
            None if span <= 1 => (LectureType::Lecture, None),
            None if span <= self.max_lab_span => (LectureType::Lab, None),
            None => (LectureType::Unknown, Some(ParseIssue::RunTooLong { span })),
        };

        let base = RawScheduleEntry {
            locator: self.block.locator.cell(row.row, lane.column),
            division: UNKNOWN_DIVISION.to_string(),
            semester: None,
            batch: None,
            day,
            time_slot: row.slot,
            raw_subject_token: text.to_string(),
            raw_faculty_token: text.to_string(),
            lecture_type,
            cell_text: text.to_string(),
            parse_issue: run_issue,
        };

        match (&self.layout.cell_format, owner) {
            (CellFormat::SubjectFaculty { separator }, Entity::Division(division)) => {
                let mut entry = RawScheduleEntry {
                    division: division.clone(),
                    ..base
                };
                match split_subject_faculty(&marked.text, separator) {
                    Some((subject, faculty)) => {
                        entry.raw_subject_token = subject;
                        entry.raw_faculty_token = faculty;
                    }
                    None => mark_unsplittable(&mut entry),
                }
                vec![entry]
            }
            (CellFormat::SubjectClassInfo, Entity::Faculty(faculty)) => {
                match parse_class_cell(&marked.text) {
                    Some(class) => class
                        .segments
                        .into_iter()
                        .map(|segment| RawScheduleEntry {
                            division: segment.division,
                            semester: Some(class.semester),
                            batch: segment.batch,
                            raw_subject_token: class.subject.clone(),
                            raw_faculty_token: faculty.clone(),
                            ..base.clone()
                        })
                        .collect(),
                    None => {
                        let mut entry = base;
                        mark_unsplittable(&mut entry);
                        vec![entry]
                    }
                }
            }
            // Format and owner disagree: keep the cell, validator rejects it
            (_, _) => {
                let mut entry = base;
                mark_unsplittable(&mut entry);
                vec![entry]
            }
        }
    }
}

fn mark_unsplittable(entry: &mut RawScheduleEntry) {
    entry.raw_subject_token = entry.cell_text.clone();
    entry.raw_faculty_token = entry.cell_text.clone();
    entry.lecture_type = LectureType::Unknown;
    entry.parse_issue = Some(ParseIssue::Unsplittable);
}

/// Lazy entry sequence of one block.
#[derive(Debug, Clone)]
pub struct Entries<'a> {
    extractor: EntryExtractor<'a>,
    row: usize,
    lane: usize,
    pending: VecDeque<RawScheduleEntry>,
}

impl Iterator for Entries<'_> {
    type Item = RawScheduleEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let layout = self.extractor.layout;
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(entry);
            }
            if self.row >= layout.data_rows.len() || layout.lanes.is_empty() {
                return None;
            }

            let lane = &layout.lanes[self.lane];
            self.pending
                .extend(self.extractor.cell_entries(self.row, lane));

            self.lane += 1;
            if self.lane >= layout.lanes.len() {
                self.lane = 0;
                self.row += 1;
            }
        }
    }
}

/// Days a block schedules anything on, in calendar order.
pub fn scheduled_days<I>(entries: I) -> Vec<Weekday>
where
    I: IntoIterator<Item = RawScheduleEntry>,
{
    let mut days: Vec<Weekday> = entries.into_iter().map(|e| e.day).collect();
    days.sort();
    days.dedup();
    days
}
