//! Layout detection: classify a raw table block before extraction.
//!
//! A block is either **day-rows** (the timetable office's usual matrix: a
//! `Day` column, a `SLOT` column, then one column per faculty member or per
//! division) or **day-columns** (one table per division or faculty, days
//! across the top, slots down the side, the owner named in a caption above
//! the header).
//!
//! Header rows are found by keyword match. Detection is pure: the same
//! block always yields the same descriptor or the same [`BlockIssue`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::PipelineOptions;
use crate::error::{BlockIssue, BlockResult, MalformedBlock};
use crate::loader::RawTableBlock;
use crate::models::Weekday;

const DAY_KEYWORDS: &[&str] = &["DAY", "DAYS"];
const SLOT_KEYWORDS: &[&str] = &[
    "SLOT", "SLOTS", "TIME", "TIME SLOT", "TIMESLOT", "PERIOD", "LECTURE", "LEC",
];
const DIVISION_KEYWORDS: &[&str] = &["DIV", "DIVISION"];
const FACULTY_KEYWORDS: &[&str] = &["FACULTY", "FAC"];

/// Minimum slot-bearing rows for a block to count as a schedule.
const MIN_DATA_ROWS: usize = 2;

static DIVISION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:DIVISION|DIV)(?:\s*[:.\-]\s*|\s+)([A-Z0-9]+)$").expect("valid regex pattern")
});

static CAPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(DIVISION|DIV|FACULTY|FAC)(?:\s*[:.\-]\s*|\s+)(\S+)$").expect("valid regex pattern")
});

static LEADING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+").expect("valid regex pattern"));

// =============================================================================
// Descriptor types
// =============================================================================

/// What the schedule columns of a day-rows block stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnAxis {
    Division,
    Faculty,
}

impl ColumnAxis {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "division" | "div" => Some(Self::Division),
            "faculty" | "fac" => Some(Self::Faculty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    /// Days down the rows, entities across the columns.
    DayRows,
    /// Days across the columns, one entity per block.
    DayColumns,
}

/// Who a schedule cell belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum Entity {
    Division(String),
    Faculty(String),
}

/// What a lane (data column) denotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LaneKey {
    Entity(Entity),
    Day(Weekday),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lane {
    /// Zero-based grid column.
    pub column: usize,
    pub header: String,
    pub key: LaneKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRow {
    /// Zero-based grid row.
    pub row: usize,
    pub slot: u32,
    /// Day of a day-rows row, carried forward over blank day cells.
    pub day: Option<Weekday>,
}

/// How a cell splits into subject and faculty tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CellFormat {
    /// "DS-JS": subject, separator, faculty. Used when cells belong to a division.
    SubjectFaculty { separator: String },
    /// "DS 5A1/A2": subject and class info. Used when cells belong to a faculty member.
    SubjectClassInfo,
}

/// Classified shape of one table block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDescriptor {
    pub header_row: usize,
    pub orientation: Orientation,
    pub slot_column: usize,
    pub day_column: Option<usize>,
    /// Owner of the whole block (day-columns only).
    pub entity: Option<Entity>,
    pub lanes: Vec<Lane>,
    pub data_rows: Vec<DataRow>,
    pub cell_format: CellFormat,
    /// Grid dimensions the descriptor was computed for.
    pub grid_rows: usize,
    pub grid_cols: usize,
}

impl LayoutDescriptor {
    /// Owner of the cells in `lane`.
    pub fn owner<'a>(&'a self, lane: &'a Lane) -> Option<&'a Entity> {
        match &lane.key {
            LaneKey::Entity(entity) => Some(entity),
            LaneKey::Day(_) => self.entity.as_ref(),
        }
    }

    /// Day of the cell at (`row`, `lane`).
    pub fn day(&self, row: &DataRow, lane: &Lane) -> Option<Weekday> {
        match lane.key {
            LaneKey::Day(day) => Some(day),
            LaneKey::Entity(_) => row.day,
        }
    }

    pub fn axis(&self) -> ColumnAxis {
        match self.cell_format {
            CellFormat::SubjectFaculty { .. } => ColumnAxis::Division,
            CellFormat::SubjectClassInfo => ColumnAxis::Faculty,
        }
    }
}

// =============================================================================
// Detection
// =============================================================================

#[derive(Debug, Clone)]
enum HeaderCandidate {
    DayRows {
        row: usize,
        day_col: usize,
        slot_col: usize,
    },
    DayColumns {
        row: usize,
        slot_col: usize,
        days: Vec<(usize, Weekday)>,
    },
}

impl HeaderCandidate {
    fn row(&self) -> usize {
        match self {
            Self::DayRows { row, .. } | Self::DayColumns { row, .. } => *row,
        }
    }
}

/// Classify `block` into a [`LayoutDescriptor`].
pub fn detect_layout(
    block: &RawTableBlock,
    options: &PipelineOptions,
) -> BlockResult<LayoutDescriptor> {
    let malformed = |issue| MalformedBlock::new(&block.locator, issue);

    let candidates: Vec<HeaderCandidate> = (0..block.height())
        .filter_map(|row| classify_header(block, row))
        .collect();

    let header = match candidates.as_slice() {
        [] => return Err(malformed(BlockIssue::NoHeaderRow)),
        [only] => only.clone(),
        many => {
            let rows = many.iter().map(|c| sheet_row(block, c.row())).collect();
            return Err(malformed(BlockIssue::AmbiguousHeader(rows)));
        }
    };

    let (orientation, header_row, slot_col, day_col, entity, lanes) = match header {
        HeaderCandidate::DayRows {
            row,
            day_col,
            slot_col,
        } => {
            let lanes = day_rows_lanes(block, row, day_col.max(slot_col) + 1, options)
                .map_err(malformed)?;
            (Orientation::DayRows, row, slot_col, Some(day_col), None, lanes)
        }
        HeaderCandidate::DayColumns {
            row,
            slot_col,
            days,
        } => {
            let entity = find_caption(block, row).ok_or_else(|| malformed(BlockIssue::MissingCaption))?;
            let lanes = days
                .into_iter()
                .map(|(column, day)| Lane {
                    column,
                    header: block.cell(row, column).unwrap_or_default().to_string(),
                    key: LaneKey::Day(day),
                })
                .collect();
            (Orientation::DayColumns, row, slot_col, None, Some(entity), lanes)
        }
    };

    let data_rows = scan_data_rows(block, header_row, slot_col, day_col, &lanes).map_err(malformed)?;
    check_unique_slots(&data_rows, &lanes).map_err(malformed)?;

    let cell_format = match lanes.first().map(|l| &l.key) {
        Some(LaneKey::Entity(Entity::Division(_))) | None => CellFormat::SubjectFaculty {
            separator: options.cell_separator.clone(),
        },
        Some(LaneKey::Entity(Entity::Faculty(_))) => CellFormat::SubjectClassInfo,
        Some(LaneKey::Day(_)) => match &entity {
            Some(Entity::Faculty(_)) => CellFormat::SubjectClassInfo,
            _ => CellFormat::SubjectFaculty {
                separator: options.cell_separator.clone(),
            },
        },
    };

    Ok(LayoutDescriptor {
        header_row,
        orientation,
        slot_column: slot_col,
        day_column: day_col,
        entity,
        lanes,
        data_rows,
        cell_format,
        grid_rows: block.height(),
        grid_cols: block.width(),
    })
}

fn classify_header(block: &RawTableBlock, row: usize) -> Option<HeaderCandidate> {
    let cells = block.row(row);
    let slot_col = cells
        .iter()
        .position(|c| c.as_deref().is_some_and(|t| is_keyword(t, SLOT_KEYWORDS)))?;

    let days: Vec<(usize, Weekday)> = cells
        .iter()
        .enumerate()
        .filter_map(|(col, c)| Some((col, Weekday::from_label(c.as_deref()?)?)))
        .collect();
    if days.len() >= 2 {
        return Some(HeaderCandidate::DayColumns {
            row,
            slot_col,
            days,
        });
    }

    let labeled = cells
        .iter()
        .position(|c| c.as_deref().is_some_and(|t| is_keyword(t, DAY_KEYWORDS)));
    let day_col = match labeled {
        Some(col) => col,
        // Unlabeled day column left of the slot column
        None => {
            let col = slot_col.checked_sub(1)?;
            let has_days = (row + 1..block.height())
                .any(|r| block.cell(r, col).and_then(Weekday::from_label).is_some());
            if !has_days {
                return None;
            }
            col
        }
    };

    Some(HeaderCandidate::DayRows {
        row,
        day_col,
        slot_col,
    })
}

fn day_rows_lanes(
    block: &RawTableBlock,
    header_row: usize,
    first_col: usize,
    options: &PipelineOptions,
) -> Result<Vec<Lane>, BlockIssue> {
    let headers: Vec<(usize, String)> = (first_col..block.width())
        .map_while(|col| block.cell(header_row, col).map(|h| (col, h.to_string())))
        .collect();
    if headers.is_empty() {
        return Err(BlockIssue::NoLanes {
            row: sheet_row(block, header_row),
        });
    }

    let divisions: Vec<Option<String>> = headers.iter().map(|(_, h)| division_of(h)).collect();
    let axis = match options.column_axis {
        Some(axis) => axis,
        None if divisions.iter().all(Option::is_some) => ColumnAxis::Division,
        None if divisions.iter().all(Option::is_none) => ColumnAxis::Faculty,
        None => return Err(BlockIssue::MixedColumnAxis),
    };

    Ok(headers
        .into_iter()
        .zip(divisions)
        .map(|((column, header), division)| {
            let entity = match axis {
                ColumnAxis::Division => {
                    Entity::Division(division.unwrap_or_else(|| header.to_uppercase()))
                }
                ColumnAxis::Faculty => Entity::Faculty(header.clone()),
            };
            Lane {
                column,
                header,
                key: LaneKey::Entity(entity),
            }
        })
        .collect())
}

/// Walk the rows under the header and collect the slot-bearing ones.
fn scan_data_rows(
    block: &RawTableBlock,
    header_row: usize,
    slot_col: usize,
    day_col: Option<usize>,
    lanes: &[Lane],
) -> Result<Vec<DataRow>, BlockIssue> {
    let slots: Vec<(usize, Option<u32>)> = (header_row + 1..block.height())
        .map(|row| (row, block.cell(row, slot_col).and_then(parse_slot)))
        .collect();

    let found = slots.iter().filter(|(_, s)| s.is_some()).count();
    if found < MIN_DATA_ROWS {
        return Err(BlockIssue::TooFewDataRows { found });
    }

    // Rows after the last slot are footer
    let last = slots
        .iter()
        .rposition(|(_, s)| s.is_some())
        .unwrap_or_default();
    let first = slots.iter().position(|(_, s)| s.is_some()).unwrap_or_default();

    let has_content = |row: usize| lanes.iter().any(|l| block.cell(row, l.column).is_some());

    let mut data_rows = Vec::with_capacity(found);
    let mut current_day = None;
    for &(row, slot) in &slots[..=last] {
        if let Some(col) = day_col {
            if let Some(day) = block.cell(row, col).and_then(Weekday::from_label) {
                current_day = Some(day);
            }
        }

        match slot {
            Some(slot) => {
                if day_col.is_some() && current_day.is_none() && has_content(row) {
                    return Err(BlockIssue::MissingDay {
                        row: sheet_row(block, row),
                    });
                }
                data_rows.push(DataRow {
                    row,
                    slot,
                    day: current_day,
                });
            }
            None if row > slots[first].0 && has_content(row) => {
                return Err(BlockIssue::MissingSlot {
                    row: sheet_row(block, row),
                });
            }
            None => {}
        }
    }

    Ok(data_rows)
}

/// Every (day, slot) pair must be reachable through exactly one row and lane.
fn check_unique_slots(data_rows: &[DataRow], lanes: &[Lane]) -> Result<(), BlockIssue> {
    let lane_days: Vec<Weekday> = lanes
        .iter()
        .filter_map(|l| match l.key {
            LaneKey::Day(day) => Some(day),
            LaneKey::Entity(_) => None,
        })
        .collect();

    let mut seen_days = HashSet::new();
    for &day in &lane_days {
        if !seen_days.insert(day) {
            let slot = data_rows.first().map(|r| r.slot).unwrap_or(1);
            return Err(BlockIssue::DuplicateSlot { day, slot });
        }
    }

    let mut seen = HashSet::new();
    for row in data_rows {
        let day = match (row.day, lane_days.first()) {
            (Some(day), _) => day,
            (None, Some(&day)) => day,
            (None, None) => continue,
        };
        if !seen.insert((day, row.slot)) {
            return Err(BlockIssue::DuplicateSlot {
                day,
                slot: row.slot,
            });
        }
    }
    Ok(())
}

/// Caption above a day-columns header naming the block's owner.
///
/// The row closest to the header wins.
fn find_caption(block: &RawTableBlock, header_row: usize) -> Option<Entity> {
    (0..header_row).rev().find_map(|row| {
        let cells: Vec<&str> = block.row(row).iter().flatten().map(String::as_str).collect();
        cells.iter().enumerate().find_map(|(i, text)| {
            if let Some(caps) = CAPTION.captures(text) {
                return Some(entity_for(&caps[1], &caps[2]));
            }
            if is_keyword(text, DIVISION_KEYWORDS) || is_keyword(text, FACULTY_KEYWORDS) {
                let value = cells.get(i + 1)?;
                if value.split_whitespace().count() == 1 {
                    return Some(entity_for(text, value));
                }
            }
            None
        })
    })
}

fn entity_for(keyword: &str, value: &str) -> Entity {
    if is_keyword(keyword, DIVISION_KEYWORDS) {
        Entity::Division(value.to_uppercase())
    } else {
        Entity::Faculty(value.to_string())
    }
}

/// Division named by a lane header ("Div A" → "A").
fn division_of(header: &str) -> Option<String> {
    DIVISION_HEADER
        .captures(header.trim())
        .map(|caps| caps[1].to_uppercase())
}

fn normalize_keyword(text: &str) -> String {
    text.trim()
        .trim_end_matches([':', '.'])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn is_keyword(text: &str, keywords: &[&str]) -> bool {
    let normalized = normalize_keyword(text);
    keywords.contains(&normalized.as_str())
}

/// Slot ordinal from leading digits ("1", "1.0", "3 (10:30)").
pub fn parse_slot(text: &str) -> Option<u32> {
    LEADING_DIGITS
        .find(text.trim())
        .and_then(|m| m.as_str().parse().ok())
        .filter(|&slot| slot >= 1)
}

/// One-based sheet row of a grid row, for messages.
fn sheet_row(block: &RawTableBlock, row: usize) -> usize {
    block.locator.cell(row, 0).row as usize
}
