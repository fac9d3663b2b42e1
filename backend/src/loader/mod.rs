//! Workbook loading: uploaded bytes → ordered raw table blocks.
//!
//! Spreadsheet containers (xlsx, xls, ods) are read with `calamine`;
//! delimited text goes through [`delimited`]. Every non-blank sheet becomes
//! one [`RawTableBlock`]: a rectangular grid of cleaned cells where empty
//! and whitespace-only cells are `None`.
//!
//! For xlsx input the merged regions are loaded and the top-left value of
//! each region is copied into every cell it covers, so a lab merged over two
//! slot rows reads as two identical cells downstream.

pub mod delimited;

use calamine::{Data, Ods, Range, Reader, Xls, Xlsx};
use std::fmt;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::str::FromStr;

use crate::api::logs::{log_info_indent, log_warning};
use crate::error::{WorkbookError, WorkbookResult};
use crate::models::BlockLocator;

/// Sheet name given to the single block of a delimited-text upload.
pub const DELIMITED_SHEET_NAME: &str = "Sheet1";

// =============================================================================
// File Format
// =============================================================================

/// Declared format of the uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Xlsx,
    Xls,
    Ods,
    Csv,
}

impl FileFormat {
    /// Map a file extension (without dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "ods" => Some(Self::Ods),
            "csv" | "tsv" | "txt" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Format implied by a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| format!("unsupported format '{}' (expected xlsx, xls, ods or csv)", s))
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Ods => "ods",
            Self::Csv => "csv",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Raw Table Block
// =============================================================================

/// Rectangular grid of cleaned cells from one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTableBlock {
    pub locator: BlockLocator,
    cells: Vec<Vec<Option<String>>>,
    width: usize,
}

impl RawTableBlock {
    /// Build a block, padding short rows with empty cells.
    pub fn new(locator: BlockLocator, mut cells: Vec<Vec<Option<String>>>) -> Self {
        let width = cells.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut cells {
            row.resize(width, None);
        }
        Self {
            locator,
            cells,
            width,
        }
    }

    /// Build a block from text rows; blank strings become empty cells.
    pub fn from_rows<S: AsRef<str>>(locator: BlockLocator, rows: &[Vec<S>]) -> Self {
        let cells = rows
            .iter()
            .map(|row| row.iter().map(|c| clean_text(c.as_ref())).collect())
            .collect();
        Self::new(locator, cells)
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Cell text, `None` when empty or out of range.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }

    pub fn row(&self, row: usize) -> &[Option<String>] {
        self.cells.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when no cell holds content.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_none)
    }
}

// =============================================================================
// Workbook
// =============================================================================

/// Ordered table blocks of one upload. Iterating is restartable.
#[derive(Debug, Clone)]
pub struct Workbook {
    format: FileFormat,
    blocks: Vec<RawTableBlock>,
}

impl Workbook {
    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn blocks(&self) -> std::slice::Iter<'_, RawTableBlock> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Load an uploaded workbook from memory.
///
/// Fails with `UnreadableFile` when the container cannot be parsed and with
/// `EmptyWorkbook` when every sheet is blank.
pub fn load_workbook(bytes: &[u8], format: FileFormat) -> WorkbookResult<Workbook> {
    let blocks = match format {
        FileFormat::Csv => {
            let rows = delimited::read_delimited(bytes)?;
            let block = RawTableBlock::new(BlockLocator::new(DELIMITED_SHEET_NAME, 0), rows);
            if block.is_blank() {
                Vec::new()
            } else {
                vec![block]
            }
        }
        FileFormat::Xlsx => load_xlsx(bytes)?,
        FileFormat::Xls => read_sheets(Xls::new(Cursor::new(bytes)).map_err(unreadable)?)?,
        FileFormat::Ods => read_sheets(Ods::new(Cursor::new(bytes)).map_err(unreadable)?)?,
    };

    if blocks.is_empty() {
        return Err(WorkbookError::EmptyWorkbook);
    }

    for block in &blocks {
        log_info_indent(
            format!("{}: {}x{} cells", block.locator, block.height(), block.width()),
            1,
        );
    }

    Ok(Workbook { format, blocks })
}

/// Load a workbook from disk, taking the format from the extension.
pub fn load_workbook_file<P: AsRef<Path>>(path: P) -> WorkbookResult<Workbook> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path).ok_or_else(|| {
        WorkbookError::UnreadableFile(format!("unsupported file type: {}", path.display()))
    })?;
    let bytes = std::fs::read(path)?;
    load_workbook(&bytes, format)
}

fn unreadable(err: impl fmt::Display) -> WorkbookError {
    WorkbookError::UnreadableFile(err.to_string())
}

/// A merged cell region in absolute sheet coordinates (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MergedRegion {
    start: (u32, u32),
    end: (u32, u32),
}

fn load_xlsx(bytes: &[u8]) -> WorkbookResult<Vec<RawTableBlock>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).map_err(unreadable)?;

    let has_merges = match workbook.load_merged_regions() {
        Ok(()) => true,
        Err(e) => {
            log_warning(format!("Merged cells unavailable, reading cells as-is: {}", e));
            false
        }
    };

    let mut blocks = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name).map_err(unreadable)?;
        let merges: Vec<MergedRegion> = if has_merges {
            workbook
                .merged_regions_by_sheet(&name)
                .into_iter()
                .map(|(_, _, dims)| MergedRegion {
                    start: dims.start,
                    end: dims.end,
                })
                .collect()
        } else {
            Vec::new()
        };
        if let Some(block) = range_to_block(&name, blocks.len(), &range, &merges) {
            blocks.push(block);
        }
    }
    Ok(blocks)
}

fn read_sheets<RS, R>(mut workbook: R) -> WorkbookResult<Vec<RawTableBlock>>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: fmt::Display,
{
    let mut blocks = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name).map_err(unreadable)?;
        if let Some(block) = range_to_block(&name, blocks.len(), &range, &[]) {
            blocks.push(block);
        }
    }
    Ok(blocks)
}

fn range_to_block(
    sheet: &str,
    index: usize,
    range: &Range<Data>,
    merges: &[MergedRegion],
) -> Option<RawTableBlock> {
    if range.is_empty() {
        return None;
    }
    let (origin_row, origin_col) = range.start().unwrap_or((0, 0));

    let mut cells: Vec<Vec<Option<String>>> = range
        .rows()
        .map(|row| row.iter().map(clean_data).collect())
        .collect();

    for region in merges {
        propagate_merge(&mut cells, region, (origin_row, origin_col));
    }

    let locator = BlockLocator::new(sheet, index).with_origin(origin_row, origin_col);
    let block = RawTableBlock::new(locator, cells);
    if block.is_blank() {
        None
    } else {
        Some(block)
    }
}

/// Copy the top-left value of a merged region into every cell it covers.
fn propagate_merge(cells: &mut [Vec<Option<String>>], region: &MergedRegion, origin: (u32, u32)) {
    let to_grid = |(row, col): (u32, u32)| -> Option<(usize, usize)> {
        Some((
            row.checked_sub(origin.0)? as usize,
            col.checked_sub(origin.1)? as usize,
        ))
    };
    let Some((top, left)) = to_grid(region.start) else {
        return;
    };
    let Some((bottom, right)) = to_grid(region.end) else {
        return;
    };
    let Some(value) = cells.get(top).and_then(|r| r.get(left)).cloned().flatten() else {
        return;
    };

    for row in cells.iter_mut().take(bottom + 1).skip(top) {
        for cell in row.iter_mut().take(right + 1).skip(left) {
            *cell = Some(value.clone());
        }
    }
}

/// Trim a text cell; blank → `None`.
pub(crate) fn clean_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn clean_data(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => clean_text(s),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format_number(*f)),
        Data::Bool(b) => Some(b.to_string()),
        other => clean_text(&other.to_string()),
    }
}

/// Render integral floats without a fraction ("1.0" → "1").
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_extension("XLSX"), Some(FileFormat::Xlsx));
        assert_eq!(FileFormat::from_extension("xlsm"), Some(FileFormat::Xlsx));
        assert_eq!(FileFormat::from_extension("ods"), Some(FileFormat::Ods));
        assert_eq!(FileFormat::from_extension("tsv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_extension("pdf"), None);
        assert_eq!(".xls".parse::<FileFormat>(), Ok(FileFormat::Xls));
        assert!("docx".parse::<FileFormat>().is_err());
    }

    #[test]
    fn test_block_is_rectangular() {
        let block = RawTableBlock::from_rows(
            BlockLocator::new("S", 0),
            &[vec!["Day", "SLOT", "JS"], vec!["MON"]],
        );
        assert_eq!(block.width(), 3);
        assert_eq!(block.row(1).len(), 3);
        assert_eq!(block.cell(1, 0), Some("MON"));
        assert_eq!(block.cell(1, 2), None);
        assert_eq!(block.cell(9, 9), None);
    }

    #[test]
    fn test_propagate_merge() {
        let mut cells = vec![
            vec![Some("x".to_string()), Some("DS 5A".to_string())],
            vec![Some("y".to_string()), None],
            vec![Some("z".to_string()), None],
        ];
        // Sheet rows 10..=11, column 4, block starting at (10, 3)
        let region = MergedRegion {
            start: (10, 4),
            end: (11, 4),
        };
        propagate_merge(&mut cells, &region, (10, 3));
        assert_eq!(cells[1][1].as_deref(), Some("DS 5A"));
        assert_eq!(cells[2][1], None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_load_csv_workbook() {
        let workbook = load_workbook(b"Day,SLOT,JS\nMON,1,DS 5A\n", FileFormat::Csv).unwrap();
        assert_eq!(workbook.len(), 1);
        let block = workbook.blocks().next().unwrap();
        assert_eq!(block.locator.sheet, DELIMITED_SHEET_NAME);
        assert_eq!(block.cell(1, 2), Some("DS 5A"));
    }

    #[test]
    fn test_blank_csv_is_empty_workbook() {
        let err = load_workbook(b" , ,\n,,\n", FileFormat::Csv).unwrap_err();
        assert!(matches!(err, WorkbookError::EmptyWorkbook));
    }

    /// Division matrix at B3 with the day merged down three slots and a
    /// lab merged over the first two.
    fn merged_xlsx() -> Vec<u8> {
        use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

        let mut workbook = XlsxWorkbook::new();
        let merged = Format::new();
        let sheet = workbook.add_worksheet().set_name("CE").unwrap();
        sheet.write_string(2, 1, "Day").unwrap();
        sheet.write_string(2, 2, "Slot").unwrap();
        sheet.write_string(2, 3, "Div A").unwrap();
        sheet.merge_range(3, 1, 5, 1, "MON", &merged).unwrap();
        sheet.merge_range(3, 3, 4, 3, "DS-JS", &merged).unwrap();
        sheet.write_string(5, 3, "OT-AB").unwrap();
        sheet.write_string(6, 1, "TUE").unwrap();
        sheet.write_string(6, 3, "CN-KP").unwrap();
        for (row, slot) in [(3, 1.0), (4, 2.0), (5, 3.0), (6, 1.0)] {
            sheet.write_number(row, 2, slot).unwrap();
        }
        workbook.add_worksheet().set_name("Notes").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_xlsx_merged_cells_are_propagated() {
        let workbook = load_workbook(&merged_xlsx(), FileFormat::Xlsx).unwrap();

        // The blank "Notes" sheet is not a block
        assert_eq!(workbook.len(), 1);
        let block = workbook.blocks().next().unwrap();
        assert_eq!(block.locator.sheet, "CE");
        assert_eq!((block.locator.origin_row, block.locator.origin_col), (2, 1));

        assert_eq!(block.cell(0, 0), Some("Day"));
        assert_eq!(block.cell(1, 1), Some("1"));
        for row in 1..=3 {
            assert_eq!(block.cell(row, 0), Some("MON"));
        }
        assert_eq!(block.cell(1, 2), Some("DS-JS"));
        assert_eq!(block.cell(2, 2), Some("DS-JS"));
        assert_eq!(block.cell(3, 2), Some("OT-AB"));
        assert_eq!(block.cell(4, 0), Some("TUE"));
    }

    #[test]
    fn test_xlsx_merged_lab_extracts_per_slot() {
        use crate::config::PipelineOptions;
        use crate::extract::EntryExtractor;
        use crate::layout::detect_layout;
        use crate::models::{LectureType, Weekday};

        let workbook = load_workbook(&merged_xlsx(), FileFormat::Xlsx).unwrap();
        let block = workbook.blocks().next().unwrap();
        let options = PipelineOptions::default();
        let layout = detect_layout(block, &options).unwrap();
        let entries: Vec<_> = EntryExtractor::new(block, &layout, &options)
            .unwrap()
            .entries()
            .collect();

        let summary: Vec<(Weekday, u32, &str, LectureType)> = entries
            .iter()
            .map(|e| (e.day, e.time_slot, e.raw_subject_token.as_str(), e.lecture_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Weekday::Monday, 1, "DS", LectureType::Lab),
                (Weekday::Monday, 2, "DS", LectureType::Lab),
                (Weekday::Monday, 3, "OT", LectureType::Lecture),
                (Weekday::Tuesday, 1, "CN", LectureType::Lecture),
            ]
        );
        assert_eq!(entries[1].locator.a1(), "D5");
    }

    #[test]
    fn test_corrupt_xlsx_is_unreadable() {
        let err = load_workbook(b"definitely not a zip archive", FileFormat::Xlsx).unwrap_err();
        assert!(matches!(err, WorkbookError::UnreadableFile(_)));
    }

    #[test]
    fn test_corrupt_ods_is_unreadable() {
        let err = load_workbook(b"garbage", FileFormat::Ods).unwrap_err();
        assert!(matches!(err, WorkbookError::UnreadableFile(_)));
    }

    #[test]
    fn test_load_workbook_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.csv");
        std::fs::write(&path, "Day;SLOT;JS\nMON;1;DS 5A\nMON;2;\n").unwrap();

        let workbook = load_workbook_file(&path).unwrap();
        assert_eq!(workbook.format(), FileFormat::Csv);
        assert_eq!(workbook.blocks().next().unwrap().cell(0, 1), Some("SLOT"));

        let bad = dir.path().join("matrix.pdf");
        std::fs::write(&bad, "x").unwrap();
        assert!(matches!(
            load_workbook_file(&bad),
            Err(WorkbookError::UnreadableFile(_))
        ));
    }
}
