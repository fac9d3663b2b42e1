//! Delimited-text (CSV/TSV) input with encoding and delimiter auto-detection.
//!
//! Timetable offices often export the matrix as CSV from older tools, in
//! whatever code page the machine used. The bytes are decoded first, then
//! split with the `csv` crate into a flexible grid: rows may have any
//! number of fields.

use crate::error::{WorkbookError, WorkbookResult};

use super::clean_text;

/// Lines inspected when guessing the delimiter
const DELIMITER_SAMPLE_LINES: usize = 5;

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with the given encoding, replacing invalid sequences.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let codec = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252,
        other => encoding_rs::Encoding::for_label(other.as_bytes()).unwrap_or(encoding_rs::UTF_8),
    };
    codec.decode(bytes).0.into_owned()
}

/// Detect the delimiter by counting candidates over the first lines.
///
/// Matrices usually start with a title line that holds no delimiter at
/// all, so a single line is not enough.
pub fn detect_delimiter(content: &str) -> char {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(DELIMITER_SAMPLE_LINES)
        .collect();

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count: usize = sample.iter().map(|line| line.matches(sep).count()).sum();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited bytes into a grid of cleaned cells.
pub fn read_delimited(bytes: &[u8]) -> WorkbookResult<Vec<Vec<Option<String>>>> {
    if bytes.contains(&0) {
        return Err(WorkbookError::UnreadableFile(
            "binary content in a delimited-text upload".to_string(),
        ));
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| WorkbookError::UnreadableFile(format!("CSV error: {}", e)))?;
        rows.push(record.iter().map(clean_text).collect());
    }

    Ok(rows)
}
