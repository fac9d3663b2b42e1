//! Cell text conventions.
//!
//! Division-lane cells read `SUBJECT-FACULTY` (separator configurable).
//! Faculty-lane cells read `SUBJECT CLASSINFO` where CLASSINFO is a
//! semester number followed by `/`-joined division segments, each an
//! optional batch number with an optional `*`: `OT 5A3/B3`, `DS 3B`,
//! `CN 7ALL`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::LectureType;

/// Division value meaning every division of the semester.
pub const ALL_DIVISIONS: &str = "ALL";

static SEMESTER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)").expect("valid regex pattern"));

static TRAILING_BATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\*?)$").expect("valid regex pattern"));

/// Cell text with lecture-type marker words taken out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedText {
    pub text: String,
    pub marker: Option<LectureType>,
}

impl MarkedText {
    /// Cell text taken as-is, without looking for markers.
    pub fn plain(cell: &str) -> Self {
        Self {
            text: cell.split_whitespace().collect::<Vec<_>>().join(" "),
            marker: None,
        }
    }
}

/// Remove marker words ("DS-JS TUT", "OT 5A1 (LAB)") from a cell.
///
/// Only a parenthesized marker or a bare marker in last position counts;
/// elsewhere the word stays a token, since `PR` or `LAB` may well be an
/// abbreviation. The first marker found decides the lecture type.
pub fn strip_markers(cell: &str) -> MarkedText {
    let words: Vec<&str> = cell.split_whitespace().collect();
    let last = words.len().saturating_sub(1);

    let mut marker = None;
    let mut kept = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        let parenthesized = word.len() > 2 && word.starts_with('(') && word.ends_with(')');
        let trailing = i > 0 && i == last;
        match LectureType::from_marker(word) {
            Some(found) if parenthesized || trailing => {
                marker.get_or_insert(found);
            }
            _ => kept.push(*word),
        }
    }

    MarkedText {
        text: kept.join(" "),
        marker,
    }
}

/// Split "DS-JS" at the first separator into (subject, faculty).
pub fn split_subject_faculty(text: &str, separator: &str) -> Option<(String, String)> {
    if separator.is_empty() {
        return None;
    }
    let (subject, faculty) = text.split_once(separator)?;
    Some((subject.trim().to_string(), faculty.trim().to_string()))
}

/// One division (and optional batch) a faculty-lane cell addresses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassSegment {
    pub division: String,
    pub batch: Option<String>,
}

/// A parsed faculty-lane cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCell {
    pub subject: String,
    pub semester: u32,
    /// Unique segments, sorted by division then batch.
    pub segments: Vec<ClassSegment>,
}

/// Parse "OT 5A3/B3" into subject, semester and division segments.
pub fn parse_class_cell(text: &str) -> Option<ClassCell> {
    let (subject, class_info) = text.trim().split_once(char::is_whitespace)?;
    let class_info: String = class_info.split_whitespace().collect();

    let semester_match = SEMESTER_PREFIX.find(&class_info)?;
    // Semesters count from 1
    let semester: u32 = semester_match
        .as_str()
        .parse()
        .ok()
        .filter(|&semester| semester >= 1)?;
    let rest = &class_info[semester_match.end()..];

    let segments = if rest.to_uppercase().contains(ALL_DIVISIONS) {
        vec![ClassSegment {
            division: ALL_DIVISIONS.to_string(),
            batch: None,
        }]
    } else {
        let mut segments: Vec<ClassSegment> = rest
            .split('/')
            .filter_map(|segment| {
                let division: String = segment
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .collect::<String>()
                    .to_uppercase();
                if division.is_empty() {
                    return None;
                }
                let batch = TRAILING_BATCH
                    .find(segment)
                    .map(|m| m.as_str().to_string());
                Some(ClassSegment { division, batch })
            })
            .collect();
        segments.sort();
        segments.dedup();
        segments
    };

    if segments.is_empty() {
        return None;
    }

    Some(ClassCell {
        subject: subject.to_string(),
        semester,
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(division: &str, batch: Option<&str>) -> ClassSegment {
        ClassSegment {
            division: division.to_string(),
            batch: batch.map(str::to_string),
        }
    }

    #[test]
    fn test_strip_markers() {
        let marked = strip_markers("DS-JS TUT");
        assert_eq!(marked.text, "DS-JS");
        assert_eq!(marked.marker, Some(LectureType::Tutorial));

        let marked = strip_markers("OT 5A1 (LAB)");
        assert_eq!(marked.text, "OT 5A1");
        assert_eq!(marked.marker, Some(LectureType::Lab));

        let marked = strip_markers("DS 5A");
        assert_eq!(marked.marker, None);
        assert_eq!(marked.text, "DS 5A");
    }

    #[test]
    fn test_marker_words_inside_cell_stay_tokens() {
        let marked = strip_markers("PR - JS");
        assert_eq!(marked.text, "PR - JS");
        assert_eq!(marked.marker, None);

        let marked = strip_markers("LAB");
        assert_eq!(marked.text, "LAB");
        assert_eq!(marked.marker, None);

        // Trailing word is taken as a marker; the extractor falls back
        // when what is left no longer splits
        let marked = strip_markers("DS - PR");
        assert_eq!(marked.text, "DS -");
        assert_eq!(marked.marker, Some(LectureType::Lab));
        assert_eq!(MarkedText::plain("DS  - PR").text, "DS - PR");
    }

    #[test]
    fn test_split_subject_faculty() {
        assert_eq!(
            split_subject_faculty("DS-JS", "-"),
            Some(("DS".to_string(), "JS".to_string()))
        );
        assert_eq!(
            split_subject_faculty("DS - J-S", "-"),
            Some(("DS".to_string(), "J-S".to_string()))
        );
        assert_eq!(
            split_subject_faculty("DS-", "-"),
            Some(("DS".to_string(), String::new()))
        );
        assert_eq!(split_subject_faculty("DS JS", "-"), None);
        assert_eq!(split_subject_faculty("DS-JS", ""), None);
    }

    #[test]
    fn test_parse_class_cell_with_batches() {
        let cell = parse_class_cell("OT 5A3/B3").unwrap();
        assert_eq!(cell.subject, "OT");
        assert_eq!(cell.semester, 5);
        assert_eq!(
            cell.segments,
            vec![segment("A", Some("3")), segment("B", Some("3"))]
        );
    }

    #[test]
    fn test_parse_class_cell_dedups_and_sorts() {
        let cell = parse_class_cell("DS 3B/a/B").unwrap();
        assert_eq!(cell.segments, vec![segment("A", None), segment("B", None)]);

        let cell = parse_class_cell("CN 7A2*").unwrap();
        assert_eq!(cell.segments, vec![segment("A", Some("2*"))]);
    }

    #[test]
    fn test_parse_class_cell_all() {
        let cell = parse_class_cell("CN 7ALL").unwrap();
        assert_eq!(cell.semester, 7);
        assert_eq!(cell.segments, vec![segment(ALL_DIVISIONS, None)]);
    }

    #[test]
    fn test_parse_class_cell_rejects_bad_shapes() {
        assert!(parse_class_cell("DS").is_none());
        assert!(parse_class_cell("DS A3").is_none());
        assert!(parse_class_cell("DS 5").is_none());
        assert!(parse_class_cell("DS-JS").is_none());
    }

    #[test]
    fn test_parse_class_cell_rejects_semester_zero() {
        assert!(parse_class_cell("OT 0B").is_none());
        assert!(parse_class_cell("OT 00A1/B1").is_none());
        assert_eq!(parse_class_cell("OT 1B").unwrap().semester, 1);
    }
}
