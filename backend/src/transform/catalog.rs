//! Class-oriented view of a schedule for the feedback service.
//!
//! ```text
//! college → department → semester → division → subject
//!     { lectures: { designatedFaculty }, labs: { batch → { designatedFaculty } } }
//! ```
//!
//! An occurrence addressed to `ALL` divisions is copied to every division
//! the schedule names for that semester. Tutorials are not designations.
//! When several faculty members cover the same lecture or lab batch, the
//! one teaching earliest in the week is designated.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::extract::cell::ALL_DIVISIONS;
use crate::models::{LectureType, MatrixResult, Occurrence, Weekday};

/// Key used when a semester or batch is not known.
pub const UNSPECIFIED: &str = "-";

/// Faculty member responsible for a lecture stream or a lab batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Designation {
    pub designated_faculty: String,
    #[serde(skip)]
    first_seen: (Weekday, u32),
}

impl Designation {
    fn new(faculty: &str, occurrence: &Occurrence) -> Self {
        Self {
            designated_faculty: faculty.to_string(),
            first_seen: (occurrence.day, occurrence.time_slot),
        }
    }

    /// Keep whichever faculty teaches earliest in the week.
    fn offer(slot: &mut Option<Self>, faculty: &str, occurrence: &Occurrence) {
        let candidate = Self::new(faculty, occurrence);
        match slot {
            Some(current) if current.first_seen <= candidate.first_seen => {}
            _ => *slot = Some(candidate),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDesignation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lectures: Option<Designation>,
    pub labs: BTreeMap<String, Designation>,
}

/// division → subject → designations
pub type DivisionSubjects = BTreeMap<String, BTreeMap<String, SubjectDesignation>>;

/// semester → divisions
pub type SemesterDivisions = BTreeMap<String, DivisionSubjects>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DivisionCatalog {
    colleges: BTreeMap<String, BTreeMap<String, SemesterDivisions>>,
}

impl DivisionCatalog {
    /// Derive the catalog of one run's schedule.
    pub fn build(college: &str, schedule: &MatrixResult) -> Self {
        let known = known_divisions(schedule);
        let mut catalog = Self::default();

        for (department, faculty, subject, occurrence) in schedule.iter() {
            if occurrence.lecture_type == LectureType::Tutorial {
                continue;
            }
            let semester = semester_key(occurrence.semester);

            let divisions: Vec<String> = if occurrence.division == ALL_DIVISIONS {
                match known.get(&(department.to_string(), semester.clone())) {
                    Some(divisions) if !divisions.is_empty() => divisions.iter().cloned().collect(),
                    _ => vec![ALL_DIVISIONS.to_string()],
                }
            } else {
                vec![occurrence.division.clone()]
            };

            for division in divisions {
                let designation = catalog
                    .colleges
                    .entry(college.to_string())
                    .or_default()
                    .entry(department.to_string())
                    .or_default()
                    .entry(semester.clone())
                    .or_default()
                    .entry(division)
                    .or_default()
                    .entry(subject.to_string())
                    .or_default();

                match occurrence.lecture_type {
                    LectureType::Lab => {
                        let batch = occurrence
                            .batch
                            .clone()
                            .unwrap_or_else(|| UNSPECIFIED.to_string());
                        let mut slot = designation.labs.remove(&batch);
                        Designation::offer(&mut slot, faculty, occurrence);
                        if let Some(lab) = slot {
                            designation.labs.insert(batch, lab);
                        }
                    }
                    _ => Designation::offer(&mut designation.lectures, faculty, occurrence),
                }
            }
        }

        catalog
    }

    pub fn is_empty(&self) -> bool {
        self.colleges.is_empty()
    }

    /// Designations of one subject, if present.
    pub fn subject(
        &self,
        college: &str,
        department: &str,
        semester: &str,
        division: &str,
        subject: &str,
    ) -> Option<&SubjectDesignation> {
        self.colleges
            .get(college)?
            .get(department)?
            .get(semester)?
            .get(division)?
            .get(subject)
    }

    /// Divisions listed for a semester.
    pub fn divisions(&self, college: &str, department: &str, semester: &str) -> Vec<&str> {
        self.colleges
            .get(college)
            .and_then(|d| d.get(department))
            .and_then(|s| s.get(semester))
            .map(|divisions| divisions.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn semester_key(semester: Option<u32>) -> String {
    semester
        .map(|s| s.to_string())
        .unwrap_or_else(|| UNSPECIFIED.to_string())
}

/// Concrete divisions per (department, semester).
fn known_divisions(schedule: &MatrixResult) -> BTreeMap<(String, String), BTreeSet<String>> {
    let mut known: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
    for (department, _, _, occurrence) in schedule.iter() {
        if occurrence.division != ALL_DIVISIONS {
            known
                .entry((department.to_string(), semester_key(occurrence.semester)))
                .or_default()
                .insert(occurrence.division.clone());
        }
    }
    known
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrence(
        semester: u32,
        division: &str,
        batch: Option<&str>,
        day: Weekday,
        slot: u32,
        lecture_type: LectureType,
    ) -> Occurrence {
        Occurrence {
            semester: Some(semester),
            division: division.to_string(),
            batch: batch.map(str::to_string),
            day,
            time_slot: slot,
            lecture_type,
        }
    }

    #[test]
    fn test_lectures_and_labs() {
        let mut schedule = MatrixResult::new();
        schedule
            .try_insert("CE", "JS", "DS", occurrence(5, "A", None, Weekday::Monday, 1, LectureType::Lecture))
            .unwrap();
        schedule
            .try_insert("CE", "AB", "DS", occurrence(5, "A", Some("1"), Weekday::Tuesday, 3, LectureType::Lab))
            .unwrap();

        let catalog = DivisionCatalog::build("LDRP-ITR", &schedule);
        let ds = catalog.subject("LDRP-ITR", "CE", "5", "A", "DS").unwrap();
        assert_eq!(ds.lectures.as_ref().unwrap().designated_faculty, "JS");
        assert_eq!(ds.labs["1"].designated_faculty, "AB");

        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(
            json["LDRP-ITR"]["CE"]["5"]["A"]["DS"]["lectures"]["designatedFaculty"],
            "JS"
        );
        assert!(json["LDRP-ITR"]["CE"]["5"]["A"]["DS"]["lectures"].get("firstSeen").is_none());
    }

    #[test]
    fn test_all_expands_to_known_divisions() {
        let mut schedule = MatrixResult::new();
        schedule
            .try_insert("CE", "JS", "DS", occurrence(5, "A", None, Weekday::Monday, 1, LectureType::Lecture))
            .unwrap();
        schedule
            .try_insert("CE", "AB", "OT", occurrence(5, "B", None, Weekday::Monday, 2, LectureType::Lecture))
            .unwrap();
        schedule
            .try_insert("CE", "KP", "CN", occurrence(5, ALL_DIVISIONS, None, Weekday::Friday, 4, LectureType::Lecture))
            .unwrap();

        let catalog = DivisionCatalog::build("LDRP-ITR", &schedule);
        assert_eq!(catalog.divisions("LDRP-ITR", "CE", "5"), vec!["A", "B"]);
        for division in ["A", "B"] {
            let cn = catalog.subject("LDRP-ITR", "CE", "5", division, "CN").unwrap();
            assert_eq!(cn.lectures.as_ref().unwrap().designated_faculty, "KP");
        }
    }

    #[test]
    fn test_all_without_known_divisions_stays_all() {
        let mut schedule = MatrixResult::new();
        schedule
            .try_insert("CE", "KP", "CN", occurrence(7, ALL_DIVISIONS, None, Weekday::Friday, 4, LectureType::Lecture))
            .unwrap();
        let catalog = DivisionCatalog::build("LDRP-ITR", &schedule);
        assert_eq!(catalog.divisions("LDRP-ITR", "CE", "7"), vec![ALL_DIVISIONS]);
    }

    #[test]
    fn test_earliest_faculty_is_designated() {
        let mut schedule = MatrixResult::new();
        schedule
            .try_insert("CE", "AB", "DS", occurrence(5, "A", None, Weekday::Wednesday, 1, LectureType::Lecture))
            .unwrap();
        schedule
            .try_insert("CE", "ZZ", "DS", occurrence(5, "A", None, Weekday::Monday, 2, LectureType::Lecture))
            .unwrap();

        let catalog = DivisionCatalog::build("LDRP-ITR", &schedule);
        let ds = catalog.subject("LDRP-ITR", "CE", "5", "A", "DS").unwrap();
        assert_eq!(ds.lectures.as_ref().unwrap().designated_faculty, "ZZ");
    }

    #[test]
    fn test_tutorials_and_missing_batches() {
        let mut schedule = MatrixResult::new();
        schedule
            .try_insert("CE", "JS", "DS", occurrence(5, "A", None, Weekday::Monday, 1, LectureType::Tutorial))
            .unwrap();
        schedule
            .try_insert("CE", "JS", "OT", occurrence(5, "A", None, Weekday::Monday, 2, LectureType::Lab))
            .unwrap();

        let catalog = DivisionCatalog::build("LDRP-ITR", &schedule);
        assert!(catalog.subject("LDRP-ITR", "CE", "5", "A", "DS").is_none());
        let ot = catalog.subject("LDRP-ITR", "CE", "5", "A", "OT").unwrap();
        assert!(ot.lectures.is_none());
        assert_eq!(ot.labs[UNSPECIFIED].designated_faculty, "JS");
    }
}
