//! Token validation against the reference vocabularies.
//!
//! Every raw entry is resolved to exactly one [`Resolution`]. Lookups are
//! exact after normalization; there is no fuzzy matching.
//!
//! Resolution order:
//! 1. Entry the extractor could not classify → `Malformed`
//! 2. Empty token after normalization → `Malformed(EmptyToken)`
//! 3. Faculty not in vocabulary → `UnknownFaculty`
//! 4. Subject not in vocabulary → `UnknownSubject`
//! 5. Otherwise → `Valid` with normalized identifiers
//!
//! The [`schema`] submodule checks the serialized success payload.

pub mod schema;

use crate::models::{
    LectureType, MalformedReason, RawScheduleEntry, Resolution, ResolvedIds, TokenField,
    ValidatedEntry,
};
use crate::vocabulary::VocabularySnapshot;

/// Characters stripped from tokens before lookup.
const STRIPPED_PUNCTUATION: &[char] = &['.', ',', ';', ':', '*', '\'', '"', '(', ')', '[', ']'];

/// Canonical form of an abbreviation: no whitespace, no punctuation, upper case.
///
/// `" j.s "` and `"JS"` normalize to the same token.
pub fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !STRIPPED_PUNCTUATION.contains(c))
        .collect::<String>()
        .to_uppercase()
}

/// Resolves raw entries against one vocabulary snapshot.
#[derive(Debug, Clone, Copy)]
pub struct TokenValidator<'a> {
    vocabulary: &'a VocabularySnapshot,
}

impl<'a> TokenValidator<'a> {
    pub fn new(vocabulary: &'a VocabularySnapshot) -> Self {
        Self { vocabulary }
    }

    pub fn validate(&self, entry: RawScheduleEntry) -> ValidatedEntry {
        let resolution = self.resolve(&entry);
        ValidatedEntry { entry, resolution }
    }

    /// Validate a sequence lazily, preserving order.
    pub fn validate_all<I>(&self, entries: I) -> Validated<'a, I::IntoIter>
    where
        I: IntoIterator<Item = RawScheduleEntry>,
    {
        Validated {
            validator: *self,
            entries: entries.into_iter(),
        }
    }

    fn resolve(&self, entry: &RawScheduleEntry) -> Resolution {
        if let Some(issue) = entry.parse_issue {
            return Resolution::Malformed(issue.into());
        }
        if entry.lecture_type == LectureType::Unknown {
            return Resolution::Malformed(MalformedReason::Unsplittable);
        }

        let faculty = normalize_token(&entry.raw_faculty_token);
        let subject = normalize_token(&entry.raw_subject_token);

        if faculty.is_empty() {
            return Resolution::Malformed(MalformedReason::EmptyToken {
                field: TokenField::Faculty,
            });
        }
        if subject.is_empty() {
            return Resolution::Malformed(MalformedReason::EmptyToken {
                field: TokenField::Subject,
            });
        }

        let subject_known = self.vocabulary.subjects.contains(&subject);
        if !self.vocabulary.faculty.contains(&faculty) {
            return Resolution::UnknownFaculty { subject_known };
        }
        if !subject_known {
            return Resolution::UnknownSubject;
        }

        Resolution::Valid(ResolvedIds { faculty, subject })
    }
}

/// Lazy validation of an entry sequence.
#[derive(Debug, Clone)]
pub struct Validated<'a, I> {
    validator: TokenValidator<'a>,
    entries: I,
}

impl<I> Iterator for Validated<'_, I>
where
    I: Iterator<Item = RawScheduleEntry>,
{
    type Item = ValidatedEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        Some(self.validator.validate(entry))
    }
}
