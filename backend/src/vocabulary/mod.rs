//! Reference vocabularies of valid faculty and subject abbreviations.
//!
//! The hosting service fetches both lists once at startup and may refresh
//! them later. A [`VocabularyStore`] holds the current pair as one
//! immutable [`VocabularySnapshot`] behind an `ArcSwap`: readers load it
//! without locking, a refresh replaces it wholesale, and a pipeline run
//! keeps the snapshot it started with.

use arc_swap::ArcSwap;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::logs::log_info;
use crate::error::{VocabularyError, VocabularyResult};
use crate::validation::normalize_token;

// =============================================================================
// Reference Vocabulary
// =============================================================================

/// Immutable set of normalized abbreviations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceVocabulary {
    tokens: BTreeSet<String>,
}

impl ReferenceVocabulary {
    /// Build from raw abbreviations; blanks are dropped.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| normalize_token(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Exact lookup of an already-normalized token.
    pub fn contains(&self, normalized: &str) -> bool {
        self.tokens.contains(normalized)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

/// Faculty and subject vocabularies taken together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabularySnapshot {
    pub faculty: ReferenceVocabulary,
    pub subjects: ReferenceVocabulary,
}

impl VocabularySnapshot {
    pub fn new(faculty: ReferenceVocabulary, subjects: ReferenceVocabulary) -> Self {
        Self { faculty, subjects }
    }

    /// Fetch both lists from a provider.
    pub fn load(provider: &dyn VocabularyProvider) -> VocabularyResult<Self> {
        Ok(Self {
            faculty: ReferenceVocabulary::new(provider.faculty_abbreviations()?),
            subjects: ReferenceVocabulary::new(provider.subject_abbreviations()?),
        })
    }
}

// =============================================================================
// Providers
// =============================================================================

/// Source of the two reference lists.
pub trait VocabularyProvider: Send + Sync {
    fn faculty_abbreviations(&self) -> VocabularyResult<BTreeSet<String>>;
    fn subject_abbreviations(&self) -> VocabularyResult<BTreeSet<String>>;
}

/// In-memory lists.
#[derive(Debug, Clone, Default)]
pub struct StaticVocabulary {
    pub faculty: BTreeSet<String>,
    pub subjects: BTreeSet<String>,
}

impl StaticVocabulary {
    pub fn new<F, S>(faculty: F, subjects: S) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            faculty: faculty.into_iter().map(Into::into).collect(),
            subjects: subjects.into_iter().map(Into::into).collect(),
        }
    }
}

impl VocabularyProvider for StaticVocabulary {
    fn faculty_abbreviations(&self) -> VocabularyResult<BTreeSet<String>> {
        Ok(self.faculty.clone())
    }

    fn subject_abbreviations(&self) -> VocabularyResult<BTreeSet<String>> {
        Ok(self.subjects.clone())
    }
}

#[derive(Debug, Deserialize)]
struct VocabularyFile {
    faculty: BTreeSet<String>,
    subjects: BTreeSet<String>,
}

/// JSON file `{"faculty": [...], "subjects": [...]}`, read on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileVocabulary {
    path: PathBuf,
}

impl JsonFileVocabulary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> VocabularyResult<VocabularyFile> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl VocabularyProvider for JsonFileVocabulary {
    fn faculty_abbreviations(&self) -> VocabularyResult<BTreeSet<String>> {
        Ok(self.read()?.faculty)
    }

    fn subject_abbreviations(&self) -> VocabularyResult<BTreeSet<String>> {
        Ok(self.read()?.subjects)
    }
}

// =============================================================================
// Store
// =============================================================================

/// Process-wide holder of the current snapshot.
pub struct VocabularyStore {
    current: ArcSwap<VocabularySnapshot>,
}

impl VocabularyStore {
    pub fn new(snapshot: VocabularySnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Build a store from a provider's current lists.
    pub fn from_provider(provider: &dyn VocabularyProvider) -> VocabularyResult<Self> {
        Ok(Self::new(VocabularySnapshot::load(provider)?))
    }

    /// The snapshot in effect right now.
    pub fn snapshot(&self) -> Arc<VocabularySnapshot> {
        self.current.load_full()
    }

    pub fn replace(&self, snapshot: VocabularySnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Refetch from `provider`. The old snapshot stays if the fetch fails.
    pub fn refresh_from(&self, provider: &dyn VocabularyProvider) -> VocabularyResult<()> {
        let snapshot = VocabularySnapshot::load(provider)?;
        if snapshot.faculty.is_empty() && snapshot.subjects.is_empty() {
            return Err(VocabularyError::Provider(
                "provider returned empty vocabularies".to_string(),
            ));
        }
        log_info(format!(
            "Vocabulary refreshed: {} faculty, {} subjects",
            snapshot.faculty.len(),
            snapshot.subjects.len()
        ));
        self.replace(snapshot);
        Ok(())
    }
}

impl Default for VocabularyStore {
    fn default() -> Self {
        Self::new(VocabularySnapshot::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_vocabulary_is_normalized() {
        let vocab = ReferenceVocabulary::new([" js ", "A.B", "", "JS"]);
        assert_eq!(vocab.len(), 2);
        assert!(vocab.contains("JS"));
        assert!(vocab.contains("AB"));
        assert!(!vocab.contains("js"));
    }

    #[test]
    fn test_static_provider_snapshot() {
        let provider = StaticVocabulary::new(["JS"], ["DS", "OT"]);
        let snapshot = VocabularySnapshot::load(&provider).unwrap();
        assert!(snapshot.faculty.contains("JS"));
        assert_eq!(snapshot.subjects.len(), 2);
    }

    #[test]
    fn test_json_file_provider() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"faculty": ["JS", "AB"], "subjects": ["DS"]}}"#).unwrap();

        let provider = JsonFileVocabulary::new(file.path());
        let store = VocabularyStore::from_provider(&provider).unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.faculty.len(), 2);
        assert!(snapshot.subjects.contains("DS"));
    }

    #[test]
    fn test_json_file_provider_errors() {
        let missing = JsonFileVocabulary::new("/nonexistent/vocabulary.json");
        assert!(matches!(
            missing.faculty_abbreviations(),
            Err(VocabularyError::Io(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let broken = JsonFileVocabulary::new(file.path());
        assert!(matches!(
            broken.subject_abbreviations(),
            Err(VocabularyError::Json(_))
        ));
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let store = VocabularyStore::new(VocabularySnapshot::load(&StaticVocabulary::new(["JS"], ["DS"])).unwrap());
        let before = store.snapshot();

        store
            .refresh_from(&StaticVocabulary::new(["AB"], ["OT"]))
            .unwrap();

        assert!(before.faculty.contains("JS"));
        assert!(store.snapshot().faculty.contains("AB"));
        assert!(!store.snapshot().faculty.contains("JS"));
    }

    #[test]
    fn test_failed_refresh_keeps_snapshot() {
        let store = VocabularyStore::new(VocabularySnapshot::load(&StaticVocabulary::new(["JS"], ["DS"])).unwrap());
        let empty = StaticVocabulary::default();
        assert!(store.refresh_from(&empty).is_err());
        assert!(store.snapshot().faculty.contains("JS"));
    }
}
