//! Persistent store for learner feedback.
//!
//! All records live in one JSON blob at a single path, rewritten whole on
//! every mutation. There is no cross-process coordination: the store assumes
//! a single writer for the lifetime of the blob.

use chrono::Utc;
use parking_lot::RwLock;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

const ID_SUFFIX_LEN: usize = 6;
const PENDING_STATUS: &str = "pending";

/// The closed set of feedback categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedbackCategory {
    ContentCorrection,
    ContentSuggestion,
    TechnicalIssue,
    EducationalImprovement,
}

impl FeedbackCategory {
    pub const ALL: [FeedbackCategory; 4] = [
        FeedbackCategory::ContentCorrection,
        FeedbackCategory::ContentSuggestion,
        FeedbackCategory::TechnicalIssue,
        FeedbackCategory::EducationalImprovement,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FeedbackCategory::ContentCorrection => "Content correction",
            FeedbackCategory::ContentSuggestion => "Content suggestion",
            FeedbackCategory::TechnicalIssue => "Technical issue",
            FeedbackCategory::EducationalImprovement => "Educational improvement",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            FeedbackCategory::ContentCorrection => "✏",
            FeedbackCategory::ContentSuggestion => "💡",
            FeedbackCategory::TechnicalIssue => "⚠",
            FeedbackCategory::EducationalImprovement => "🎓",
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            FeedbackCategory::ContentCorrection => {
                "Describe the error and where it appears in the section."
            }
            FeedbackCategory::ContentSuggestion => {
                "What should this section cover, or cover differently?"
            }
            FeedbackCategory::TechnicalIssue => {
                "What went wrong, and on what device or browser?"
            }
            FeedbackCategory::EducationalImprovement => {
                "How could this section teach the material better?"
            }
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            FeedbackCategory::ContentCorrection => "content-correction",
            FeedbackCategory::ContentSuggestion => "content-suggestion",
            FeedbackCategory::TechnicalIssue => "technical-issue",
            FeedbackCategory::EducationalImprovement => "educational-improvement",
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for FeedbackCategory {
    type Err = UnknownCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FeedbackCategory::ALL
            .into_iter()
            .find(|category| category.slug() == value)
            .ok_or_else(|| UnknownCategory(value.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("unknown feedback category {0:?} (expected one of: content-correction, content-suggestion, technical-issue, educational-improvement)")]
pub struct UnknownCategory(String);

/// A stored feedback entry. Created only by [`FeedbackStore::add`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    /// RFC 3339 creation time.
    pub timestamp: String,
    pub module: String,
    pub section: String,
    pub category: FeedbackCategory,
    pub message: String,
    #[serde(default)]
    pub user_email: Option<String>,
    /// Informational tag; nothing in this crate transitions it.
    pub status: String,
}

/// Validated input for [`FeedbackStore::add`]; id, timestamp, and status are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub module: String,
    pub section: String,
    pub category: FeedbackCategory,
    pub message: String,
    pub user_email: Option<String>,
}

/// Snapshot returned by [`FeedbackStore::export`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackExport {
    pub export_date: String,
    pub total_feedback: usize,
    pub feedback: Vec<FeedbackRecord>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialize feedback records: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Clone)]
pub struct FeedbackStore {
    shared: Arc<StoreShared>,
}

struct StoreShared {
    records: RwLock<Vec<FeedbackRecord>>,
    path: Option<PathBuf>,
}

impl FeedbackStore {
    /// Opens a store backed by `path`, loading whatever is already there.
    /// A missing file starts empty; a malformed blob is logged and treated
    /// as empty rather than failing the caller.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = load_records(&path);
        Self {
            shared: Arc::new(StoreShared {
                records: RwLock::new(records),
                path: Some(path),
            }),
        }
    }

    /// An in-memory store with no backing file.
    pub fn ephemeral() -> Self {
        Self {
            shared: Arc::new(StoreShared {
                records: RwLock::new(Vec::new()),
                path: None,
            }),
        }
    }

    /// Stamps `entry` into a [`FeedbackRecord`], appends it, and persists
    /// synchronously. On a persistence failure the append is rolled back so
    /// the in-memory sequence never diverges from the blob.
    pub fn add(&self, entry: NewFeedback) -> Result<FeedbackRecord, StoreError> {
        let record = FeedbackRecord {
            id: generate_record_id(),
            timestamp: Utc::now().to_rfc3339(),
            module: entry.module,
            section: entry.section,
            category: entry.category,
            message: entry.message,
            user_email: entry.user_email,
            status: PENDING_STATUS.to_string(),
        };
        let mut guard = self.shared.records.write();
        guard.push(record.clone());
        if let Err(err) = self.persist(&guard) {
            guard.pop();
            return Err(err);
        }
        Ok(record)
    }

    /// A snapshot of every record in submission order.
    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.shared.records.read().clone()
    }

    pub fn count(&self) -> usize {
        self.shared.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// A pure projection of the current state; mutates nothing.
    pub fn export(&self) -> FeedbackExport {
        let records = self.shared.records.read();
        FeedbackExport {
            export_date: Utc::now().to_rfc3339(),
            total_feedback: records.len(),
            feedback: records.clone(),
        }
    }

    /// Writes the export snapshot to a date-stamped file under `dir` and
    /// returns the path written.
    pub fn write_export(&self, dir: &Path) -> Result<PathBuf, StoreError> {
        let snapshot = self.export();
        let stamp = Utc::now().format("%Y-%m-%d");
        let path = dir.join(format!("feedback-export-{stamp}.json"));
        let json = serde_json::to_vec_pretty(&snapshot)?;
        fs::write(&path, json).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Empties the store and persists the empty state. Idempotent; callers
    /// are expected to confirm with the user first.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.shared.records.write();
        let previous = std::mem::take(&mut *guard);
        if let Err(err) = self.persist(&guard) {
            *guard = previous;
            return Err(err);
        }
        Ok(())
    }

    fn persist(&self, records: &[FeedbackRecord]) -> Result<(), StoreError> {
        let Some(path) = &self.shared.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        fs::write(path, json).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })
    }
}

fn load_records(path: &Path) -> Vec<FeedbackRecord> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(error = %err, path = %path.display(), "failed to read feedback store");
            return Vec::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "malformed feedback store, starting empty");
            Vec::new()
        }
    }
}

fn generate_record_id() -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("fb-{}-{}", Utc::now().timestamp_millis(), suffix)
}
