use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ids::CourseId;

/// Key under which all progress records live in the durable key-value store.
pub const PROGRESS_STORAGE_KEY: &str = "learning_progress";

/// Percent at which a course is *labelled* as completed.
pub const COMPLETION_LABEL_THRESHOLD: u8 = 90;

/// Percent at which a course counts as fully finished for the finished counter.
///
/// Deliberately distinct from `COMPLETION_LABEL_THRESHOLD`.
pub const FINISHED_PERCENT: u8 = 100;

/// Reading progress of one course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub percent: u8,
    #[serde(default)]
    pub completed: bool,
}

impl ProgressRecord {
    #[must_use]
    pub fn from_percent(percent: u8) -> Self {
        let percent = percent.min(100);
        Self {
            percent,
            completed: percent >= COMPLETION_LABEL_THRESHOLD,
        }
    }

    /// Clamp the percent and raise `completed` when the percent implies it.
    /// A stored `completed` flag is never cleared.
    #[must_use]
    pub fn repaired(self) -> Self {
        let percent = self.percent.min(100);
        Self {
            percent,
            completed: self.completed || percent >= COMPLETION_LABEL_THRESHOLD,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.percent == FINISHED_PERCENT
    }

    #[must_use]
    pub fn label(&self) -> ProgressLabel {
        ProgressLabel::for_percent(self.percent)
    }
}

/// Merge a fresh measurement with the previously persisted record.
///
/// The stored percent never decreases.
#[must_use]
pub fn merge_progress(previous: Option<ProgressRecord>, current: u8) -> ProgressRecord {
    let prior = previous.map_or(0, |p| p.percent);
    ProgressRecord::from_percent(current.max(prior))
}

//
// ─── SCROLL MEASUREMENT ────────────────────────────────────────────────────────
//

/// One scroll measurement of the rendered course document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

impl ScrollMetrics {
    #[must_use]
    pub fn new(scroll_top: f64, viewport_height: f64, document_height: f64) -> Self {
        Self {
            scroll_top,
            viewport_height,
            document_height,
        }
    }

    /// Percent of the scrollable range covered, rounded and clamped to 0..=100.
    ///
    /// Returns `None` when the document has no scrollable overflow or when any
    /// measurement is not a finite number.
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        if !(self.scroll_top.is_finite()
            && self.viewport_height.is_finite()
            && self.document_height.is_finite())
        {
            return None;
        }
        let range = self.document_height - self.viewport_height;
        if range <= 0.0 {
            return None;
        }
        let raw = (100.0 * self.scroll_top / range).round().clamp(0.0, 100.0);
        // clamped above, the cast cannot truncate
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = raw as u8;
        Some(percent)
    }
}

//
// ─── LABEL ─────────────────────────────────────────────────────────────────────
//

/// What the progress label of a course shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "percent", rename_all = "snake_case")]
pub enum ProgressLabel {
    Percent(u8),
    Completed,
}

impl ProgressLabel {
    #[must_use]
    pub fn for_percent(percent: u8) -> Self {
        if percent >= COMPLETION_LABEL_THRESHOLD {
            Self::Completed
        } else {
            Self::Percent(percent)
        }
    }
}

impl fmt::Display for ProgressLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressLabel::Percent(p) => write!(f, "{p}%"),
            ProgressLabel::Completed => write!(f, "✓ Completed"),
        }
    }
}

//
// ─── PERSISTED BLOB ────────────────────────────────────────────────────────────
//

/// Every progress record of one profile, as stored under
/// `PROGRESS_STORAGE_KEY`.
///
/// JSON shape: `{ "courses": { "<courseId>": { "percent": n, "completed": b } } }`.
///
/// Entries are decoded one by one. An entry that cannot be read is kept
/// verbatim and written back untouched, so one bad record never erases the
/// others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressBlob {
    pub courses: BTreeMap<String, ProgressRecord>,
    unreadable: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawBlob {
    #[serde(default)]
    courses: BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct EncodedBlob<'a> {
    courses: BTreeMap<&'a str, EncodedEntry<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EncodedEntry<'a> {
    Record(&'a ProgressRecord),
    Raw(&'a Value),
}

impl ProgressBlob {
    /// # Errors
    ///
    /// Returns the `serde_json` error if `raw` is not a JSON object whose
    /// `courses` member (when present) is an object.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let raw: RawBlob = serde_json::from_str(raw)?;
        let mut blob = Self::default();
        for (key, value) in raw.courses {
            match ProgressRecord::deserialize(&value) {
                Ok(record) => {
                    blob.courses.insert(key, record.repaired());
                }
                Err(_) => {
                    blob.unreadable.insert(key, value);
                }
            }
        }
        Ok(blob)
    }

    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let raw = self
            .unreadable
            .iter()
            .map(|(key, value)| (key.as_str(), EncodedEntry::Raw(value)));
        let records = self
            .courses
            .iter()
            .map(|(key, record)| (key.as_str(), EncodedEntry::Record(record)));
        let courses = raw.chain(records).collect();
        serde_json::to_string(&EncodedBlob { courses })
    }

    /// Keys of entries that could not be decoded.
    pub fn unreadable_keys(&self) -> impl Iterator<Item = &str> {
        self.unreadable.keys().map(String::as_str)
    }

    #[must_use]
    pub fn get(&self, course_id: CourseId) -> Option<ProgressRecord> {
        self.courses.get(&course_id.to_string()).copied()
    }

    /// Merge `current` into the stored record of `course_id` and return the
    /// record now stored. An unreadable entry for the course is replaced.
    pub fn apply(&mut self, course_id: CourseId, current: u8) -> ProgressRecord {
        let key = course_id.to_string();
        let previous = self.courses.get(&key).copied();
        let mut merged = merge_progress(previous, current);
        merged.completed |= previous.is_some_and(|r| r.completed);
        self.unreadable.remove(&key);
        self.courses.insert(key, merged);
        merged
    }

    /// Number of courses at exactly 100%.
    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.courses.values().filter(|r| r.is_finished()).count()
    }
}
