use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::model::course::Editor;
use crate::model::ids::{CourseId, SectionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SectionError {
    #[error("section title cannot be empty")]
    EmptyTitle,

    #[error("section content cannot be empty")]
    EmptyContent,
}

/// Image shown next to a section, stored as typed.
///
/// Absolute URLs are parsed; anything else (e.g. `images/cell.png`) is kept
/// as a relative reference resolved by whoever renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Url(Url),
    Relative(String),
}

impl ImageRef {
    /// Trimmed reference, or `None` when `raw` is blank.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(Url::parse(raw).map_or_else(|_| Self::Relative(raw.to_owned()), Self::Url))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ImageRef::Url(u) => u.as_str(),
            ImageRef::Relative(r) => r,
        }
    }

    #[must_use]
    pub fn as_url(&self) -> Option<&Url> {
        match self {
            ImageRef::Url(u) => Some(u),
            ImageRef::Relative(_) => None,
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted section of a course.
///
/// Sections of one course form a sequence ordered by `position`. `edited_by`
/// tracks the last writer of this section only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: SectionId,
    pub course_id: CourseId,
    pub title: String,
    pub content: String,
    pub image_url: Option<ImageRef>,
    pub edited_by: Option<Editor>,
    pub position: u32,
    pub created_at: DateTime<Utc>,
}

/// Raw section fields as typed into the editor form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionDraft {
    pub title: String,
    pub content: String,
    /// Empty means "no image".
    pub image_url: String,
}

impl SectionDraft {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            image_url: image_url.into(),
        }
    }

    /// # Errors
    ///
    /// Returns `SectionError` if title or content is blank.
    pub fn validate(&self) -> Result<ValidatedSection, SectionError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(SectionError::EmptyTitle);
        }
        if self.content.trim().is_empty() {
            return Err(SectionError::EmptyContent);
        }
        Ok(ValidatedSection {
            title: title.to_owned(),
            content: self.content.clone(),
            image_url: ImageRef::parse(&self.image_url),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSection {
    pub title: String,
    pub content: String,
    pub image_url: Option<ImageRef>,
}
