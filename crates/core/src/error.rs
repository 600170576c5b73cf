use thiserror::Error;

use crate::model::{CourseError, SectionError};

/// Client-side validation failure for a course form.
///
/// Raised before any call to the backing store is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error(transparent)]
    Course(#[from] CourseError),

    /// `index` is the zero-based position of the buffer in the form.
    #[error("section #{index}: {source}")]
    Section {
        index: usize,
        #[source]
        source: SectionError,
    },
}

impl ValidationError {
    #[must_use]
    pub fn section(index: usize, source: SectionError) -> Self {
        Self::Section { index, source }
    }
}
