//! Shared error types for the services crate.

use thiserror::Error;

use course_core::ValidationError;
use course_core::model::CourseId;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `CourseEditor`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EditorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("course not found")]
    NotFound,

    #[error("a save is already in progress for this editor")]
    SaveInProgress,

    /// The course row was written but a later section write failed.
    /// Rows written before the failure stay committed.
    #[error(
        "course {course_id} was only partially saved: {sections_written} section(s) written before a failure"
    )]
    PartialWrite {
        course_id: CourseId,
        sections_written: usize,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CourseReader`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReaderError {
    /// Missing or not yet validated.
    #[error("course not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the progress store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to encode progress: {0}")]
    Encode(#[from] serde_json::Error),

    /// The stored value is not a progress blob; it is left untouched.
    #[error("stored progress is unreadable: {0}")]
    Unreadable(#[source] serde_json::Error),
}

/// Errors emitted by `CourseCatalog`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Progress(#[from] ProgressError),
}

/// Raised when a page is opened without a resolved user and profile.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no authenticated session")]
    Missing,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
