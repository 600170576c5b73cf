use std::sync::Arc;

use course_core::model::CourseId;
use storage::repository::CourseRepository;

use crate::error::ReaderError;
use crate::view::CourseView;

/// Read-only access to published courses.
#[derive(Clone)]
pub struct CourseReader {
    courses: Arc<dyn CourseRepository>,
}

impl CourseReader {
    #[must_use]
    pub fn new(courses: Arc<dyn CourseRepository>) -> Self {
        Self { courses }
    }

    /// Fetch one validated course with its ordered sections.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::NotFound` if the course is missing or not validated.
    /// Returns `ReaderError::Storage` if the lookup fails.
    pub async fn load_published(&self, course_id: CourseId) -> Result<CourseView, ReaderError> {
        let loaded = self
            .courses
            .get_course(course_id)
            .await
            .inspect_err(|err| {
                tracing::error!(course_id = %course_id, error = %err, "course fetch failed");
            })?;
        match loaded {
            Some(loaded) if loaded.course.is_published() => Ok(CourseView::from_loaded(&loaded)),
            Some(_) => {
                tracing::debug!(course_id = %course_id, "course exists but is not validated");
                Err(ReaderError::NotFound)
            }
            None => Err(ReaderError::NotFound),
        }
    }
}
