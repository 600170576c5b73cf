use std::sync::Arc;

use storage::repository::{CourseQuery, CourseRepository};

use crate::error::CatalogError;
use crate::progress::ProgressStore;
use crate::view::CourseSummary;

/// Number of courses on the student home page.
pub const LATEST_COURSES_LIMIT: u32 = 6;

/// Course listings for the editor and student home pages.
#[derive(Clone)]
pub struct CourseCatalog {
    courses: Arc<dyn CourseRepository>,
    progress: ProgressStore,
}

impl CourseCatalog {
    #[must_use]
    pub fn new(courses: Arc<dyn CourseRepository>, progress: ProgressStore) -> Self {
        Self { courses, progress }
    }

    /// Every course, published or not, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if the listing cannot be read.
    pub async fn list_for_editor(
        &self,
        query: &CourseQuery,
    ) -> Result<Vec<CourseSummary>, CatalogError> {
        let query = CourseQuery {
            published_only: false,
            ..query.clone()
        };
        let courses = self.courses.list_courses(&query).await?;
        Ok(courses.iter().map(CourseSummary::from_loaded).collect())
    }

    /// Published courses with the reader's stored progress.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the listing or the progress blob cannot be read.
    pub async fn list_published(
        &self,
        query: &CourseQuery,
    ) -> Result<Vec<CourseSummary>, CatalogError> {
        let query = CourseQuery {
            published_only: true,
            ..query.clone()
        };
        let courses = self.courses.list_courses(&query).await?;
        let blob = self.progress.load().await?;
        Ok(courses
            .iter()
            .map(|c| CourseSummary::from_loaded(c).with_progress(blob.get(c.course.id)))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `CatalogError` if the listing or the progress blob cannot be read.
    pub async fn latest_published(&self, limit: u32) -> Result<Vec<CourseSummary>, CatalogError> {
        self.list_published(&CourseQuery {
            limit: Some(limit),
            ..CourseQuery::default()
        })
        .await
    }

    /// Courses read to exactly 100%. Distinct from the completed label.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Progress` if the progress blob cannot be read.
    pub async fn finished_count(&self) -> Result<usize, CatalogError> {
        Ok(self.progress.finished_count().await?)
    }
}
