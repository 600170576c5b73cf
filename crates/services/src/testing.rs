//! Test doubles shared by unit tests.

use async_trait::async_trait;
use course_core::model::CourseId;
use storage::repository::{
    CourseQuery, CourseRepository, CourseUpdate, CourseWithSections, NewCourseRecord,
    StorageError,
};

/// Course store whose every call fails with a connection error.
pub(crate) struct OfflineCourses;

fn offline() -> StorageError {
    StorageError::Connection("database unreachable".into())
}

#[async_trait]
impl CourseRepository for OfflineCourses {
    async fn insert_course(&self, _course: NewCourseRecord) -> Result<CourseId, StorageError> {
        Err(offline())
    }

    async fn update_course(
        &self,
        _id: CourseId,
        _update: &CourseUpdate,
    ) -> Result<(), StorageError> {
        Err(offline())
    }

    async fn get_course(&self, _id: CourseId) -> Result<Option<CourseWithSections>, StorageError> {
        Err(offline())
    }

    async fn list_courses(
        &self,
        _query: &CourseQuery,
    ) -> Result<Vec<CourseWithSections>, StorageError> {
        Err(offline())
    }

    async fn delete_course(&self, _id: CourseId) -> Result<(), StorageError> {
        Err(offline())
    }
}
