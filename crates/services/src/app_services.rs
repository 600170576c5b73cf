use std::sync::Arc;

use course_core::model::{CourseId, Profile, UserId};
use storage::repository::{ReferenceDataRepository, Storage};

use crate::Clock;
use crate::catalog::CourseCatalog;
use crate::editor::CourseEditor;
use crate::error::AppServicesError;
use crate::progress::{ProgressStore, ProgressTracker};
use crate::reader::CourseReader;
use crate::reading::ReadingPage;
use crate::session::Session;

/// Assembles app-facing services over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    reference: Arc<dyn ReferenceDataRepository>,
    editor: Arc<CourseEditor>,
    reader: CourseReader,
    catalog: Arc<CourseCatalog>,
    progress: ProgressStore,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock) -> Self {
        let progress = ProgressStore::new(Arc::clone(&storage.key_values));
        Self {
            reference: Arc::clone(&storage.reference),
            editor: Arc::new(CourseEditor::new(
                clock,
                Arc::clone(&storage.courses),
                Arc::clone(&storage.sections),
            )),
            reader: CourseReader::new(Arc::clone(&storage.courses)),
            catalog: Arc::new(CourseCatalog::new(
                Arc::clone(&storage.courses),
                progress.clone(),
            )),
            progress,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock))
    }

    /// Make sure the profile behind `session` exists so attribution can
    /// resolve its name.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` if the profile cannot be stored.
    pub async fn register_session(&self, profile: Profile) -> Result<Session, AppServicesError> {
        self.reference.upsert_profile(&profile).await?;
        Ok(Session::new(profile))
    }

    /// Pair an authenticated user id with its stored profile.
    ///
    /// Returns `None` when there is no user or the user has no profile yet.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` if the profile lookup fails.
    pub async fn resolve_session(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Option<Session>, AppServicesError> {
        let Some(user_id) = user_id else {
            return Ok(None);
        };
        let profile = self.reference.get_profile(user_id).await?;
        if profile.is_none() {
            tracing::debug!(user_id = %user_id, "no profile for user");
        }
        Ok(profile.map(Session::new))
    }

    #[must_use]
    pub fn editor(&self) -> Arc<CourseEditor> {
        Arc::clone(&self.editor)
    }

    #[must_use]
    pub fn reader(&self) -> CourseReader {
        self.reader.clone()
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CourseCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progress(&self) -> ProgressStore {
        self.progress.clone()
    }

    #[must_use]
    pub fn tracker(&self) -> ProgressTracker {
        ProgressTracker::new(self.progress.clone())
    }

    #[must_use]
    pub fn reading_page(&self, course_id: CourseId) -> ReadingPage {
        ReadingPage::new(self.reader(), self.tracker(), course_id)
    }
}
