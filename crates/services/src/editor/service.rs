use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use course_core::model::{CourseId, UserId, resolve_attribution};
use storage::repository::{
    CourseQuery, CourseRepository, CourseUpdate, NewCourseRecord, NewSectionRecord,
    SectionRepository, SectionUpdate, StorageError,
};

use super::form::{EditorSession, ValidatedForm};
use crate::Clock;
use crate::error::{EditorError, SessionError};
use crate::session::Session;
use crate::view::CourseSummary;

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub course_id: CourseId,
    /// `true` when the save created the course row.
    pub created: bool,
    pub sections_updated: usize,
    pub sections_inserted: usize,
    /// Editor listing re-read after the save.
    pub listing: Vec<CourseSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

/// Resets the in-flight flag when the save future completes or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::AcqRel)).then_some(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Loads, saves and deletes courses on behalf of one editor page.
#[derive(Clone)]
pub struct CourseEditor {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    sections: Arc<dyn SectionRepository>,
    in_flight: Arc<AtomicBool>,
}

impl CourseEditor {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        sections: Arc<dyn SectionRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            sections,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Initialise the authoring page and return the course listing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Missing` if no session was resolved; nothing is loaded.
    pub async fn open(
        &self,
        session: Option<&Session>,
    ) -> Result<Vec<CourseSummary>, SessionError> {
        let Some(session) = session else {
            tracing::warn!("authoring page opened without session");
            return Err(SessionError::Missing);
        };
        tracing::debug!(user_id = %session.user_id, "authoring page ready");
        Ok(self.refresh_listing().await)
    }

    /// Start composing a blank course.
    pub fn new_course(&self, form: &mut EditorSession) {
        form.clear();
    }

    /// Fill `form` with a stored course and its ordered sections.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::NotFound` if the course does not exist.
    /// Returns `EditorError::Storage` if the lookup fails.
    pub async fn load_for_edit(
        &self,
        session: &Session,
        form: &mut EditorSession,
        course_id: CourseId,
    ) -> Result<(), EditorError> {
        let loaded = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(EditorError::NotFound)?;
        let attribution = resolve_attribution(&loaded.course, &loaded.sections);
        form.fill_from(&loaded, attribution);
        tracing::debug!(
            course_id = %course_id,
            user_id = %session.user_id,
            sections = loaded.sections.len(),
            "course loaded for editing"
        );
        Ok(())
    }

    /// Validate the form and write it to the store as `session`'s user.
    ///
    /// Persisted buffers are updated and new buffers inserted, in form order.
    /// Sections removed from the form stay in the store. Writes are not
    /// wrapped in a transaction; on success the form is cleared.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::SaveInProgress` if another save is running.
    /// Returns `EditorError::Validation` before any store call if the form is invalid.
    /// Returns `EditorError::NotFound` if the edited course no longer exists.
    /// Returns `EditorError::Storage` if the course row cannot be written.
    /// Returns `EditorError::PartialWrite` if a section write fails after the
    /// course row was written.
    pub async fn save(
        &self,
        session: &Session,
        form: &mut EditorSession,
    ) -> Result<SaveReport, EditorError> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            tracing::warn!("save rejected: another save is in flight");
            return Err(EditorError::SaveInProgress);
        };

        let acting_user = session.user_id;
        let validated = form.validate()?;
        let now = self.clock.now();

        let (course_id, created) = match form.editing {
            Some(id) => {
                self.courses
                    .update_course(id, &CourseUpdate::from_editor(&validated.course, acting_user))
                    .await
                    .map_err(|e| match e {
                        StorageError::NotFound => EditorError::NotFound,
                        other => EditorError::Storage(other),
                    })?;
                (id, false)
            }
            None => {
                let record = NewCourseRecord::from_editor(&validated.course, acting_user, now);
                let id = self.courses.insert_course(record).await?;
                (id, true)
            }
        };

        let (sections_updated, sections_inserted) = self
            .write_sections(course_id, &validated, acting_user, now)
            .await?;

        tracing::info!(
            course_id = %course_id,
            user_id = %acting_user,
            created,
            sections_updated,
            sections_inserted,
            "course saved"
        );
        form.clear();

        Ok(SaveReport {
            course_id,
            created,
            sections_updated,
            sections_inserted,
            listing: self.refresh_listing().await,
        })
    }

    async fn write_sections(
        &self,
        course_id: CourseId,
        form: &ValidatedForm,
        acting_user: UserId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(usize, usize), EditorError> {
        let mut updated = 0;
        let mut inserted = 0;
        for (index, (persisted, section)) in form.sections.iter().enumerate() {
            let written = match persisted {
                Some(section_id) => self
                    .sections
                    .update_section(
                        *section_id,
                        &SectionUpdate::from_validated(section, acting_user),
                    )
                    .await
                    .map(|()| updated += 1),
                None => self
                    .sections
                    .insert_section(NewSectionRecord::from_validated(
                        course_id,
                        section,
                        acting_user,
                        now,
                    ))
                    .await
                    .map(|_| inserted += 1),
            };
            if let Err(source) = written {
                tracing::error!(
                    course_id = %course_id,
                    sections_written = index,
                    error = %source,
                    "section write failed; earlier writes stay committed"
                );
                return Err(EditorError::PartialWrite {
                    course_id,
                    sections_written: index,
                    source,
                });
            }
        }
        Ok((updated, inserted))
    }

    /// Read failures degrade to an empty listing.
    async fn refresh_listing(&self) -> Vec<CourseSummary> {
        match self.courses.list_courses(&CourseQuery::default()).await {
            Ok(courses) => courses.iter().map(CourseSummary::from_loaded).collect(),
            Err(err) => {
                tracing::warn!(error = %err, "course listing refresh failed");
                Vec::new()
            }
        }
    }

    /// Delete a course once `confirm` accepts the prompt naming it.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::NotFound` if the course does not exist.
    /// Returns `EditorError::Storage` if the delete fails.
    pub async fn delete<F>(
        &self,
        session: &Session,
        course_id: CourseId,
        confirm: F,
    ) -> Result<DeleteOutcome, EditorError>
    where
        F: FnOnce(&str) -> bool,
    {
        let prompt = format!("Delete course {course_id}?");
        if !confirm(&prompt) {
            tracing::debug!(course_id = %course_id, "delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }
        self.courses
            .delete_course(course_id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => EditorError::NotFound,
                other => EditorError::Storage(other),
            })?;
        tracing::info!(course_id = %course_id, user_id = %session.user_id, "course deleted");
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{ClassId, CourseDraft, Profile, SectionDraft, SubjectId};
    use course_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn editor(repo: &InMemoryRepository) -> CourseEditor {
        CourseEditor::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    fn author() -> Session {
        Session::new(Profile::new(UserId::random(), "noor"))
    }

    fn draft_form(title: &str) -> EditorSession {
        let mut form = EditorSession::new();
        form.course = CourseDraft {
            title: title.into(),
            class_id: Some(ClassId::new(1)),
            subject_id: Some(SubjectId::new(1)),
        };
        form
    }

    #[tokio::test]
    async fn save_clears_session_and_returns_listing() {
        let repo = InMemoryRepository::new();
        let editor = editor(&repo);
        let mut form = draft_form("Geometry");
        form.push_section(SectionDraft::new("Angles", "Right angles", ""));

        let report = editor.save(&author(), &mut form).await.unwrap();
        assert!(report.created);
        assert_eq!(report.sections_inserted, 1);
        assert_eq!(report.listing.len(), 1);
        assert_eq!(report.listing[0].title, "Geometry");
        assert_eq!(form, EditorSession::default());
    }

    #[tokio::test]
    async fn load_missing_course_is_not_found() {
        let repo = InMemoryRepository::new();
        let mut form = EditorSession::new();
        let err = editor(&repo)
            .load_for_edit(&author(), &mut form, CourseId::new(42))
            .await
            .unwrap_err();
        assert!(matches!(err, EditorError::NotFound));
    }

    #[tokio::test]
    async fn saving_a_vanished_course_is_not_found() {
        let repo = InMemoryRepository::new();
        let mut form = draft_form("Ghost");
        form.editing = Some(CourseId::new(7));
        let err = editor(&repo).save(&author(), &mut form).await.unwrap_err();
        assert!(matches!(err, EditorError::NotFound));
        assert_eq!(form.editing, Some(CourseId::new(7)));
    }

    #[tokio::test]
    async fn busy_flag_rejects_second_save() {
        let repo = InMemoryRepository::new();
        let editor = editor(&repo);
        let held = InFlight::acquire(&editor.in_flight).unwrap();

        let mut form = draft_form("Busy");
        let err = editor.save(&author(), &mut form).await.unwrap_err();
        assert!(matches!(err, EditorError::SaveInProgress));

        drop(held);
        editor.save(&author(), &mut form).await.unwrap();
    }

    #[tokio::test]
    async fn open_requires_a_session() {
        let repo = InMemoryRepository::new();
        let editor = editor(&repo);
        assert_eq!(editor.open(None).await, Err(SessionError::Missing));

        editor.save(&author(), &mut draft_form("Optics")).await.unwrap();
        let listing = editor.open(Some(&author())).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].title, "Optics");
    }
}
