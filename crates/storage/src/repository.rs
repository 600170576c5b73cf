use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    ClassId, Course, CourseId, Editor, ImageRef, Profile, Section, SectionId, SubjectId,
    UserId, ValidatedCourse, ValidatedSection,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert payload for a course row. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourseRecord {
    pub title: String,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub last_editor: Option<UserId>,
    pub validated: bool,
    pub created_at: DateTime<Utc>,
}

impl NewCourseRecord {
    /// A course saved from the editor: stamped with its author and published.
    #[must_use]
    pub fn from_editor(course: &ValidatedCourse, editor: UserId, now: DateTime<Utc>) -> Self {
        Self {
            title: course.title.clone(),
            class_id: course.class_id,
            subject_id: course.subject_id,
            last_editor: Some(editor),
            validated: true,
            created_at: now,
        }
    }
}

/// Column values written when an existing course is saved from the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseUpdate {
    pub title: String,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub last_editor: UserId,
    pub validated: bool,
}

impl CourseUpdate {
    #[must_use]
    pub fn from_editor(course: &ValidatedCourse, editor: UserId) -> Self {
        Self {
            title: course.title.clone(),
            class_id: course.class_id,
            subject_id: course.subject_id,
            last_editor: editor,
            validated: true,
        }
    }
}

/// Insert payload for a section. The store assigns the id and appends the
/// section after the current last position of its course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSectionRecord {
    pub course_id: CourseId,
    pub title: String,
    pub content: String,
    pub image_url: Option<ImageRef>,
    pub edited_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl NewSectionRecord {
    #[must_use]
    pub fn from_validated(
        course_id: CourseId,
        section: &ValidatedSection,
        editor: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            course_id,
            title: section.title.clone(),
            content: section.content.clone(),
            image_url: section.image_url.clone(),
            edited_by: editor,
            created_at: now,
        }
    }
}

/// Column values written when an existing section is saved. Position and
/// owning course are never touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionUpdate {
    pub title: String,
    pub content: String,
    pub image_url: Option<ImageRef>,
    pub edited_by: UserId,
}

impl SectionUpdate {
    #[must_use]
    pub fn from_validated(section: &ValidatedSection, editor: UserId) -> Self {
        Self {
            title: section.title.clone(),
            content: section.content.clone(),
            image_url: section.image_url.clone(),
            edited_by: editor,
        }
    }
}

/// A course together with its sections ordered by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseWithSections {
    pub course: Course,
    pub sections: Vec<Section>,
    /// Display names of the class and subject, when known.
    pub class_name: Option<String>,
    pub subject_name: Option<String>,
}

/// Filters for course listings. Results are ordered newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseQuery {
    /// Literal substring of the title, compared after Unicode lowercasing.
    pub search: Option<String>,
    pub class_id: Option<ClassId>,
    pub subject_id: Option<SubjectId>,
    pub published_only: bool,
    pub limit: Option<u32>,
}

impl CourseQuery {
    #[must_use]
    pub fn published() -> Self {
        Self {
            published_only: true,
            ..Self::default()
        }
    }

    pub(crate) fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub(crate) fn row_limit(&self) -> usize {
        self.limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX))
    }
}

/// Title filter shared by every adapter. `term` is already lowercased.
pub(crate) fn title_matches(title: &str, term: &str) -> bool {
    title.to_lowercase().contains(term)
}

/// Notification that a key of the durable key-value store changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub key: String,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Insert a course row and return its new id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn insert_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError>;

    /// Overwrite the editable columns of a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn update_course(&self, id: CourseId, update: &CourseUpdate)
    -> Result<(), StorageError>;

    /// Fetch a course with its ordered sections and editor names.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<CourseWithSections>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_courses(
        &self,
        query: &CourseQuery,
    ) -> Result<Vec<CourseWithSections>, StorageError>;

    /// Delete a course row. Its sections go with it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn delete_course(&self, id: CourseId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait SectionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the section cannot be stored, including when
    /// the referenced course does not exist.
    async fn insert_section(&self, section: NewSectionRecord) -> Result<SectionId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the section does not exist.
    async fn update_section(
        &self,
        id: SectionId,
        update: &SectionUpdate,
    ) -> Result<(), StorageError>;

    /// Sections of a course ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_sections(&self, course_id: CourseId) -> Result<Vec<Section>, StorageError>;
}

/// Profiles, classes and subjects referenced by courses.
#[async_trait]
pub trait ReferenceDataRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the class cannot be stored.
    async fn upsert_class(&self, id: ClassId, name: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the subject cannot be stored.
    async fn upsert_subject(&self, id: SubjectId, name: &str) -> Result<(), StorageError>;
}

/// Durable string key-value store shared by every page of one profile.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failures.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Receive a `KeyChange` for every successful `set`.
    fn subscribe(&self) -> broadcast::Receiver<KeyChange>;
}

pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct CourseRow {
    title: String,
    class_id: ClassId,
    subject_id: SubjectId,
    last_editor: Option<UserId>,
    validated: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct SectionRow {
    course_id: CourseId,
    title: String,
    content: String,
    image_url: Option<ImageRef>,
    edited_by: Option<UserId>,
    position: u32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    courses: BTreeMap<CourseId, CourseRow>,
    sections: BTreeMap<SectionId, SectionRow>,
    profiles: HashMap<UserId, Option<String>>,
    classes: HashMap<ClassId, String>,
    subjects: HashMap<SubjectId, String>,
    next_course_id: u64,
    next_section_id: u64,
}

impl MemoryState {
    fn editor(&self, id: Option<UserId>) -> Option<Editor> {
        id.map(|id| Editor::new(id, self.profiles.get(&id).cloned().flatten()))
    }

    fn sections_of(&self, course_id: CourseId) -> Vec<Section> {
        let mut sections: Vec<Section> = self
            .sections
            .iter()
            .filter(|(_, row)| row.course_id == course_id)
            .map(|(id, row)| Section {
                id: *id,
                course_id: row.course_id,
                title: row.title.clone(),
                content: row.content.clone(),
                image_url: row.image_url.clone(),
                edited_by: self.editor(row.edited_by),
                position: row.position,
                created_at: row.created_at,
            })
            .collect();
        sections.sort_by_key(|s| (s.position, s.id));
        sections
    }

    fn course_with_sections(&self, id: CourseId, row: &CourseRow) -> CourseWithSections {
        CourseWithSections {
            course: Course {
                id,
                title: row.title.clone(),
                class_id: row.class_id,
                subject_id: row.subject_id,
                last_editor: self.editor(row.last_editor),
                validated: row.validated,
                created_at: row.created_at,
            },
            sections: self.sections_of(id),
            class_name: self.classes.get(&row.class_id).cloned(),
            subject_name: self.subjects.get(&row.subject_id).cloned(),
        }
    }
}

/// Simple in-memory backing store for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn insert_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError> {
        let mut guard = self.lock()?;
        guard.next_course_id += 1;
        let id = CourseId::new(guard.next_course_id);
        guard.courses.insert(
            id,
            CourseRow {
                title: course.title,
                class_id: course.class_id,
                subject_id: course.subject_id,
                last_editor: course.last_editor,
                validated: course.validated,
                created_at: course.created_at,
            },
        );
        Ok(id)
    }

    async fn update_course(
        &self,
        id: CourseId,
        update: &CourseUpdate,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let row = guard.courses.get_mut(&id).ok_or(StorageError::NotFound)?;
        row.title.clone_from(&update.title);
        row.class_id = update.class_id;
        row.subject_id = update.subject_id;
        row.last_editor = Some(update.last_editor);
        row.validated = update.validated;
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<CourseWithSections>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .courses
            .get(&id)
            .map(|row| guard.course_with_sections(id, row)))
    }

    async fn list_courses(
        &self,
        query: &CourseQuery,
    ) -> Result<Vec<CourseWithSections>, StorageError> {
        let guard = self.lock()?;
        let search = query.search_term();
        let mut rows: Vec<(CourseId, &CourseRow)> = guard
            .courses
            .iter()
            .filter(|(_, row)| !query.published_only || row.validated)
            .filter(|(_, row)| query.class_id.is_none_or(|c| row.class_id == c))
            .filter(|(_, row)| query.subject_id.is_none_or(|s| row.subject_id == s))
            .filter(|(_, row)| {
                search
                    .as_deref()
                    .is_none_or(|term| title_matches(&row.title, term))
            })
            .map(|(id, row)| (*id, row))
            .collect();
        rows.sort_by(|(a_id, a), (b_id, b)| {
            b.created_at.cmp(&a.created_at).then(b_id.cmp(a_id))
        });
        Ok(rows
            .into_iter()
            .take(query.row_limit())
            .map(|(id, row)| guard.course_with_sections(id, row))
            .collect())
    }

    async fn delete_course(&self, id: CourseId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.courses.remove(&id).ok_or(StorageError::NotFound)?;
        guard.sections.retain(|_, row| row.course_id != id);
        Ok(())
    }
}

#[async_trait]
impl SectionRepository for InMemoryRepository {
    async fn insert_section(&self, section: NewSectionRecord) -> Result<SectionId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&section.course_id) {
            return Err(StorageError::Conflict(format!(
                "course {} does not exist",
                section.course_id
            )));
        }
        let position = guard
            .sections
            .values()
            .filter(|row| row.course_id == section.course_id)
            .map(|row| row.position + 1)
            .max()
            .unwrap_or(0);
        guard.next_section_id += 1;
        let id = SectionId::new(guard.next_section_id);
        guard.sections.insert(
            id,
            SectionRow {
                course_id: section.course_id,
                title: section.title,
                content: section.content,
                image_url: section.image_url,
                edited_by: Some(section.edited_by),
                position,
                created_at: section.created_at,
            },
        );
        Ok(id)
    }

    async fn update_section(
        &self,
        id: SectionId,
        update: &SectionUpdate,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let row = guard.sections.get_mut(&id).ok_or(StorageError::NotFound)?;
        row.title.clone_from(&update.title);
        row.content.clone_from(&update.content);
        row.image_url.clone_from(&update.image_url);
        row.edited_by = Some(update.edited_by);
        Ok(())
    }

    async fn list_sections(&self, course_id: CourseId) -> Result<Vec<Section>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.sections_of(course_id))
    }
}

#[async_trait]
impl ReferenceDataRepository for InMemoryRepository {
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.profiles.insert(profile.id, profile.username.clone());
        Ok(())
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.profiles.get(&id).map(|username| Profile {
            id,
            username: username.clone(),
        }))
    }

    async fn upsert_class(&self, id: ClassId, name: &str) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.classes.insert(id, name.to_owned());
        Ok(())
    }

    async fn upsert_subject(&self, id: SubjectId, name: &str) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.subjects.insert(id, name.to_owned());
        Ok(())
    }
}

/// In-memory key-value store with change notifications.
#[derive(Clone)]
pub struct InMemoryKeyValueStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    changes: broadcast::Sender<KeyChange>,
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Arc::new(Mutex::new(HashMap::new())),
            changes,
        }
    }
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut guard = self
                .values
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard.insert(key.to_owned(), value.to_owned());
        }
        // no subscribers is fine
        let _ = self.changes.send(KeyChange {
            key: key.to_owned(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<KeyChange> {
        self.changes.subscribe()
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub sections: Arc<dyn SectionRepository>,
    pub reference: Arc<dyn ReferenceDataRepository>,
    pub key_values: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let courses: Arc<dyn CourseRepository> = Arc::new(repo.clone());
        let sections: Arc<dyn SectionRepository> = Arc::new(repo.clone());
        let reference: Arc<dyn ReferenceDataRepository> = Arc::new(repo);
        let key_values: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        Self {
            courses,
            sections,
            reference,
            key_values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::time::fixed_now;

    fn new_course(title: &str, validated: bool) -> NewCourseRecord {
        NewCourseRecord {
            title: title.to_string(),
            class_id: ClassId::new(1),
            subject_id: SubjectId::new(1),
            last_editor: None,
            validated,
            created_at: fixed_now(),
        }
    }

    fn new_section(course_id: CourseId, title: &str, editor: UserId) -> NewSectionRecord {
        NewSectionRecord {
            course_id,
            title: title.to_string(),
            content: "body".to_string(),
            image_url: None,
            edited_by: editor,
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn sections_append_in_insert_order_with_editor_names() {
        let repo = InMemoryRepository::new();
        let bob = Profile::new(UserId::random(), "bob");
        repo.upsert_profile(&bob).await.unwrap();

        let course_id = repo.insert_course(new_course("Algebra", true)).await.unwrap();
        repo.insert_section(new_section(course_id, "one", bob.id)).await.unwrap();
        repo.insert_section(new_section(course_id, "two", bob.id)).await.unwrap();

        let loaded = repo.get_course(course_id).await.unwrap().unwrap();
        let titles: Vec<_> = loaded.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["one", "two"]);
        assert_eq!(loaded.sections[1].position, 1);
        assert_eq!(
            loaded.sections[0].edited_by.as_ref().and_then(|e| e.username()),
            Some("bob")
        );
    }

    #[tokio::test]
    async fn section_insert_requires_existing_course() {
        let repo = InMemoryRepository::new();
        let err = repo
            .insert_section(new_section(CourseId::new(99), "orphan", UserId::random()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_cascades_to_sections() {
        let repo = InMemoryRepository::new();
        let course_id = repo.insert_course(new_course("Algebra", true)).await.unwrap();
        repo.insert_section(new_section(course_id, "one", UserId::random()))
            .await
            .unwrap();

        repo.delete_course(course_id).await.unwrap();
        assert!(repo.get_course(course_id).await.unwrap().is_none());
        assert!(repo.list_sections(course_id).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_course(course_id).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_filters_published_and_search() {
        let repo = InMemoryRepository::new();
        repo.insert_course(new_course("Linear Algebra", true)).await.unwrap();
        repo.insert_course(new_course("Draft algebra", false)).await.unwrap();
        repo.insert_course(new_course("History", true)).await.unwrap();

        let query = CourseQuery {
            search: Some("ALGEBRA".into()),
            ..CourseQuery::published()
        };
        let found = repo.list_courses(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].course.title, "Linear Algebra");

        let all = repo.list_courses(&CourseQuery::default()).await.unwrap();
        let ids: Vec<u64> = all.iter().map(|c| c.course.id.value()).collect();
        assert_eq!(ids, [3, 2, 1]);
    }

    #[tokio::test]
    async fn key_value_set_notifies_subscribers() {
        let store = InMemoryKeyValueStore::new();
        let mut rx = store.subscribe();
        store.set("learning_progress", "{}").await.unwrap();

        assert_eq!(store.get("learning_progress").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(rx.recv().await.unwrap().key, "learning_progress");
    }
}
