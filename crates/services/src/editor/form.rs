use course_core::ValidationError;
use course_core::model::{
    CourseDraft, CourseId, SectionDraft, SectionId, ValidatedCourse, ValidatedSection,
};
use storage::repository::CourseWithSections;

/// Where a section buffer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferOrigin {
    /// Loaded from the store; saving updates this row in place.
    Persisted {
        id: SectionId,
        editor_name: Option<String>,
    },
    /// Added in the form; saving inserts a new row.
    New,
}

/// One section as held by the editor form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBuffer {
    pub origin: BufferOrigin,
    pub draft: SectionDraft,
}

impl SectionBuffer {
    #[must_use]
    pub fn new(draft: SectionDraft) -> Self {
        Self {
            origin: BufferOrigin::New,
            draft,
        }
    }

    #[must_use]
    pub fn persisted_id(&self) -> Option<SectionId> {
        match self.origin {
            BufferOrigin::Persisted { id, .. } => Some(id),
            BufferOrigin::New => None,
        }
    }
}

/// In-memory state of the course editor form.
///
/// `editing` is `None` while composing a brand new course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSession {
    pub editing: Option<CourseId>,
    pub course: CourseDraft,
    pub sections: Vec<SectionBuffer>,
    attribution: Option<String>,
}

impl EditorSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the form state with a stored course.
    pub(crate) fn fill_from(&mut self, loaded: &CourseWithSections, attribution: &str) {
        let course = &loaded.course;
        self.editing = Some(course.id);
        self.course = CourseDraft {
            title: course.title.clone(),
            class_id: Some(course.class_id),
            subject_id: Some(course.subject_id),
        };
        self.sections = loaded
            .sections
            .iter()
            .map(|s| SectionBuffer {
                origin: BufferOrigin::Persisted {
                    id: s.id,
                    editor_name: s
                        .edited_by
                        .as_ref()
                        .and_then(|e| e.username())
                        .map(str::to_owned),
                },
                draft: SectionDraft::new(
                    s.title.clone(),
                    s.content.clone(),
                    s.image_url.as_ref().map_or_else(String::new, ToString::to_string),
                ),
            })
            .collect();
        self.attribution = Some(attribution.to_owned());
    }

    /// Append an empty section buffer and return its index.
    pub fn add_section(&mut self) -> usize {
        self.push_section(SectionDraft::default())
    }

    pub fn push_section(&mut self, draft: SectionDraft) -> usize {
        self.sections.push(SectionBuffer::new(draft));
        self.sections.len() - 1
    }

    /// Drop a buffer from the form. Stored rows are left untouched.
    pub fn remove_section(&mut self, index: usize) -> Option<SectionBuffer> {
        (index < self.sections.len()).then(|| self.sections.remove(index))
    }

    pub fn section_mut(&mut self, index: usize) -> Option<&mut SectionDraft> {
        self.sections.get_mut(index).map(|b| &mut b.draft)
    }

    /// Back to an empty "new course" form.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Attribution shown while editing a stored course.
    #[must_use]
    pub fn attribution(&self) -> Option<&str> {
        self.attribution.as_deref()
    }

    pub(crate) fn validate(&self) -> Result<ValidatedForm, ValidationError> {
        let course = self.course.validate()?;
        let sections = self
            .sections
            .iter()
            .enumerate()
            .map(|(index, buffer)| {
                buffer
                    .draft
                    .validate()
                    .map(|section| (buffer.persisted_id(), section))
                    .map_err(|e| ValidationError::section(index, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ValidatedForm { course, sections })
    }
}

/// A form that passed validation, ready to be written.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedForm {
    pub course: ValidatedCourse,
    /// `Some(id)` for persisted buffers.
    pub sections: Vec<(Option<SectionId>, ValidatedSection)>,
}
