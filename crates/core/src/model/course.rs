use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{ClassId, CourseId, SubjectId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("a class must be selected")]
    MissingClass,

    #[error("a subject must be selected")]
    MissingSubject,
}

//
// ─── EDITOR REFERENCE ──────────────────────────────────────────────────────────
//

/// A user referenced by a course or section as its last writer.
///
/// `username` is joined from the profile row and may be missing when the
/// profile was never created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Editor {
    pub id: UserId,
    pub username: Option<String>,
}

impl Editor {
    #[must_use]
    pub fn new(id: UserId, username: Option<String>) -> Self {
        Self { id, username }
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A persisted course row.
///
/// Only courses with `validated == true` are visible to readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub last_editor: Option<Editor>,
    pub validated: bool,
    pub created_at: DateTime<Utc>,
}

impl Course {
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.validated
    }
}

/// Raw course-level fields as typed into the editor form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseDraft {
    pub title: String,
    pub class_id: Option<ClassId>,
    pub subject_id: Option<SubjectId>,
}

impl CourseDraft {
    /// Check the course-level form fields.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` for a blank title or a missing class/subject.
    pub fn validate(&self) -> Result<ValidatedCourse, CourseError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        let class_id = self.class_id.ok_or(CourseError::MissingClass)?;
        let subject_id = self.subject_id.ok_or(CourseError::MissingSubject)?;

        Ok(ValidatedCourse {
            title: title.to_owned(),
            class_id,
            subject_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCourse {
    pub title: String,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> CourseDraft {
        CourseDraft {
            title: title.to_string(),
            class_id: Some(ClassId::new(1)),
            subject_id: Some(SubjectId::new(2)),
        }
    }

    #[test]
    fn blank_title_is_rejected() {
        assert_eq!(draft("   ").validate(), Err(CourseError::EmptyTitle));
    }

    #[test]
    fn missing_class_or_subject_is_rejected() {
        let mut no_class = draft("Algebra");
        no_class.class_id = None;
        assert_eq!(no_class.validate(), Err(CourseError::MissingClass));

        let mut no_subject = draft("Algebra");
        no_subject.subject_id = None;
        assert_eq!(no_subject.validate(), Err(CourseError::MissingSubject));
    }

    #[test]
    fn valid_draft_trims_title() {
        let validated = draft("  Algebra ").validate().unwrap();
        assert_eq!(validated.title, "Algebra");
        assert_eq!(validated.class_id, ClassId::new(1));
        assert_eq!(validated.subject_id, SubjectId::new(2));
    }
}
