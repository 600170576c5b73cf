//! Normalized view models handed to the rendering layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use course_core::model::{
    ClassId, CourseId, ProgressLabel, ProgressRecord, SectionId, SubjectId, resolve_attribution,
    section_attribution,
};
use storage::repository::CourseWithSections;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionView {
    pub id: SectionId,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub editor_name: String,
    pub position: u32,
}

/// A course with its ordered sections and resolved attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseView {
    pub id: CourseId,
    pub title: String,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub editor_name: String,
    pub sections: Vec<SectionView>,
}

impl CourseView {
    #[must_use]
    pub fn from_loaded(loaded: &CourseWithSections) -> Self {
        let course = &loaded.course;
        Self {
            id: course.id,
            title: course.title.clone(),
            class_id: course.class_id,
            subject_id: course.subject_id,
            editor_name: resolve_attribution(course, &loaded.sections).to_owned(),
            sections: loaded
                .sections
                .iter()
                .map(|s| SectionView {
                    id: s.id,
                    title: s.title.clone(),
                    content: s.content.clone(),
                    image_url: s.image_url.as_ref().map(ToString::to_string),
                    editor_name: section_attribution(s).to_owned(),
                    position: s.position,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub percent: u8,
    pub label: String,
}

impl ProgressView {
    /// Courses never scrolled show as 0%.
    #[must_use]
    pub fn from_record(record: Option<ProgressRecord>) -> Self {
        let percent = record.map_or(0, |r| r.percent);
        Self {
            percent,
            label: ProgressLabel::for_percent(percent).to_string(),
        }
    }
}

/// One row of a course listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
    pub class_id: ClassId,
    pub class_name: Option<String>,
    pub subject_id: SubjectId,
    pub subject_name: Option<String>,
    pub editor_name: String,
    pub validated: bool,
    pub created_at: DateTime<Utc>,
    /// Only filled for student-facing listings.
    pub progress: Option<ProgressView>,
}

impl CourseSummary {
    #[must_use]
    pub fn from_loaded(loaded: &CourseWithSections) -> Self {
        let course = &loaded.course;
        Self {
            id: course.id,
            title: course.title.clone(),
            class_id: course.class_id,
            class_name: loaded.class_name.clone(),
            subject_id: course.subject_id,
            subject_name: loaded.subject_name.clone(),
            editor_name: resolve_attribution(course, &loaded.sections).to_owned(),
            validated: course.validated,
            created_at: course.created_at,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, record: Option<ProgressRecord>) -> Self {
        self.progress = Some(ProgressView::from_record(record));
        self
    }
}
