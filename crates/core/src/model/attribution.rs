//! Resolution of the "last edited by" display name of a course.

use crate::model::course::Course;
use crate::model::section::Section;

/// Shown when neither the course nor its last section names an editor.
pub const ATTRIBUTION_PLACEHOLDER: &str = "—";

/// Resolve the display editor of a course.
///
/// The course's own `last_editor` wins. Otherwise the editor of the section
/// at the last position is used, and only that section: an unnamed last
/// section yields the placeholder even if earlier sections are attributed.
#[must_use]
pub fn resolve_attribution<'a>(course: &'a Course, sections: &'a [Section]) -> &'a str {
    course_editor_name(course)
        .or_else(|| last_section_editor_name(sections))
        .unwrap_or(ATTRIBUTION_PLACEHOLDER)
}

/// Display name for a single section's editor.
#[must_use]
pub fn section_attribution(section: &Section) -> &str {
    section
        .edited_by
        .as_ref()
        .and_then(|e| e.username())
        .unwrap_or(ATTRIBUTION_PLACEHOLDER)
}

fn course_editor_name(course: &Course) -> Option<&str> {
    course.last_editor.as_ref().and_then(|e| e.username())
}

fn last_section_editor_name(sections: &[Section]) -> Option<&str> {
    sections
        .iter()
        .max_by_key(|s| s.position)
        .and_then(|s| s.edited_by.as_ref())
        .and_then(|e| e.username())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::course::Editor;
    use crate::model::ids::{ClassId, CourseId, SectionId, SubjectId, UserId};
    use crate::time::fixed_now;

    fn course(last_editor: Option<&str>) -> Course {
        Course {
            id: CourseId::new(1),
            title: "Fractions".into(),
            class_id: ClassId::new(1),
            subject_id: SubjectId::new(1),
            last_editor: last_editor.map(|name| Editor::new(UserId::random(), Some(name.into()))),
            validated: true,
            created_at: fixed_now(),
        }
    }

    fn section(id: u64, position: u32, editor: Option<&str>) -> Section {
        Section {
            id: SectionId::new(id),
            course_id: CourseId::new(1),
            title: format!("Part {id}"),
            content: "...".into(),
            image_url: None,
            edited_by: editor.map(|name| Editor::new(UserId::random(), Some(name.into()))),
            position,
            created_at: fixed_now(),
        }
    }

    #[test]
    fn falls_back_to_last_section_editor() {
        let sections = [section(1, 0, Some("bob")), section(2, 1, Some("alice"))];
        assert_eq!(resolve_attribution(&course(None), &sections), "alice");
    }

    #[test]
    fn course_editor_takes_precedence() {
        let sections = [section(1, 0, Some("bob"))];
        assert_eq!(resolve_attribution(&course(Some("carol")), &sections), "carol");
    }

    #[test]
    fn uses_position_not_slice_order() {
        let sections = [section(2, 5, Some("alice")), section(1, 0, Some("bob"))];
        assert_eq!(resolve_attribution(&course(None), &sections), "alice");
    }

    #[test]
    fn unnamed_last_section_yields_placeholder() {
        let sections = [section(1, 0, Some("bob")), section(2, 1, None)];
        assert_eq!(
            resolve_attribution(&course(None), &sections),
            ATTRIBUTION_PLACEHOLDER
        );
        assert_eq!(resolve_attribution(&course(None), &[]), ATTRIBUTION_PLACEHOLDER);
    }

    #[test]
    fn course_editor_without_username_falls_through() {
        let mut c = course(None);
        c.last_editor = Some(Editor::new(UserId::random(), None));
        let sections = [section(1, 0, Some("bob"))];
        assert_eq!(resolve_attribution(&c, &sections), "bob");
    }

    #[test]
    fn section_attribution_uses_placeholder() {
        assert_eq!(section_attribution(&section(1, 0, None)), ATTRIBUTION_PLACEHOLDER);
        assert_eq!(section_attribution(&section(1, 0, Some("dan"))), "dan");
    }
}
