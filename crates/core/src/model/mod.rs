pub mod attribution;
pub mod chronometer;
mod course;
mod ids;
mod profile;
pub mod progress;
mod section;

pub use ids::{ClassId, CourseId, ParseIdError, SectionId, SubjectId, UserId};

pub use attribution::{ATTRIBUTION_PLACEHOLDER, resolve_attribution, section_attribution};
pub use chronometer::{Chronometer, RunState, format_hms};
pub use course::{Course, CourseDraft, CourseError, Editor, ValidatedCourse};
pub use profile::Profile;
pub use progress::{ProgressBlob, ProgressLabel, ProgressRecord, ScrollMetrics};
pub use section::{ImageRef, Section, SectionDraft, SectionError, ValidatedSection};
