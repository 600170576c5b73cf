//! Course authoring: the editor form and the service that persists it.

mod form;
mod service;

pub use form::{BufferOrigin, EditorSession, SectionBuffer};
pub use service::{CourseEditor, DeleteOutcome, SaveReport};
