#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod chronometer;
pub mod editor;
pub mod error;
pub mod progress;
pub mod reader;
pub mod reading;
pub mod session;
#[cfg(test)]
mod testing;
pub mod view;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use catalog::{CourseCatalog, LATEST_COURSES_LIMIT};
pub use chronometer::ChronometerDriver;
pub use editor::{
    BufferOrigin, CourseEditor, DeleteOutcome, EditorSession, SaveReport, SectionBuffer,
};
pub use error::{
    AppServicesError, CatalogError, EditorError, ProgressError, ReaderError, SessionError,
};
pub use progress::{ProgressStore, ProgressTracker, ProgressWatcher};
pub use reader::CourseReader;
pub use reading::{PageState, ReadingPage, Unavailable};
pub use session::{Session, require_session};
pub use view::{CourseSummary, CourseView, ProgressView, SectionView};
