//! Student reading page: published course, progress and chronometer together.

use course_core::model::{CourseId, ProgressRecord, ScrollMetrics};

use crate::chronometer::ChronometerDriver;
use crate::error::{ProgressError, ReaderError, SessionError};
use crate::progress::ProgressTracker;
use crate::reader::CourseReader;
use crate::session::Session;
use crate::view::{CourseView, ProgressView};

/// What the reading page shows after opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    Ready {
        view: CourseView,
        progress: ProgressView,
    },
    /// Terminal, no retry.
    Unavailable(Unavailable),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    NotFound,
    StoreFailure,
}

pub struct ReadingPage {
    reader: CourseReader,
    tracker: ProgressTracker,
    chronometer: ChronometerDriver,
    course_id: CourseId,
}

impl ReadingPage {
    #[must_use]
    pub fn new(reader: CourseReader, tracker: ProgressTracker, course_id: CourseId) -> Self {
        Self {
            reader,
            tracker,
            chronometer: ChronometerDriver::new(),
            course_id,
        }
    }

    /// Load the course, restore progress and start the chronometer.
    ///
    /// Must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Missing` if no session was resolved; nothing is loaded.
    pub async fn open(&mut self, session: Option<&Session>) -> Result<PageState, SessionError> {
        let Some(session) = session else {
            tracing::warn!(course_id = %self.course_id, "reading page opened without session");
            return Err(SessionError::Missing);
        };

        let view = match self.reader.load_published(self.course_id).await {
            Ok(view) => view,
            Err(ReaderError::NotFound) => {
                return Ok(PageState::Unavailable(Unavailable::NotFound));
            }
            Err(err) => {
                tracing::error!(course_id = %self.course_id, error = %err, "course unavailable");
                return Ok(PageState::Unavailable(Unavailable::StoreFailure));
            }
        };

        let restored = self.tracker.restore(self.course_id).await.unwrap_or_else(|err| {
            tracing::warn!(course_id = %self.course_id, error = %err, "progress restore failed");
            None
        });
        self.chronometer.start();
        tracing::debug!(
            course_id = %self.course_id,
            user_id = %session.user_id,
            "reading page ready"
        );

        Ok(PageState::Ready {
            view,
            progress: ProgressView::from_record(restored),
        })
    }

    /// Forward one scroll measurement to the tracker.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the progress cannot be persisted.
    pub async fn on_scroll(
        &mut self,
        metrics: ScrollMetrics,
    ) -> Result<Option<ProgressRecord>, ProgressError> {
        self.tracker.record_scroll(self.course_id, metrics).await
    }

    pub fn chronometer(&mut self) -> &mut ChronometerDriver {
        &mut self.chronometer
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }
}
