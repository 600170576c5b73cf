use course_core::model::{Profile, UserId};

use crate::error::SessionError;

/// A user and profile resolved by the external auth guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub profile: Profile,
}

impl Session {
    #[must_use]
    pub fn new(profile: Profile) -> Self {
        Self {
            user_id: profile.id,
            profile,
        }
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.profile.username.as_deref()
    }
}

/// Gate for page initialisation: nothing else runs without a session.
///
/// # Errors
///
/// Returns `SessionError::Missing` if the guard resolved no session.
pub fn require_session(session: Option<Session>) -> Result<Session, SessionError> {
    session.ok_or_else(|| {
        tracing::warn!("page initialisation aborted: no session");
        SessionError::Missing
    })
}
