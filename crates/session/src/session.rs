use std::fmt::{self, Display};

use chrono::{DateTime, Utc};

use crate::{Event, State, StateMap};

/// Identifies one session of one user of one app.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    /// The app the session belongs to.
    pub app_name: String,
    /// The user the session belongs to.
    pub user_id: String,
    /// The session id, unique per app and user.
    pub session_id: String,
}

impl SessionKey {
    /// Creates a key.
    pub fn new<A, U, S>(app_name: A, user_id: U, session_id: S) -> Self
    where
        A: Into<String>,
        U: Into<String>,
        S: Into<String>,
    {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

/// A snapshot of a stored session.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    /// Where the session lives.
    pub key: SessionKey,
    /// Session state merged with the shared `app:` and `user:` keys.
    pub state: StateMap,
    /// Recorded events, oldest first. Empty in listings.
    pub events: Vec<Event>,
    /// When the session was last changed.
    pub last_update_time: DateTime<Utc>,
}

impl Session {
    /// Returns the session id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.key.session_id
    }

    /// Returns a [`State`] seeded with the session state, ready to record
    /// changes.
    #[inline]
    pub fn to_state(&self) -> State {
        State::new(self.state.clone())
    }
}
