use async_trait::async_trait;

use crate::{Event, Session, SessionError, SessionKey, StateMap};

/// Parameters for [`SessionService::create`].
#[derive(Clone, Debug, Default)]
pub struct CreateRequest {
    /// The app the session belongs to.
    pub app_name: String,
    /// The user the session belongs to.
    pub user_id: String,
    /// A fixed session id. A random UUID is used when absent.
    pub session_id: Option<String>,
    /// Initial state, may contain `app:` and `user:` keys.
    pub state: StateMap,
}

/// Parameters for [`SessionService::list`].
#[derive(Clone, Debug, Default)]
pub struct ListRequest {
    /// The app to list sessions of.
    pub app_name: String,
    /// The user to list sessions of.
    pub user_id: String,
}

/// Stores sessions and their events.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Creates a session.
    async fn create(&self, req: CreateRequest) -> Result<Session, SessionError>;

    /// Loads a session with all its events.
    async fn get(&self, key: &SessionKey) -> Result<Session, SessionError>;

    /// Lists the sessions of a user, most recently updated first. Events
    /// are not loaded.
    async fn list(
        &self,
        req: ListRequest,
    ) -> Result<Vec<Session>, SessionError>;

    /// Deletes a session and its events. Deleting a missing session is not
    /// an error.
    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError>;

    /// Stores an event and applies its state delta. Returns the event as
    /// stored, i.e. without `temp:` keys.
    async fn append_event(
        &self,
        key: &SessionKey,
        event: Event,
    ) -> Result<Event, SessionError>;
}
