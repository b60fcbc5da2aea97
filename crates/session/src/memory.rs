use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::state::{merge_scopes, strip_temp};
use crate::{
    CreateRequest, Event, ListRequest, ScopedDelta, Session, SessionError,
    SessionKey, SessionService, StateMap,
};

struct StoredSession {
    state: StateMap,
    events: Vec<Event>,
    last_update_time: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionKey, StoredSession>,
    app_states: HashMap<String, StateMap>,
    user_states: HashMap<(String, String), StateMap>,
}

impl Inner {
    fn apply_shared(
        &mut self,
        app_name: &str,
        user_id: &str,
        scoped: &mut ScopedDelta,
    ) {
        if !scoped.app.is_empty() {
            self.app_states
                .entry(app_name.to_owned())
                .or_default()
                .append(&mut scoped.app);
        }
        if !scoped.user.is_empty() {
            self.user_states
                .entry((app_name.to_owned(), user_id.to_owned()))
                .or_default()
                .append(&mut scoped.user);
        }
    }

    fn snapshot(
        &self,
        key: &SessionKey,
        stored: &StoredSession,
        with_events: bool,
    ) -> Session {
        let empty = StateMap::new();
        let app = self.app_states.get(&key.app_name).unwrap_or(&empty);
        let user = self
            .user_states
            .get(&(key.app_name.clone(), key.user_id.clone()))
            .unwrap_or(&empty);
        Session {
            key: key.clone(),
            state: merge_scopes(app, user, &stored.state),
            events: if with_events {
                stored.events.clone()
            } else {
                vec![]
            },
            last_update_time: stored.last_update_time,
        }
    }
}

/// Keeps sessions in process memory. Everything is lost on exit.
#[derive(Default)]
pub struct InMemorySessionService {
    inner: RwLock<Inner>,
}

impl InMemorySessionService {
    /// Creates an empty service.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn create(
        &self,
        req: CreateRequest,
    ) -> Result<Session, SessionError> {
        let session_id = req
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let key = SessionKey::new(req.app_name, req.user_id, session_id);

        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(&key) {
            return Err(SessionError::AlreadyExists(key));
        }

        let mut scoped = ScopedDelta::split(&req.state);
        inner.apply_shared(&key.app_name, &key.user_id, &mut scoped);
        let stored = StoredSession {
            state: scoped.session,
            events: vec![],
            last_update_time: Utc::now(),
        };
        let session = inner.snapshot(&key, &stored, true);
        inner.sessions.insert(key, stored);
        debug!("created session {}", session.key);
        Ok(session)
    }

    async fn get(&self, key: &SessionKey) -> Result<Session, SessionError> {
        let inner = self.inner.read().await;
        let stored = inner
            .sessions
            .get(key)
            .ok_or_else(|| SessionError::NotFound(key.clone()))?;
        Ok(inner.snapshot(key, stored, true))
    }

    async fn list(
        &self,
        req: ListRequest,
    ) -> Result<Vec<Session>, SessionError> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<_> = inner
            .sessions
            .iter()
            .filter(|(key, _)| {
                key.app_name == req.app_name && key.user_id == req.user_id
            })
            .map(|(key, stored)| inner.snapshot(key, stored, false))
            .collect();
        sessions.sort_by(|a, b| b.last_update_time.cmp(&a.last_update_time));
        Ok(sessions)
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError> {
        let mut inner = self.inner.write().await;
        if inner.sessions.remove(key).is_some() {
            debug!("deleted session {key}");
        }
        Ok(())
    }

    async fn append_event(
        &self,
        key: &SessionKey,
        mut event: Event,
    ) -> Result<Event, SessionError> {
        strip_temp(&mut event.actions.state_delta);

        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(key) {
            return Err(SessionError::NotFound(key.clone()));
        }

        let mut scoped = ScopedDelta::split(&event.actions.state_delta);
        inner.apply_shared(&key.app_name, &key.user_id, &mut scoped);
        let Some(stored) = inner.sessions.get_mut(key) else {
            return Err(SessionError::NotFound(key.clone()));
        };
        stored.state.append(&mut scoped.session);
        stored.events.push(event.clone());
        stored.last_update_time = Utc::now();
        Ok(event)
    }
}
