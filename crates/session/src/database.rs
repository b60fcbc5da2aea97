use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::state::{merge_scopes, strip_temp};
use crate::{
    CreateRequest, Event, ListRequest, ScopedDelta, Session, SessionError,
    SessionKey, SessionService, StateMap,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        app_name TEXT NOT NULL,
        user_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        state TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (app_name, user_id, session_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id TEXT NOT NULL,
        app_name TEXT NOT NULL,
        user_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        invocation_id TEXT NOT NULL,
        author TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        payload TEXT NOT NULL,
        PRIMARY KEY (id, app_name, user_id, session_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_states (
        app_name TEXT PRIMARY KEY,
        state TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_states (
        app_name TEXT NOT NULL,
        user_id TEXT NOT NULL,
        state TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (app_name, user_id)
    )
    "#,
];

/// Stores sessions in a SQLite database.
///
/// Session rows hold only session-scoped keys. Shared `app:` and `user:`
/// keys live in their own tables and are merged in when a session is
/// loaded, so every session of a user sees the same values.
pub struct DatabaseSessionService {
    pool: SqlitePool,
}

impl DatabaseSessionService {
    /// Opens the database at `url` (e.g. `sqlite://data.db`), creating the
    /// file if needed. Call [`DatabaseSessionService::migrate`] before use.
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let options =
            SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        debug!("opened session database at {url}");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[inline]
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the tables if they don't exist yet.
    pub async fn migrate(&self) -> Result<(), SessionError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, SessionError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

async fn load_app_state(
    tx: &mut Transaction<'_, Sqlite>,
    app_name: &str,
) -> Result<StateMap, SessionError> {
    let row = sqlx::query("SELECT state FROM app_states WHERE app_name = ?")
        .bind(app_name)
        .fetch_optional(&mut **tx)
        .await?;
    match row {
        Some(row) => Ok(serde_json::from_str(row.try_get("state")?)?),
        None => Ok(StateMap::new()),
    }
}

async fn load_user_state(
    tx: &mut Transaction<'_, Sqlite>,
    app_name: &str,
    user_id: &str,
) -> Result<StateMap, SessionError> {
    let row = sqlx::query(
        "SELECT state FROM user_states WHERE app_name = ? AND user_id = ?",
    )
    .bind(app_name)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    match row {
        Some(row) => Ok(serde_json::from_str(row.try_get("state")?)?),
        None => Ok(StateMap::new()),
    }
}

/// Applies the shared parts of a delta and returns the resulting app and
/// user state.
async fn apply_shared(
    tx: &mut Transaction<'_, Sqlite>,
    key: &SessionKey,
    scoped: &mut ScopedDelta,
    now: &str,
) -> Result<(StateMap, StateMap), SessionError> {
    let mut app = load_app_state(tx, &key.app_name).await?;
    if !scoped.app.is_empty() {
        app.append(&mut scoped.app);
        sqlx::query(
            "INSERT OR REPLACE INTO app_states (app_name, state, updated_at) \
             VALUES (?, ?, ?)",
        )
        .bind(&key.app_name)
        .bind(serde_json::to_string(&app)?)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }

    let mut user = load_user_state(tx, &key.app_name, &key.user_id).await?;
    if !scoped.user.is_empty() {
        user.append(&mut scoped.user);
        sqlx::query(
            "INSERT OR REPLACE INTO user_states \
             (app_name, user_id, state, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(serde_json::to_string(&user)?)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }

    Ok((app, user))
}

#[async_trait]
impl SessionService for DatabaseSessionService {
    async fn create(
        &self,
        req: CreateRequest,
    ) -> Result<Session, SessionError> {
        let session_id = req
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let key = SessionKey::new(req.app_name, req.user_id, session_id);
        let now = Utc::now();
        let now_str = format_time(&now);

        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query(
            "SELECT 1 FROM sessions \
             WHERE app_name = ? AND user_id = ? AND session_id = ?",
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(SessionError::AlreadyExists(key));
        }

        let mut scoped = ScopedDelta::split(&req.state);
        let (app, user) =
            apply_shared(&mut tx, &key, &mut scoped, &now_str).await?;

        sqlx::query(
            "INSERT INTO sessions \
             (app_name, user_id, session_id, state, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .bind(serde_json::to_string(&scoped.session)?)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!("created session {key}");
        Ok(Session {
            state: merge_scopes(&app, &user, &scoped.session),
            key,
            events: vec![],
            last_update_time: now,
        })
    }

    async fn get(&self, key: &SessionKey) -> Result<Session, SessionError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT state, updated_at FROM sessions \
             WHERE app_name = ? AND user_id = ? AND session_id = ?",
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| SessionError::NotFound(key.clone()))?;

        let session_state: StateMap =
            serde_json::from_str(row.try_get("state")?)?;
        let last_update_time = parse_time(row.try_get("updated_at")?)?;
        let app = load_app_state(&mut tx, &key.app_name).await?;
        let user = load_user_state(&mut tx, &key.app_name, &key.user_id).await?;

        let rows = sqlx::query(
            "SELECT payload FROM events \
             WHERE app_name = ? AND user_id = ? AND session_id = ? \
             ORDER BY rowid",
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(serde_json::from_str(row.try_get("payload")?)?);
        }

        Ok(Session {
            key: key.clone(),
            state: merge_scopes(&app, &user, &session_state),
            events,
            last_update_time,
        })
    }

    async fn list(
        &self,
        req: ListRequest,
    ) -> Result<Vec<Session>, SessionError> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            "SELECT session_id, state, updated_at FROM sessions \
             WHERE app_name = ? AND user_id = ? \
             ORDER BY updated_at DESC",
        )
        .bind(&req.app_name)
        .bind(&req.user_id)
        .fetch_all(&mut *tx)
        .await?;
        let app = load_app_state(&mut tx, &req.app_name).await?;
        let user =
            load_user_state(&mut tx, &req.app_name, &req.user_id).await?;
        tx.commit().await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            let session_id: String = row.try_get("session_id")?;
            let state: StateMap =
                serde_json::from_str(row.try_get("state")?)?;
            let key =
                SessionKey::new(&*req.app_name, &*req.user_id, session_id);
            sessions.push(Session {
                key,
                state: merge_scopes(&app, &user, &state),
                events: vec![],
                last_update_time: parse_time(row.try_get("updated_at")?)?,
            });
        }
        Ok(sessions)
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM events \
             WHERE app_name = ? AND user_id = ? AND session_id = ?",
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query(
            "DELETE FROM sessions \
             WHERE app_name = ? AND user_id = ? AND session_id = ?",
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if result.rows_affected() > 0 {
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
        let now_str = format_time(&Utc::now());

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT state FROM sessions \
             WHERE app_name = ? AND user_id = ? AND session_id = ?",
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| SessionError::NotFound(key.clone()))?;
        let mut session_state: StateMap =
            serde_json::from_str(row.try_get("state")?)?;

        let mut scoped = ScopedDelta::split(&event.actions.state_delta);
        apply_shared(&mut tx, key, &mut scoped, &now_str).await?;
        session_state.append(&mut scoped.session);

        sqlx::query(
            "UPDATE sessions SET state = ?, updated_at = ? \
             WHERE app_name = ? AND user_id = ? AND session_id = ?",
        )
        .bind(serde_json::to_string(&session_state)?)
        .bind(&now_str)
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO events (id, app_name, user_id, session_id, \
             invocation_id, author, timestamp, payload) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .bind(&event.invocation_id)
        .bind(&event.author)
        .bind(format_time(&event.timestamp))
        .bind(serde_json::to_string(&event)?)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(event)
    }
}
