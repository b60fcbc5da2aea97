//! Conversation sessions: state, events and their storage.
//!
//! A session belongs to one user of one app and records every step of the
//! conversation as an [`Event`]. Events carry state deltas, which the
//! [`SessionService`] folds into the session [`State`] when they are
//! appended. Keys prefixed with `app:` or `user:` are shared across
//! sessions of the same app or user, `temp:` keys are never stored.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod event;
mod memory;
mod service;
mod session;
mod state;

#[cfg(feature = "sqlite")]
mod database;

#[cfg(feature = "sqlite")]
pub use database::DatabaseSessionService;
pub use error::SessionError;
pub use event::{Event, EventActions, EventContent, USER_AUTHOR};
pub use memory::InMemorySessionService;
pub use service::{CreateRequest, ListRequest, SessionService};
pub use session::{Session, SessionKey};
pub use state::{
    KEY_PREFIX_APP, KEY_PREFIX_TEMP, KEY_PREFIX_USER, ScopedDelta, State,
    StateMap,
};
