//! Step-by-step tutorial agents, from a plain greeter to a pizza ordering
//! assistant that keeps its order in a SQLite-backed session.
//!
//! The `agent-primer` binary runs each of them in the terminal. As a
//! library the crate exposes the agent constructors, the pizza domain and
//! the settings the binary reads from the environment.

#[macro_use]
extern crate tracing;

pub mod agents;
pub mod config;
pub mod driver;
pub mod pizza;

/// Re-exports of the runtime crates.
pub mod core {
    pub use primer_core::*;
    pub use primer_session as session;
}
