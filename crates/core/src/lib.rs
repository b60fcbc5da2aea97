//! Agent runtime: agent definitions, tools, model access and the runner
//! that drives an agent over persisted sessions.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod error;
mod model_client;
mod runner;
pub mod template;
pub mod tool;

pub use agent::{AgentBuilder, LlmAgent};
pub use error::RunError;
pub use model_client::RetryPolicy;
pub use runner::{EventStream, Runner};
