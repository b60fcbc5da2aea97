//! Provider-agnostic types for talking to LLMs.
//!
//! Agents only see the types defined here: a [`ModelRequest`] goes in, a
//! stream of [`ModelResponseEvent`]s comes out. Each concrete provider
//! (OpenAI-compatible endpoints, the scripted test model, ...) lives in its
//! own crate and implements [`ModelProvider`].
//!
//! Conversation history is expressed with plain data ([`ModelMessage`]) so
//! that it can be rebuilt from persisted session events at any time.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
