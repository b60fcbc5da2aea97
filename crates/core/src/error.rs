use primer_model::{ErrorKind, ModelProviderError};
use primer_session::SessionError;
use thiserror::Error;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Loading or storing the session failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The model provider failed and retrying didn't help.
    #[error("model request failed ({kind}): {message}")]
    Model {
        /// What kind of failure the provider reported.
        kind: ErrorKind,
        /// The provider's description of the failure.
        message: String,
    },
    /// The instruction references a state key that isn't set.
    #[error("instruction references unset state variable `{0}`")]
    MissingStateVariable(String),
    /// The model's final answer doesn't parse as the requested JSON.
    #[error("model output is not valid structured output: {0}")]
    InvalidOutput(#[source] serde_json::Error),
}

impl From<Box<dyn ModelProviderError>> for RunError {
    fn from(err: Box<dyn ModelProviderError>) -> Self {
        RunError::Model {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
