use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use primer_session::State;

/// What a tool can see of the invocation that called it.
///
/// Tools run one at a time, so the state lock is never contended. It only
/// exists to let tool futures be `'static`. Don't hold the guard across an
/// `.await`.
#[derive(Clone)]
pub struct ToolContext {
    state: Arc<Mutex<State>>,
    invocation_id: Arc<str>,
    call_id: String,
}

impl ToolContext {
    pub(crate) fn new(
        state: Arc<Mutex<State>>,
        invocation_id: Arc<str>,
        call_id: String,
    ) -> Self {
        Self {
            state,
            invocation_id,
            call_id,
        }
    }

    /// Creates a context over a standalone state, for calling tools
    /// outside of a run.
    pub fn detached(state: State) -> Self {
        Self::new(Arc::new(Mutex::new(state)), Arc::from(""), String::new())
    }

    /// Locks the session state. Changes are recorded in its delta and
    /// persisted with the tool response.
    #[inline]
    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the id of the current invocation.
    #[inline]
    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    /// Returns the id of the tool call being served.
    #[inline]
    pub fn call_id(&self) -> &str {
        &self.call_id
    }
}
