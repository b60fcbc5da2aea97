#[cfg(test)]
mod tests;

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures_util::Stream;
use primer_model::{ModelMessage, ModelRequest};
use primer_session::{
    Event, EventContent, SessionKey, SessionService, State, StateMap,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::conversation::to_model_messages;
use crate::template::render_instruction;
use crate::tool::ToolContext;
use crate::{LlmAgent, RunError};

const DEFAULT_MAX_MODEL_TURNS: usize = 10;

/// Drives an [`LlmAgent`] over the sessions of one app.
///
/// Each [`Runner::run`] call is one invocation: the user message is
/// recorded, then the model is called until it produces a final answer,
/// with requested tools executed in between. Every step is appended to
/// the session and streamed back to the caller as an [`Event`].
pub struct Runner {
    agent: Arc<LlmAgent>,
    app_name: String,
    session_service: Arc<dyn SessionService>,
    max_model_turns: usize,
}

impl Runner {
    /// Creates a runner for `agent`, storing sessions under `app_name`.
    pub fn new<S: Into<String>>(
        agent: LlmAgent,
        app_name: S,
        session_service: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            agent: Arc::new(agent),
            app_name: app_name.into(),
            session_service,
            max_model_turns: DEFAULT_MAX_MODEL_TURNS,
        }
    }

    /// Caps the number of model calls in one invocation. When the cap is
    /// hit, the invocation ends with an escalation event.
    #[inline]
    pub fn with_max_model_turns(mut self, max_model_turns: usize) -> Self {
        self.max_model_turns = max_model_turns.max(1);
        self
    }

    /// Returns the agent.
    #[inline]
    pub fn agent(&self) -> &LlmAgent {
        &self.agent
    }

    /// Returns the app name sessions are stored under.
    #[inline]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Returns the session service.
    #[inline]
    pub fn session_service(&self) -> &Arc<dyn SessionService> {
        &self.session_service
    }

    /// Sends `message` to the agent within an existing session.
    ///
    /// The invocation runs on a spawned task. Dropping the returned stream
    /// stops it before the next model call.
    pub fn run(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
    ) -> EventStream {
        let (tx, rx) = mpsc::channel(32);
        let invocation = Invocation {
            agent: Arc::clone(&self.agent),
            session_service: Arc::clone(&self.session_service),
            key: SessionKey::new(&*self.app_name, user_id, session_id),
            id: Arc::from(format!("e-{}", Uuid::new_v4())),
            max_model_turns: self.max_model_turns,
            tx,
        };
        let span = debug_span!("invocation", id = %invocation.id);
        tokio::spawn(invocation.run(message.to_owned()).instrument(span));
        EventStream { rx }
    }
}

/// Events of one invocation, in the order they were recorded.
///
/// The stream ends after the final response, or after an error.
pub struct EventStream {
    rx: mpsc::Receiver<Result<Event, RunError>>,
}

impl Stream for EventStream {
    type Item = Result<Event, RunError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

struct Invocation {
    agent: Arc<LlmAgent>,
    session_service: Arc<dyn SessionService>,
    key: SessionKey,
    id: Arc<str>,
    max_model_turns: usize,
    tx: mpsc::Sender<Result<Event, RunError>>,
}

impl Invocation {
    async fn run(self, message: String) {
        if let Err(err) = self.drive(message).await {
            error!("invocation failed: {err}");
            self.tx.send(Err(err)).await.ok();
        }
    }

    async fn drive(&self, message: String) -> Result<(), RunError> {
        let session = self.session_service.get(&self.key).await?;
        let mut history = session.events;
        let state = Arc::new(Mutex::new(State::new(session.state)));

        let user_event = Event::user_text(&*self.id, message);
        let user_event =
            self.session_service.append_event(&self.key, user_event).await?;
        history.push(user_event);

        for turn in 0..self.max_model_turns {
            if self.tx.is_closed() {
                debug!("event stream dropped, stopping");
                return Ok(());
            }

            let instruction = {
                let state =
                    state.lock().unwrap_or_else(PoisonError::into_inner);
                render_instruction(&self.agent.instruction, state.values())?
            };
            let request = self.build_request(instruction, &history);
            trace!("model turn {turn}");
            let resp = self.agent.model_client.send_request(request).await?;

            if resp.tool_calls.is_empty() {
                let event = self.final_response(resp.text)?;
                self.record(&mut history, event).await?;
                return Ok(());
            }

            let calls = resp.tool_calls;
            let text = Some(resp.text).filter(|text| !text.trim().is_empty());
            let event = self.new_event().with_content(EventContent::ToolCalls {
                text,
                calls: calls.clone(),
            });
            self.record(&mut history, event).await?;

            for call in calls {
                let ctx = ToolContext::new(
                    Arc::clone(&state),
                    Arc::clone(&self.id),
                    call.id.clone(),
                );
                let response =
                    self.agent.tool_executor.execute(&call, ctx).await;
                let delta = state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take_delta();
                let event = self
                    .new_event()
                    .with_content(EventContent::ToolResponse {
                        id: call.id,
                        name: call.name,
                        response,
                    })
                    .with_state_delta(delta);
                self.record(&mut history, event).await?;
            }
        }

        warn!(
            "no final response after {} model turns, escalating",
            self.max_model_turns
        );
        let mut event = self.new_event();
        event.actions.escalate = true;
        event.error_message = Some(format!(
            "no final response after {} model turns",
            self.max_model_turns
        ));
        self.record(&mut history, event).await
    }

    fn build_request(
        &self,
        instruction: String,
        history: &[Event],
    ) -> ModelRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !instruction.trim().is_empty() {
            messages.push(ModelMessage::System(instruction));
        }
        messages.extend(to_model_messages(history));

        let tools = if self.agent.tools_enabled() {
            self.agent.tool_executor.definitions()
        } else {
            vec![]
        };
        ModelRequest {
            messages,
            tools,
            output_schema: self.agent.output_schema.clone(),
        }
    }

    fn final_response(&self, text: String) -> Result<Event, RunError> {
        let mut delta = StateMap::new();
        if let Some(key) = &self.agent.output_key {
            let value = if self.agent.output_schema.is_some() {
                parse_structured_output(&text)?
            } else {
                Value::String(text.clone())
            };
            delta.insert(key.clone(), value);
        }
        Ok(self
            .new_event()
            .with_content(EventContent::Text { text })
            .with_state_delta(delta))
    }

    #[inline]
    fn new_event(&self) -> Event {
        Event::new(&*self.id, &*self.agent.name)
    }

    async fn record(
        &self,
        history: &mut Vec<Event>,
        event: Event,
    ) -> Result<(), RunError> {
        let event = self.session_service.append_event(&self.key, event).await?;
        history.push(event.clone());
        if self.tx.send(Ok(event)).await.is_err() {
            trace!("event stream dropped");
        }
        Ok(())
    }
}

/// Parses a structured answer, tolerating a Markdown code fence around it.
fn parse_structured_output(text: &str) -> Result<Value, RunError> {
    let mut body = text.trim();
    if let Some(fenced) = body.strip_prefix("```") {
        let fenced = fenced.strip_prefix("json").unwrap_or(fenced);
        body = fenced.strip_suffix("```").unwrap_or(fenced).trim();
    }
    serde_json::from_str(body).map_err(RunError::InvalidOutput)
}
