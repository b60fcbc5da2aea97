//! A local scripted model for testing purpose.

mod preset;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use primer_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<ModelResponseEvent>,
    delay: Option<Duration>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if let Some(delay) = this.delay {
            let pending = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
            ready!(pending.as_mut().poll(cx));
            this.sleep = None;
        }
        Poll::Ready(Ok(this.events.pop_front()))
    }
}

#[derive(Default)]
struct Script {
    turns: Vec<PresetResponse>,
    attempts: HashMap<usize, u64>,
    requests: Vec<ModelRequest>,
    delay: Option<Duration>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, set up the script: one [`PresetResponse`] per
/// model turn. The turn is selected by counting the assistant messages in
/// the request history, so the first request of a conversation gets the
/// first turn, the request after a tool call gets the second one, and so
/// on. If the script runs out, an error is returned.
///
/// Clones share the same script, which lets a test keep a handle for
/// inspecting [`TestModelProvider::requests`] after moving the provider
/// into an agent.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_turn(&self, preset: PresetResponse) {
        self.lock().turns.push(preset);
    }

    #[inline]
    pub fn set_delay(&self, duration: Duration) {
        self.lock().delay = Some(duration);
    }

    /// Returns every request received so far, including failed attempts.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, req: &ModelRequest) -> Result<TestModelResponse, Error> {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let turn_idx = req
            .messages
            .iter()
            .filter(|msg| matches!(msg, ModelMessage::Assistant(_)))
            .count();
        let Some(preset) = script.turns.get(turn_idx).cloned() else {
            return Err(Error {
                message: "no enough turns in the script",
                kind: ErrorKind::Other,
            });
        };

        let attempt = script.attempts.entry(turn_idx).or_default();
        *attempt += 1;
        let should_fail = match preset.failures {
            Some(0) => true,
            Some(failures) => *attempt <= failures,
            None => false,
        };
        if should_fail {
            return Err(Error {
                message: "scripted failure",
                kind: ErrorKind::RateLimitExceeded,
            });
        }

        let reason = if preset.has_tool_call() {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        };
        let mut events: VecDeque<_> = preset
            .events
            .into_iter()
            .map(|event| match event {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg)
                }
                PresetEvent::ToolCall(req) => ModelResponseEvent::ToolCall(req),
            })
            .collect();
        events.push_back(ModelResponseEvent::Completed(reason));

        Ok(TestModelResponse {
            events,
            delay: script.delay,
            sleep: None,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.respond(req))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use primer_model::{AssistantMessage, ToolCallRequest};
    use serde_json::json;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ToolCallRequest>, ModelFinishReason) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_call = None;
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(reason) => {
                    return (msg, tool_call, reason);
                }
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_call = Some(req),
            }
        }
    }

    #[tokio::test]
    async fn test_turns_follow_history() {
        let provider = TestModelProvider::default();
        provider.add_assistant_turn(PresetResponse::tool_call(
            "call_1",
            "set_pizza_type",
            json!({ "pizza_type": "veggie" }),
        ));
        provider.add_assistant_turn(PresetResponse::with_events([
            PresetEvent::MessageDelta("Veggie ".to_owned()),
            PresetEvent::MessageDelta("it is!".to_owned()),
        ]));

        let mut req = ModelRequest {
            messages: vec![ModelMessage::User("A veggie please".to_owned())],
            ..Default::default()
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call, reason) = collect_response(resp).await;
        assert!(msg.is_empty());
        assert_eq!(reason, ModelFinishReason::ToolCalls);
        let tool_call = tool_call.unwrap();
        assert_eq!(tool_call.name, "set_pizza_type");

        req.messages.push(ModelMessage::Assistant(AssistantMessage {
            content: None,
            tool_calls: vec![tool_call],
        }));
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call, reason) = collect_response(resp).await;
        assert_eq!(msg, "Veggie it is!");
        assert!(tool_call.is_none());
        assert_eq!(reason, ModelFinishReason::Stop);

        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let provider = TestModelProvider::default();
        provider.add_assistant_turn(PresetResponse::text("ok").with_failures(2));
        let req = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            ..Default::default()
        };

        for _ in 0..2 {
            let err = provider.send_request(&req).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        assert!(provider.send_request(&req).await.is_ok());
    }

    #[tokio::test]
    async fn test_exhausted_script() {
        let provider = TestModelProvider::default();
        let req = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            ..Default::default()
        };
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
