use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use primer_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    ToolCallRequest,
};
use serde_json::Value;

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, ToolCallDelta};

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn patch(&mut self, delta: ToolCallDelta) {
        if let Some(id) = delta.id {
            self.id.push_str(&id);
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                self.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                self.arguments.push_str(&arguments);
            }
        }
    }

    fn finish(self) -> ToolCallRequest {
        let arguments = if self.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            // Keep malformed arguments as a string, so the tool reports an
            // input error back to the model instead of silently dropping it.
            serde_json::from_str(&self.arguments)
                .unwrap_or(Value::String(self.arguments))
        };
        ToolCallRequest {
            id: self.id,
            name: self.name,
            arguments,
        }
    }
}

/// Decodes chat completion chunks into model events.
///
/// Text deltas are emitted as soon as they arrive. Tool call fragments are
/// accumulated by index and emitted as complete requests once the stream
/// reports a finish reason (or ends), followed by the completion event.
struct Decoder {
    sse: Sse,
    tool_calls: BTreeMap<u32, PartialToolCall>,
    queue: VecDeque<ModelResponseEvent>,
    finished: bool,
}

impl Decoder {
    async fn next(mut self) -> (Result<Option<ModelResponseEvent>, Error>, Self) {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return (Ok(Some(event)), self);
            }
            if self.finished {
                return (Ok(None), self);
            }

            let data = match self.sse.next_event().await {
                Ok(Some(data)) => data,
                Ok(None) => {
                    // Some servers close the stream without a finish reason.
                    self.finish(ModelFinishReason::Stop);
                    continue;
                }
                Err(err) => {
                    let err = Error::new(format!("{err:?}"), ErrorKind::Other);
                    return (Err(err), self);
                }
            };
            trace!("got sse event: {data}");
            if data == "[DONE]" {
                self.finish(ModelFinishReason::Stop);
                continue;
            }

            match serde_json::from_str::<ChatCompletionChunk>(&data) {
                Ok(chunk) => self.apply(chunk),
                Err(err) => {
                    let err = Error::new(
                        format!("malformed chunk: {err}"),
                        ErrorKind::Other,
                    );
                    return (Err(err), self);
                }
            }
        }
    }

    fn apply(&mut self, chunk: ChatCompletionChunk) {
        // Usage-only chunks have no choices.
        let Some(choice) = chunk.choices.into_iter().next() else {
            return;
        };

        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            self.queue.push_back(ModelResponseEvent::MessageDelta(content));
        }
        for delta in choice.delta.tool_calls.unwrap_or_default() {
            let index = delta.index.unwrap_or_else(|| {
                // Without an index every fragment is a complete call.
                self.tool_calls
                    .last_key_value()
                    .map_or(0, |(idx, _)| idx + 1)
            });
            self.tool_calls.entry(index).or_default().patch(delta);
        }

        if let Some(reason) = choice.finish_reason {
            let reason = match reason.as_str() {
                "tool_calls" | "function_call" => ModelFinishReason::ToolCalls,
                "length" => ModelFinishReason::Length,
                _ => ModelFinishReason::Stop,
            };
            self.finish(reason);
        }
    }

    fn finish(&mut self, reason: ModelFinishReason) {
        if self.finished {
            return;
        }
        self.finished = true;

        let tool_calls = std::mem::take(&mut self.tool_calls);
        let has_tool_calls = !tool_calls.is_empty();
        for (_, call) in tool_calls {
            self.queue
                .push_back(ModelResponseEvent::ToolCall(call.finish()));
        }
        // Gemini reports `stop` even when it asked for tools.
        let reason = if has_tool_calls {
            ModelFinishReason::ToolCalls
        } else {
            reason
        };
        self.queue.push_back(ModelResponseEvent::Completed(reason));
    }
}

type NextEvent = (Result<Option<ModelResponseEvent>, Error>, Decoder);

/// A streaming response from an OpenAI-compatible endpoint.
pub struct OpenAIResponse {
    next_fut: Option<Pin<Box<dyn Future<Output = NextEvent> + Send>>>,
}

impl OpenAIResponse {
    pub(crate) fn from_sse(sse: Sse) -> Self {
        let decoder = Decoder {
            sse,
            tool_calls: BTreeMap::new(),
            queue: VecDeque::new(),
            finished: false,
        };
        Self {
            next_fut: Some(Box::pin(decoder.next())),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let Some(next_fut) = this.next_fut.as_mut() else {
            return Poll::Ready(Ok(None));
        };
        let (result, decoder) = ready!(next_fut.as_mut().poll(cx));
        this.next_fut = match result {
            Ok(Some(_)) => Some(Box::pin(decoder.next())),
            Ok(None) | Err(_) => None,
        };
        Poll::Ready(result)
    }
}
