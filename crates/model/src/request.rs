use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    /// The input messages, oldest first.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
    /// If set, the model must answer with JSON matching this schema.
    pub output_schema: Option<OutputSchema>,
}

/// A complete message in the conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// A message produced by the model.
    Assistant(AssistantMessage),
    /// A tool call result.
    Tool(ToolCallResult),
}

impl ModelMessage {
    /// Creates a text-only assistant message.
    #[inline]
    pub fn assistant_text<S: Into<String>>(text: S) -> Self {
        ModelMessage::Assistant(AssistantMessage {
            content: Some(text.into()),
            tool_calls: vec![],
        })
    }
}

/// A message produced by the model, possibly requesting tool calls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Text content, if the model produced any.
    pub content: Option<String>,
    /// Tool calls the model requested in this message.
    pub tool_calls: Vec<ToolCallRequest>,
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The result of the tool call, usually serialized JSON.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// A JSON schema the final answer of the model must conform to.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputSchema {
    /// A short identifier of the schema, e.g. `structured_email`.
    pub name: String,
    /// The JSON schema.
    pub schema: Value,
}
