use chrono::{DateTime, Utc};
use primer_model::ToolCallRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::StateMap;

/// The author of events created from user input.
pub const USER_AUTHOR: &str = "user";

/// One recorded step of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id of the event.
    pub id: String,
    /// Id of the invocation (one user turn) that produced the event.
    pub invocation_id: String,
    /// [`USER_AUTHOR`] or the name of the agent.
    pub author: String,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// What was said or done, if anything.
    pub content: Option<EventContent>,
    /// Side effects of the event.
    #[serde(default)]
    pub actions: EventActions,
    /// Set when the event reports a failure.
    #[serde(default)]
    pub error_message: Option<String>,
}

/// The payload of an [`Event`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventContent {
    /// Plain text from the user or the model.
    Text {
        /// The text.
        text: String,
    },
    /// The model asked for tools, optionally with some text.
    ToolCalls {
        /// Text the model produced alongside the calls.
        text: Option<String>,
        /// The requested calls.
        calls: Vec<ToolCallRequest>,
    },
    /// The result of one tool call.
    ToolResponse {
        /// Id of the call this responds to.
        id: String,
        /// Name of the tool.
        name: String,
        /// JSON returned by the tool.
        response: Value,
    },
}

/// Side effects attached to an event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventActions {
    /// State changes to apply when the event is stored.
    #[serde(default)]
    pub state_delta: StateMap,
    /// The agent gave up and hands control back to the caller.
    #[serde(default)]
    pub escalate: bool,
}

impl Event {
    /// Creates an empty event.
    pub fn new<S1, S2>(invocation_id: S1, author: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            id: Uuid::new_v4().to_string(),
            invocation_id: invocation_id.into(),
            author: author.into(),
            timestamp: Utc::now(),
            content: None,
            actions: EventActions::default(),
            error_message: None,
        }
    }

    /// Creates an event for user input.
    #[inline]
    pub fn user_text<S1, S2>(invocation_id: S1, text: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::new(invocation_id, USER_AUTHOR).with_content(EventContent::Text {
            text: text.into(),
        })
    }

    /// Sets the content.
    #[inline]
    pub fn with_content(mut self, content: EventContent) -> Self {
        self.content = Some(content);
        self
    }

    /// Sets the state delta.
    #[inline]
    pub fn with_state_delta(mut self, delta: StateMap) -> Self {
        self.actions.state_delta = delta;
        self
    }

    /// Returns `true` if the event was authored by the user.
    #[inline]
    pub fn is_from_user(&self) -> bool {
        self.author == USER_AUTHOR
    }

    /// Returns `true` if this event ends an invocation: agent output that
    /// neither requests tools nor carries a tool result.
    pub fn is_final_response(&self) -> bool {
        if self.is_from_user() {
            return false;
        }
        !matches!(
            self.content,
            Some(EventContent::ToolCalls { .. })
                | Some(EventContent::ToolResponse { .. })
        )
    }

    /// Returns the text carried by the event, if any.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(EventContent::Text { text }) => Some(text),
            Some(EventContent::ToolCalls {
                text: Some(text), ..
            }) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_final_response() {
        let user = Event::user_text("inv", "hello");
        assert!(!user.is_final_response());

        let calls = Event::new("inv", "pizza_order_agent").with_content(
            EventContent::ToolCalls {
                text: None,
                calls: vec![ToolCallRequest {
                    id: "c1".to_owned(),
                    name: "display_menu".to_owned(),
                    arguments: json!({}),
                }],
            },
        );
        assert!(!calls.is_final_response());

        let reply = Event::new("inv", "pizza_order_agent").with_content(
            EventContent::Text {
                text: "Here is the menu".to_owned(),
            },
        );
        assert!(reply.is_final_response());
        assert_eq!(reply.text(), Some("Here is the menu"));

        let mut escalation = Event::new("inv", "pizza_order_agent");
        escalation.actions.escalate = true;
        assert!(escalation.is_final_response());
        assert_eq!(escalation.text(), None);
    }

    #[test]
    fn test_serde_shape() {
        let event = Event::new("inv", "agent")
            .with_content(EventContent::ToolResponse {
                id: "c1".to_owned(),
                name: "set_quantity".to_owned(),
                response: json!({ "quantity": 2 }),
            })
            .with_state_delta(StateMap::from([(
                "quantity".to_owned(),
                json!(2),
            )]));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["content"]["type"], json!("tool_response"));
        assert_eq!(value["actions"]["state_delta"]["quantity"], json!(2));

        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
