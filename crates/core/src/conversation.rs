//! Rebuilding model history from session events.

use primer_model::{AssistantMessage, ModelMessage, ToolCallResult};
use primer_session::{Event, EventContent};

/// Converts recorded events into the messages sent to the model, oldest
/// first.
///
/// Events without content (e.g. escalations) are skipped. Text authored
/// by anyone other than the user is treated as model output.
pub fn to_model_messages<'a, I>(events: I) -> Vec<ModelMessage>
where
    I: IntoIterator<Item = &'a Event>,
{
    events.into_iter().filter_map(to_model_message).collect()
}

fn to_model_message(event: &Event) -> Option<ModelMessage> {
    let msg = match event.content.as_ref()? {
        EventContent::Text { text } if event.is_from_user() => {
            ModelMessage::User(text.clone())
        }
        EventContent::Text { text } => ModelMessage::assistant_text(text),
        EventContent::ToolCalls { text, calls } => {
            ModelMessage::Assistant(AssistantMessage {
                content: text.clone(),
                tool_calls: calls.clone(),
            })
        }
        EventContent::ToolResponse { id, response, .. } => {
            ModelMessage::Tool(ToolCallResult {
                id: id.clone(),
                content: response.to_string(),
            })
        }
    };
    Some(msg)
}

#[cfg(test)]
mod tests {
    use primer_model::ToolCallRequest;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_to_model_messages() {
        let call = ToolCallRequest {
            id: "call_1".to_owned(),
            name: "set_quantity".to_owned(),
            arguments: json!({ "quantity": 2 }),
        };
        let mut escalation = Event::new("inv", "pizza_order_agent");
        escalation.actions.escalate = true;
        let events = [
            Event::user_text("inv", "Two please"),
            Event::new("inv", "pizza_order_agent").with_content(
                EventContent::ToolCalls {
                    text: None,
                    calls: vec![call.clone()],
                },
            ),
            Event::new("inv", "pizza_order_agent").with_content(
                EventContent::ToolResponse {
                    id: "call_1".to_owned(),
                    name: "set_quantity".to_owned(),
                    response: json!({ "quantity": 2 }),
                },
            ),
            escalation,
            Event::new("inv", "pizza_order_agent").with_content(
                EventContent::Text {
                    text: "Two it is.".to_owned(),
                },
            ),
        ];

        let messages = to_model_messages(&events);
        assert_eq!(
            messages,
            vec![
                ModelMessage::User("Two please".to_owned()),
                ModelMessage::Assistant(AssistantMessage {
                    content: None,
                    tool_calls: vec![call],
                }),
                ModelMessage::Tool(ToolCallResult {
                    id: "call_1".to_owned(),
                    content: r#"{"quantity":2}"#.to_owned(),
                }),
                ModelMessage::assistant_text("Two it is."),
            ]
        );
    }
}
