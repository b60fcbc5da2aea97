//! Helpers for driving a runner from a simple request/response loop.

use futures_util::StreamExt;
use primer_core::{RunError, Runner};
use primer_session::Event;

/// Returned when an invocation ends without a final response.
pub const NO_RESPONSE: &str = "Agent failed to process your request.";

/// Sends `message` and waits for the invocation to finish, returning the
/// last final response.
///
/// An escalation is reported as text. Errors end the invocation and are
/// returned as is.
pub async fn call_agent(
    runner: &Runner,
    user_id: &str,
    session_id: &str,
    message: &str,
) -> Result<String, RunError> {
    let mut events = runner.run(user_id, session_id, message);
    let mut response = None;
    while let Some(event) = events.next().await {
        let event = event?;
        trace!("event from `{}`: {:?}", event.author, event.content);
        if let Some(text) = final_response_text(&event) {
            response = Some(text);
        }
    }
    Ok(response.unwrap_or_else(|| NO_RESPONSE.to_owned()))
}

/// Extracts what to show the user from a final response event.
pub fn final_response_text(event: &Event) -> Option<String> {
    if !event.is_final_response() {
        return None;
    }
    let text = event.text().map(str::trim).filter(|text| !text.is_empty());
    if let Some(text) = text {
        return Some(text.to_owned());
    }
    if event.actions.escalate {
        let reason = event
            .error_message
            .as_deref()
            .unwrap_or("No specific message.");
        return Some(format!("Agent escalated: {reason}"));
    }
    None
}

#[cfg(test)]
mod tests {
    use primer_session::EventContent;

    use super::*;

    #[test]
    fn test_final_response_text() {
        let event = Event::new("e-1", "agent").with_content(EventContent::Text {
            text: "  Hello!\n".to_owned(),
        });
        assert_eq!(final_response_text(&event).as_deref(), Some("Hello!"));

        let event = Event::user_text("e-1", "hi");
        assert_eq!(final_response_text(&event), None);

        let mut event = Event::new("e-1", "agent");
        event.actions.escalate = true;
        assert_eq!(
            final_response_text(&event).as_deref(),
            Some("Agent escalated: No specific message.")
        );
        event.error_message = Some("too many turns".to_owned());
        assert_eq!(
            final_response_text(&event).as_deref(),
            Some("Agent escalated: too many turns")
        );

        let event = Event::new("e-1", "agent").with_content(
            EventContent::ToolResponse {
                id: "call_1".to_owned(),
                name: "display_menu".to_owned(),
                response: serde_json::json!({}),
            },
        );
        assert_eq!(final_response_text(&event), None);
    }
}
