use std::future::ready;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use primer_model::{ErrorKind, ModelMessage};
use primer_session::{
    CreateRequest, Event, EventContent, InMemorySessionService, SessionKey,
    SessionService, StateMap,
};
use primer_test_model::{PresetResponse, TestModelProvider};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::tool::{Tool, ToolContext, ToolResult, parameter_schema};
use crate::{AgentBuilder, EventStream, RetryPolicy, RunError, Runner};

const APP: &str = "test_app";
const USER: &str = "user_1";
const SESSION: &str = "session_1";

#[derive(Deserialize, JsonSchema)]
struct SetPizzaInput {
    pizza_type: String,
}

struct SetPizzaTool {
    parameter_schema: Value,
}

impl SetPizzaTool {
    fn new() -> Self {
        Self {
            parameter_schema: parameter_schema::<SetPizzaInput>(),
        }
    }
}

impl Tool for SetPizzaTool {
    type Input = SetPizzaInput;

    fn name(&self) -> &str {
        "set_pizza_type"
    }

    fn description(&self) -> &str {
        "Sets the pizza type."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: Self::Input,
        ctx: ToolContext,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ctx.state().set("pizza_type", input.pizza_type.clone());
        ready(Ok(json!({
            "action": "set_pizza_type",
            "pizza_type": input.pizza_type,
        })))
    }
}

#[derive(Deserialize, JsonSchema)]
#[allow(dead_code)]
struct EmailContent {
    subject: String,
    body: String,
}

async fn session_service(state: StateMap) -> Arc<dyn SessionService> {
    let service = Arc::new(InMemorySessionService::new());
    service
        .create(CreateRequest {
            app_name: APP.to_owned(),
            user_id: USER.to_owned(),
            session_id: Some(SESSION.to_owned()),
            state,
        })
        .await
        .unwrap();
    service
}

async fn collect(mut stream: EventStream) -> Vec<Result<Event, RunError>> {
    let mut items = vec![];
    while let Some(item) = stream.next().await {
        items.push(item);
    }
    items
}

fn key() -> SessionKey {
    SessionKey::new(APP, USER, SESSION)
}

#[tokio::test]
async fn test_text_reply() {
    let provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::text("Hello, Ada!"));
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .name("greeting_agent")
        .instruction("You are talking to {user_name}.")
        .build();
    let sessions = session_service(StateMap::from([(
        "user_name".to_owned(),
        json!("Ada"),
    )]))
    .await;
    let runner = Runner::new(agent, APP, Arc::clone(&sessions));

    let events = collect(runner.run(USER, SESSION, "Hi")).await;
    assert_eq!(events.len(), 1);
    let event = events[0].as_ref().unwrap();
    assert!(event.is_final_response());
    assert_eq!(event.author, "greeting_agent");
    assert_eq!(event.text(), Some("Hello, Ada!"));

    let requests = provider.requests();
    assert_eq!(
        requests[0].messages,
        vec![
            ModelMessage::System("You are talking to Ada.".to_owned()),
            ModelMessage::User("Hi".to_owned()),
        ]
    );

    let session = sessions.get(&key()).await.unwrap();
    assert_eq!(session.events.len(), 2);
    assert!(session.events[0].is_from_user());
    assert_eq!(session.events[0].invocation_id, event.invocation_id);
}

#[tokio::test]
async fn test_tool_loop() {
    let provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::tool_call(
        "call_1",
        "set_pizza_type",
        json!({ "pizza_type": "veggie" }),
    ));
    provider.add_assistant_turn(PresetResponse::text("Veggie it is."));
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .name("pizza_order_agent")
        .with_tool(SetPizzaTool::new())
        .build();
    let sessions = session_service(StateMap::new()).await;
    let runner = Runner::new(agent, APP, Arc::clone(&sessions));

    let events: Vec<_> = collect(runner.run(USER, SESSION, "A veggie please"))
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        events[0].content,
        Some(EventContent::ToolCalls { .. })
    ));
    let Some(EventContent::ToolResponse { id, name, response }) =
        &events[1].content
    else {
        panic!("expected a tool response, got {:?}", events[1]);
    };
    assert_eq!(id, "call_1");
    assert_eq!(name, "set_pizza_type");
    assert_eq!(response["pizza_type"], json!("veggie"));
    assert_eq!(events[1].actions.state_delta["pizza_type"], json!("veggie"));
    assert!(!events[1].is_final_response());
    assert!(events[2].is_final_response());

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "set_pizza_type");
    assert!(matches!(
        requests[1].messages.last(),
        Some(ModelMessage::Tool(result)) if result.id == "call_1"
    ));

    let session = sessions.get(&key()).await.unwrap();
    assert_eq!(session.state["pizza_type"], json!("veggie"));
    assert_eq!(session.events.len(), 4);
}

#[tokio::test]
async fn test_history_carries_over() {
    let provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::text("Nice to meet you."));
    provider.add_assistant_turn(PresetResponse::text("You are Ada."));
    let agent = AgentBuilder::with_model_provider(provider.clone()).build();
    let sessions = session_service(StateMap::new()).await;
    let runner = Runner::new(agent, APP, sessions);

    collect(runner.run(USER, SESSION, "I'm Ada")).await;
    let events = collect(runner.run(USER, SESSION, "Who am I?")).await;
    assert_eq!(events[0].as_ref().unwrap().text(), Some("You are Ada."));

    let requests = provider.requests();
    assert_eq!(
        requests[1].messages,
        vec![
            ModelMessage::User("I'm Ada".to_owned()),
            ModelMessage::assistant_text("Nice to meet you."),
            ModelMessage::User("Who am I?".to_owned()),
        ]
    );
}

#[tokio::test]
async fn test_structured_output() {
    let provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::text(
        "```json\n{\"subject\": \"Hi\", \"body\": \"Hello there\"}\n```",
    ));
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .name("email_agent")
        .with_tool(SetPizzaTool::new())
        .output_schema::<EmailContent>("email_content")
        .output_key("email")
        .build();
    let sessions = session_service(StateMap::new()).await;
    let runner = Runner::new(agent, APP, Arc::clone(&sessions));

    let events = collect(runner.run(USER, SESSION, "Write a hello")).await;
    assert!(events[0].is_ok());

    let requests = provider.requests();
    let request = &requests[0];
    assert!(request.tools.is_empty());
    let schema = request.output_schema.as_ref().unwrap();
    assert_eq!(schema.name, "email_content");
    let required = schema.schema["required"].as_array().unwrap();
    assert!(required.contains(&json!("subject")));
    assert!(required.contains(&json!("body")));

    let session = sessions.get(&key()).await.unwrap();
    assert_eq!(
        session.state["email"],
        json!({ "subject": "Hi", "body": "Hello there" })
    );
}

#[tokio::test]
async fn test_invalid_structured_output() {
    let provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::text("Sure! Here's an email"));
    let agent = AgentBuilder::with_model_provider(provider)
        .output_schema::<EmailContent>("email_content")
        .output_key("email")
        .build();
    let service = session_service(StateMap::new()).await;
    let runner = Runner::new(agent, APP, service);

    let events = collect(runner.run(USER, SESSION, "Write a hello")).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Err(RunError::InvalidOutput(_))));
}

#[tokio::test]
async fn test_text_output_key() {
    let provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::text("plain answer"));
    let agent = AgentBuilder::with_model_provider(provider)
        .output_key("last_answer")
        .build();
    let sessions = session_service(StateMap::new()).await;
    let runner = Runner::new(agent, APP, Arc::clone(&sessions));

    collect(runner.run(USER, SESSION, "Hi")).await;
    let session = sessions.get(&key()).await.unwrap();
    assert_eq!(session.state["last_answer"], json!("plain answer"));
}

#[tokio::test]
async fn test_errors() {
    // Missing state variable.
    let provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::text("unused"));
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .instruction("Preferences: {user_preferences}")
        .build();
    let service = session_service(StateMap::new()).await;
    let runner = Runner::new(agent, APP, service);
    let events = collect(runner.run(USER, SESSION, "Hi")).await;
    assert!(matches!(
        &events[0],
        Err(RunError::MissingStateVariable(name)) if name == "user_preferences"
    ));
    assert!(provider.requests().is_empty());

    // Missing session.
    let events = collect(runner.run(USER, "no_such_session", "Hi")).await;
    assert!(matches!(events[0], Err(RunError::Session(_))));

    // Model failure.
    let agent = AgentBuilder::with_model_provider(TestModelProvider::default())
        .build();
    let service = session_service(StateMap::new()).await;
    let runner = Runner::new(agent, APP, service);
    let events = collect(runner.run(USER, SESSION, "Hi")).await;
    assert!(matches!(
        events[0],
        Err(RunError::Model {
            kind: ErrorKind::Other,
            ..
        })
    ));
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_model() {
    let provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::tool_call(
        "call_1",
        "order_drinks",
        json!({}),
    ));
    provider.add_assistant_turn(PresetResponse::text("Sorry, no drinks."));
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(SetPizzaTool::new())
        .build();
    let service = session_service(StateMap::new()).await;
    let runner = Runner::new(agent, APP, service);

    let events = collect(runner.run(USER, SESSION, "And a cola")).await;
    assert_eq!(events.len(), 3);
    let Ok(Event {
        content: Some(EventContent::ToolResponse { response, .. }),
        ..
    }) = &events[1]
    else {
        panic!("expected a tool response");
    };
    assert!(response["error"].as_str().unwrap().contains("order_drinks"));
    assert_eq!(
        events[2].as_ref().unwrap().text(),
        Some("Sorry, no drinks.")
    );
}

#[tokio::test]
async fn test_escalates_after_max_turns() {
    let provider = TestModelProvider::default();
    for idx in 0..3 {
        provider.add_assistant_turn(PresetResponse::tool_call(
            format!("call_{idx}"),
            "set_pizza_type",
            json!({ "pizza_type": "hawaiian" }),
        ));
    }
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(SetPizzaTool::new())
        .build();
    let runner = Runner::new(agent, APP, session_service(StateMap::new()).await)
        .with_max_model_turns(2);

    let events: Vec<_> = collect(runner.run(USER, SESSION, "Loop forever"))
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(provider.requests().len(), 2);
    let last = events.last().unwrap();
    assert!(last.actions.escalate);
    assert!(last.is_final_response());
    assert!(last.error_message.is_some());
}

#[tokio::test]
async fn test_retries_rate_limits() {
    let provider = TestModelProvider::default();
    provider
        .add_assistant_turn(PresetResponse::text("made it").with_failures(1));
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .retry_policy(RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed_time: Duration::from_secs(5),
        })
        .build();
    let service = session_service(StateMap::new()).await;
    let runner = Runner::new(agent, APP, service);

    let events = collect(runner.run(USER, SESSION, "Hi")).await;
    assert_eq!(events[0].as_ref().unwrap().text(), Some("made it"));
    assert_eq!(provider.requests().len(), 2);
}
