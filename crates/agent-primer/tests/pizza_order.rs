use std::sync::Arc;

use agent_primer::driver::call_agent;
use agent_primer::pizza::{
    OrderState, OrderStatus, default_order_state, is_order_complete,
    pizza_order_agent,
};
use primer_core::Runner;
use primer_session::{
    CreateRequest, DatabaseSessionService, EventContent, SessionKey,
    SessionService,
};
use primer_test_model::{PresetResponse, TestModelProvider};
use serde_json::json;

const APP_NAME: &str = "Pizza Agent";
const USER_ID: &str = "Phineas";

async fn open_database(dir: &tempfile::TempDir) -> Arc<dyn SessionService> {
    let path = dir.path().join("pizza.db");
    let url = format!("sqlite://{}", path.display());
    let service = DatabaseSessionService::connect(&url).await.unwrap();
    service.migrate().await.unwrap();
    Arc::new(service)
}

async fn new_order(service: &dyn SessionService) -> SessionKey {
    service
        .create(CreateRequest {
            app_name: APP_NAME.to_owned(),
            user_id: USER_ID.to_owned(),
            session_id: None,
            state: default_order_state(),
        })
        .await
        .unwrap()
        .key
}

#[tokio::test]
async fn test_order_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::tool_call(
        "call_1",
        "set_pizza_type",
        json!({ "pizza_type": "Margherita" }),
    ));
    provider.add_assistant_turn(PresetResponse::tool_call(
        "call_2",
        "set_pizza_size",
        json!({ "size": "large" }),
    ));
    provider.add_assistant_turn(PresetResponse::tool_call(
        "call_3",
        "calculate_total_price",
        json!({}),
    ));
    provider.add_assistant_turn(PresetResponse::text(
        "A large Margherita comes to $18.24.",
    ));

    let key = {
        let service = open_database(&dir).await;
        let key = new_order(service.as_ref()).await;
        let runner = Runner::new(
            pizza_order_agent(provider.clone()),
            APP_NAME,
            Arc::clone(&service),
        );
        let reply = call_agent(
            &runner,
            USER_ID,
            &key.session_id,
            "One large margherita please",
        )
        .await
        .unwrap();
        assert_eq!(reply, "A large Margherita comes to $18.24.");
        key
    };

    let service = open_database(&dir).await;
    let session = service.get(&key).await.unwrap();
    let order = OrderState::from_values(&session.state);
    assert_eq!(order.pizza_type.as_deref(), Some("margherita"));
    assert_eq!(order.size.as_deref(), Some("large"));
    assert_eq!(order.status, OrderStatus::SizeSelected);
    assert_eq!(order.total_price, 18.24);
    assert_eq!(order.quantity, 1);
    assert!(!is_order_complete(&session.state));

    // user, 3 x (call + response), final answer
    assert_eq!(session.events.len(), 8);
    let responses: Vec<_> = session
        .events
        .iter()
        .filter_map(|event| match &event.content {
            Some(EventContent::ToolResponse { response, .. }) => {
                Some(response)
            }
            _ => None,
        })
        .collect();
    assert_eq!(responses[0]["action"], "set_pizza_type");
    assert_eq!(
        responses[2]["message"],
        "Order total: $18.24 (Subtotal: $16.89 + Tax: $1.35)"
    );
    assert_eq!(
        session.events[2].actions.state_delta["pizza_type"],
        json!("margherita")
    );

    // All nine tools were offered.
    let requests = provider.requests();
    assert_eq!(requests[0].tools.len(), 9);
}

#[tokio::test]
async fn test_invalid_request_reaches_model() {
    let dir = tempfile::tempdir().unwrap();
    let service = open_database(&dir).await;
    let key = new_order(service.as_ref()).await;

    let provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::tool_call(
        "call_1",
        "set_delivery_info",
        json!({ "address": "nowhere", "phone_number": "123" }),
    ));
    provider.add_assistant_turn(PresetResponse::text(
        "I need a longer address and a valid phone number.",
    ));
    let runner = Runner::new(
        pizza_order_agent(provider.clone()),
        APP_NAME,
        Arc::clone(&service),
    );
    call_agent(&runner, USER_ID, &key.session_id, "Deliver to nowhere")
        .await
        .unwrap();

    let session = service.get(&key).await.unwrap();
    assert_eq!(session.state["address"], json!(null));
    assert_eq!(session.state["status"], json!("START"));

    // The validation message is sent back as the tool result.
    let requests = provider.requests();
    let last = requests.last().unwrap();
    let tool_message = format!("{:?}", last.messages.last().unwrap());
    assert!(tool_message.contains("Validation failed"));
}

#[tokio::test]
async fn test_complete_order() {
    let dir = tempfile::tempdir().unwrap();
    let service = open_database(&dir).await;
    let key = new_order(service.as_ref()).await;

    let provider = TestModelProvider::default();
    for (id, name, args) in [
        ("call_1", "set_pizza_type", json!({ "pizza_type": "veggie" })),
        ("call_2", "set_pizza_size", json!({ "size": "small" })),
        ("call_3", "add_toppings", json!({ "toppings": ["olives"] })),
        ("call_4", "set_quantity", json!({ "quantity": 2 })),
        (
            "call_5",
            "set_delivery_info",
            json!({
                "address": "2308 Maple Drive, Danville",
                "phone_number": "555-010-1234",
            }),
        ),
        ("call_6", "calculate_total_price", json!({})),
    ] {
        provider.add_assistant_turn(PresetResponse::tool_call(id, name, args));
    }
    provider.add_assistant_turn(PresetResponse::text("All done!"));

    let runner = Runner::new(
        pizza_order_agent(provider),
        APP_NAME,
        Arc::clone(&service),
    );
    call_agent(&runner, USER_ID, &key.session_id, "The usual")
        .await
        .unwrap();

    let session = service.get(&key).await.unwrap();
    let order = OrderState::from_values(&session.state);
    assert!(order.is_complete());
    assert_eq!(order.status, OrderStatus::OrderComplete);
    assert_eq!(order.toppings, ["olives"]);
    assert_eq!(order.phone_number.as_deref(), Some("5550101234"));
    // (15.99 * 0.8 + 1.50) * 2 * 1.08
    assert_eq!(order.total_price, 30.87);
}
