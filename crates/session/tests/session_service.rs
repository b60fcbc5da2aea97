use std::time::Duration;

use primer_session::{
    CreateRequest, DatabaseSessionService, Event, EventContent,
    InMemorySessionService, ListRequest, SessionError, SessionKey,
    SessionService, StateMap,
};
use serde_json::json;

const APP: &str = "pizza_order_agent";
const USER: &str = "default_user";

fn create_request(session_id: Option<&str>, state: StateMap) -> CreateRequest {
    CreateRequest {
        app_name: APP.to_owned(),
        user_id: USER.to_owned(),
        session_id: session_id.map(str::to_owned),
        state,
    }
}

async fn open_database(dir: &tempfile::TempDir) -> DatabaseSessionService {
    let path = dir.path().join("sessions.db");
    let url = format!("sqlite://{}", path.display());
    let service = DatabaseSessionService::connect(&url).await.unwrap();
    service.migrate().await.unwrap();
    service
}

async fn check_create_and_get(service: &dyn SessionService) {
    let state = StateMap::from([
        ("status".to_owned(), json!("START")),
        ("user:name".to_owned(), json!("Phineas")),
        ("temp:scratch".to_owned(), json!(1)),
    ]);
    let created = service
        .create(create_request(Some("s1"), state))
        .await
        .unwrap();
    assert_eq!(created.id(), "s1");
    assert_eq!(created.state["status"], json!("START"));
    assert_eq!(created.state["user:name"], json!("Phineas"));
    assert!(!created.state.contains_key("temp:scratch"));

    let duplicate = service
        .create(create_request(Some("s1"), StateMap::new()))
        .await;
    assert!(matches!(duplicate, Err(SessionError::AlreadyExists(_))));

    let loaded = service.get(&created.key).await.unwrap();
    assert_eq!(loaded.state, created.state);
    assert!(loaded.events.is_empty());

    let missing = service.get(&SessionKey::new(APP, USER, "nope")).await;
    assert!(matches!(missing, Err(SessionError::NotFound(_))));
}

async fn check_append_event(service: &dyn SessionService) {
    let session = service
        .create(create_request(None, StateMap::new()))
        .await
        .unwrap();
    assert!(!session.id().is_empty());

    let user = Event::user_text("inv-1", "I'd like a pepperoni pizza");
    service.append_event(&session.key, user).await.unwrap();

    let reply = Event::new("inv-1", APP)
        .with_content(EventContent::Text {
            text: "Pepperoni it is.".to_owned(),
        })
        .with_state_delta(StateMap::from([
            ("pizza_type".to_owned(), json!("pepperoni")),
            ("status".to_owned(), json!("PIZZA_SELECTED")),
            ("temp:turns".to_owned(), json!(2)),
            ("user:last_pizza".to_owned(), json!("pepperoni")),
        ]));
    let stored = service.append_event(&session.key, reply).await.unwrap();
    assert!(!stored.actions.state_delta.contains_key("temp:turns"));

    let loaded = service.get(&session.key).await.unwrap();
    assert_eq!(loaded.events.len(), 2);
    assert_eq!(loaded.events[0].text(), Some("I'd like a pepperoni pizza"));
    assert_eq!(loaded.events[1], stored);
    assert_eq!(loaded.state["pizza_type"], json!("pepperoni"));
    assert_eq!(loaded.state["status"], json!("PIZZA_SELECTED"));
    assert!(!loaded.state.contains_key("temp:turns"));

    // User-scoped keys are visible from other sessions of the same user.
    let other = service
        .create(create_request(None, StateMap::new()))
        .await
        .unwrap();
    assert_eq!(other.state["user:last_pizza"], json!("pepperoni"));
    assert!(!other.state.contains_key("pizza_type"));

    let orphan = service
        .append_event(&SessionKey::new(APP, USER, "gone"), Event::new("x", APP))
        .await;
    assert!(matches!(orphan, Err(SessionError::NotFound(_))));
}

async fn check_list_and_delete(service: &dyn SessionService) {
    let first = service
        .create(create_request(Some("older"), StateMap::new()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = service
        .create(create_request(Some("newer"), StateMap::new()))
        .await
        .unwrap();

    let listed = service
        .list(ListRequest {
            app_name: APP.to_owned(),
            user_id: USER.to_owned(),
        })
        .await
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|s| s.id()).collect();
    assert_eq!(ids, ["newer", "older"]);

    // Appending bumps the session to the front.
    tokio::time::sleep(Duration::from_millis(5)).await;
    service
        .append_event(&first.key, Event::user_text("inv", "hello"))
        .await
        .unwrap();
    let listed = service
        .list(ListRequest {
            app_name: APP.to_owned(),
            user_id: USER.to_owned(),
        })
        .await
        .unwrap();
    assert_eq!(listed[0].id(), "older");
    assert!(listed[0].events.is_empty());

    service.delete(&second.key).await.unwrap();
    service.delete(&second.key).await.unwrap();
    assert!(matches!(
        service.get(&second.key).await,
        Err(SessionError::NotFound(_))
    ));

    let others = service
        .list(ListRequest {
            app_name: APP.to_owned(),
            user_id: "someone_else".to_owned(),
        })
        .await
        .unwrap();
    assert!(others.is_empty());
}

#[tokio::test]
async fn test_memory_create_and_get() {
    check_create_and_get(&InMemorySessionService::new()).await;
}

#[tokio::test]
async fn test_memory_append_event() {
    check_append_event(&InMemorySessionService::new()).await;
}

#[tokio::test]
async fn test_memory_list_and_delete() {
    check_list_and_delete(&InMemorySessionService::new()).await;
}

#[tokio::test]
async fn test_database_create_and_get() {
    let dir = tempfile::tempdir().unwrap();
    check_create_and_get(&open_database(&dir).await).await;
}

#[tokio::test]
async fn test_database_append_event() {
    let dir = tempfile::tempdir().unwrap();
    check_append_event(&open_database(&dir).await).await;
}

#[tokio::test]
async fn test_database_list_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    check_list_and_delete(&open_database(&dir).await).await;
}

#[tokio::test]
async fn test_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = {
        let service = open_database(&dir).await;
        let session = service
            .create(create_request(
                None,
                StateMap::from([("quantity".to_owned(), json!(1))]),
            ))
            .await
            .unwrap();
        let event = Event::new("inv", APP).with_state_delta(StateMap::from([(
            "quantity".to_owned(),
            json!(3),
        )]));
        service.append_event(&session.key, event).await.unwrap();
        session.key
    };

    let service = open_database(&dir).await;
    let session = service.get(&key).await.unwrap();
    assert_eq!(session.state["quantity"], json!(3));
    assert_eq!(session.events.len(), 1);
}
