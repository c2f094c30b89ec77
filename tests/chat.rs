mod common;

use axum::http::{header, Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn personalities_are_public() {
    let app = TestApp::new().await;

    let res = app.call(Method::GET, "/chat/personalities", None, None).await;
    assert_eq!(res.status, StatusCode::OK);

    let body = res.json();
    let ids: Vec<&str> = body["personalities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["general", "coding", "support", "creative", "tutor"]);
    assert!(body["personalities"][0].get("system_prompt").is_none());
}

#[tokio::test]
async fn message_needs_a_token_and_text() {
    let app = TestApp::new().await;

    let res = app.call(Method::POST, "/chat/message", None, Some(json!({ "message": "hi" }))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let token = app.register("Ada", "ada@example.com", "secret1").await;
    let res = app.call(Method::POST, "/chat/message", Some(&token), Some(json!({ "message": "   " }))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "Please provide a message");
    assert!(app.completions.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn message_builds_prompt_and_replies() {
    let app = TestApp::new().await;
    let token = app.register("Ada", "ada@example.com", "secret1").await;

    let history: Vec<_> = (0..12)
        .map(|i| json!({ "sender": if i % 2 == 0 { "user" } else { "assistant" }, "text": format!("m{i}") }))
        .collect();

    let res = app
        .call(Method::POST, "/chat/message", Some(&token), Some(json!({
            "message": "What now?",
            "personality": "tutor",
            "conversationHistory": history,
        })))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text());

    let body = res.json();
    assert_eq!(body["message"], "echo: What now?");
    assert_eq!(body["personality"], json!({ "type": "tutor", "name": "Educational Tutor", "icon": "📚" }));

    let requests = app.completions.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.model, "llama3.1-70b");
    assert_eq!(request.messages.len(), 12);
    assert_eq!(request.messages[0].role, "system");
    assert_eq!(request.messages[1].content, "m2");
    assert_eq!(request.messages[11].content, "What now?");
}

#[tokio::test]
async fn stream_relays_deltas_then_done() {
    let app = TestApp::new().await;
    let token = app.register("Ada", "ada@example.com", "secret1").await;

    let res = app
        .call(Method::POST, "/chat/stream", Some(&token), Some(json!({ "message": "hello" })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[header::CONTENT_TYPE], "text/event-stream");

    let data: Vec<String> = res
        .text()
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(str::to_owned)
        .collect();
    assert_eq!(
        data,
        [
            r#"{"content":"Hel"}"#,
            r#"{"content":"lo"}"#,
            r#"{"content":"!"}"#,
            "[DONE]",
        ],
    );
}
