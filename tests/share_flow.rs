mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn register_share_unshare_round_trip() {
    let app = TestApp::new().await;

    let res = app
        .call(Method::POST, "/auth/register", None, Some(json!({
            "name": "A",
            "email": "a@x.com",
            "password": "secret1",
        })))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let t1 = res.json()["token"].as_str().unwrap().to_owned();

    let res = app.call(Method::GET, "/auth/me", Some(&t1), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["user"]["name"], "A");

    let res = app.call(Method::POST, "/conversations", Some(&t1), Some(json!({}))).await;
    assert_eq!(res.status, StatusCode::CREATED);
    let conversation = res.json()["conversation"].clone();
    assert_eq!(conversation["isShared"], false);
    assert_eq!(conversation["shareToken"], json!(null));
    let c1 = conversation["id"].as_str().unwrap().to_owned();

    let res = app.call(Method::POST, &format!("/conversations/{c1}/share"), Some(&t1), None).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    let share_token = body["shareToken"].as_str().unwrap().to_owned();
    assert!(body["shareUrl"].as_str().unwrap().contains(&share_token));

    let res = app.call(Method::DELETE, &format!("/conversations/{c1}/share"), Some(&t1), None).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.call(Method::GET, &format!("/conversations/share/{share_token}"), None, None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["success"], false);
}

#[tokio::test]
async fn shared_view_is_public_and_minimal() {
    let app = TestApp::new().await;
    let token = app.register("Ada", "ada@example.com", "secret1").await;

    let res = app
        .call(Method::POST, "/conversations", Some(&token), Some(json!({ "title": "Lifetimes", "personality": "coding" })))
        .await;
    let id = res.json()["conversation"]["id"].as_str().unwrap().to_owned();
    assert_eq!(res.json()["conversation"]["personality"], "coding");

    for (text, sender) in [("What is 'a?", "user"), ("A lifetime.", "assistant")] {
        let res = app
            .call(Method::POST, &format!("/conversations/{id}/messages"), Some(&token), Some(json!({
                "text": text,
                "sender": sender,
            })))
            .await;
        assert_eq!(res.status, StatusCode::OK);
    }

    let share = app.call(Method::POST, &format!("/conversations/{id}/share"), Some(&token), None).await.json();
    let share_token = share["shareToken"].as_str().unwrap();
    assert_eq!(share["shareUrl"], format!("http://localhost:5173/share/{share_token}"));

    let res = app.call(Method::GET, &format!("/conversations/share/{share_token}"), None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    let view = res.json()["conversation"].clone();
    assert_eq!(view["title"], "Lifetimes");
    assert_eq!(view["sharedBy"], "Ada");
    assert_eq!(view["messages"].as_array().unwrap().len(), 2);
    assert_eq!(view["messages"][0]["sender"], "user");
    assert!(view.get("userId").is_none());
    assert!(view.get("shareToken").is_none());
    assert!(view.get("email").is_none());
}

#[tokio::test]
async fn repeated_share_keeps_the_token() {
    let app = TestApp::new().await;
    let token = app.register("Ada", "ada@example.com", "secret1").await;
    let id = app.call(Method::POST, "/conversations", Some(&token), None).await.json()["conversation"]["id"]
        .as_str()
        .unwrap()
        .to_owned();

    let first = app.call(Method::POST, &format!("/conversations/{id}/share"), Some(&token), None).await.json();
    let second = app.call(Method::POST, &format!("/conversations/{id}/share"), Some(&token), None).await.json();
    assert_eq!(first["shareToken"], second["shareToken"]);
    assert_eq!(first["shareUrl"], second["shareUrl"]);

    // unsharing twice is fine
    for _ in 0..2 {
        let res = app.call(Method::DELETE, &format!("/conversations/{id}/share"), Some(&token), None).await;
        assert_eq!(res.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn other_users_see_not_found() {
    let app = TestApp::new().await;
    let owner = app.register("Ada", "ada@example.com", "secret1").await;
    let stranger = app.register("Bob", "bob@example.com", "secret1").await;

    let id = app.call(Method::POST, "/conversations", Some(&owner), None).await.json()["conversation"]["id"]
        .as_str()
        .unwrap()
        .to_owned();

    for (method, path, body) in [
        (Method::GET, format!("/conversations/{id}"), None),
        (Method::PUT, format!("/conversations/{id}"), Some(json!({ "title": "mine now" }))),
        (Method::POST, format!("/conversations/{id}/messages"), Some(json!({ "text": "hi", "sender": "user" }))),
        (Method::POST, format!("/conversations/{id}/share"), None),
        (Method::DELETE, format!("/conversations/{id}/share"), None),
        (Method::POST, format!("/conversations/{id}/generate-title"), None),
        (Method::DELETE, format!("/conversations/{id}"), None),
    ] {
        let res = app.call(method.clone(), &path, Some(&stranger), body).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND, "{method} {path}");
        assert_eq!(res.json()["error"], "Conversation not found");
    }

    let res = app.call(Method::GET, "/conversations/not-a-uuid", Some(&owner), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.call(Method::GET, &format!("/conversations/{id}"), Some(&owner), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["conversation"]["title"], "New Conversation");
}

#[tokio::test]
async fn conversation_routes_need_a_token() {
    let app = TestApp::new().await;

    let res = app.call(Method::GET, "/conversations", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.call(Method::POST, "/conversations/whatever/share", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.call(Method::GET, "/conversations/share/0123456789abcdef0123456789abcdef", None, None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_groups_recent_conversations() {
    let app = TestApp::new().await;
    let token = app.register("Ada", "ada@example.com", "secret1").await;

    for title in ["first", "second"] {
        app.call(Method::POST, "/conversations", Some(&token), Some(json!({ "title": title }))).await;
    }
    let old = app.call(Method::POST, "/conversations", Some(&token), Some(json!({ "title": "old" }))).await.json();
    sqlx::query("UPDATE conversations SET updated_at = '2020-01-01T00:00:00Z' WHERE id = ?")
        .bind(old["conversation"]["id"].as_str().unwrap())
        .execute(&app.db_pool)
        .await
        .unwrap();

    let res = app.call(Method::GET, "/conversations", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::OK);
    let grouped = res.json()["conversations"].clone();

    let today: Vec<&str> = grouped["today"].as_array().unwrap().iter().map(|c| c["title"].as_str().unwrap()).collect();
    assert_eq!(today, ["second", "first"]);
    assert_eq!(grouped["older"][0]["title"], "old");
    assert!(grouped["today"][0].get("messages").is_none());
}

#[tokio::test]
async fn rename_generate_title_and_delete() {
    let app = TestApp::new().await;
    let token = app.register("Ada", "ada@example.com", "secret1").await;
    let id = app.call(Method::POST, "/conversations", Some(&token), None).await.json()["conversation"]["id"]
        .as_str()
        .unwrap()
        .to_owned();

    let res = app.call(Method::PUT, &format!("/conversations/{id}"), Some(&token), Some(json!({ "title": "  " }))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .call(Method::PUT, &format!("/conversations/{id}"), Some(&token), Some(json!({ "title": "Renamed" })))
        .await;
    assert_eq!(res.json()["conversation"]["title"], "Renamed");

    // no user message yet, title stays
    let res = app.call(Method::POST, &format!("/conversations/{id}/generate-title"), Some(&token), None).await;
    assert_eq!(res.json()["conversation"]["title"], "Renamed");

    let text = "Explain how the borrow checker decides when a reference is still alive";
    app.call(Method::POST, &format!("/conversations/{id}/messages"), Some(&token), Some(json!({
        "text": text,
        "sender": "user",
    })))
    .await;

    let res = app.call(Method::POST, &format!("/conversations/{id}/generate-title"), Some(&token), None).await;
    assert_eq!(res.json()["conversation"]["title"], format!("{}...", &text[..40]));

    let res = app
        .call(Method::POST, &format!("/conversations/{id}/messages"), Some(&token), Some(json!({
            "text": "hi",
            "sender": "robot",
        })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.call(Method::DELETE, &format!("/conversations/{id}"), Some(&token), None).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = app.call(Method::GET, &format!("/conversations/{id}"), Some(&token), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_the_owner_revokes_shares() {
    let app = TestApp::new().await;
    let token = app.register("Ada", "ada@example.com", "secret1").await;
    let id = app.call(Method::POST, "/conversations", Some(&token), None).await.json()["conversation"]["id"]
        .as_str()
        .unwrap()
        .to_owned();
    let share = app.call(Method::POST, &format!("/conversations/{id}/share"), Some(&token), None).await.json();
    let share_token = share["shareToken"].as_str().unwrap().to_owned();

    app.call(Method::DELETE, "/auth/account", Some(&token), None).await;

    let res = app.call(Method::GET, &format!("/conversations/share/{share_token}"), None, None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
