//! Message View Tests
//!
//! Covers the /messages routes through the full router: session guard,
//! form validation, ownership checks and HTML escaping.

mod common;

use axum::http::StatusCode;
use common::app;
use uuid::Uuid;
use warbler::app::messages::MessageService;
use warbler::http::ACCESS_UNAUTHORIZED;

// ===========================================================================
// Adding messages
// ===========================================================================

#[tokio::test]
async fn add_message() {
    let app = app().await;
    let user = app.create_user("mv_add").await;
    let mut client = app.client();
    client.login_as(user.id).await;

    let resp = client.post_form("/messages/new", &[("text", "Hello")]).await;

    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location.as_deref(), Some(format!("/users/{}", user.id).as_str()));

    let messages = MessageService::new(app.state.db.clone())
        .list_by_user(user.id, 10)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "Hello");
}

#[tokio::test]
async fn add_message_without_session() {
    let app = app().await;
    let mut client = app.client();

    let resp = client
        .post_form("/messages/new", &[("text", "mv_anon_unique")])
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location.as_deref(), Some("/"));

    let page = client.follow_redirects(resp).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.text().contains(ACCESS_UNAUTHORIZED));
    assert_eq!(app.message_count_with_text("mv_anon_unique").await, 0);
}

#[tokio::test]
async fn add_message_for_missing_user() {
    let app = app().await;
    let mut client = app.client();
    client.login_as(Uuid::new_v4()).await;

    let resp = client
        .post_form("/messages/new", &[("text", "mv_missing_user_unique")])
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location.as_deref(), Some("/"));

    let page = client.follow_redirects(resp).await;
    assert!(page.text().contains(ACCESS_UNAUTHORIZED));
    assert_eq!(app.message_count_with_text("mv_missing_user_unique").await, 0);
}

#[tokio::test]
async fn add_message_too_long_rerenders_form() {
    let app = app().await;
    let user = app.create_user("mv_add_long").await;
    let mut client = app.client();
    client.login_as(user.id).await;

    let text = "a".repeat(141);
    let resp = client.post_form("/messages/new", &[("text", text.as_str())]).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.text();
    assert!(body.contains("Field cannot be longer than 140 characters."));
    assert!(body.contains("Add my message!"));
    assert_eq!(app.message_count(user.id).await, 0);
}

#[tokio::test]
async fn add_message_empty_rerenders_form() {
    let app = app().await;
    let user = app.create_user("mv_add_empty").await;
    let mut client = app.client();
    client.login_as(user.id).await;

    let resp = client.post("/messages/new").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("This field is required."));
    assert_eq!(app.message_count(user.id).await, 0);
}

#[tokio::test]
async fn new_message_form_requires_session() {
    let app = app().await;

    let mut client = app.client();
    let resp = client.get("/messages/new").await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location.as_deref(), Some("/"));

    let user = app.create_user("mv_form").await;
    client.login_as(user.id).await;
    let resp = client.get("/messages/new").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("action=\"/messages/new\""));
}

// ===========================================================================
// Showing messages
// ===========================================================================

#[tokio::test]
async fn show_message() {
    let app = app().await;
    let user = app.create_user("mv_show").await;
    let message = app.create_message(user.id, "a test message").await;
    let mut client = app.client();
    client.login_as(user.id).await;

    let resp = client.get(&format!("/messages/{}", message.id)).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.text();
    assert!(body.contains("a test message"));
    assert!(body.contains(&format!("@{}", user.username)));
    // Owner sees the delete button
    assert!(body.contains(&format!("/messages/{}/delete", message.id)));
}

#[tokio::test]
async fn show_message_anonymous_has_no_delete_button() {
    let app = app().await;
    let user = app.create_user("mv_show_anon").await;
    let message = app.create_message(user.id, "public message").await;

    let resp = app.client().get(&format!("/messages/{}", message.id)).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.text();
    assert!(body.contains("public message"));
    assert!(!body.contains("/delete"));
}

#[tokio::test]
async fn show_missing_message() {
    let app = app().await;

    let resp = app
        .client()
        .get(&format!("/messages/{}", Uuid::new_v4()))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn message_text_is_escaped() {
    let app = app().await;
    let user = app.create_user("mv_escape").await;
    let message = app
        .create_message(user.id, "<script>alert(1)</script>")
        .await;

    let resp = app.client().get(&format!("/messages/{}", message.id)).await;

    let body = resp.text();
    assert!(!body.contains("<script>alert(1)</script>"));
    assert!(body.contains("&lt;script&gt;"));
}

// ===========================================================================
// Deleting messages
// ===========================================================================

#[tokio::test]
async fn delete_own_message() {
    let app = app().await;
    let user = app.create_user("mv_delete").await;
    let message = app.create_message(user.id, "delete me").await;
    let mut client = app.client();
    client.login_as(user.id).await;

    let resp = client.post(&format!("/messages/{}/delete", message.id)).await;

    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location.as_deref(), Some(format!("/users/{}", user.id).as_str()));
    assert_eq!(app.message_count(user.id).await, 0);
}

#[tokio::test]
async fn delete_message_without_session() {
    let app = app().await;
    let user = app.create_user("mv_delete_anon").await;
    let message = app.create_message(user.id, "keep me").await;
    let mut client = app.client();

    let resp = client.post(&format!("/messages/{}/delete", message.id)).await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location.as_deref(), Some("/"));

    let page = client.follow_redirects(resp).await;
    assert!(page.text().contains(ACCESS_UNAUTHORIZED));
    assert_eq!(app.message_count(user.id).await, 1);
}

#[tokio::test]
async fn delete_someone_elses_message() {
    let app = app().await;
    let owner = app.create_user("mv_delete_owner").await;
    let intruder = app.create_user("mv_delete_intruder").await;
    let message = app.create_message(owner.id, "not yours").await;
    let mut client = app.client();
    client.login_as(intruder.id).await;

    let resp = client.post(&format!("/messages/{}/delete", message.id)).await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location.as_deref(), Some("/"));

    let page = client.follow_redirects(resp).await;
    assert!(page.text().contains(ACCESS_UNAUTHORIZED));
    assert_eq!(app.message_count(owner.id).await, 1);
}

#[tokio::test]
async fn delete_missing_message() {
    let app = app().await;
    let user = app.create_user("mv_delete_missing").await;
    let mut client = app.client();
    client.login_as(user.id).await;

    let resp = client
        .post(&format!("/messages/{}/delete", Uuid::new_v4()))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_message_id_rejected() {
    let app = app().await;

    let resp = app.client().get("/messages/not-a-uuid").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}
