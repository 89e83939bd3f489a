use axum::{routing::get, routing::post, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn home() -> Router<AppState> {
    Router::new().route("/", get(handlers::home))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/signup", get(handlers::signup_form).post(handlers::signup))
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/logout", get(handlers::logout))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::list_users))
        .route("/users/:id", get(handlers::show_user))
        .route("/users/:id/following", get(handlers::show_following))
        .route("/users/:id/followers", get(handlers::show_followers))
        .route("/users/:id/likes", get(handlers::show_likes))
        .route("/users/follow/:id", post(handlers::follow_user))
        .route("/users/stop-following/:id", post(handlers::stop_following))
        .route("/users/add_like/:id", post(handlers::toggle_like))
        // Account management (the logged-in user's own account)
        .route(
            "/users/profile",
            get(handlers::edit_profile_form).post(handlers::edit_profile),
        )
        .route("/users/delete", post(handlers::delete_account))
}

pub fn messages() -> Router<AppState> {
    Router::new()
        .route(
            "/messages/new",
            get(handlers::new_message_form).post(handlers::create_message),
        )
        .route("/messages/:id", get(handlers::show_message))
        .route("/messages/:id/delete", post(handlers::delete_message))
}
