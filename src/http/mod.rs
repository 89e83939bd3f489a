use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
pub mod forms;
pub mod middleware;
mod routes;
pub mod views;

pub use auth::{AuthUser, CurrentSession, ACCESS_UNAUTHORIZED};
pub use error::AppError;
pub use middleware::session::SESSION_COOKIE;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::home())
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::messages())
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session::session_middleware,
        ))
        .with_state(state)
}
