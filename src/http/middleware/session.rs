use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

use crate::app::sessions::SessionStore;
use crate::AppState;

pub const SESSION_COOKIE: &str = "warbler_session";

const MAX_TOKEN_LEN: usize = 128;

/// Session token attached to every request by [`session_middleware`].
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Ensures every request carries a session token. Requests without a usable
/// cookie get a fresh token, returned to the client unless the handler already
/// set its own session cookie.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| get_cookie(cookies, SESSION_COOKIE))
        .filter(|token| !token.is_empty() && token.len() <= MAX_TOKEN_LEN);

    let (token, is_new) = match existing {
        Some(token) => (token, false),
        None => (SessionStore::new_token(), true),
    };

    request.extensions_mut().insert(SessionToken(token.clone()));
    let mut response = next.run(request).await;

    if is_new && !response.headers().contains_key(header::SET_COOKIE) {
        let cookie = session_cookie(
            &token,
            state.session_ttl_seconds,
            state.session_cookie_secure,
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => tracing::error!(error = %err, "invalid session cookie"),
        }
    }

    response
}

pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let secure_attr = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly{}; Path=/; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE, token, secure_attr, max_age_secs
    )
}

fn get_cookie(cookie_header: &str, name: &str) -> Option<String> {
    for part in cookie_header.split(';') {
        let kv = part.trim();
        if let Some((k, v)) = kv.split_once('=') {
            if k.trim() == name {
                return Some(v.trim().to_string());
            }
        }
    }
    None
}
