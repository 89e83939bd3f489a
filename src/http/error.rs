use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::http::views;

/// Failure at the HTTP edge: either a rendered error page or a redirect.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    location: Option<String>,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::page(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::page(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::page(StatusCode::FORBIDDEN, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::page(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 302 to `location`. Any flash explaining the redirect is queued by the caller.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            message: String::new(),
            location: Some(location.into()),
        }
    }

    fn page(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            location: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.location {
            Some(location) => views::found(&location),
            None => (
                self.status,
                Html(views::error_page(self.status, &self.message)),
            )
                .into_response(),
        }
    }
}
