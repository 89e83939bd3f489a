use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app::sessions::Flash;
use crate::app::users::UserService;
use crate::domain::user::User;
use crate::http::middleware::session::SessionToken;
use crate::http::AppError;
use crate::AppState;

pub const ACCESS_UNAUTHORIZED: &str = "Access unauthorized.";

/// The request's session and, when `curr_user` points at an existing user,
/// that user.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub token: String,
    pub user: Option<User>,
}

/// A logged-in user. Anonymous requests are rejected before the handler runs:
/// the session gets an "Access unauthorized." flash and the client a 302 to `/`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .extensions
            .get::<SessionToken>()
            .map(|token| token.0.clone())
            .ok_or_else(|| AppError::internal("session unavailable"))?;

        let user_id = state
            .sessions()
            .current_user_id(&token)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to read session");
                AppError::internal("failed to read session")
            })?;

        let user = match user_id {
            Some(user_id) => UserService::new(state.db.clone())
                .get_user(user_id)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, user_id = %user_id, "failed to load session user");
                    AppError::internal("failed to load session user")
                })?,
            None => None,
        };

        Ok(CurrentSession { token, user })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = CurrentSession::from_request_parts(parts, state).await?;

        match session.user {
            Some(user) => Ok(AuthUser {
                user,
                token: session.token,
            }),
            None => {
                deny_access(state, &session.token).await?;
                Err(AppError::redirect("/"))
            }
        }
    }
}

/// Queues the "Access unauthorized." flash for the session.
pub async fn deny_access(state: &AppState, token: &str) -> Result<(), AppError> {
    state
        .sessions()
        .push_flash(token, Flash::new("danger", ACCESS_UNAUTHORIZED))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to queue flash");
            AppError::internal("failed to queue flash")
        })
}
