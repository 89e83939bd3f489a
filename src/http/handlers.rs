use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::auth::{AccountError, AuthService};
use crate::app::likes::LikeService;
use crate::app::messages::{MessageService, TIMELINE_LIMIT};
use crate::app::sessions::{Flash, SessionStore};
use crate::app::social::SocialService;
use crate::app::users::UserService;
use crate::domain::like::LikeOutcome;
use crate::domain::user::{User, UserStats};
use crate::http::auth::deny_access;
use crate::http::forms::{
    FieldErrors, LoginForm, MessageForm, SignupForm, UserEditForm, FIELD_REQUIRED,
};
use crate::http::middleware::session::session_cookie;
use crate::http::views::{self, Page};
use crate::http::{AppError, AuthUser, CurrentSession};
use crate::AppState;

const USERS_PAGE_LIMIT: i64 = 100;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

pub async fn not_found() -> AppError {
    AppError::not_found("Page not found")
}

/// Wraps `body` in the layout, consuming the session's queued flashes.
async fn render(
    state: &AppState,
    token: &str,
    user: Option<&User>,
    title: &str,
    body: String,
) -> Result<Response, AppError> {
    let flashes = state.sessions().take_flashes(token).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to read flashes");
        AppError::internal("failed to read flashes")
    })?;

    let page = Page {
        title,
        user,
        flashes: &flashes,
    };
    Ok(Html(views::layout(&page, &body)).into_response())
}

async fn flash(state: &AppState, token: &str, category: &str, message: &str) -> Result<(), AppError> {
    state
        .sessions()
        .push_flash(token, Flash::new(category, message))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to queue flash");
            AppError::internal("failed to queue flash")
        })
}

/// Moves the client to a fresh session logged in as `user_id`, carrying over
/// pending flashes, and answers with a 302 to `location`.
async fn log_in_and_redirect(
    state: &AppState,
    old_token: &str,
    user_id: Uuid,
    location: &str,
) -> Result<Response, AppError> {
    let sessions = state.sessions();
    let token = SessionStore::new_token();

    let result = async {
        let pending = sessions.take_flashes(old_token).await?;
        sessions.destroy(old_token).await?;
        sessions.log_in(&token, user_id).await?;
        for flash in pending {
            sessions.push_flash(&token, flash).await?;
        }
        anyhow::Ok(())
    }
    .await;
    result.map_err(|err| {
        tracing::error!(error = ?err, user_id = %user_id, "failed to start session");
        AppError::internal("failed to start session")
    })?;

    let cookie = session_cookie(&token, state.session_ttl_seconds, state.session_cookie_secure);
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|_| AppError::internal("failed to start session"))?;

    let mut response = views::found(location);
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

// ---------------------------------------------------------------------------
// Home
// ---------------------------------------------------------------------------

pub async fn home(
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let Some(user) = session.user.as_ref() else {
        return render(&state, &session.token, None, "Home", views::home_anon()).await;
    };

    let messages = MessageService::new(state.db.clone())
        .timeline(user.id, TIMELINE_LIMIT)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user.id, "failed to load timeline");
            AppError::internal("failed to load timeline")
        })?;
    let liked = LikeService::new(state.db.clone())
        .liked_message_ids(user.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user.id, "failed to load likes");
            AppError::internal("failed to load likes")
        })?;
    let stats = load_stats(&state, user.id).await?;

    let body = views::home(user, &stats, &messages, &liked);
    render(&state, &session.token, Some(user), "Home", body).await
}

// ---------------------------------------------------------------------------
// Signup / login / logout
// ---------------------------------------------------------------------------

pub async fn signup_form(
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let body = views::signup_form(&SignupForm::default(), &FieldErrors::default());
    render(&state, &session.token, session.user.as_ref(), "Sign up", body).await
}

pub async fn signup(
    session: CurrentSession,
    State(state): State<AppState>,
    form: Option<Form<SignupForm>>,
) -> Result<Response, AppError> {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let new_user = match form.validate() {
        Ok(new_user) => new_user,
        Err(errors) => {
            let body = views::signup_form(&form, &errors);
            return render(&state, &session.token, None, "Sign up", body).await;
        }
    };

    let service = AuthService::new(state.db.clone());
    match service.signup(new_user).await {
        Ok(user) => log_in_and_redirect(&state, &session.token, user.id, "/").await,
        Err(err @ (AccountError::UsernameTaken | AccountError::EmailTaken)) => {
            flash(&state, &session.token, "danger", &err.to_string()).await?;
            let body = views::signup_form(&form, &FieldErrors::default());
            render(&state, &session.token, None, "Sign up", body).await
        }
        Err(AccountError::MissingField(field)) => {
            let mut errors = FieldErrors::default();
            errors.add(field, FIELD_REQUIRED);
            let body = views::signup_form(&form, &errors);
            render(&state, &session.token, None, "Sign up", body).await
        }
        Err(AccountError::Other(err)) => {
            tracing::error!(error = ?err, "failed to create user");
            Err(AppError::internal("failed to create user"))
        }
    }
}

pub async fn login_form(
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let body = views::login_form(None, &FieldErrors::default());
    render(&state, &session.token, session.user.as_ref(), "Log in", body).await
}

pub async fn login(
    session: CurrentSession,
    State(state): State<AppState>,
    form: Option<Form<LoginForm>>,
) -> Result<Response, AppError> {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let credentials = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => {
            let body = views::login_form(form.username.as_deref(), &errors);
            return render(&state, &session.token, None, "Log in", body).await;
        }
    };

    let service = AuthService::new(state.db.clone());
    let user = service
        .authenticate(&credentials.username, &credentials.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to authenticate");
            AppError::internal("failed to log in")
        })?;

    match user {
        Some(user) => {
            tracing::info!(user_id = %user.id, "user logged in");
            flash(
                &state,
                &session.token,
                "success",
                &format!("Hello, {}!", user.username),
            )
            .await?;
            log_in_and_redirect(&state, &session.token, user.id, "/").await
        }
        None => {
            flash(&state, &session.token, "danger", "Invalid credentials.").await?;
            let body = views::login_form(Some(&credentials.username), &FieldErrors::default());
            render(&state, &session.token, None, "Log in", body).await
        }
    }
}

pub async fn logout(
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    state.sessions().log_out(&session.token).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to log out");
        AppError::internal("failed to log out")
    })?;
    if let Some(user) = &session.user {
        tracing::info!(user_id = %user.id, "user logged out");
    }

    flash(
        &state,
        &session.token,
        "success",
        "You have successfully logged out.",
    )
    .await?;
    Ok(views::found("/login"))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn list_users(
    session: CurrentSession,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let users = UserService::new(state.db.clone())
        .search_users(query.q.as_deref(), USERS_PAGE_LIMIT)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to search users");
            AppError::internal("failed to search users")
        })?;

    let body = views::users_index(&users, query.q.as_deref());
    render(&state, &session.token, session.user.as_ref(), "Users", body).await
}

pub async fn show_user(
    Path(id): Path<Uuid>,
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let user = load_user(&state, id).await?;
    let stats = load_stats(&state, id).await?;
    let messages = MessageService::new(state.db.clone())
        .list_by_user(id, TIMELINE_LIMIT)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list messages");
            AppError::internal("failed to list messages")
        })?;

    let is_following = match &session.user {
        Some(viewer) if viewer.id != id => Some(
            SocialService::new(state.db.clone())
                .is_following(viewer.id, id)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, user_id = %viewer.id, other_id = %id, "failed to check follow");
                    AppError::internal("failed to load user")
                })?,
        ),
        _ => None,
    };

    let body = views::user_show(
        &user,
        &stats,
        &messages,
        session.user.as_ref(),
        is_following,
    );
    render(&state, &session.token, session.user.as_ref(), &user.username, body).await
}

pub async fn show_following(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let owner = load_user(&state, id).await?;
    let users = SocialService::new(state.db.clone())
        .list_following(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list following");
            AppError::internal("failed to list following")
        })?;

    let body = views::follow_list("Following", &owner, &users);
    render(&state, &auth.token, Some(&auth.user), "Following", body).await
}

pub async fn show_followers(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let owner = load_user(&state, id).await?;
    let users = SocialService::new(state.db.clone())
        .list_followers(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list followers");
            AppError::internal("failed to list followers")
        })?;

    let body = views::follow_list("Followers", &owner, &users);
    render(&state, &auth.token, Some(&auth.user), "Followers", body).await
}

pub async fn show_likes(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let owner = load_user(&state, id).await?;
    let service = LikeService::new(state.db.clone());
    let messages = service.list_liked_messages(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to list liked messages");
        AppError::internal("failed to list likes")
    })?;
    let liked = service
        .liked_message_ids(auth.user.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user.id, "failed to load likes");
            AppError::internal("failed to list likes")
        })?;

    let body = views::liked_messages(&owner, &messages, &auth.user, &liked);
    render(&state, &auth.token, Some(&auth.user), "Likes", body).await
}

pub async fn follow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if auth.user.id == id {
        return Err(AppError::bad_request("You cannot follow yourself."));
    }
    load_user(&state, id).await?;

    let followed = SocialService::new(state.db.clone())
        .follow(auth.user.id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, follower_id = %auth.user.id, followed_id = %id, "failed to follow user");
            AppError::internal("failed to follow user")
        })?;
    if followed.is_none() {
        tracing::debug!(follower_id = %auth.user.id, followed_id = %id, "already following");
    }

    Ok(views::found(&format!("/users/{}/following", auth.user.id)))
}

pub async fn stop_following(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    SocialService::new(state.db.clone())
        .unfollow(auth.user.id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, follower_id = %auth.user.id, followed_id = %id, "failed to unfollow user");
            AppError::internal("failed to unfollow user")
        })?;

    Ok(views::found(&format!("/users/{}/following", auth.user.id)))
}

pub async fn toggle_like(
    Path(message_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let outcome = LikeService::new(state.db.clone())
        .toggle_like(auth.user.id, message_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user.id, message_id = %message_id, "failed to toggle like");
            AppError::internal("failed to like message")
        })?;

    match outcome {
        LikeOutcome::Liked | LikeOutcome::Unliked => Ok(views::found("/")),
        LikeOutcome::OwnMessage => Err(AppError::forbidden("You cannot like your own message.")),
        LikeOutcome::MessageNotFound => Err(AppError::not_found("message not found")),
    }
}

pub async fn edit_profile_form(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let form = UserEditForm {
        username: Some(auth.user.username.clone()),
        email: Some(auth.user.email.clone()),
        image_url: Some(auth.user.image_url.clone()),
        header_image_url: Some(auth.user.header_image_url.clone()),
        bio: auth.user.bio.clone(),
        location: auth.user.location.clone(),
        password: None,
    };
    let body = views::user_edit_form(&form, &FieldErrors::default());
    render(&state, &auth.token, Some(&auth.user), "Edit profile", body).await
}

pub async fn edit_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    form: Option<Form<UserEditForm>>,
) -> Result<Response, AppError> {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let (update, password) = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            let body = views::user_edit_form(&form, &errors);
            return render(&state, &auth.token, Some(&auth.user), "Edit profile", body).await;
        }
    };

    let confirmed = AuthService::new(state.db.clone())
        .authenticate(&auth.user.username, &password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user.id, "failed to verify password");
            AppError::internal("failed to update profile")
        })?;
    if confirmed.is_none() {
        flash(&state, &auth.token, "danger", "Wrong password, please try again.").await?;
        return Ok(views::found("/"));
    }

    match UserService::new(state.db.clone())
        .update_profile(auth.user.id, update)
        .await
    {
        Ok(Some(user)) => Ok(views::found(&format!("/users/{}", user.id))),
        Ok(None) => Err(AppError::not_found("user not found")),
        Err(err @ (AccountError::UsernameTaken | AccountError::EmailTaken)) => {
            flash(&state, &auth.token, "danger", &err.to_string()).await?;
            let body = views::user_edit_form(&form, &FieldErrors::default());
            render(&state, &auth.token, Some(&auth.user), "Edit profile", body).await
        }
        Err(err) => {
            tracing::error!(error = ?err, user_id = %auth.user.id, "failed to update profile");
            Err(AppError::internal("failed to update profile"))
        }
    }
}

pub async fn delete_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let deleted = UserService::new(state.db.clone())
        .delete_account(auth.user.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user.id, "failed to delete account");
            AppError::internal("failed to delete account")
        })?;
    if !deleted {
        return Err(AppError::not_found("user not found"));
    }
    tracing::info!(user_id = %auth.user.id, "account deleted");

    state.sessions().destroy(&auth.token).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to clear session");
        AppError::internal("failed to clear session")
    })?;

    Ok(views::found("/signup"))
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub async fn new_message_form(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let body = views::message_form("", &FieldErrors::default());
    render(&state, &auth.token, Some(&auth.user), "New message", body).await
}

pub async fn create_message(
    auth: AuthUser,
    State(state): State<AppState>,
    form: Option<Form<MessageForm>>,
) -> Result<Response, AppError> {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => {
            let body = views::message_form(form.text.as_deref().unwrap_or_default(), &errors);
            return render(&state, &auth.token, Some(&auth.user), "New message", body).await;
        }
    };

    let message = MessageService::new(state.db.clone())
        .create_message(auth.user.id, text)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user.id, "failed to create message");
            AppError::internal("failed to create message")
        })?;
    tracing::debug!(message_id = %message.id, user_id = %auth.user.id, "message created");

    Ok(views::found(&format!("/users/{}", auth.user.id)))
}

pub async fn show_message(
    Path(id): Path<Uuid>,
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let message = MessageService::new(state.db.clone())
        .get_message(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, message_id = %id, "failed to fetch message");
            AppError::internal("failed to fetch message")
        })?
        .ok_or_else(|| AppError::not_found("message not found"))?;

    let body = views::message_show(&message, session.user.as_ref());
    render(&state, &session.token, session.user.as_ref(), "Message", body).await
}

pub async fn delete_message(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let service = MessageService::new(state.db.clone());
    let message = service
        .get_message(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, message_id = %id, "failed to fetch message");
            AppError::internal("failed to fetch message")
        })?
        .ok_or_else(|| AppError::not_found("message not found"))?;

    if message.user_id != auth.user.id {
        deny_access(&state, &auth.token).await?;
        return Err(AppError::redirect("/"));
    }

    let deleted = service.delete_message(id, auth.user.id).await.map_err(|err| {
        tracing::error!(error = ?err, message_id = %id, "failed to delete message");
        AppError::internal("failed to delete message")
    })?;
    if !deleted {
        return Err(AppError::not_found("message not found"));
    }

    Ok(views::found(&format!("/users/{}", auth.user.id)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    UserService::new(state.db.clone())
        .get_user(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
            AppError::internal("failed to fetch user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))
}

async fn load_stats(state: &AppState, id: Uuid) -> Result<UserStats, AppError> {
    UserService::new(state.db.clone())
        .stats(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to load user stats");
            AppError::internal("failed to load user stats")
        })
}
