//! Server-rendered HTML. Every interpolated value goes through `escape_html`;
//! attribute values are always double-quoted.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use htmlescape::encode_minimal as escape_html;
use std::collections::HashSet;
use std::fmt::Write;
use time::macros::format_description;
use uuid::Uuid;

use crate::app::sessions::Flash;
use crate::domain::message::{Message, MAX_MESSAGE_LEN};
use crate::domain::user::{User, UserStats};
use crate::http::forms::{FieldErrors, SignupForm, UserEditForm};

pub struct Page<'a> {
    pub title: &'a str,
    pub user: Option<&'a User>,
    pub flashes: &'a [Flash],
}

/// Plain 302, the status the login and mutation flows answer with.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

pub fn layout(page: &Page<'_>, body: &str) -> String {
    let nav = match page.user {
        Some(user) => format!(
            "<a href=\"/messages/new\">New Message</a>\n\
             <a href=\"/users/{id}\">@{username}</a>\n\
             <a href=\"/logout\">Log out</a>",
            id = user.id,
            username = escape_html(&user.username),
        ),
        None => "<a href=\"/signup\">Sign up</a>\n<a href=\"/login\">Log in</a>".to_string(),
    };

    let mut flashes = String::new();
    for flash in page.flashes {
        let _ = writeln!(
            flashes,
            "<div class=\"alert alert-{}\">{}</div>",
            escape_html(&flash.category),
            escape_html(&flash.message),
        );
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n\
         <title>{title} | Warbler</title>\n</head>\n<body>\n\
         <nav>\n<a href=\"/\">Warbler</a>\n<form action=\"/users\" method=\"get\">\
         <input name=\"q\" placeholder=\"Search Warbler\" /></form>\n{nav}\n</nav>\n\
         <main>\n{flashes}{body}\n</main>\n</body>\n</html>\n",
        title = escape_html(page.title),
        nav = nav,
        flashes = flashes,
        body = body,
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let heading = status.canonical_reason().unwrap_or("Error");
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n\
         <title>{heading} | Warbler</title>\n</head>\n<body>\n\
         <h1>{code} {heading}</h1>\n<p>{message}</p>\n<a href=\"/\">Back home</a>\n\
         </body>\n</html>\n",
        code = status.as_u16(),
        heading = escape_html(heading),
        message = escape_html(message),
    )
}

pub fn home_anon() -> String {
    "<div class=\"home-hero\">\n<h1>What's Happening?</h1>\n\
     <h4>New to Warbler?</h4>\n<a href=\"/signup\">Sign up now</a>\n</div>"
        .to_string()
}

pub fn home(user: &User, stats: &UserStats, messages: &[Message], liked: &HashSet<Uuid>) -> String {
    format!(
        "<aside class=\"user-card\">\n{card}\n{counts}\n</aside>\n\
         <section class=\"timeline\">\n{messages}\n</section>",
        card = user_card(user),
        counts = stats_list(user, stats),
        messages = message_list(messages, Some(user), Some(liked)),
    )
}

pub fn message_form(text: &str, errors: &FieldErrors) -> String {
    format!(
        "<h2>Add a message</h2>\n\
         <form method=\"POST\" action=\"/messages/new\">\n\
         <textarea name=\"text\" maxlength=\"{max}\" placeholder=\"What's happening?\">{text}</textarea>\n\
         {errors}<button>Add my message!</button>\n</form>",
        max = MAX_MESSAGE_LEN,
        text = escape_html(text),
        errors = field_errors(errors, "text"),
    )
}

pub fn message_show(message: &Message, viewer: Option<&User>) -> String {
    let author = message.author_username.as_deref().unwrap_or("unknown");
    let delete = match viewer {
        Some(viewer) if viewer.id == message.user_id => format!(
            "<form method=\"POST\" action=\"/messages/{}/delete\">\
             <button>Delete</button></form>",
            message.id
        ),
        _ => String::new(),
    };

    format!(
        "<article class=\"message\">\n\
         <a href=\"/users/{user_id}\">@{author}</a>\n\
         <span class=\"timestamp\">{timestamp}</span>\n\
         <p class=\"single-message\">{text}</p>\n{delete}\n</article>",
        user_id = message.user_id,
        author = escape_html(author),
        timestamp = format_timestamp(message),
        text = escape_html(&message.text),
        delete = delete,
    )
}

pub fn signup_form(form: &SignupForm, errors: &FieldErrors) -> String {
    format!(
        "<h2>Join Warbler today.</h2>\n<form method=\"POST\" action=\"/signup\">\n\
         {username}{email}\
         <input name=\"password\" type=\"password\" placeholder=\"Password\" />\n{password_errors}\
         {image_url}<button>Sign me up!</button>\n</form>",
        username = text_input("username", "Username", form.username.as_deref(), errors),
        email = text_input("email", "E-mail", form.email.as_deref(), errors),
        password_errors = field_errors(errors, "password"),
        image_url = text_input("image_url", "(Optional) Image URL", form.image_url.as_deref(), errors),
    )
}

pub fn login_form(username: Option<&str>, errors: &FieldErrors) -> String {
    format!(
        "<h2>Welcome back.</h2>\n<form method=\"POST\" action=\"/login\">\n{username}\
         <input name=\"password\" type=\"password\" placeholder=\"Password\" />\n{password_errors}\
         <button>Log in</button>\n</form>",
        username = text_input("username", "Username", username, errors),
        password_errors = field_errors(errors, "password"),
    )
}

pub fn user_edit_form(form: &UserEditForm, errors: &FieldErrors) -> String {
    format!(
        "<h2>Edit Your Profile.</h2>\n<form method=\"POST\" action=\"/users/profile\">\n\
         {username}{email}{image_url}{header_image_url}{bio}{location}\
         <p>To confirm changes, enter your password:</p>\n\
         <input name=\"password\" type=\"password\" placeholder=\"Password\" />\n{password_errors}\
         <button>Edit this user!</button>\n</form>\n\
         <form method=\"POST\" action=\"/users/delete\"><button>Delete Profile</button></form>",
        username = text_input("username", "Username", form.username.as_deref(), errors),
        email = text_input("email", "E-mail", form.email.as_deref(), errors),
        image_url = text_input("image_url", "Image URL", form.image_url.as_deref(), errors),
        header_image_url = text_input(
            "header_image_url",
            "Header Image URL",
            form.header_image_url.as_deref(),
            errors
        ),
        bio = text_input("bio", "Bio", form.bio.as_deref(), errors),
        location = text_input("location", "Location", form.location.as_deref(), errors),
        password_errors = field_errors(errors, "password"),
    )
}

pub fn users_index(users: &[User], query: Option<&str>) -> String {
    if users.is_empty() {
        let query = query.unwrap_or_default();
        return format!(
            "<h3>Sorry, no users found matching \"{}\"</h3>",
            escape_html(query)
        );
    }

    let mut cards = String::new();
    for user in users {
        let _ = writeln!(cards, "<li>{}</li>", user_card(user));
    }
    format!("<ul class=\"user-list\">\n{}</ul>", cards)
}

/// `is_following` is `None` when the viewer is anonymous or is the profile owner.
pub fn user_show(
    user: &User,
    stats: &UserStats,
    messages: &[Message],
    viewer: Option<&User>,
    is_following: Option<bool>,
) -> String {
    let action = match (viewer, is_following) {
        (Some(viewer), _) if viewer.id == user.id => {
            "<a href=\"/users/profile\">Edit Profile</a>".to_string()
        }
        (Some(_), Some(true)) => format!(
            "<form method=\"POST\" action=\"/users/stop-following/{}\">\
             <button>Unfollow</button></form>",
            user.id
        ),
        (Some(_), _) => format!(
            "<form method=\"POST\" action=\"/users/follow/{}\">\
             <button>Follow</button></form>",
            user.id
        ),
        (None, _) => String::new(),
    };

    format!(
        "<header class=\"profile\">\n<img class=\"header-image\" src=\"{header}\" alt=\"\" />\n\
         {card}\n{details}\n{counts}\n{action}\n</header>\n\
         <section class=\"messages\">\n{messages}\n</section>",
        header = escape_html(&user.header_image_url),
        card = user_card(user),
        details = user_details(user),
        counts = stats_list(user, stats),
        action = action,
        messages = message_list(messages, viewer, None),
    )
}

pub fn follow_list(heading: &str, owner: &User, users: &[User]) -> String {
    let mut cards = String::new();
    for user in users {
        let _ = writeln!(cards, "<li>{}</li>", user_card(user));
    }
    format!(
        "<h2>{heading}</h2>\n<p>{card}</p>\n<ul class=\"user-list\">\n{cards}</ul>",
        heading = escape_html(heading),
        card = user_card(owner),
        cards = cards,
    )
}

pub fn liked_messages(owner: &User, messages: &[Message], viewer: &User, liked: &HashSet<Uuid>) -> String {
    format!(
        "<h2>Liked by @{username}</h2>\n<section class=\"messages\">\n{messages}\n</section>",
        username = escape_html(&owner.username),
        messages = message_list(messages, Some(viewer), Some(liked)),
    )
}

fn user_card(user: &User) -> String {
    format!(
        "<a class=\"user-card\" href=\"/users/{id}\">\
         <img src=\"{image}\" alt=\"Image for {alt}\" /> @{username}</a>",
        id = user.id,
        image = escape_html(&user.image_url),
        alt = escape_html(&user.username),
        username = escape_html(&user.username),
    )
}

fn user_details(user: &User) -> String {
    let mut details = String::new();
    if let Some(bio) = user.bio.as_deref().filter(|bio| !bio.is_empty()) {
        let _ = write!(details, "<p class=\"bio\">{}</p>", escape_html(bio));
    }
    if let Some(location) = user.location.as_deref().filter(|loc| !loc.is_empty()) {
        let _ = write!(details, "<p class=\"location\">{}</p>", escape_html(location));
    }
    details
}

fn stats_list(user: &User, stats: &UserStats) -> String {
    format!(
        "<ul class=\"user-stats\">\
         <li><a href=\"/users/{id}\">Messages {messages}</a></li>\
         <li><a href=\"/users/{id}/following\">Following {following}</a></li>\
         <li><a href=\"/users/{id}/followers\">Followers {followers}</a></li>\
         <li><a href=\"/users/{id}/likes\">Likes {likes}</a></li></ul>",
        id = user.id,
        messages = stats.messages,
        following = stats.following,
        followers = stats.followers,
        likes = stats.likes,
    )
}

/// Like buttons are rendered only when `liked` is known for the viewer.
fn message_list(messages: &[Message], viewer: Option<&User>, liked: Option<&HashSet<Uuid>>) -> String {
    if messages.is_empty() {
        return "<p class=\"empty\">No messages yet.</p>".to_string();
    }

    let mut items = String::new();
    for message in messages {
        let like = match (viewer, liked) {
            (Some(viewer), Some(liked)) if viewer.id != message.user_id => {
                let label = if liked.contains(&message.id) { "Unlike" } else { "Like" };
                format!(
                    "<form method=\"POST\" action=\"/users/add_like/{}\">\
                     <button>{}</button></form>",
                    message.id, label
                )
            }
            _ => String::new(),
        };
        let author = message.author_username.as_deref().unwrap_or("unknown");
        let _ = writeln!(
            items,
            "<li class=\"message\"><a href=\"/users/{user_id}\">@{author}</a> \
             <span class=\"timestamp\">{timestamp}</span> \
             <a href=\"/messages/{id}\">{text}</a>{like}</li>",
            user_id = message.user_id,
            author = escape_html(author),
            timestamp = format_timestamp(message),
            id = message.id,
            text = escape_html(&message.text),
            like = like,
        );
    }
    format!("<ul class=\"messages\">\n{}</ul>", items)
}

fn text_input(name: &str, placeholder: &str, value: Option<&str>, errors: &FieldErrors) -> String {
    format!(
        "<input name=\"{name}\" placeholder=\"{placeholder}\" value=\"{value}\" />\n{errors}",
        name = name,
        placeholder = escape_html(placeholder),
        value = escape_html(value.unwrap_or_default()),
        errors = field_errors(errors, name),
    )
}

fn field_errors(errors: &FieldErrors, field: &str) -> String {
    let mut out = String::new();
    for message in errors.get(field) {
        let _ = writeln!(
            out,
            "<span class=\"form-error\">{}</span>",
            escape_html(message)
        );
    }
    out
}

fn format_timestamp(message: &Message) -> String {
    let format = format_description!("[day] [month repr:short] [year]");
    message
        .timestamp
        .format(format)
        .unwrap_or_default()
}
