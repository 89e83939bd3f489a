use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

use crate::domain::message::MAX_MESSAGE_LEN;
use crate::domain::user::{NewUser, ProfileUpdate};

pub const FIELD_REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Invalid email address.";
pub const INVALID_URL: &str = "Invalid URL.";

const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_USERNAME_LEN: usize = 64;

/// Validation messages keyed by form field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageForm {
    pub text: Option<String>,
}

impl MessageForm {
    /// Returns the trimmed message text.
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::default();
        let text = required(&mut errors, "text", self.text.as_deref());
        if let Some(text) = &text {
            max_len(&mut errors, "text", text, MAX_MESSAGE_LEN);
        }
        errors.into_result(text.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image_url: Option<String>,
}

impl SignupForm {
    pub fn validate(&self) -> Result<NewUser, FieldErrors> {
        let mut errors = FieldErrors::default();

        let username = required(&mut errors, "username", self.username.as_deref());
        if let Some(username) = &username {
            max_len(&mut errors, "username", username, MAX_USERNAME_LEN);
        }
        let email = required(&mut errors, "email", self.email.as_deref());
        if let Some(email) = &email {
            if !is_valid_email(email) {
                errors.add("email", INVALID_EMAIL);
            }
        }
        let password = password(&mut errors, "password", self.password.as_deref());
        let image_url = optional_url(&mut errors, "image_url", self.image_url.as_deref());

        errors.into_result(NewUser {
            username: username.unwrap_or_default(),
            email: email.unwrap_or_default(),
            password: password.unwrap_or_default(),
            image_url,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::default();
        let username = required(&mut errors, "username", self.username.as_deref());
        let password = password(&mut errors, "password", self.password.as_deref());

        errors.into_result(Credentials {
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserEditForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub password: Option<String>,
}

impl UserEditForm {
    /// Returns the profile changes and the password confirming them.
    pub fn validate(&self) -> Result<(ProfileUpdate, String), FieldErrors> {
        let mut errors = FieldErrors::default();

        let username = required(&mut errors, "username", self.username.as_deref());
        if let Some(username) = &username {
            max_len(&mut errors, "username", username, MAX_USERNAME_LEN);
        }
        let email = required(&mut errors, "email", self.email.as_deref());
        if let Some(email) = &email {
            if !is_valid_email(email) {
                errors.add("email", INVALID_EMAIL);
            }
        }
        let image_url = optional_url(&mut errors, "image_url", self.image_url.as_deref());
        let header_image_url = optional_url(
            &mut errors,
            "header_image_url",
            self.header_image_url.as_deref(),
        );
        let password = required(&mut errors, "password", self.password.as_deref());

        let update = ProfileUpdate {
            username,
            email,
            image_url,
            header_image_url,
            bio: self.bio.as_deref().map(|bio| bio.trim().to_string()),
            location: self.location.as_deref().map(|loc| loc.trim().to_string()),
        };
        errors.into_result((update, password.unwrap_or_default()))
    }
}

fn required(errors: &mut FieldErrors, field: &'static str, value: Option<&str>) -> Option<String> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Some(value.to_string()),
        None => {
            errors.add(field, FIELD_REQUIRED);
            None
        }
    }
}

fn max_len(errors: &mut FieldErrors, field: &'static str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Field cannot be longer than {} characters.", max),
        );
    }
}

/// Passwords are not trimmed.
fn password(errors: &mut FieldErrors, field: &'static str, value: Option<&str>) -> Option<String> {
    let value = match value.filter(|value| !value.is_empty()) {
        Some(value) => value,
        None => {
            errors.add(field, FIELD_REQUIRED);
            return None;
        }
    };

    let len = value.chars().count();
    if len < MIN_PASSWORD_LEN {
        errors.add(
            field,
            format!("Field must be at least {} characters long.", MIN_PASSWORD_LEN),
        );
    }
    if len > MAX_PASSWORD_LEN {
        errors.add(
            field,
            format!("Field cannot be longer than {} characters.", MAX_PASSWORD_LEN),
        );
    }
    Some(value.to_string())
}

/// Blank means "not provided". Accepts absolute http(s) URLs and site paths.
fn optional_url(errors: &mut FieldErrors, field: &'static str, value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|value| !value.is_empty())?;

    let valid = if value.starts_with('/') {
        !value.starts_with("//")
    } else {
        Url::parse(value)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false)
    };

    if !valid {
        errors.add(field, INVALID_URL);
        return None;
    }
    Some(value.to_string())
}

fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
