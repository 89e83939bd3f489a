use anyhow::anyhow;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sqlx::Row;

use crate::app::users::user_from_row;
use crate::domain::user::{NewUser, User, DEFAULT_IMAGE_URL};
use crate::infra::db::Db;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Email already taken")]
    EmailTaken,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or_default();
                if constraint.contains("users_username_key") {
                    return AccountError::UsernameTaken;
                }
                if constraint.contains("users_email_key") {
                    return AccountError::EmailTaken;
                }
            }
        }
        AccountError::Other(err.into())
    }
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
}

impl AuthService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn signup(&self, new_user: NewUser) -> Result<User, AccountError> {
        if new_user.username.trim().is_empty() {
            return Err(AccountError::MissingField("username"));
        }
        if new_user.email.trim().is_empty() {
            return Err(AccountError::MissingField("email"));
        }
        if new_user.password.is_empty() {
            return Err(AccountError::MissingField("password"));
        }

        let password_hash = hash_password(&new_user.password)?;
        let image_url = new_user
            .image_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string());

        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "INSERT INTO users (username, email, image_url, password_hash) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, username, email, image_url, header_image_url, bio, location, created_at",
        )
        .bind(new_user.username.trim())
        .bind(new_user.email.trim())
        .bind(image_url)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await?;

        let user = user_from_row(&row);

        tx.commit().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "user signed up");
        Ok(user)
    }

    /// Returns `None` for both an unknown username and a wrong password.
    pub async fn authenticate(&self, username: &str, password: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, image_url, header_image_url, bio, location, created_at, \
                    password_hash \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() {
            return Ok(None);
        }

        match verify_password(password, &password_hash) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(err) => {
                let user_id: uuid::Uuid = row.get("id");
                tracing::warn!(error = ?err, user_id = %user_id, "unreadable password hash");
                return Ok(None);
            }
        }

        Ok(Some(user_from_row(&row)))
    }
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
