use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::auth::AccountError;
use crate::domain::user::{ProfileUpdate, User, UserStats};
use crate::infra::db::Db;

const USER_COLUMNS: &str =
    "id, username, email, image_url, header_image_url, bio, location, created_at";

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Case-insensitive substring match on username; every user when the
    /// query is empty.
    pub async fn search_users(&self, query: Option<&str>, limit: i64) -> Result<Vec<User>> {
        let pattern = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => format!("%{}%", escape_like(q)),
            None => "%".to_string(),
        };

        let rows = sqlx::query(&format!(
            "SELECT {} FROM users \
             WHERE username ILIKE $1 ESCAPE '\\' \
             ORDER BY username ASC \
             LIMIT $2",
            USER_COLUMNS
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<UserStats> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM messages WHERE user_id = $1) AS messages, \
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following, \
                (SELECT COUNT(*) FROM follows WHERE followed_id = $1) AS followers, \
                (SELECT COUNT(*) FROM likes WHERE user_id = $1) AS likes",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(UserStats {
            messages: row.get("messages"),
            following: row.get("following"),
            followers: row.get("followers"),
            likes: row.get("likes"),
        })
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, AccountError> {
        let row = sqlx::query(&format!(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 email = COALESCE($3, email), \
                 image_url = COALESCE($4, image_url), \
                 header_image_url = COALESCE($5, header_image_url), \
                 bio = CASE WHEN $6::TEXT IS NULL THEN bio ELSE NULLIF($6, '') END, \
                 location = CASE WHEN $7::TEXT IS NULL THEN location ELSE NULLIF($7, '') END \
             WHERE id = $1 \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(update.username)
        .bind(update.email)
        .bind(update.image_url)
        .bind(update.header_image_url)
        .bind(update.bio)
        .bind(update.location)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Messages, follows and likes go with the user through ON DELETE CASCADE.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        image_url: row.get("image_url"),
        header_image_url: row.get("header_image_url"),
        bio: row.get("bio"),
        location: row.get("location"),
        created_at: row.get("created_at"),
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
