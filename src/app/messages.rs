use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::message::Message;
use crate::infra::db::Db;

pub const TIMELINE_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct MessageService {
    db: Db,
}

impl MessageService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_message(&self, user_id: Uuid, text: String) -> Result<Message> {
        let row = sqlx::query(
            "WITH inserted_message AS ( \
                INSERT INTO messages (text, user_id) \
                VALUES ($1, $2) \
                RETURNING id, text, timestamp, user_id \
             ) \
             SELECT m.*, u.username AS author_username, u.image_url AS author_image_url \
             FROM inserted_message m \
             JOIN users u ON m.user_id = u.id",
        )
        .bind(text)
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(message_from_row(&row))
    }

    pub async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>> {
        let row = sqlx::query(
            "SELECT m.id, m.text, m.timestamp, m.user_id, \
                    u.username AS author_username, u.image_url AS author_image_url \
             FROM messages m \
             JOIN users u ON m.user_id = u.id \
             WHERE m.id = $1",
        )
        .bind(message_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(message_from_row))
    }

    /// Deletes only when `owner_id` owns the message.
    pub async fn delete_message(&self, message_id: Uuid, owner_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1 AND user_id = $2")
            .bind(message_id)
            .bind(owner_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_by_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT m.id, m.text, m.timestamp, m.user_id, \
                    u.username AS author_username, u.image_url AS author_image_url \
             FROM messages m \
             JOIN users u ON m.user_id = u.id \
             WHERE m.user_id = $1 \
             ORDER BY m.timestamp DESC, m.id DESC \
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }

    /// The user's own messages and those of everyone they follow, newest first.
    pub async fn timeline(&self, user_id: Uuid, limit: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT m.id, m.text, m.timestamp, m.user_id, \
                    u.username AS author_username, u.image_url AS author_image_url \
             FROM messages m \
             JOIN users u ON m.user_id = u.id \
             WHERE m.user_id = $1 \
                OR m.user_id IN (SELECT followed_id FROM follows WHERE follower_id = $1) \
             ORDER BY m.timestamp DESC, m.id DESC \
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }
}

pub(crate) fn message_from_row(row: &PgRow) -> Message {
    Message {
        id: row.get("id"),
        text: row.get("text"),
        timestamp: row.get("timestamp"),
        user_id: row.get("user_id"),
        author_username: Some(row.get("author_username")),
        author_image_url: Some(row.get("author_image_url")),
    }
}
