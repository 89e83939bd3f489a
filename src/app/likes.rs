use anyhow::Result;
use sqlx::Row;
use std::collections::HashSet;
use uuid::Uuid;

use crate::app::messages::message_from_row;
use crate::domain::like::{Like, LikeOutcome};
use crate::domain::message::Message;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct LikeService {
    db: Db,
}

impl LikeService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Returns `None` if the user already likes the message.
    pub async fn like(&self, user_id: Uuid, message_id: Uuid) -> Result<Option<Like>> {
        let row = sqlx::query(
            "INSERT INTO likes (user_id, message_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING \
             RETURNING user_id, message_id, created_at",
        )
        .bind(user_id)
        .bind(message_id)
        .fetch_optional(self.db.pool())
        .await?;

        let like = row.map(|row| Like {
            user_id: row.get("user_id"),
            message_id: row.get("message_id"),
            created_at: row.get("created_at"),
        });

        Ok(like)
    }

    pub async fn unlike(&self, user_id: Uuid, message_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND message_id = $2")
            .bind(user_id)
            .bind(message_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_liked_by(&self, message_id: Uuid, user_id: Uuid) -> Result<bool> {
        let liked: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM likes WHERE user_id = $1 AND message_id = $2 \
             )",
        )
        .bind(user_id)
        .bind(message_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(liked)
    }

    /// Likes the message, or removes an existing like. Users cannot like
    /// their own messages.
    pub async fn toggle_like(&self, user_id: Uuid, message_id: Uuid) -> Result<LikeOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM messages WHERE id = $1 FOR SHARE")
                .bind(message_id)
                .fetch_optional(&mut *tx)
                .await?;

        let outcome = match owner {
            None => LikeOutcome::MessageNotFound,
            Some(owner) if owner == user_id => LikeOutcome::OwnMessage,
            Some(_) => {
                let removed = sqlx::query(
                    "DELETE FROM likes WHERE user_id = $1 AND message_id = $2",
                )
                .bind(user_id)
                .bind(message_id)
                .execute(&mut *tx)
                .await?;

                if removed.rows_affected() > 0 {
                    LikeOutcome::Unliked
                } else {
                    sqlx::query(
                        "INSERT INTO likes (user_id, message_id) VALUES ($1, $2) \
                         ON CONFLICT DO NOTHING",
                    )
                    .bind(user_id)
                    .bind(message_id)
                    .execute(&mut *tx)
                    .await?;
                    LikeOutcome::Liked
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn liked_message_ids(&self, user_id: Uuid) -> Result<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT message_id FROM likes WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(ids.into_iter().collect())
    }

    pub async fn list_liked_messages(&self, user_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT m.id, m.text, m.timestamp, m.user_id, \
                    u.username AS author_username, u.image_url AS author_image_url \
             FROM likes l \
             JOIN messages m ON m.id = l.message_id \
             JOIN users u ON m.user_id = u.id \
             WHERE l.user_id = $1 \
             ORDER BY l.created_at DESC, m.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }
}
