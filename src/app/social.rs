use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::app::users::user_from_row;
use crate::domain::social_graph::Follow;
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Returns `None` when the edge already exists or both ids are the same user.
    pub async fn follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<Option<Follow>> {
        let row = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id) \
             SELECT $1, $2 \
             WHERE $1 <> $2 \
             ON CONFLICT DO NOTHING \
             RETURNING follower_id, followed_id, created_at",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(self.db.pool())
        .await?;

        let follow = row.map(|row| Follow {
            follower_id: row.get("follower_id"),
            followed_id: row.get("followed_id"),
            created_at: row.get("created_at"),
        });

        Ok(follow)
    }

    pub async fn unfollow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether `user_id` follows `other_id`.
    pub async fn is_following(&self, user_id: Uuid, other_id: Uuid) -> Result<bool> {
        self.edge_exists(user_id, other_id).await
    }

    /// Whether `other_id` follows `user_id`.
    pub async fn is_followed_by(&self, user_id: Uuid, other_id: Uuid) -> Result<bool> {
        self.edge_exists(other_id, user_id).await
    }

    async fn edge_exists(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2 \
             )",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }

    pub async fn list_followers(&self, user_id: Uuid) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT u.id, u.username, u.email, u.image_url, u.header_image_url, u.bio, \
                    u.location, u.created_at \
             FROM follows f \
             JOIN users u ON u.id = f.follower_id \
             WHERE f.followed_id = $1 \
             ORDER BY f.created_at DESC, f.follower_id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    pub async fn list_following(&self, user_id: Uuid) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT u.id, u.username, u.email, u.image_url, u.header_image_url, u.bio, \
                    u.location, u.created_at \
             FROM follows f \
             JOIN users u ON u.id = f.followed_id \
             WHERE f.follower_id = $1 \
             ORDER BY f.created_at DESC, f.followed_id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }
}
