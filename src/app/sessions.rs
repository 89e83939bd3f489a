use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::infra::cache::RedisCache;

/// Session field holding the logged-in user's id.
pub const CURR_USER_KEY: &str = "curr_user";

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: String,
    pub message: String,
}

impl Flash {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }
}

/// Server-side sessions. Redis keys carry the SHA-256 of the cookie token,
/// never the token itself.
#[derive(Clone)]
pub struct SessionStore {
    cache: RedisCache,
    ttl_seconds: u64,
}

impl SessionStore {
    pub fn new(cache: RedisCache, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    pub fn new_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub async fn current_user_id(&self, token: &str) -> Result<Option<Uuid>> {
        let mut conn = self.cache.connection().await?;
        let value: Option<String> = conn.hget(session_key(token), CURR_USER_KEY).await?;

        // A malformed id is treated like an anonymous session.
        Ok(value.and_then(|value| Uuid::parse_str(&value).ok()))
    }

    pub async fn log_in(&self, token: &str, user_id: Uuid) -> Result<()> {
        let key = session_key(token);
        let mut conn = self.cache.connection().await?;
        let _: () = conn.hset(&key, CURR_USER_KEY, user_id.to_string()).await?;
        let _: () = conn.expire(&key, self.ttl_seconds as i64).await?;
        Ok(())
    }

    pub async fn log_out(&self, token: &str) -> Result<()> {
        let mut conn = self.cache.connection().await?;
        let _: () = conn.hdel(session_key(token), CURR_USER_KEY).await?;
        Ok(())
    }

    pub async fn push_flash(&self, token: &str, flash: Flash) -> Result<()> {
        let key = flash_key(token);
        let payload = serde_json::to_string(&flash)?;
        let mut conn = self.cache.connection().await?;
        let _: () = conn.rpush(&key, payload).await?;
        let _: () = conn.expire(&key, self.ttl_seconds as i64).await?;
        Ok(())
    }

    /// Returns queued flashes in insertion order and clears the queue.
    pub async fn take_flashes(&self, token: &str) -> Result<Vec<Flash>> {
        let key = flash_key(token);
        let mut conn = self.cache.connection().await?;
        let (items,): (Vec<String>,) = redis::pipe()
            .atomic()
            .lrange(&key, 0, -1)
            .del(&key)
            .ignore()
            .query_async(&mut conn)
            .await?;

        let mut flashes = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_str::<Flash>(&item) {
                Ok(flash) => flashes.push(flash),
                Err(err) => tracing::warn!(error = %err, "dropping malformed flash"),
            }
        }
        Ok(flashes)
    }

    pub async fn destroy(&self, token: &str) -> Result<()> {
        let mut conn = self.cache.connection().await?;
        let _: () = conn.del(vec![session_key(token), flash_key(token)]).await?;
        Ok(())
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

fn session_key(token: &str) -> String {
    format!("session:{}", hash_token(token))
}

fn flash_key(token: &str) -> String {
    format!("session:{}:flashes", hash_token(token))
}
