pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::app::sessions::SessionStore;
use crate::infra::{cache::RedisCache, db::Db};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub session_ttl_seconds: u64,
    pub session_cookie_secure: bool,
}

impl AppState {
    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.cache.clone(), self.session_ttl_seconds)
    }
}
