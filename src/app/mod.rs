pub mod auth;
pub mod likes;
pub mod messages;
pub mod sessions;
pub mod social;
pub mod users;
