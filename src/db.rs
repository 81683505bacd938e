mod schema;
mod subscription;

pub use schema::Database;
pub use subscription::{CancelHandle, Snapshot, Subscription};

#[cfg(test)]
pub(crate) use schema::CHANGE_CHANNEL_CAPACITY;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Sign-in email.
    pub email: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last sign-in timestamp.
    pub last_login: Option<i64>,
}

/// Signed-in session. Passed explicitly into every store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Email the user signed in with.
    pub email: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Per-user profile document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Owner user ID.
    pub user_id: String,
    /// Display username.
    pub username: String,
    /// Contact email.
    pub email: String,
}

/// Which part of a user's collection a read or subscription covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookFilter {
    /// Every saved book.
    All,
    /// Only favorites.
    Favorites,
    /// A single book.
    ById(String),
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}
