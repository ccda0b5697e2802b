use serde::{Deserialize, Serialize};

// -- Auth --

/// Body returned by `/api/auth/login` and `/api/auth/refresh` on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub user_id: i64,
    pub username: String,
}

/// Form fields for a password login.
#[derive(Debug, Serialize)]
pub struct PasswordLoginRequest<'a> {
    pub username_or_email: &'a str,
    pub password: &'a str,
}

// -- Messages --

/// A user as the REST API returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub subscriber_tier: i32,
    #[serde(default)]
    pub minutes_listened: i64,
    #[serde(default)]
    pub total_contributions: i64,
    pub created_at: String,
    pub modified_at: String,
}

/// A persisted message, including the moderation state clients never display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    pub message_id: i64,
    pub content: String,
    pub sender: ApiUser,
    #[serde(default)]
    pub censored: bool,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub removed: bool,
    pub created_at: String,
    pub modified_at: String,
}

// -- Server rows --

/// A message row as `GET /api/messages/{id}` returns it. The sender is only
/// referenced by id; `created_at` is in seconds and `modified_at` in
/// milliseconds since the epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub sender_id: i64,
    pub content: String,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub censored: bool,
    pub created_at: i64,
    pub modified_at: i64,
}

/// A user row as `GET /api/users/{id}` returns it. Credential columns the
/// server also sends are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub subscriber_tier: i32,
    #[serde(default)]
    pub minutes_listened: i64,
    #[serde(default)]
    pub total_contributions: i64,
}
