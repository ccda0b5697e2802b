use std::fmt;

use serde::{Deserialize, Serialize};

/// Local storage key holding the signed-in username.
pub const USERNAME_KEY: &str = "username";
/// Local storage key holding the signed-in user id.
pub const USER_ID_KEY: &str = "user_id";

/// Who is using this client. Present only when both storage keys are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

/// The two bearer credentials issued by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived, sent with every authenticated request.
    Access,
    /// Long-lived, only accepted by the refresh endpoint.
    Refresh,
}

impl TokenKind {
    /// Name of the cookie the server sets for this token.
    pub fn cookie_name(self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
        }
    }

    pub fn from_cookie_name(name: &str) -> Option<Self> {
        match name {
            "access_token" => Some(Self::Access),
            "refresh_token" => Some(Self::Refresh),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => f.write_str("access"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}
