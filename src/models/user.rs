//! Authenticated identity as issued by the hosted auth service.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed-in user. Owned by the auth service; profiles only reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user ID (also the `user_profiles` primary key)
    pub id: String,
    /// Email address the account was registered with
    #[serde(default)]
    pub email: Option<String>,
}

/// Access/refresh token pair plus expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    /// True if the access token expires within `margin` from now.
    pub fn is_expired(&self, margin: Duration) -> bool {
        self.expires_at - margin <= Utc::now()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}
