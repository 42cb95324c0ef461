//! Records exchanged with the account API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access and refresh tokens.
///
/// The same shape is used on the wire and in storage, with different units
/// for the two expiry fields: the server sends relative TTLs in seconds,
/// while the stored copy holds absolute epoch milliseconds. Use
/// [`with_absolute_expiry`](Self::with_absolute_expiry) to go from one to the
/// other.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtPayload {
    pub access: String,
    pub refresh: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

impl JwtPayload {
    /// Turns relative TTLs (seconds) into absolute timestamps (epoch ms).
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera::JwtPayload;
    ///
    /// let wire = JwtPayload {
    ///     access: "a".to_string(),
    ///     refresh: "r".to_string(),
    ///     access_expires_at: 3600,
    ///     refresh_expires_at: 86400,
    /// };
    ///
    /// let stored = wire.with_absolute_expiry(1_000);
    /// assert_eq!(stored.access_expires_at, 3_601_000);
    /// assert_eq!(stored.refresh_expires_at, 86_401_000);
    /// ```
    pub fn with_absolute_expiry(&self, now_ms: i64) -> Self {
        Self {
            access: self.access.clone(),
            refresh: self.refresh.clone(),
            access_expires_at: expires_at(now_ms, self.access_expires_at),
            refresh_expires_at: expires_at(now_ms, self.refresh_expires_at),
        }
    }
}

impl fmt::Debug for JwtPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtPayload")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// `now_ms + ttl_seconds * 1000`, saturating.
pub(crate) fn expires_at(now_ms: i64, ttl_seconds: i64) -> i64 {
    now_ms.saturating_add(ttl_seconds.saturating_mul(1000))
}

/// Answer of the token refresh endpoint. `access_expires_at` is a TTL in
/// seconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPayloadResponse {
    pub access: String,
    pub access_expires_at: i64,
}

impl fmt::Debug for RefreshPayloadResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshPayloadResponse")
            .field("access", &"<redacted>")
            .field("access_expires_at", &self.access_expires_at)
            .finish()
    }
}

/// Public profile attached to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub twitter: String,
}

/// The signed-in user, cached next to the tokens for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub profile: Profile,
}

/// Data of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub tokens: JwtPayload,
}

/// Body of the registration endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("fullname", &self.fullname)
            .finish()
    }
}
