//! Token persistence and expiry bookkeeping.
//!
//! The store keeps two slots in a [`CookieJar`]: the JSON-encoded
//! [`JwtPayload`] with absolute expiry timestamps, and the JSON-encoded
//! [`User`]. Expiry is computed once, when a payload is written. Deciding
//! whether a stored token is still fresh is up to the reader.

use crate::{
    cookie::CookieJar,
    models::{expires_at, JwtPayload, LoginResponse, RefreshPayloadResponse, User},
    Error, Result,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Slot holding the JSON-encoded token payload.
pub const PAYLOAD_KEY: &str = "jwt_payload";

/// Slot holding the JSON-encoded user record.
pub const USER_KEY: &str = "user";

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Reads and writes the token and user slots of a cookie jar.
///
/// Cloning is cheap and every clone shares the jar.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tessera::cookie::MemoryCookieJar;
/// use tessera::{JwtPayload, LoginResponse, Profile, TokenStore, User};
///
/// # fn example() -> Result<(), tessera::Error> {
/// let store = TokenStore::new(Arc::new(MemoryCookieJar::new()));
/// assert!(store.load().is_none());
///
/// store.save(&LoginResponse {
///     user: User {
///         username: "ada".to_string(),
///         email: "ada@example.com".to_string(),
///         profile: Profile::default(),
///     },
///     tokens: JwtPayload {
///         access: "access".to_string(),
///         refresh: "refresh".to_string(),
///         access_expires_at: 300,
///         refresh_expires_at: 86_400,
///     },
/// })?;
///
/// let token = store.load().unwrap();
/// assert_eq!(token.access, "access");
/// assert!(!token.is_access_expired());
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Clone)]
pub struct TokenStore {
    jar: Arc<dyn CookieJar>,
}

impl TokenStore {
    /// Creates a store over `jar`.
    pub fn new(jar: Arc<dyn CookieJar>) -> Self {
        Self { jar }
    }

    /// Persists a fresh login.
    ///
    /// The token TTLs are turned into absolute timestamps before writing.
    /// Returns the user that was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if a slot cannot be encoded or written.
    pub fn save(&self, login: &LoginResponse) -> Result<User> {
        self.save_at(login, now_millis())
    }

    pub(crate) fn save_at(&self, login: &LoginResponse, now_ms: i64) -> Result<User> {
        let payload = login.tokens.with_absolute_expiry(now_ms);
        self.write(PAYLOAD_KEY, &payload)?;
        self.write(USER_KEY, &login.user)?;

        tracing::debug!(
            username = %login.user.username,
            access_expires_at = payload.access_expires_at,
            "Stored login tokens"
        );
        Ok(login.user.clone())
    }

    /// Loads the stored token.
    ///
    /// A missing slot yields `None`. A slot that does not decode as a
    /// [`JwtPayload`] is treated as corrupt: both slots are cleared and
    /// `None` is returned.
    pub fn load(&self) -> Option<StoredToken> {
        let payload = self.read::<JwtPayload>(PAYLOAD_KEY)?;
        Some(StoredToken {
            payload,
            store: self.clone(),
        })
    }

    /// Loads the cached user, with the same corruption handling as
    /// [`load`](Self::load).
    pub fn user(&self) -> Option<User> {
        self.read(USER_KEY)
    }

    /// Deletes both slots.
    pub fn clear(&self) {
        self.jar.remove(PAYLOAD_KEY);
        self.jar.remove(USER_KEY);
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.jar.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    slot = key,
                    error = %e,
                    "Stored credentials are corrupt; clearing them"
                );
                self.clear();
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let encoded =
            serde_json::to_string(value).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        self.jar.set(key, &encoded)
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

/// A token read from a [`TokenStore`], bound to that store.
///
/// Dereferences to the stored [`JwtPayload`], whose expiry fields are
/// absolute epoch milliseconds.
#[derive(Debug, Clone)]
pub struct StoredToken {
    payload: JwtPayload,
    store: TokenStore,
}

impl StoredToken {
    /// The stored payload.
    pub fn payload(&self) -> &JwtPayload {
        &self.payload
    }

    /// Replaces the stored payload with a new wire payload.
    ///
    /// TTLs are converted exactly as in [`TokenStore::save`]. The user slot
    /// is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    pub fn update_payload(&mut self, wire: &JwtPayload) -> Result<()> {
        self.store_payload(wire.with_absolute_expiry(now_millis()))
    }

    /// Applies the answer of the refresh endpoint.
    ///
    /// The access token and its expiry are replaced; the refresh token and
    /// its absolute expiry are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    pub fn apply_refresh(&mut self, refreshed: &RefreshPayloadResponse) -> Result<()> {
        let payload = JwtPayload {
            access: refreshed.access.clone(),
            refresh: self.payload.refresh.clone(),
            access_expires_at: expires_at(now_millis(), refreshed.access_expires_at),
            refresh_expires_at: self.payload.refresh_expires_at,
        };
        self.store_payload(payload)
    }

    fn store_payload(&mut self, payload: JwtPayload) -> Result<()> {
        self.store.write(PAYLOAD_KEY, &payload)?;
        self.payload = payload;
        Ok(())
    }

    /// Whether the access token has expired by now.
    pub fn is_access_expired(&self) -> bool {
        self.is_access_expired_at(now_millis())
    }

    /// Whether the access token has expired at `now_ms`.
    pub fn is_access_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.payload.access_expires_at
    }

    /// Whether the refresh token has expired by now.
    pub fn is_refresh_expired(&self) -> bool {
        self.is_refresh_expired_at(now_millis())
    }

    /// Whether the refresh token has expired at `now_ms`.
    pub fn is_refresh_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.payload.refresh_expires_at
    }
}

impl Deref for StoredToken {
    type Target = JwtPayload;

    fn deref(&self) -> &Self::Target {
        &self.payload
    }
}

impl AsRef<JwtPayload> for StoredToken {
    fn as_ref(&self) -> &JwtPayload {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::{MemoryCookieJar, RequestCookieJar};
    use crate::models::Profile;
    use http::header::{HeaderMap, HeaderValue, COOKIE};

    fn login(access_ttl: i64, refresh_ttl: i64) -> LoginResponse {
        LoginResponse {
            user: User {
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
                profile: Profile {
                    fullname: "Ada Lovelace".to_string(),
                    ..Profile::default()
                },
            },
            tokens: JwtPayload {
                access: "access-1".to_string(),
                refresh: "refresh-1".to_string(),
                access_expires_at: access_ttl,
                refresh_expires_at: refresh_ttl,
            },
        }
    }

    fn memory_store() -> (Arc<MemoryCookieJar>, TokenStore) {
        let jar = Arc::new(MemoryCookieJar::new());
        let store = TokenStore::new(jar.clone());
        (jar, store)
    }

    #[test]
    fn save_then_load_yields_absolute_expiry() {
        let (_, store) = memory_store();

        let before = now_millis();
        store.save(&login(3600, 86_400)).unwrap();
        let after = now_millis();

        let token = store.load().unwrap();
        assert!(token.access_expires_at >= before + 3_600_000);
        assert!(token.access_expires_at <= after + 3_600_000);
        assert!(token.refresh_expires_at >= before + 86_400_000);
        assert!(token.refresh_expires_at <= after + 86_400_000);
    }

    #[test]
    fn save_at_is_exact() {
        let (_, store) = memory_store();
        let user = store.save_at(&login(60, 120), 1_000).unwrap();

        assert_eq!(user.username, "ada");
        let token = store.load().unwrap();
        assert_eq!(token.access_expires_at, 61_000);
        assert_eq!(token.refresh_expires_at, 121_000);
        assert_eq!(store.user().unwrap().profile.fullname, "Ada Lovelace");
    }

    #[test]
    fn missing_payload_is_absent() {
        let (_, store) = memory_store();
        assert!(store.load().is_none());
        assert!(store.user().is_none());
    }

    #[test]
    fn corrupt_payload_clears_both_slots() {
        let (jar, store) = memory_store();
        store.save(&login(60, 120)).unwrap();
        jar.set(PAYLOAD_KEY, "not json").unwrap();

        assert!(store.load().is_none());
        assert_eq!(jar.get(PAYLOAD_KEY), None);
        assert_eq!(jar.get(USER_KEY), None);
    }

    #[test]
    fn wrongly_shaped_payload_is_corrupt() {
        let (jar, store) = memory_store();
        jar.set(PAYLOAD_KEY, r#"{"access":"a"}"#).unwrap();
        jar.set(USER_KEY, r#"{"username":"ada","email":"e"}"#).unwrap();

        assert!(store.load().is_none());
        assert_eq!(jar.get(USER_KEY), None);
    }

    #[test]
    fn corrupt_user_clears_both_slots() {
        let (jar, store) = memory_store();
        store.save(&login(60, 120)).unwrap();
        jar.set(USER_KEY, "{").unwrap();

        assert!(store.user().is_none());
        assert_eq!(jar.get(PAYLOAD_KEY), None);
    }

    #[test]
    fn clear_removes_both_slots() {
        let (jar, store) = memory_store();
        store.save(&login(60, 120)).unwrap();
        store.clear();
        assert_eq!(jar.get(PAYLOAD_KEY), None);
        assert_eq!(jar.get(USER_KEY), None);
    }

    #[test]
    fn update_payload_recomputes_and_persists() {
        let (_, store) = memory_store();
        store.save_at(&login(60, 120), 0).unwrap();

        let mut token = store.load().unwrap();
        let before = now_millis();
        token
            .update_payload(&JwtPayload {
                access: "access-2".to_string(),
                refresh: "refresh-2".to_string(),
                access_expires_at: 10,
                refresh_expires_at: 20,
            })
            .unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.access, "access-2");
        assert_eq!(reloaded.refresh, "refresh-2");
        assert!(reloaded.access_expires_at >= before + 10_000);
        assert_eq!(reloaded.payload(), token.payload());
        assert_eq!(store.user().unwrap().username, "ada");
    }

    #[test]
    fn apply_refresh_keeps_refresh_token() {
        let (_, store) = memory_store();
        store.save_at(&login(60, 120), 5_000).unwrap();

        let mut token = store.load().unwrap();
        token
            .apply_refresh(&RefreshPayloadResponse {
                access: "access-2".to_string(),
                access_expires_at: 60,
            })
            .unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.access, "access-2");
        assert_eq!(reloaded.refresh, "refresh-1");
        assert_eq!(reloaded.refresh_expires_at, 125_000);
    }

    #[test]
    fn expiry_checks_compare_against_now() {
        let (_, store) = memory_store();
        store.save_at(&login(60, 120), 0).unwrap();
        let token = store.load().unwrap();

        assert!(!token.is_access_expired_at(59_999));
        assert!(token.is_access_expired_at(60_000));
        assert!(!token.is_refresh_expired_at(60_000));
        assert!(token.is_refresh_expired());
    }

    #[test]
    fn server_side_jar_shares_the_same_logic() {
        // A payload written by the client side, forwarded in a Cookie header.
        let (client_jar, client_store) = memory_store();
        client_store.save(&login(60, 120)).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, client_jar.cookie_header().unwrap());
        let server_jar = Arc::new(RequestCookieJar::from_headers(&headers));
        let server_store = TokenStore::new(server_jar.clone());

        let mut token = server_store.load().unwrap();
        assert_eq!(token.payload(), client_store.load().unwrap().payload());

        token
            .update_payload(&JwtPayload {
                access: "server-refreshed".to_string(),
                refresh: "refresh-2".to_string(),
                access_expires_at: 60,
                refresh_expires_at: 120,
            })
            .unwrap();

        assert_eq!(server_store.load().unwrap().access, "server-refreshed");
        let set_cookie = server_jar.set_cookie_headers().unwrap();
        let line = set_cookie.get("set-cookie").unwrap().to_str().unwrap();
        assert!(line.starts_with("jwt_payload="));
        assert!(line.contains("server-refreshed"));
    }

    #[test]
    fn server_side_corruption_expires_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("jwt_payload=garbage; user=x"));
        let jar = Arc::new(RequestCookieJar::from_headers(&headers));
        let store = TokenStore::new(jar.clone());

        assert!(store.load().is_none());
        let set_cookie = jar.set_cookie_headers().unwrap();
        assert_eq!(set_cookie.get_all("set-cookie").iter().count(), 2);
    }
}
