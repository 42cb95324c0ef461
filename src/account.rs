//! Account endpoints and the session built on top of them.
//!
//! [`AccountClient`] pairs an [`ApiClient`] with a [`TokenStore`]: it calls
//! the login, registration, verification and refresh endpoints, attaches
//! bearer credentials to authorized calls, and keeps the stored tokens in
//! step with the server.

use crate::{
    models::{LoginResponse, RefreshPayloadResponse, RegisterRequest, User},
    response::{Envelope, ErrorResponse},
    token::{StoredToken, TokenStore},
    ApiClient, Error, RequestOptions, Result,
};
use http::header::{HeaderValue, AUTHORIZATION};
use http::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Exchanges credentials for a user and tokens.
pub const LOGIN_PATH: &str = "/account/login";
/// Creates an account.
pub const REGISTER_PATH: &str = "/account/register";
/// Confirms an account with a one-time code.
pub const VERIFY_ACCOUNT_PATH: &str = "/account/validate-otp";
/// Trades a refresh token for a new access token.
pub const REFRESH_PATH: &str = "/account/token/user/refresh";

/// Form fields whose server-side messages a sign-in reports.
pub const SIGN_IN_FIELDS: [&str; 2] = ["email", "password"];

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct OneTimePassword<'a> {
    email: &'a str,
    otp: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Outcome of [`AccountClient::sign_in`].
#[derive(Debug, Clone, PartialEq)]
pub enum SignIn {
    /// Tokens were stored; here is the user.
    Authenticated(User),
    /// The server turned the credentials down.
    Rejected(SignInRejection),
}

/// Why a sign-in was refused, shaped for a login form.
#[derive(Debug, Clone, PartialEq)]
pub struct SignInRejection {
    /// The transport status code.
    pub status: StatusCode,
    /// The server's error message.
    pub message: String,
    /// Messages per form field, joined with `", "`. Only fields in
    /// [`SIGN_IN_FIELDS`] that the server complained about are present.
    pub field_errors: BTreeMap<String, String>,
}

/// Outcome of [`AccountClient::refresh_session`].
#[derive(Debug, Clone)]
pub enum Refresh {
    /// The stored token is fresh, either refreshed by this call or by a
    /// concurrent one.
    Refreshed(StoredToken),
    /// The server refused the refresh token.
    Rejected {
        /// The failure body.
        result: ErrorResponse,
        /// The transport status code.
        status: StatusCode,
    },
}

/// Client for the account API with a token store attached.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tessera::cookie::MemoryCookieJar;
/// use tessera::{AccountClient, ApiClient, SignIn, TokenStore};
///
/// # async fn example() -> Result<(), tessera::Error> {
/// let api = ApiClient::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
/// let account = AccountClient::new(api, TokenStore::new(Arc::new(MemoryCookieJar::new())));
///
/// match account.sign_in("ada@example.com", "hunter2").await? {
///     SignIn::Authenticated(user) => println!("Welcome, {}", user.username),
///     SignIn::Rejected(rejection) => {
///         for (field, message) in &rejection.field_errors {
///             println!("{}: {}", field, message);
///         }
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AccountClient {
    api: ApiClient,
    store: TokenStore,
    refresh_lock: Arc<Mutex<()>>,
}

impl AccountClient {
    /// Creates an account client over `api`, persisting sessions in `store`.
    pub fn new(api: ApiClient, store: TokenStore) -> Self {
        Self {
            api,
            store,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying API client.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The token store.
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Exchanges credentials for tokens. Nothing is stored; see
    /// [`sign_in`](Self::sign_in).
    pub async fn login(&self, email: &str, password: &str) -> Result<Envelope<LoginResponse>> {
        let options = RequestOptions::new().with_body(&Credentials { email, password })?;
        self.api.post(LOGIN_PATH, options).await
    }

    /// Creates an account.
    pub async fn register(&self, data: &RegisterRequest) -> Result<Envelope<User>> {
        let options = RequestOptions::new().with_body(data)?;
        self.api.post(REGISTER_PATH, options).await
    }

    /// Confirms an account with the one-time password sent to `email`.
    pub async fn verify_account(&self, email: &str, otp: &str) -> Result<Envelope<User>> {
        let options = RequestOptions::new().with_body(&OneTimePassword { email, otp })?;
        self.api.post(VERIFY_ACCOUNT_PATH, options).await
    }

    /// Asks for a new access token.
    pub async fn refresh_jwt(&self, refresh: &str) -> Result<Envelope<RefreshPayloadResponse>> {
        let options = RequestOptions::new().with_body(&RefreshRequest { refresh })?;
        self.api.post(REFRESH_PATH, options).await
    }

    /// Adds `Authorization: Bearer <access>` to `options`.
    ///
    /// Everything else in `options` is returned unchanged. No refresh is
    /// attempted; an expired token is attached as-is and the server's 401
    /// tells the caller to call [`refresh_session`](Self::refresh_session).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] if no token is stored.
    pub fn authorize(&self, mut options: RequestOptions) -> Result<RequestOptions> {
        let token = self.store.load().ok_or(Error::Unauthenticated)?;
        let value = HeaderValue::from_str(&format!("Bearer {}", token.access))
            .map_err(|e| Error::ConfigurationError(format!("Invalid access token: {}", e)))?;
        options.headers.insert(AUTHORIZATION, value);
        Ok(options)
    }

    /// Logs in and, on success, stores the tokens and user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if the server reports success
    /// without login data, and propagates transport and storage errors.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn> {
        match self.login(email, password).await? {
            Envelope::Success { result, .. } => {
                let login = result.data.ok_or_else(|| {
                    Error::InvalidResponse("login succeeded without tokens".to_string())
                })?;
                let user = self.store.save(&login)?;
                tracing::info!(username = %user.username, "Signed in");
                Ok(SignIn::Authenticated(user))
            }
            Envelope::Failure { result, status } => {
                let field_errors = SIGN_IN_FIELDS
                    .iter()
                    .filter_map(|field| {
                        result
                            .field_message(field)
                            .map(|message| (field.to_string(), message))
                    })
                    .collect();
                Ok(SignIn::Rejected(SignInRejection {
                    status,
                    message: result.error.message,
                    field_errors,
                }))
            }
        }
    }

    /// Forgets the stored session.
    pub fn logout(&self) {
        self.store.clear();
        tracing::info!("Signed out");
    }

    /// The cached user of the current session.
    pub fn current_user(&self) -> Option<User> {
        self.store.user()
    }

    /// Refreshes the access token, at most one refresh at a time.
    ///
    /// Callers that queued behind a refresh which changed the stored token
    /// get that token back without another round trip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] if no token is stored or the
    /// refresh token has expired (the store is cleared in that case), and
    /// [`Error::InvalidResponse`] if the server reports success without a
    /// token.
    pub async fn refresh_session(&self) -> Result<Refresh> {
        let seen = self.store.load().ok_or(Error::Unauthenticated)?;
        let _guard = self.refresh_lock.lock().await;

        let mut current = self.store.load().ok_or(Error::Unauthenticated)?;
        if current.payload() != seen.payload() {
            tracing::debug!("Token already refreshed by a concurrent caller");
            return Ok(Refresh::Refreshed(current));
        }

        if current.is_refresh_expired() {
            tracing::info!("Refresh token expired; clearing session");
            self.store.clear();
            return Err(Error::Unauthenticated);
        }

        match self.refresh_jwt(&current.refresh).await? {
            Envelope::Success { result, .. } => {
                let refreshed = result.data.ok_or_else(|| {
                    Error::InvalidResponse("refresh succeeded without a token".to_string())
                })?;
                current.apply_refresh(&refreshed)?;
                Ok(Refresh::Refreshed(current))
            }
            Envelope::Failure { result, status } => Ok(Refresh::Rejected { result, status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::MemoryCookieJar;
    use crate::models::{JwtPayload, Profile};

    fn account() -> AccountClient {
        let api = ApiClient::builder()
            .base_url("http://localhost:3000")
            .unwrap()
            .build()
            .unwrap();
        AccountClient::new(api, TokenStore::new(Arc::new(MemoryCookieJar::new())))
    }

    fn sign_in_locally(account: &AccountClient) {
        account
            .store()
            .save(&LoginResponse {
                user: User {
                    username: "ada".to_string(),
                    email: "ada@example.com".to_string(),
                    profile: Profile::default(),
                },
                tokens: JwtPayload {
                    access: "access-1".to_string(),
                    refresh: "refresh-1".to_string(),
                    access_expires_at: 60,
                    refresh_expires_at: 120,
                },
            })
            .unwrap();
    }

    #[test]
    fn authorize_without_token_is_unauthenticated() {
        let result = account().authorize(RequestOptions::new());
        assert!(matches!(result, Err(Error::Unauthenticated)));
    }

    #[test]
    fn authorize_adds_bearer_and_keeps_everything_else() {
        let account = account();
        sign_in_locally(&account);

        let original = RequestOptions::new()
            .with_header("x-trace", "1")
            .unwrap()
            .with_param("id", "7")
            .with_query_param("page", "2")
            .with_body(&serde_json::json!({ "k": "v" }))
            .unwrap();

        let authorized = account.authorize(original.clone()).unwrap();
        assert_eq!(authorized.headers.get(AUTHORIZATION).unwrap(), "Bearer access-1");
        assert_eq!(authorized.headers.get("x-trace").unwrap(), "1");
        assert_eq!(authorized.params, original.params);
        assert_eq!(authorized.query, original.query);
        assert_eq!(authorized.body, original.body);
        assert_eq!(authorized.path, original.path);
    }

    #[test]
    fn logout_forgets_user() {
        let account = account();
        sign_in_locally(&account);
        assert_eq!(account.current_user().unwrap().username, "ada");

        account.logout();
        assert!(account.current_user().is_none());
        assert!(account.store().load().is_none());
    }

    #[tokio::test]
    async fn refresh_without_token_is_unauthenticated() {
        let result = account().refresh_session().await;
        assert!(matches!(result, Err(Error::Unauthenticated)));
    }
}
