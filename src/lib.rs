//! # Tessera - an account API client with a token lifecycle
//!
//! Tessera calls a remote account API over HTTP and keeps the resulting
//! session tokens. It is built in three layers:
//!
//! - a **request builder** that joins base URL and path, fills `{key}`
//!   placeholders, appends query parameters and merges headers;
//! - a pluggable **transport** ([`transport::Transport`], with a `reqwest`
//!   implementation) that returns every response the server sent;
//! - the **API client**, which turns each answer into an [`Envelope`] tagged
//!   by status code, logs failed calls and redirects on 401.
//!
//! On top sits [`AccountClient`], which stores tokens in a [`TokenStore`]
//! after login, attaches them to authorized calls and refreshes them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera::cookie::MemoryCookieJar;
//! use tessera::{AccountClient, ApiClient, Envelope, SignIn, TokenStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tessera::Error> {
//!     let api = ApiClient::builder()
//!         .base_url("https://api.example.com")?
//!         .build()?;
//!     let account = AccountClient::new(api, TokenStore::new(Arc::new(MemoryCookieJar::new())));
//!
//!     if let SignIn::Authenticated(user) = account.sign_in("ada@example.com", "hunter2").await? {
//!         println!("Signed in as {}", user.username);
//!
//!         let options = account.authorize(Default::default())?;
//!         match account.api().get::<serde_json::Value>("/account/me", options).await? {
//!             Envelope::Success { result, .. } => println!("Me: {:?}", result.data),
//!             Envelope::Failure { result, status } => {
//!                 println!("{}: {}", status, result.error.message)
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Errors versus failures
//!
//! A call that got any response returns `Ok(Envelope)`. Non-2xx responses
//! are [`Envelope::Failure`] values carrying the server's error code,
//! message and per-field validation messages. `Err` is reserved for calls
//! that got no response at all ([`Error::Transport`]), for authorized calls
//! without a stored token ([`Error::Unauthenticated`]) and for malformed
//! success bodies.
//!
//! ## Token storage
//!
//! Tokens live in two cookie slots, [`token::PAYLOAD_KEY`] and
//! [`token::USER_KEY`]. The server sends token lifetimes in seconds; the
//! store turns them into absolute epoch milliseconds when it writes them. A
//! slot that no longer decodes is treated as corrupt: both slots are cleared
//! and the session reads as signed out.

pub mod account;
mod client;
pub mod cookie;
mod error;
pub mod models;
pub mod navigator;
mod options;
pub mod request;
mod response;
pub mod token;
pub mod transport;

pub use account::{AccountClient, Refresh, SignIn, SignInRejection};
pub use client::{ApiClient, ClientBuilder, BASE_URL_ENV};
pub use error::{Error, Result};
pub use models::{JwtPayload, LoginResponse, Profile, RefreshPayloadResponse, RegisterRequest, User};
pub use options::RequestOptions;
pub use response::{Envelope, ErrorDetail, ErrorResponse, FieldError, ServerSideOutcome, SuccessResponse};
pub use token::{StoredToken, TokenStore};
