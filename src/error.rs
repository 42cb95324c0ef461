//! Error types for account API calls.
//!
//! Only failures that leave the caller without a usable server answer are
//! errors. A well-formed non-2xx response is not an error: it comes back as
//! [`Envelope::Failure`](crate::Envelope::Failure).

use crate::transport::TransportError;
use http::StatusCode;

/// The main error type for the crate.
///
/// # Examples
///
/// ```no_run
/// use tessera::{ApiClient, Envelope, Error, RequestOptions};
///
/// # async fn example() -> Result<(), Error> {
/// let client = ApiClient::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/account/me", RequestOptions::new()).await {
///     Ok(Envelope::Success { result, .. }) => println!("Data: {:?}", result.data),
///     Ok(Envelope::Failure { result, status }) => {
///         eprintln!("Rejected ({}): {}", status, result.error.message);
///     }
///     Err(Error::Transport(e)) => eprintln!("No response: {}", e),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The transport produced no response (connection refused, DNS failure,
    /// timeout, ...).
    ///
    /// This is fatal to the calling operation and is never retried by the
    /// client.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// An authorized call was attempted with no stored token.
    #[error("Unauthenticated: no stored access token")]
    Unauthenticated,

    /// A 2xx response body could not be decoded as a success envelope.
    ///
    /// # Fields
    ///
    /// * `raw_response` - The raw response body as a string
    /// * `serde_error` - The error message from serde
    /// * `status` - The HTTP status code of the response
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// The server answered with a success envelope that is missing data the
    /// operation needs.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration was provided, such as a bad header value.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize a request body or a persisted record.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// A cookie jar rejected a write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An invalid URL was provided or produced.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Transport(e) => e.status,
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns `true` if the caller has to send the user back through login.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera::Error;
    ///
    /// assert!(Error::Unauthenticated.is_unauthenticated());
    /// assert!(!Error::InvalidResponse("empty".to_string()).is_unauthenticated());
    /// ```
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Error::Unauthenticated)
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
