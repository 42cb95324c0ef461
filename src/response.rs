//! Server envelopes and the tagged result every client call returns.
//!
//! The account API wraps every payload in a small envelope. [`Envelope`] adds
//! the transport status on top and tags the outcome by status code alone: a
//! 2xx answer is [`Envelope::Success`] even if its body says
//! `"success": false`.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name to the validation messages reported for it.
pub type FieldError = BTreeMap<String, Vec<String>>;

/// Body of a successful call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    /// The server's own success flag. Not used for classification.
    #[serde(default)]
    pub success: bool,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// The payload, if any.
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    /// The path the server resolved.
    #[serde(default)]
    pub path: String,
}

/// Error code and message reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Numeric error code, usually the HTTP status.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
}

/// Body of a failed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false` for well-behaved servers.
    #[serde(default)]
    pub success: bool,
    /// What went wrong.
    pub error: ErrorDetail,
    /// Per-field validation messages, for form submissions.
    #[serde(default)]
    pub data: Option<FieldError>,
    /// The path the server resolved.
    #[serde(default)]
    pub path: String,
}

impl ErrorResponse {
    /// Builds a failure body for a response that did not carry one.
    pub(crate) fn synthesize(status: StatusCode, path: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: i64::from(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            },
            data: None,
            path: path.into(),
        }
    }

    /// Returns the messages for `field`, joined with `", "`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera::ErrorResponse;
    ///
    /// let body: ErrorResponse = serde_json::from_str(r#"{
    ///     "success": false,
    ///     "error": { "code": 400, "message": "Invalid input" },
    ///     "data": { "email": ["Required", "Must be an email"] },
    ///     "path": "/account/login"
    /// }"#).unwrap();
    ///
    /// assert_eq!(body.field_message("email").as_deref(), Some("Required, Must be an email"));
    /// assert_eq!(body.field_message("password"), None);
    /// ```
    pub fn field_message(&self, field: &str) -> Option<String> {
        let messages = self.data.as_ref()?.get(field)?;
        if messages.is_empty() {
            return None;
        }
        Some(messages.join(", "))
    }
}

/// The outcome of a call that got a response.
///
/// # Examples
///
/// ```no_run
/// use tessera::{ApiClient, Envelope, RequestOptions};
///
/// # async fn example() -> Result<(), tessera::Error> {
/// let client = ApiClient::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/health", RequestOptions::new()).await? {
///     Envelope::Success { result, status } => println!("{}: {}", status, result.message),
///     Envelope::Failure { result, status } => println!("{}: {}", status, result.error.message),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    /// The server answered with a 2xx status.
    Success {
        /// The decoded success body.
        result: SuccessResponse<T>,
        /// The transport status code.
        status: StatusCode,
    },
    /// The server answered with any other status.
    Failure {
        /// The decoded, or synthesized, failure body.
        result: ErrorResponse,
        /// The transport status code.
        status: StatusCode,
    },
}

impl<T> Envelope<T> {
    /// Returns `true` for [`Envelope::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    /// The transport status code.
    pub fn status(&self) -> StatusCode {
        match self {
            Envelope::Success { status, .. } | Envelope::Failure { status, .. } => *status,
        }
    }

    /// The payload of a success envelope.
    pub fn data(&self) -> Option<&T> {
        match self {
            Envelope::Success { result, .. } => result.data.as_ref(),
            Envelope::Failure { .. } => None,
        }
    }

    /// Consumes the envelope, returning the payload of a success envelope.
    pub fn into_data(self) -> Option<T> {
        match self {
            Envelope::Success { result, .. } => result.data,
            Envelope::Failure { .. } => None,
        }
    }

    /// The failure body of a failure envelope.
    pub fn error(&self) -> Option<&ErrorResponse> {
        match self {
            Envelope::Success { .. } => None,
            Envelope::Failure { result, .. } => Some(result),
        }
    }

    /// Maps the success payload, keeping status and envelope fields.
    pub fn map<U, F>(self, f: F) -> Envelope<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Envelope::Success { result, status } => Envelope::Success {
                result: SuccessResponse {
                    success: result.success,
                    message: result.message,
                    data: result.data.map(f),
                    path: result.path,
                },
                status,
            },
            Envelope::Failure { result, status } => Envelope::Failure { result, status },
        }
    }

    /// What a server-rendered page should do with this outcome.
    ///
    /// Success needs nothing. A 401 sends the browser back to
    /// `request_url`, where the page can re-check credentials; every other
    /// failure renders as not found.
    pub fn server_side_outcome(&self, request_url: &str) -> Option<ServerSideOutcome> {
        match self {
            Envelope::Success { .. } => None,
            Envelope::Failure { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                Some(ServerSideOutcome::Redirect {
                    destination: request_url.to_string(),
                })
            }
            Envelope::Failure { .. } => Some(ServerSideOutcome::NotFound),
        }
    }
}

/// Instruction for a server-rendered page after a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerSideOutcome {
    /// Redirect the browser.
    Redirect {
        /// Where to send it.
        destination: String,
    },
    /// Render a not-found page.
    NotFound,
}
