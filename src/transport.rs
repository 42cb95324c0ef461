//! The network seam of the client.
//!
//! [`Transport`] is the capability the [`ApiClient`](crate::ApiClient) calls to
//! put a request on the wire. Implementations must return every response the
//! server actually sent, whatever its status, and fail only when no response
//! was obtained. [`ReqwestTransport`] is the stock implementation; tests and
//! non-HTTP environments can supply their own.

use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Headers and body handed to a transport for one call.
#[derive(Debug, Clone, Default)]
pub struct TransportRequest {
    /// Fully merged request headers.
    pub headers: HeaderMap,
    /// JSON body, if the verb carries one.
    pub body: Option<serde_json::Value>,
}

/// A response as seen by the client, independent of the HTTP library used.
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The canonical reason phrase for `status`, when one exists.
    pub status_text: Option<String>,
    /// The raw response body.
    pub body: String,
}

impl NormalizedResponse {
    /// Creates a response, filling `status_text` from the status code.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            status_text: status.canonical_reason().map(str::to_string),
            body: body.into(),
        }
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }

    /// Returns `true` for statuses in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// A transport-level failure.
///
/// `response` is `None` when nothing came back from the server (DNS failure,
/// refused connection, timeout). An adapter that treats some received
/// responses as failures attaches them here, and the client still turns them
/// into a failure envelope.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{message}")]
pub struct TransportError {
    /// Human-readable description from the underlying stack.
    pub message: String,
    /// Status code, if the stack got far enough to see one.
    pub status: Option<StatusCode>,
    /// The response that was received, if any.
    pub response: Option<NormalizedResponse>,
    /// Whether the failure was a timeout.
    pub timeout: bool,
}

impl TransportError {
    /// A failure with no response at all.
    pub fn no_response(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            response: None,
            timeout: false,
        }
    }

    /// A failure that still carries the server's response.
    pub fn with_response(message: impl Into<String>, response: NormalizedResponse) -> Self {
        Self {
            message: message.into(),
            status: Some(response.status),
            response: Some(response),
            timeout: false,
        }
    }

    /// Returns `true` if the request timed out.
    pub fn is_timeout(&self) -> bool {
        self.timeout
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self {
            message: error.to_string(),
            status: error.status(),
            response: None,
            timeout: error.is_timeout(),
        }
    }
}

/// Executes HTTP calls on behalf of the client.
///
/// Only [`execute`](Transport::execute) is required; the per-verb methods
/// delegate to it.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use http::{HeaderMap, Method, StatusCode};
/// use tessera::transport::{NormalizedResponse, Transport, TransportError, TransportRequest};
/// use url::Url;
///
/// struct Offline;
///
/// #[async_trait]
/// impl Transport for Offline {
///     async fn execute(
///         &self,
///         _method: Method,
///         _url: Url,
///         _request: TransportRequest,
///     ) -> Result<NormalizedResponse, TransportError> {
///         Err(TransportError::no_response("offline"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and returns whatever the server answered.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        request: TransportRequest,
    ) -> Result<NormalizedResponse, TransportError>;

    /// Sends a GET request. Any body is ignored.
    async fn get(
        &self,
        url: Url,
        headers: HeaderMap,
    ) -> Result<NormalizedResponse, TransportError> {
        let request = TransportRequest {
            headers,
            body: None,
        };
        self.execute(Method::GET, url, request).await
    }

    /// Sends a POST request.
    async fn post(
        &self,
        url: Url,
        request: TransportRequest,
    ) -> Result<NormalizedResponse, TransportError> {
        self.execute(Method::POST, url, request).await
    }

    /// Sends a PUT request.
    async fn put(
        &self,
        url: Url,
        request: TransportRequest,
    ) -> Result<NormalizedResponse, TransportError> {
        self.execute(Method::PUT, url, request).await
    }

    /// Sends a PATCH request.
    async fn patch(
        &self,
        url: Url,
        request: TransportRequest,
    ) -> Result<NormalizedResponse, TransportError> {
        self.execute(Method::PATCH, url, request).await
    }

    /// Sends a DELETE request. Any body is ignored.
    async fn delete(
        &self,
        url: Url,
        headers: HeaderMap,
    ) -> Result<NormalizedResponse, TransportError> {
        let request = TransportRequest {
            headers,
            body: None,
        };
        self.execute(Method::DELETE, url, request).await
    }
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Creates a transport with no timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built (for
    /// example when the TLS backend fails to initialize).
    pub fn new() -> crate::Result<Self> {
        let http_client = reqwest::Client::builder().build().map_err(|e| {
            crate::Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self::from_client(http_client))
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            timeout: None,
        }
    }

    /// Applies a timeout to every request. An expired request fails with a
    /// [`TransportError`] that carries no response.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        method: Method,
        url: Url,
        request: TransportRequest,
    ) -> Result<NormalizedResponse, TransportError> {
        let mut builder = self.http_client.request(method, url).headers(request.headers);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(NormalizedResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<(Method, Option<serde_json::Value>)>>,
    }

    #[async_trait]
    impl Transport for Recording {
        async fn execute(
            &self,
            method: Method,
            _url: Url,
            request: TransportRequest,
        ) -> Result<NormalizedResponse, TransportError> {
            self.seen.lock().unwrap().push((method, request.body));
            Ok(NormalizedResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), ""))
        }
    }

    #[tokio::test]
    async fn verb_methods_delegate_to_execute() {
        let transport = Recording {
            seen: Mutex::new(Vec::new()),
        };
        let url = Url::parse("http://localhost/").unwrap();
        let body = TransportRequest {
            headers: HeaderMap::new(),
            body: Some(serde_json::json!({ "k": 1 })),
        };

        transport.get(url.clone(), HeaderMap::new()).await.unwrap();
        transport.post(url.clone(), body.clone()).await.unwrap();
        transport.put(url.clone(), body.clone()).await.unwrap();
        transport.patch(url.clone(), body).await.unwrap();
        transport.delete(url, HeaderMap::new()).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        let methods: Vec<&Method> = seen.iter().map(|(m, _)| m).collect();
        assert_eq!(
            methods,
            vec![&Method::GET, &Method::POST, &Method::PUT, &Method::PATCH, &Method::DELETE]
        );
        assert!(seen[0].1.is_none());
        assert!(seen[1].1.is_some());
        assert!(seen[4].1.is_none());
    }

    #[test]
    fn normalized_response_fills_status_text() {
        let response = NormalizedResponse::new(StatusCode::UNAUTHORIZED, HeaderMap::new(), "{}");
        assert_eq!(response.status_text.as_deref(), Some("Unauthorized"));
        assert!(!response.is_success());
    }

    #[test]
    fn with_response_copies_status() {
        let response = NormalizedResponse::new(StatusCode::BAD_GATEWAY, HeaderMap::new(), "");
        let error = TransportError::with_response("upstream", response);
        assert_eq!(error.status, Some(StatusCode::BAD_GATEWAY));
        assert!(!error.is_timeout());
    }
}
