//! Verb-level API client that normalizes every answer into an [`Envelope`].
//!
//! The [`ApiClient`] type is the main entry point for making requests.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    navigator::{Navigator, NoopNavigator, LOGIN_ROUTE},
    request::{build_headers, build_url},
    response::{Envelope, ErrorResponse, SuccessResponse},
    transport::{NormalizedResponse, ReqwestTransport, Transport, TransportRequest},
    Error, RequestOptions, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Environment variable read by [`ClientBuilder::from_env`].
pub const BASE_URL_ENV: &str = "TESSERA_BASE_URL";

/// An HTTP client for the account API.
///
/// Each call returns `Ok(Envelope)` whenever the server answered, whatever
/// the status, and `Err` only when no answer was obtained. The client is a
/// cheap handle; clone it freely.
///
/// # Examples
///
/// ```no_run
/// use tessera::{ApiClient, Envelope, RequestOptions};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     username: String,
/// }
///
/// # async fn example() -> Result<(), tessera::Error> {
/// let client = ApiClient::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let options = RequestOptions::new().with_param("id", "7");
/// if let Envelope::Success { result, .. } = client.get::<User>("/users/{id}", options).await? {
///     if let Some(user) = result.data {
///         println!("User: {}", user.username);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: String,
    base_headers: HeaderMap,
    navigator: Arc<dyn Navigator>,
    login_route: String,
}

impl ApiClient {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The headers sent with every call.
    pub fn base_headers(&self) -> &HeaderMap {
        &self.inner.base_headers
    }

    /// Makes a request and normalizes the answer.
    ///
    /// `path` is recorded into `options.path` before anything else happens.
    /// Bodies are only sent for POST, PUT and PATCH.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidUrl`] if the URL cannot be built.
    /// * [`Error::Transport`] if no response was obtained.
    /// * [`Error::DeserializationFailed`] if a non-empty 2xx body is not a success
    ///   envelope for `T`.
    pub async fn call<T>(
        &self,
        method: Method,
        path: &str,
        mut options: RequestOptions,
    ) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        options.path = Some(path.to_string());

        let url = build_url(&self.inner.base_url, path, &options.params, &options.query)?;
        let headers = build_headers(&self.inner.base_headers, &options.headers);

        tracing::debug!(
            method = %method,
            url = %url,
            "Executing HTTP request"
        );

        let request = TransportRequest {
            headers,
            body: if carries_body(&method) {
                options.body.take()
            } else {
                None
            },
        };

        let start_time = Instant::now();
        let outcome = self
            .inner
            .transport
            .execute(method.clone(), url.clone(), request)
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(mut e) => match e.response.take() {
                Some(response) => response,
                None => {
                    self.log_failure(&method, &options, &url, None);
                    tracing::error!(
                        error = %e,
                        timeout = e.is_timeout(),
                        "No response from server"
                    );
                    return Err(Error::Transport(e));
                }
            },
        };

        tracing::info!(
            status = response.status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "Received HTTP response"
        );

        self.resolve(response, &method, &options, &url)
    }

    /// Reduces a received response to an envelope.
    fn resolve<T>(
        &self,
        response: NormalizedResponse,
        method: &Method,
        options: &RequestOptions,
        url: &Url,
    ) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        let status = response.status;

        if response.is_success() {
            if response.body.trim().is_empty() {
                let result = SuccessResponse {
                    success: true,
                    message: String::new(),
                    data: None,
                    path: options.path.clone().unwrap_or_default(),
                };
                return Ok(Envelope::Success { result, status });
            }

            return match response.json::<SuccessResponse<T>>() {
                Ok(result) => Ok(Envelope::Success { result, status }),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        status = status.as_u16(),
                        "Failed to deserialize response"
                    );
                    Err(Error::DeserializationFailed {
                        raw_response: response.body,
                        serde_error: e.to_string(),
                        status,
                    })
                }
            };
        }

        self.log_failure(method, options, url, Some(status));
        if status == StatusCode::UNAUTHORIZED {
            self.inner.navigator.redirect(&self.inner.login_route);
        }

        let path = options.path.as_deref().unwrap_or_default();
        let result = response
            .json::<ErrorResponse>()
            .unwrap_or_else(|_| ErrorResponse::synthesize(status, path));

        Ok(Envelope::Failure { result, status })
    }

    /// Logs the request context of a failed call. Bodies, headers and query
    /// values are left out since they can carry credentials; query keys are
    /// logged on their own.
    fn log_failure(
        &self,
        method: &Method,
        options: &RequestOptions,
        url: &Url,
        status: Option<StatusCode>,
    ) {
        let params: Vec<&str> = options.params.keys().map(String::as_str).collect();
        let query: Vec<&str> = options.query.iter().map(|(k, _)| k.as_str()).collect();

        tracing::warn!(
            method = %method,
            path = options.path.as_deref().unwrap_or_default(),
            url = %without_query(url),
            status = status.map(|s| s.as_u16()),
            params = ?params,
            query = ?query,
            "Request failed"
        );
    }

    /// Makes a GET request.
    pub async fn get<T>(&self, path: &str, options: RequestOptions) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        self.call(Method::GET, path, options).await
    }

    /// Makes a POST request with `options.body` as JSON.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tessera::{ApiClient, RequestOptions};
    /// use serde_json::json;
    ///
    /// # async fn example() -> Result<(), tessera::Error> {
    /// let client = ApiClient::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let options = RequestOptions::new().with_body(&json!({ "email": "a@b.c" }))?;
    /// let envelope = client.post::<serde_json::Value>("/account/password-reset", options).await?;
    /// println!("Accepted: {}", envelope.is_success());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn post<T>(&self, path: &str, options: RequestOptions) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        self.call(Method::POST, path, options).await
    }

    /// Makes a PUT request with `options.body` as JSON.
    pub async fn put<T>(&self, path: &str, options: RequestOptions) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        self.call(Method::PUT, path, options).await
    }

    /// Makes a PATCH request with `options.body` as JSON.
    pub async fn patch<T>(&self, path: &str, options: RequestOptions) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        self.call(Method::PATCH, path, options).await
    }

    /// Makes a DELETE request. Body and query are not sent.
    pub async fn delete<T>(&self, path: &str, mut options: RequestOptions) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        options.query.clear();
        self.call(Method::DELETE, path, options).await
    }
}

fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Builder for configuring and creating an [`ApiClient`].
///
/// # Examples
///
/// ```no_run
/// use tessera::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), tessera::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .default_header("User-Agent", "my-app/1.0")?
///     .login_route("/signin")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
    navigator: Option<Arc<dyn Navigator>>,
    login_route: String,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            timeout: None,
            transport: None,
            navigator: None,
            login_route: LOGIN_ROUTE.to_string(),
        }
    }

    /// Creates a builder with the base URL taken from [`BASE_URL_ENV`].
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or not a valid URL.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(BASE_URL_ENV).map_err(|e| {
            Error::ConfigurationError(format!("{} is not available: {}", BASE_URL_ENV, e))
        })?;
        Self::new().base_url(base_url)
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the request timeout of the default transport.
    ///
    /// Ignored when a custom transport is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Uses a custom transport instead of [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the navigator invoked on 401 responses.
    ///
    /// Defaults to [`NoopNavigator`].
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Sets the route handed to the navigator on 401 responses.
    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Builds the configured `ApiClient`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the default
    /// transport cannot be created.
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let mut transport = ReqwestTransport::new()?;
                if let Some(timeout) = self.timeout {
                    transport = transport.with_timeout(timeout);
                }
                Arc::new(transport)
            }
        };

        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(NoopNavigator));

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                transport,
                base_url: base_url.to_string(),
                base_headers: self.default_headers,
                navigator,
                login_route: self.login_route,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The URL with its query string and fragment stripped.
fn without_query(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url
}
