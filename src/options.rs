//! Per-call request options.

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::collections::HashMap;

/// Everything a single API call can customize.
///
/// Options are built per call and consumed by it. `path` is filled in by the
/// client when the call is made, so logs of a failed request carry the
/// endpoint that was intended.
///
/// # Examples
///
/// ```
/// use tessera::RequestOptions;
///
/// let options = RequestOptions::new()
///     .with_param("id", "7")
///     .with_query_param("expand", "profile")
///     .with_header("X-Request-Id", "abc")
///     .unwrap();
///
/// assert_eq!(options.params.get("id").map(String::as_str), Some("7"));
/// assert_eq!(options.query, vec![("expand".to_string(), "profile".to_string())]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// The endpoint path this call targets, relative to the base URL.
    pub path: Option<String>,

    /// Headers for this call only. These win over the client's base headers.
    pub headers: HeaderMap,

    /// JSON request body.
    pub body: Option<serde_json::Value>,

    /// Query parameters, appended in insertion order.
    pub query: Vec<(String, String)>,

    /// Values substituted into `{key}` placeholders of the path.
    pub params: HashMap<String, String>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be represented as JSON.
    pub fn with_body<B: Serialize>(mut self, body: &B) -> Result<Self, crate::Error> {
        let value = serde_json::to_value(body)
            .map_err(|e| crate::Error::SerializationFailed(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Appends a query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends multiple query parameters, keeping their order.
    pub fn with_query_params(
        mut self,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.query.extend(params);
        self
    }

    /// Sets the value for a `{key}` path placeholder.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_keep_insertion_order() {
        let options = RequestOptions::new()
            .with_query_param("b", "2")
            .with_query_param("a", "1")
            .with_query_params(vec![("c".to_string(), "3".to_string())]);

        let keys: Vec<&str> = options.query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn invalid_header_is_a_configuration_error() {
        let result = RequestOptions::new().with_header("bad header", "x");
        assert!(matches!(result, Err(crate::Error::ConfigurationError(_))));
    }

    #[test]
    fn body_is_stored_as_json() {
        #[derive(Serialize)]
        struct Credentials<'a> {
            email: &'a str,
        }

        let options = RequestOptions::new()
            .with_body(&Credentials { email: "a@b.c" })
            .unwrap();
        assert_eq!(options.body, Some(serde_json::json!({ "email": "a@b.c" })));
    }
}
