//! URL and header composition for outgoing calls.

use crate::Result;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::collections::HashMap;
use url::Url;

/// Builds the full URL for a call.
///
/// The base URL and path are joined with exactly one slash, `{key}`
/// placeholders are replaced from `params`, the path is given a trailing
/// slash and `query` is appended in order.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`](crate::Error::InvalidUrl) if the joined
/// string is not a valid absolute URL.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
///
/// let params = HashMap::from([("id".to_string(), "7".to_string())]);
/// let query = vec![("expand".to_string(), "profile".to_string())];
///
/// let url = tessera::request::build_url("https://api.example.com/", "/users/{id}", &params, &query)
///     .unwrap();
/// assert_eq!(url.as_str(), "https://api.example.com/users/7/?expand=profile");
/// ```
pub fn build_url(
    base_url: &str,
    path: &str,
    params: &HashMap<String, String>,
    query: &[(String, String)],
) -> Result<Url> {
    let mut joined = substitute(&join_urls(base_url, path), params);

    if !joined.ends_with('/') {
        joined.push('/');
    }

    let mut url = Url::parse(&joined)?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Replaces every `{key}` found in `params` in one left-to-right pass.
/// Substituted values are not scanned again.
fn substitute(template: &str, params: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match tail[1..].find(|c: char| c == '{' || c == '}') {
            Some(end) if tail.as_bytes()[end + 1] == b'}' => {
                let key = &tail[1..end + 1];
                match params.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&tail[..end + 2]),
                }
                rest = &tail[end + 2..];
            }
            _ => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Merges headers for a call.
///
/// Precedence, lowest first: `Content-Type: application/json`, the client's
/// base headers, then the call's own headers. A name present in a higher
/// layer replaces every value of that name from lower layers.
pub fn build_headers(base_headers: &HeaderMap, call_headers: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    overlay(&mut headers, base_headers);
    overlay(&mut headers, call_headers);
    headers
}

fn overlay(target: &mut HeaderMap, source: &HeaderMap) {
    for name in source.keys() {
        target.remove(name);
        for value in source.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}

/// Joins two URL fragments and collapses runs of `/`.
///
/// A run directly after `:` keeps two slashes so the scheme separator of
/// `https://` survives.
pub(crate) fn join_urls(base: &str, path: &str) -> String {
    let joined = format!("{}/{}", base, path);
    let mut out = String::with_capacity(joined.len());
    let mut before_run = None;
    let mut run = 0usize;

    for ch in joined.chars() {
        if ch == '/' {
            let limit = if before_run == Some(':') { 2 } else { 1 };
            if run < limit {
                out.push(ch);
            }
            run += 1;
        } else {
            run = 0;
            before_run = Some(ch);
            out.push(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_params() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn join_yields_single_separator_for_every_slash_combination() {
        for (base, path) in [
            ("http://localhost:3000/api/", "/users"),
            ("http://localhost:3000/api", "users"),
            ("http://localhost:3000/api/", "users"),
            ("http://localhost:3000/api", "/users"),
            ("http://localhost:3000/api//", "//users"),
        ] {
            let url = build_url(base, path, &no_params(), &[]).unwrap();
            assert_eq!(url.as_str(), "http://localhost:3000/api/users/", "{base} + {path}");
        }
    }

    #[test]
    fn scheme_separator_is_preserved() {
        assert_eq!(join_urls("https://host", "a"), "https://host/a");
        assert_eq!(join_urls("https:///host", "a"), "https://host/a");
    }

    #[test]
    fn params_are_substituted() {
        let params = HashMap::from([("id".to_string(), "7".to_string())]);
        let url = build_url("http://localhost:3000", "/users/{id}", &params, &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/users/7/");
    }

    #[test]
    fn every_occurrence_of_a_placeholder_is_substituted() {
        let params = HashMap::from([("id".to_string(), "7".to_string())]);
        let url = build_url("http://localhost:3000", "/{id}/peers/{id}", &params, &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/7/peers/7/");
    }

    #[test]
    fn unknown_placeholders_are_left_in_place() {
        let params = HashMap::from([("id".to_string(), "7".to_string())]);
        let url = build_url("http://localhost:3000", "/users/{id}/{other}", &params, &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/users/7/%7Bother%7D/");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let params = HashMap::from([
            ("a".to_string(), "{b}".to_string()),
            ("b".to_string(), "x".to_string()),
        ]);
        for _ in 0..16 {
            assert_eq!(substitute("/{a}/{b}", &params), "/{b}/x");
        }
        let url = build_url("http://localhost:3000", "/{a}/{b}", &params, &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/%7Bb%7D/x/");
    }

    #[test]
    fn stray_braces_pass_through() {
        let params = HashMap::from([("id".to_string(), "7".to_string())]);
        assert_eq!(substitute("/{x{id}/}", &params), "/{x7/}");
        assert_eq!(substitute("/{", &params), "/{");
    }

    #[test]
    fn query_follows_trailing_slash_in_insertion_order() {
        let query = vec![
            ("z".to_string(), "last letter".to_string()),
            ("a".to_string(), "x&y".to_string()),
        ];
        let url = build_url("http://localhost:3000", "/search", &no_params(), &query).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/search/?z=last+letter&a=x%26y");
    }

    #[test]
    fn invalid_base_url_is_an_error() {
        let result = build_url("", "/users", &no_params(), &[]);
        assert!(matches!(result, Err(crate::Error::InvalidUrl(_))));
    }

    #[test]
    fn header_precedence() {
        let mut base = HeaderMap::new();
        base.insert("x-client", HeaderValue::from_static("base"));
        base.insert("x-shared", HeaderValue::from_static("base"));

        let mut call = HeaderMap::new();
        call.insert("x-shared", HeaderValue::from_static("call"));
        call.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let headers = build_headers(&base, &call);
        assert_eq!(headers.get("x-client").unwrap(), "base");
        assert_eq!(headers.get("x-shared").unwrap(), "call");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(headers.get_all("x-shared").iter().count(), 1);
    }

    #[test]
    fn base_headers_override_default_content_type() {
        let mut base = HeaderMap::new();
        base.insert(CONTENT_TYPE, HeaderValue::from_static("application/vnd.api+json"));

        let headers = build_headers(&base, &HeaderMap::new());
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/vnd.api+json");
    }
}
