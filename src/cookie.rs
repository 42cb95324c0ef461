//! Cookie jars the token store persists into.
//!
//! Two execution contexts hold the same slots. In the client the jar is the
//! process's own cookie store ([`MemoryCookieJar`]). While rendering on the
//! server, the slots arrive in the inbound request's `Cookie` header and any
//! change has to go back out as `Set-Cookie` ([`RequestCookieJar`]). Jars
//! always deal in decoded values; encoding for the header happens here.

use crate::{Error, Result};
use http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// Bytes that may not appear raw in a cookie value, plus `%` itself.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

/// Named string slots.
pub trait CookieJar: Send + Sync {
    /// Returns the value stored under `name`.
    fn get(&self, name: &str) -> Option<String>;

    /// Stores `value` under `name`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the jar cannot hold the value.
    fn set(&self, name: &str, value: &str) -> Result<()>;

    /// Deletes `name`. Deleting a missing slot is not an error.
    fn remove(&self, name: &str);
}

/// In-process cookie jar.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: RwLock<HashMap<String, String>>,
}

impl MemoryCookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders the jar as a `Cookie` request header, e.g. to forward the
    /// client's slots to a server-rendered page.
    pub fn cookie_header(&self) -> Option<HeaderValue> {
        let cookies = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        if cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<String> = cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, encode(value)))
            .collect();
        pairs.sort();
        HeaderValue::from_str(&pairs.join("; ")).ok()
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}

/// Cookie jar over an inbound request.
///
/// Reads come from the request's `Cookie` headers. Writes are visible to
/// later reads on the same jar and are recorded so the response can carry
/// them back with [`set_cookie_headers`](Self::set_cookie_headers).
#[derive(Debug, Default)]
pub struct RequestCookieJar {
    cookies: RwLock<HashMap<String, String>>,
    changes: RwLock<BTreeMap<String, Option<String>>>,
}

impl RequestCookieJar {
    /// Parses every `Cookie` header in `headers`.
    ///
    /// # Examples
    ///
    /// ```
    /// use http::HeaderMap;
    /// use tessera::cookie::{CookieJar, RequestCookieJar};
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("cookie", "theme=dark; user=%7B%22a%22%3A1%7D".parse().unwrap());
    ///
    /// let jar = RequestCookieJar::from_headers(&headers);
    /// assert_eq!(jar.get("theme").as_deref(), Some("dark"));
    /// assert_eq!(jar.get("user").as_deref(), Some(r#"{"a":1}"#));
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                tracing::debug!("Skipping non-ASCII cookie header");
                continue;
            };
            for pair in header.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    cookies.insert(name.trim().to_string(), decode(value.trim()));
                }
            }
        }

        Self {
            cookies: RwLock::new(cookies),
            changes: RwLock::new(BTreeMap::new()),
        }
    }

    /// `Set-Cookie` headers for every slot written or removed through this
    /// jar. Removals expire the cookie immediately.
    pub fn set_cookie_headers(&self) -> Result<HeaderMap> {
        let changes = self.changes.read().unwrap_or_else(PoisonError::into_inner);
        let mut headers = HeaderMap::new();
        for (name, value) in changes.iter() {
            let line = match value {
                Some(value) => format!("{}={}; Path=/", name, encode(value)),
                None => format!("{}=; Path=/; Max-Age=0", name),
            };
            let value = HeaderValue::from_str(&line)
                .map_err(|e| Error::Storage(format!("Invalid Set-Cookie for {}: {}", name, e)))?;
            headers.append(SET_COOKIE, value);
        }
        Ok(headers)
    }
}

impl CookieJar for RequestCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() || name.contains(['=', ';', ' ']) {
            return Err(Error::Storage(format!("Invalid cookie name: {:?}", name)));
        }
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
        self.changes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Some(value.to_string()));
        Ok(())
    }

    fn remove(&self, name: &str) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        self.changes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), None);
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COOKIE_VALUE).to_string()
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
