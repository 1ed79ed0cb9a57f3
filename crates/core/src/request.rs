//! Request descriptors.
//!
//! A [`RequestDescriptor`] is what the host hands to the layer for every
//! intercepted request. Only the method and URL take part in cache identity;
//! headers travel with the request to the network and, minus credentials, are
//! persisted next to the stored response.

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};

use crate::Error;

/// An outbound request as seen by the interception boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// HTTP method, upper-cased.
    pub method: String,
    /// Absolute URL, or a path relative to the configured origin.
    pub url: String,
    pub headers: HeaderMap,
}

impl RequestDescriptor {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self { method: method.to_ascii_uppercase(), url: url.into(), headers: HeaderMap::new() }
    }

    /// Shorthand for a `GET` without headers.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Append a header, keeping any existing values for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Append a header given as untyped text, e.g. from tool parameters.
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` if the name or value is not a legal header.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid header name {name:?}: {e}")))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| Error::InvalidInput(format!("invalid value for {name}: {e}")))?;
        Ok(self.with_header(name, value))
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn accept(&self) -> Option<&str> {
        self.headers.get(ACCEPT).and_then(|v| v.to_str().ok())
    }

    /// Headers safe to persist next to a snapshot: the credential is removed.
    pub fn persistable_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.remove(AUTHORIZATION);
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistable_headers_strip_credentials() {
        let req = RequestDescriptor::get("/api/categories")
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer secret-token"))
            .with_header(ACCEPT, HeaderValue::from_static("application/json"));

        let stored = req.persistable_headers();
        assert!(!stored.contains_key(AUTHORIZATION));
        assert_eq!(stored.get(ACCEPT).unwrap(), "application/json");
        // the descriptor itself still carries the credential for the network fetch
        assert_eq!(req.headers.get(AUTHORIZATION).unwrap(), "Bearer secret-token");
    }

    #[test]
    fn test_try_header_is_case_insensitive() {
        let req = RequestDescriptor::get("/")
            .try_header("Accept", "text/html")
            .unwrap();
        assert_eq!(req.accept(), Some("text/html"));
    }

    #[test]
    fn test_try_header_rejects_illegal() {
        assert!(matches!(RequestDescriptor::get("/").try_header("bad name", "x"), Err(Error::InvalidInput(_))));
        assert!(matches!(RequestDescriptor::get("/").try_header("x-a", "line\nbreak"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_repeated_headers_kept() {
        let req = RequestDescriptor::get("/")
            .try_header("x-tag", "a")
            .and_then(|r| r.try_header("X-Tag", "b"))
            .unwrap();
        assert_eq!(req.headers.get_all("x-tag").iter().count(), 2);
    }

    #[test]
    fn test_method_normalized() {
        let req = RequestDescriptor::new("post", "/api/login");
        assert_eq!(req.method, "POST");
        assert!(!req.is_get());
        assert!(RequestDescriptor::get("/").is_get());
    }
}
