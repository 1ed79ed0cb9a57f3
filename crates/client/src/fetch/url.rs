//! URL canonicalization for consistent cache keys and origin checks.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a request URL against the application origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative references (`/api/categories`, `reader.html`) against `base`
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(base: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.contains("://") {
        Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else {
        base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Whether `url` is served by the same origin as `base` (scheme, host, port).
pub fn same_origin(base: &Url, url: &Url) -> bool {
    base.origin() == url.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://library.test").unwrap()
    }

    #[test]
    fn test_canonicalize_relative_path() {
        let url = canonicalize(&base(), "/api/categories").unwrap();
        assert_eq!(url.as_str(), "https://library.test/api/categories");
    }

    #[test]
    fn test_canonicalize_relative_and_absolute_agree() {
        let relative = canonicalize(&base(), "/static/app.js").unwrap();
        let absolute = canonicalize(&base(), "https://LIBRARY.test/static/app.js").unwrap();
        assert_eq!(relative, absolute);
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize(&base(), "/pdf-reader.html#page=4").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/pdf-reader.html");
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let url = canonicalize(&base(), "/api/books/search?limit=100&q=a").unwrap();
        assert_eq!(url.query(), Some("limit=100&q=a"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize(&base(), "  /manifest.json  ").unwrap();
        assert_eq!(url.as_str(), "https://library.test/manifest.json");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize(&base(), "file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize(&base(), ""), Err(UrlError::Empty)));
        assert!(matches!(canonicalize(&base(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_same_origin() {
        let own = canonicalize(&base(), "/api/categories").unwrap();
        let foreign = canonicalize(&base(), "https://accounts.example.com/o/oauth2").unwrap();
        let other_port = canonicalize(&base(), "https://library.test:8443/").unwrap();
        assert!(same_origin(&base(), &own));
        assert!(!same_origin(&base(), &foreign));
        assert!(!same_origin(&base(), &other_port));
    }
}
