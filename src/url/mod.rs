//! URL helpers for pool routing
//!
//! Task pools are keyed by `(priority, protocol, host)`, so the scheduler
//! only ever needs the scheme and host portions of a URL. Everything else
//! about URL handling (normalization, filtering) is an external concern.

use url::Url;

/// Extracts the host from a URL, lowercased
///
/// Returns `None` for URLs without a host component (e.g. `data:` URLs),
/// which the scheduler treats as unroutable.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use kumo::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the protocol (scheme) from a URL, e.g. `"https"`
pub fn extract_protocol(url: &Url) -> String {
    url.scheme().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_host() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_host_lowercases() {
        let url = Url::parse("https://Blog.Example.COM/post").unwrap();
        assert_eq!(extract_host(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_extract_host_ignores_port() {
        let url = Url::parse("http://example.com:8080/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_host_missing() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        assert_eq!(extract_host(&url), None);
    }

    #[test]
    fn test_extract_protocol() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_protocol(&url), "https");

        let url = Url::parse("http://example.com/").unwrap();
        assert_eq!(extract_protocol(&url), "http");
    }
}
