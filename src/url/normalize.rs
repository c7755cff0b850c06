use crate::UrlError;
use url::Url;

/// Maximum length, in bytes, of a [`safe_name`] output.
const SAFE_NAME_MAX_LEN: usize = 100;

/// Derives a filesystem-safe name from a URL's host and path: every
/// character outside `[A-Za-z0-9._-]` maps to `_`, capped at 100 characters.
pub fn safe_name(url: &str) -> String {
    let (host, path) = match Url::parse(url) {
        Ok(parsed) => (
            parsed.host_str().unwrap_or("").to_string(),
            parsed.path().to_string(),
        ),
        Err(_) => (String::new(), url.to_string()),
    };

    let combined = format!("{host}{path}");
    let mapped: String = combined
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    mapped.chars().take(SAFE_NAME_MAX_LEN).collect()
}

/// Normalizes a URL for admission: strip fragment, trim a trailing slash
/// (root `/` stays), lower-case the host.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse, or not http(s)
///
/// # Examples
///
/// ```
/// use terraphage::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.com/page/#section").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let Some(host) = url.host_str() else {
        return Err(UrlError::MissingDomain);
    };
    let lowercased = host.to_lowercase();
    url.set_host(Some(&lowercased))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path[..path.len() - 1].to_string();
        url.set_path(&trimmed);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_http_scheme() {
        let result = normalize_url("http://example.com/page").unwrap();
        assert_eq!(result.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_keeps_www_prefix() {
        let result = normalize_url("https://www.example.com/").unwrap();
        assert_eq!(result.as_str(), "https://www.example.com/");
    }

    #[test]
    fn test_remove_trailing_slash() {
        let result = normalize_url("https://example.com/page/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_keep_root_slash() {
        let result = normalize_url("https://example.com/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_keeps_query_params_verbatim() {
        let result = normalize_url("https://example.com/page?utm_source=twitter&b=2&a=1").unwrap();
        assert_eq!(
            result.as_str(),
            "https://example.com/page?utm_source=twitter&b=2&a=1"
        );
    }

    #[test]
    fn test_keeps_dot_segments() {
        let result = normalize_url("https://example.com/a/../b/./c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/a/../b/./c");
    }

    #[test]
    fn test_lowercase_domain() {
        let result = normalize_url("https://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_fragment_and_trailing_slash_together() {
        let result = normalize_url("http://WWW.EXAMPLE.COM/b/?utm_source=test#fragment").unwrap();
        assert_eq!(result.as_str(), "http://www.example.com/b?utm_source=test");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        let result = normalize_url("not a url");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("https://example.com").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_safe_name_maps_unsafe_characters() {
        let name = safe_name("https://example.com/a path/ünïcode?q=1");
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'));
        assert!(name.starts_with("example.com_a_path_"));
    }

    #[test]
    fn test_safe_name_caps_length() {
        let long_path = "a".repeat(500);
        let name = safe_name(&format!("https://example.com/{long_path}"));
        assert_eq!(name.len(), SAFE_NAME_MAX_LEN);
    }
}
