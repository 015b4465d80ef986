use url::{ParseError, Url};

use crate::error::{LinkError, LinkResult};

const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Check that `raw` is an absolute http(s) URL with a non-empty host.
///
/// Checks run in order: parseable, then scheme, then host.
pub fn validate_url(raw: &str) -> LinkResult<Url> {
    if raw.trim().is_empty() {
        return Err(LinkError::InvalidUrl);
    }

    match Url::parse(raw) {
        Ok(url) => {
            if !ALLOWED_SCHEMES.contains(&url.scheme()) {
                return Err(LinkError::InvalidScheme(url.scheme().to_string()));
            }
            match url.host_str() {
                Some(host) if !host.is_empty() => Ok(url),
                _ => Err(LinkError::InvalidHost),
            }
        }
        // "http://" and friends: the scheme is there but the authority is empty
        Err(ParseError::EmptyHost) => {
            let scheme = raw
                .trim()
                .split_once(':')
                .map(|(scheme, _)| scheme.to_ascii_lowercase())
                .unwrap_or_default();
            if ALLOWED_SCHEMES.contains(&scheme.as_str()) {
                Err(LinkError::InvalidHost)
            } else {
                Err(LinkError::InvalidScheme(scheme))
            }
        }
        Err(_) => Err(LinkError::InvalidUrl),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("https://example.com/path?q=1#frag").is_ok());
        assert!(validate_url("HTTPS://Example.com:8443/").is_ok());
    }

    #[test]
    fn test_rejects_unparseable() {
        assert!(matches!(validate_url("not-a-url"), Err(LinkError::InvalidUrl)));
        assert!(matches!(validate_url(""), Err(LinkError::InvalidUrl)));
        assert!(matches!(validate_url("   "), Err(LinkError::InvalidUrl)));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            validate_url("ftp://host/path"),
            Err(LinkError::InvalidScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            validate_url("javascript:alert(1)"),
            Err(LinkError::InvalidScheme(s)) if s == "javascript"
        ));
        assert!(matches!(validate_url("ftp://"), Err(LinkError::InvalidScheme(_))));
    }

    #[test]
    fn test_rejects_empty_host() {
        assert!(matches!(validate_url("http://"), Err(LinkError::InvalidHost)));
        assert!(matches!(validate_url("https://"), Err(LinkError::InvalidHost)));
    }
}
