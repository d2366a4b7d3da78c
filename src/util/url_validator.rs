use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Reasons an ad-hoc feed URL is refused.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL submitted for a one-off import.
///
/// Only `http` and `https` are accepted. Unless `allow_private` is set,
/// loopback and private-network hosts are refused so the import endpoint
/// cannot be used to reach internal services.
pub fn validate_feed_url(url_str: &str, allow_private: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if allow_private {
        return Ok(url);
    }

    match url.host() {
        Some(url::Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if domain == "localhost" || domain.ends_with(".localhost") {
                return Err(UrlValidationError::Localhost);
            }
        }
        Some(url::Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip))?,
        Some(url::Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip))?,
        None => {}
    }

    Ok(url)
}

fn check_ip(ip: IpAddr) -> Result<(), UrlValidationError> {
    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    let private = match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    };
    if private {
        return Err(UrlValidationError::PrivateIp(ip.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_urls_accepted() {
        assert!(validate_feed_url("https://www.krqe.com/feed/", false).is_ok());
        assert!(validate_feed_url("http://news.example.org:8080/rss", false).is_ok());
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        assert!(matches!(
            validate_feed_url("file:///etc/passwd", true),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_feed_url("ftp://example.com/feed", false),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            validate_feed_url("not a url", false),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_localhost_rejected() {
        assert!(matches!(
            validate_feed_url("http://localhost/feed", false),
            Err(UrlValidationError::Localhost)
        ));
        assert!(matches!(
            validate_feed_url("http://127.0.0.1:9000/feed", false),
            Err(UrlValidationError::Localhost)
        ));
        assert!(matches!(
            validate_feed_url("http://[::1]/feed", false),
            Err(UrlValidationError::Localhost)
        ));
    }

    #[test]
    fn test_private_ranges_rejected() {
        for url in [
            "http://10.0.0.1/feed",
            "http://172.16.0.1/feed",
            "http://192.168.1.1:8080/feed",
            "http://169.254.1.1/feed",
            "http://0.0.0.0/feed",
            "http://[fe80::1]/feed",
            "http://[fd00::1]/feed",
        ] {
            assert!(
                matches!(
                    validate_feed_url(url, false),
                    Err(UrlValidationError::PrivateIp(_))
                ),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_allow_private_accepts_loopback() {
        assert!(validate_feed_url("http://127.0.0.1:9000/feed", true).is_ok());
    }
}
