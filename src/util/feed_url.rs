use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

/// Reasons a feed URL is refused.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("Localhost not allowed")]
    Localhost,
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
}

/// Parses a feed URL and rejects anything that would make the fetch service
/// request an internal address.
///
/// Accepts `http`/`https` URLs whose host is a domain name other than
/// `localhost`, or a public IP address.
///
/// # Examples
///
/// ```
/// use feedwell::util::validate_url;
///
/// assert!(validate_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://10.1.2.3/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }

    match url.host() {
        None => return Err(UrlValidationError::MissingHost),
        Some(Host::Domain(domain)) => {
            if domain.eq_ignore_ascii_case("localhost") {
                return Err(UrlValidationError::Localhost);
            }
        }
        Some(Host::Ipv4(ip)) => check_ipv4(ip)?,
        Some(Host::Ipv6(ip)) => check_ipv6(ip)?,
    }

    Ok(url)
}

fn check_ipv4(ip: Ipv4Addr) -> Result<(), UrlValidationError> {
    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    if ip.is_private() || ip.is_link_local() || ip.is_unspecified() {
        return Err(UrlValidationError::PrivateIp(ip.to_string()));
    }
    Ok(())
}

fn check_ipv6(ip: Ipv6Addr) -> Result<(), UrlValidationError> {
    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00; // fc00::/7
    let link_local = (first & 0xffc0) == 0xfe80; // fe80::/10
    if ip.is_unspecified() || unique_local || link_local {
        return Err(UrlValidationError::PrivateIp(ip.to_string()));
    }
    if let Some(v4) = ip.to_ipv4_mapped() {
        return check_ipv4(v4);
    }
    Ok(())
}
