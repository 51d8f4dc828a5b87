//! URL handling module for Sumi-Spider
//!
//! This module provides task URL validation and the host key resolution
//! that decides which requests share a rate limit.

mod domain;
mod normalize;

use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use domain::registrable_domain;
pub use normalize::parse_task_url;

/// Resolves a host name or a full URL to its rate-limiting key
///
/// Interval overrides may be configured either with a URL
/// (`https://www.example.com/feed`) or a bare host (`www.example.com`);
/// both resolve to the same key as the tasks they are meant to throttle.
///
/// # Arguments
///
/// * `host_or_url` - A bare host name or an absolute URL
///
/// # Returns
///
/// * `Ok(String)` - The registrable domain
/// * `Err(UrlError)` - The input is blank or has no usable host
///
/// # Examples
///
/// ```
/// use sumi_spider::url::rate_limit_key;
///
/// assert_eq!(rate_limit_key("www.example.com").unwrap(), "example.com");
/// assert_eq!(rate_limit_key("https://api.example.com/v1").unwrap(), "example.com");
/// ```
pub fn rate_limit_key(host_or_url: &str) -> UrlResult<String> {
    let trimmed = host_or_url.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Blank);
    }

    let parsed = match Url::parse(trimmed) {
        Ok(url) if url.has_host() => url,
        _ => Url::parse(&format!("http://{}/", trimmed))
            .map_err(|e| UrlError::Parse(e.to_string()))?,
    };

    registrable_domain(&parsed).ok_or(UrlError::MissingDomain)
}
