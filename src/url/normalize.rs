use crate::{UrlError, UrlResult};
use url::Url;

/// Validates a task URL before it is admitted to the scheduler
///
/// # Validation Steps
///
/// 1. Trim surrounding whitespace; reject if blank
/// 2. Parse the URL; reject if malformed
/// 3. Require the HTTP or HTTPS scheme
/// 4. Require a host
/// 5. Drop the fragment (it is never sent to the server)
///
/// # Arguments
///
/// * `url_str` - The URL string supplied by the caller
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - The URL is blank or malformed
///
/// # Examples
///
/// ```
/// use sumi_spider::url::parse_task_url;
///
/// let url = parse_task_url("  https://example.com/page#top ").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
///
/// assert!(parse_task_url("   ").is_err());
/// ```
pub fn parse_task_url(url_str: &str) -> UrlResult<Url> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Blank);
    }

    let mut url = Url::parse(trimmed).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    Ok(url)
}
