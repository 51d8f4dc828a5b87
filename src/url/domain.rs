use url::{Host, Url};

/// Second-level suffixes that belong to the registrable suffix rather than the name
const SECOND_LEVEL_SUFFIXES: &[&str] = &["com.cn", "net.cn", "org.cn", "gov.cn"];

/// Maps a URL to the registrable domain used as its rate-limiting key
///
/// Subdomains collapse onto their parent: `www.example.com` and
/// `api.example.com` both become `example.com`. `localhost` and IP literals
/// are returned unchanged, and the Chinese second-level suffixes
/// (`com.cn`, `net.cn`, `org.cn`, `gov.cn`) count as part of the suffix.
///
/// # Returns
///
/// * `Some(String)` - The registrable domain
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_spider::url::registrable_domain;
///
/// let url = Url::parse("https://www.example.com/a").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://news.sina.com.cn/").unwrap();
/// assert_eq!(registrable_domain(&url), Some("sina.com.cn".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Ipv4(_) | Host::Ipv6(_) => url.host_str().map(str::to_string),
        Host::Domain(domain) => Some(registrable_from_host(&domain.to_lowercase())),
    }
}

/// Reduces a lowercase hostname to its registrable part
fn registrable_from_host(host: &str) -> String {
    let host = host.trim_end_matches('.');
    if host == "localhost" {
        return host.to_string();
    }

    let labels: Vec<&str> = host.split('.').collect();
    let keep = if has_second_level_suffix(host) { 3 } else { 2 };

    if labels.len() <= keep {
        host.to_string()
    } else {
        labels[labels.len() - keep..].join(".")
    }
}

fn has_second_level_suffix(host: &str) -> bool {
    SECOND_LEVEL_SUFFIXES
        .iter()
        .any(|suffix| host.ends_with(&format!(".{}", suffix)))
}
