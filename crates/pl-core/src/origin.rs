//! Origin and page URL host extraction.
//!
//! Only `scheme://host[:port][/path]` is understood.
//! IPv6 literals and userinfo are not understood and come out wrong or rejected.

use crate::models::ClientDomain;

/// Returns the bare host of `url`, or `None` if it does not look like
/// `scheme://host...`.
pub fn host_from_url(url: &str) -> Option<&str> {
    let mut parts = url.split("://");
    let scheme = parts.next()?;
    let rest = parts.next()?;
    if parts.next().is_some() || scheme.is_empty() {
        return None;
    }

    let host_port = rest.split_once('/').map_or(rest, |(head, _)| head);
    let host = host_port.split_once(':').map_or(host_port, |(head, _)| head);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Keeps the URLs whose host is exactly `domain`. Everything else,
/// unparseable URLs included, is dropped without complaint.
pub fn scope_to_domain(domain: &ClientDomain, urls: &[String]) -> Vec<String> {
    urls.iter()
        .filter(|url| host_from_url(url) == Some(domain.domain.as_str()))
        .cloned()
        .collect()
}
