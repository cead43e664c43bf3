//! URL normalization for deduplication and cycle detection.

use url::Url;

/// Dedup key: lowercase scheme and host plus the path without a trailing slash.
///
/// Fragment and query are ignored, so `a.pdf?v=1#p2` and `a.pdf` share a key.
#[must_use]
pub fn normalized_key(url: &Url) -> String {
    let scheme = url.scheme().to_ascii_lowercase();
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let port = url
        .port()
        .map(|port| format!(":{port}"))
        .unwrap_or_default();
    let path = url.path();
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        ""
    };
    format!("{scheme}://{host}{port}{path}")
}

/// Page identity for listing pagination: [`normalized_key`] plus the query.
///
/// Listings paginate through the query (`?page=1`), so two pages that differ
/// only there are distinct.
#[must_use]
pub fn page_key(url: &Url) -> String {
    let key = normalized_key(url);
    match url.query() {
        Some(query) if !query.is_empty() => format!("{key}?{query}"),
        _ => key,
    }
}

/// Returns `url` with the fragment removed.
#[must_use]
pub fn without_fragment(url: &Url) -> Url {
    let mut cleaned = url.clone();
    cleaned.set_fragment(None);
    cleaned
}
