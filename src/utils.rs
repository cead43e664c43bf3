//! Shared helpers: host normalization, URL joining, static regex/selector
//! construction, and whitespace/entity cleanup for scraped text.

use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use url::Url;

/// Compiles a regex at static init.
///
/// # Panics
///
/// Panics if `pattern` is not a valid regex. Only call it with literal
/// patterns inside `LazyLock` initializers.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Parses a CSS selector at static init.
///
/// # Panics
///
/// Panics if `selector` is not valid CSS. Only call it with literal
/// selectors inside `LazyLock` initializers.
pub fn compile_static_selector(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid static selector '{selector}': {e}"))
}

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

/// Normalizes a host string: trim, strip leading "www.", trailing '.', and lowercases.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Returns true if the two host strings refer to the same host after normalization.
#[must_use]
pub fn hosts_match(lhs: &str, rhs: &str) -> bool {
    canonical_host(lhs) == canonical_host(rhs)
}

/// Returns true if `host` equals `expected` or is a subdomain of it.
#[must_use]
pub fn host_within(host: &str, expected: &str) -> bool {
    let host = canonical_host(host);
    let expected = canonical_host(expected);
    host == expected || host.ends_with(&format!(".{expected}"))
}

/// Resolves a possibly relative URL string against a base URL.
///
/// Returns `None` for empty values, pure fragments, and non-navigable
/// schemes (`javascript:`, `mailto:`, `tel:`, `data:`).
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return None;
    }
    let lower = value.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }
    let joined = if value.starts_with("//") {
        Url::parse(&format!("{}:{value}", base_url.scheme())).ok()?
    } else {
        base_url.join(value).ok()?
    };
    matches!(joined.scheme(), "http" | "https").then_some(joined)
}

/// Collapses runs of whitespace (including non-breaking spaces) into single spaces and trims.
#[must_use]
pub fn collapse_whitespace(value: &str) -> String {
    let replaced = value.replace('\u{a0}', " ");
    WHITESPACE_RE.replace_all(replaced.trim(), " ").into_owned()
}

/// Decodes the handful of HTML entities that survive in attribute values and titles.
#[must_use]
pub fn html_unescape_basic(value: &str) -> String {
    value
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Returns `value` cleaned, or `None` when nothing meaningful remains.
#[must_use]
pub fn non_empty_text(value: &str) -> Option<String> {
    let cleaned = collapse_whitespace(&html_unescape_basic(value));
    let meaningful = cleaned.trim_matches(|c: char| c == '-' || c == ':' || c.is_whitespace());
    (!meaningful.is_empty()).then_some(cleaned)
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Writes `bytes` to `dest` through a sibling temp file and an atomic rename.
///
/// Readers see either the previous file or the complete new one, never a
/// partial write.
///
/// # Errors
///
/// Returns the underlying IO error; `dest` is left untouched on failure.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".harvester-")
        .tempfile_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_write_atomic_replaces_content_and_leaves_no_temp_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("nested").join("catalog.json");
        write_atomic(&dest, b"[1]").unwrap();
        write_atomic(&dest, b"[1,2]").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"[1,2]");
        let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".harvester-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_canonical_host_trim_www_and_trailing_dot_lowercase() {
        assert_eq!(canonical_host("  www.Portugal2030.PT.  "), "portugal2030.pt");
        assert_eq!(canonical_host("fct.pt"), "fct.pt");
    }

    #[test]
    fn test_hosts_match_and_host_within() {
        assert!(hosts_match("www.fct.pt", "fct.pt"));
        assert!(!hosts_match("fct.pt", "ani.pt"));
        assert!(host_within("docs.balcaofundos.gov.pt", "balcaofundos.gov.pt"));
        assert!(!host_within("evilbalcaofundos.gov.pt", "balcaofundos.gov.pt"));
    }

    #[test]
    fn test_absolutize_url_variants() {
        let base = Url::parse("https://example.gov/avisos/").unwrap();
        assert_eq!(
            absolutize_url("doc.pdf", &base).unwrap().as_str(),
            "https://example.gov/avisos/doc.pdf"
        );
        assert_eq!(
            absolutize_url("//cdn.example.gov/a.pdf", &base)
                .unwrap()
                .as_str(),
            "https://cdn.example.gov/a.pdf"
        );
        assert!(absolutize_url("javascript:void(0)", &base).is_none());
        assert!(absolutize_url("mailto:x@example.gov", &base).is_none());
        assert!(absolutize_url("#top", &base).is_none());
        assert!(absolutize_url("   ", &base).is_none());
    }

    #[test]
    fn test_collapse_whitespace_handles_nbsp() {
        assert_eq!(collapse_whitespace("  a\u{a0}\n\t b  "), "a b");
    }

    #[test]
    fn test_non_empty_text() {
        assert_eq!(non_empty_text(" Aviso &amp; Regulamento "), Some("Aviso & Regulamento".to_string()));
        assert_eq!(non_empty_text(" - "), None);
        assert_eq!(non_empty_text(""), None);
    }
}
