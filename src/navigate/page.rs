//! Loaded pages and raw payloads returned by a [`PageFetcher`](super::PageFetcher).

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::utils::{collapse_whitespace, compile_static_regex, html_unescape_basic};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<title[^>]*>(.*?)</title>"));

static H1_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<h1[^>]*>(.*?)</h1>"));

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?s)<[^>]*>"));

static ERROR_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"(?i)^\s*(?:404|500|502|503)\b|\b(not found|page not found|p[aá]gina n[aã]o encontrada|erro|error|service unavailable|servi[cç]o indispon[ií]vel|em manuten[cç][aã]o|under maintenance|access denied|acesso negado|forbidden)\b",
    )
});

/// A rendered HTML page after redirects.
#[derive(Debug, Clone)]
pub struct Page {
    /// The URL that was asked for.
    pub requested_url: String,
    /// The URL the page was finally served from.
    pub url: Url,
    /// HTTP status of the final response.
    pub status: u16,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    /// Response body decoded as text.
    pub html: String,
}

impl Page {
    /// Creates a page from its parts.
    #[must_use]
    pub fn new(
        requested_url: impl Into<String>,
        url: Url,
        status: u16,
        content_type: Option<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            requested_url: requested_url.into(),
            url,
            status,
            content_type,
            html: html.into(),
        }
    }

    /// Creates a 200 page served at `url` with the given markup.
    #[must_use]
    pub fn from_html(url: Url, html: impl Into<String>) -> Self {
        Self::new(
            url.as_str().to_string(),
            url,
            200,
            Some("text/html".to_string()),
            html,
        )
    }

    /// Returns the host the page was served from.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Returns the cleaned `<title>` text, if present and non-empty.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        first_text(&TITLE_RE, &self.html)
    }

    /// Returns true when the title or first heading reads like an error or maintenance page.
    #[must_use]
    pub fn looks_like_error_page(&self) -> bool {
        if !(200..300).contains(&self.status) {
            return true;
        }
        let title_hit = self
            .title()
            .is_some_and(|title| ERROR_MARKER_RE.is_match(&title));
        let heading_hit =
            first_text(&H1_RE, &self.html).is_some_and(|heading| ERROR_MARKER_RE.is_match(&heading));
        title_hit || heading_hit
    }
}

fn first_text(regex: &Regex, html: &str) -> Option<String> {
    let raw = regex.captures(html)?.get(1)?.as_str();
    let stripped = TAG_RE.replace_all(raw, " ");
    let text = collapse_whitespace(&html_unescape_basic(&stripped));
    (!text.is_empty()).then_some(text)
}

/// A raw payload fetched for document acquisition.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// The URL that was asked for.
    pub requested_url: String,
    /// The URL the payload was finally served from.
    pub url: Url,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    /// Raw Content-Disposition header, if any.
    pub content_disposition: Option<String>,
    /// Response body.
    pub bytes: Vec<u8>,
}
