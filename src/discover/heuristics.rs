//! Synchronous link heuristics over one HTML document.
//!
//! `scraper::Html` is not `Send`, so parsing happens entirely inside
//! [`scan_html`] and only owned URLs leave it.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

use super::patterns::{DiscoveryRules, MAX_CONTAINER_TEXT_CHARS};
use crate::utils::{
    absolutize_url, collapse_whitespace, compile_static_regex, compile_static_selector, hosts_match,
};

/// Onward links followed per page, at most.
const MAX_ONWARD_LINKS_PER_PAGE: usize = 10;

/// Attributes that carry a target URL on script-driven controls.
const URL_ATTRIBUTES: &[&str] = &[
    "data-href",
    "data-url",
    "data-file",
    "data-download",
    "data-link",
    "formaction",
];

static BASE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("base[href]"));
static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a[href]"));
static CONTROL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    compile_static_selector(
        "button, [role=button], input[type=button], input[type=submit], [onclick], \
         [data-href], [data-url], [data-file], [data-download], [data-link], [formaction]",
    )
});
static CONTAINER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("td, li"));
static FRAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("iframe[src], frame[src]"));

/// Quoted string literals inside inline handlers (`window.open('...')`, `location.href="..."`).
static QUOTED_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"['"]([^'"\s]{2,})['"]"#));

/// Which heuristic produced a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// `<a href>` with document-like URL or text.
    Anchor,
    /// Button/role=button/inline handler/data attribute.
    Control,
    /// Anchor inside a document-indicative table cell or list item.
    Container,
    /// Found inside a same-origin frame.
    Frame,
}

/// Owned result of scanning one document.
#[derive(Debug, Default)]
pub(crate) struct PageScan {
    /// Candidate document URLs in heuristic priority order.
    pub candidates: Vec<(Url, Heuristic)>,
    /// Same-origin frame sources to fetch and scan.
    pub frames: Vec<Url>,
    /// Intermediate-host pages to follow.
    pub onward: Vec<Url>,
}

/// Runs every heuristic over `html` served at `page_url`.
pub(crate) fn scan_html(html: &str, page_url: &Url, rules: &DiscoveryRules) -> PageScan {
    let document = Html::parse_document(html);
    let base = document
        .select(&BASE_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| absolutize_url(href, page_url))
        .unwrap_or_else(|| page_url.clone());

    let mut scan = PageScan::default();
    scan_anchors(&document, &base, page_url, rules, &mut scan);
    scan_controls(&document, &base, rules, &mut scan);
    scan_containers(&document, &base, rules, &mut scan);
    scan.frames = document
        .select(&FRAME_SELECTOR)
        .filter_map(|el| el.value().attr("src"))
        .filter_map(|src| absolutize_url(src, &base))
        .filter(|url| url.origin() == page_url.origin())
        .collect();
    scan
}

fn element_text(element: &ElementRef<'_>) -> String {
    let mut text = element.text().collect::<Vec<_>>().join(" ");
    for attr in ["title", "aria-label", "value", "download"] {
        if let Some(value) = element.value().attr(attr) {
            text.push(' ');
            text.push_str(value);
        }
    }
    collapse_whitespace(&text)
}

fn scan_anchors(
    document: &Html,
    base: &Url,
    page_url: &Url,
    rules: &DiscoveryRules,
    scan: &mut PageScan,
) {
    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| absolutize_url(href, base))
        else {
            continue;
        };
        if rules.is_denied(&url) {
            continue;
        }
        let text = element_text(&anchor);
        let document_url = rules.is_document_url(&url);
        if rules.is_intermediate(&url) && !document_url {
            let crosses_host = !hosts_match(
                url.host_str().unwrap_or_default(),
                page_url.host_str().unwrap_or_default(),
            );
            if (crosses_host || rules.is_indicative_text(&text))
                && scan.onward.len() < MAX_ONWARD_LINKS_PER_PAGE
            {
                scan.onward.push(url);
            }
            continue;
        }
        if document_url || rules.is_indicative_text(&text) {
            scan.candidates.push((url, Heuristic::Anchor));
        }
    }
}

fn scan_controls(document: &Html, base: &Url, rules: &DiscoveryRules, scan: &mut PageScan) {
    for control in document.select(&CONTROL_SELECTOR) {
        let element = control.value();
        let mut raw_targets: Vec<&str> = URL_ATTRIBUTES
            .iter()
            .filter_map(|attr| element.attr(attr))
            .collect();
        if element.name() != "a"
            && let Some(href) = element.attr("href")
        {
            raw_targets.push(href);
        }
        if let Some(handler) = element.attr("onclick") {
            raw_targets.extend(
                QUOTED_LITERAL_RE
                    .captures_iter(handler)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str())
                    .filter(|literal| looks_like_url_literal(literal)),
            );
        }
        if raw_targets.is_empty() {
            continue;
        }
        let text = element_text(&control);
        let indicative = rules.is_indicative_text(&text);
        for raw in raw_targets {
            let Some(url) = absolutize_url(raw, base) else {
                continue;
            };
            if rules.is_denied(&url) {
                continue;
            }
            if indicative || rules.is_document_url(&url) {
                scan.candidates.push((url, Heuristic::Control));
            }
        }
    }
}

fn looks_like_url_literal(literal: &str) -> bool {
    literal.starts_with("http://")
        || literal.starts_with("https://")
        || literal.starts_with('/')
        || literal.starts_with("./")
        || literal.starts_with("../")
        || (literal.contains('/') && literal.contains('.'))
        || literal
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && (2..=4).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()) && !stem.contains('('))
}

fn scan_containers(document: &Html, base: &Url, rules: &DiscoveryRules, scan: &mut PageScan) {
    for container in document.select(&CONTAINER_SELECTOR) {
        let text = collapse_whitespace(&container.text().collect::<Vec<_>>().join(" "));
        if text.chars().count() > MAX_CONTAINER_TEXT_CHARS || !rules.is_indicative_text(&text) {
            continue;
        }
        for anchor in container.select(&ANCHOR_SELECTOR) {
            let Some(url) = anchor
                .value()
                .attr("href")
                .and_then(|href| absolutize_url(href, base))
            else {
                continue;
            };
            if rules.is_denied(&url) || rules.is_intermediate(&url) {
                continue;
            }
            scan.candidates.push((url, Heuristic::Container));
        }
    }
}
