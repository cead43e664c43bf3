//! Document link discovery over rendered pages.
//!
//! Heuristics run in priority order and their results are unioned:
//!
//! 1. anchors whose URL or text looks like a document
//! 2. buttons, `role=button`, inline handlers, and `data-*` URL attributes
//! 3. anchors inside table cells / list items whose text is document-indicative
//! 4. the same search inside same-origin frames
//!
//! Links to configured intermediate-results hosts are followed (bounded depth,
//! visited set keyed by [`normalized_key`]) and their discoveries merged in,
//! tagged with the depth they were found at. Results are deduplicated by
//! scheme, host, and path.

mod heuristics;
pub mod patterns;
mod url_key;

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

pub use heuristics::Heuristic;
pub use patterns::{DiscoveryConfig, DiscoveryRules, MAX_FOLLOW_DEPTH};
pub use url_key::{normalized_key, page_key, without_fragment};

use crate::navigate::{Navigator, Page, PageFetcher, SuccessCheck};
use heuristics::scan_html;

/// One discovered candidate document link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredLink {
    /// Absolute URL with the fragment removed.
    pub url: Url,
    /// Heuristic that found it first.
    pub heuristic: Heuristic,
    /// 0 for the starting page, 1-2 for followed intermediate pages.
    pub depth: u8,
}

/// Applies the discovery heuristics with a fixed rule set.
#[derive(Debug, Clone, Default)]
pub struct Discoverer {
    rules: DiscoveryRules,
}

/// Accumulates unique links in discovery order.
#[derive(Default)]
struct LinkSet {
    seen: HashSet<String>,
    links: Vec<DiscoveredLink>,
}

impl LinkSet {
    fn push(&mut self, url: &Url, heuristic: Heuristic, depth: u8) {
        if self.seen.insert(normalized_key(url)) {
            self.links.push(DiscoveredLink {
                url: without_fragment(url),
                heuristic,
                depth,
            });
        }
    }
}

impl Discoverer {
    /// Creates a discoverer with compiled rules.
    #[must_use]
    pub fn new(rules: DiscoveryRules) -> Self {
        Self { rules }
    }

    /// The compiled rules.
    #[must_use]
    pub fn rules(&self) -> &DiscoveryRules {
        &self.rules
    }

    /// Runs heuristics 1-3 over `page` alone, without fetching frames or onward pages.
    #[must_use]
    pub fn discover_in_page(&self, page: &Page) -> Vec<DiscoveredLink> {
        let scan = scan_html(&page.html, &page.url, &self.rules);
        let mut found = LinkSet::default();
        for (url, heuristic) in &scan.candidates {
            found.push(url, *heuristic, 0);
        }
        found.links
    }

    /// Full discovery: all heuristics, same-origin frames, and bounded
    /// following of intermediate pages. Fetch failures of frames or onward
    /// pages are logged and skipped.
    #[instrument(skip(self, navigator, fetcher, page), fields(url = %page.url))]
    pub async fn discover(
        &self,
        navigator: &Navigator,
        fetcher: &dyn PageFetcher,
        page: &Page,
    ) -> Vec<DiscoveredLink> {
        let max_depth = self.rules.max_depth();
        let mut found = LinkSet::default();
        let mut visited: HashSet<String> = HashSet::from([normalized_key(&page.url)]);
        if page.requested_url != page.url.as_str()
            && let Ok(requested) = Url::parse(&page.requested_url)
        {
            visited.insert(normalized_key(&requested));
        }

        // (page, depth, scanning a frame)
        let mut queue: VecDeque<(Page, u8, bool)> = VecDeque::from([(page.clone(), 0, false)]);
        while let Some((current, depth, in_frame)) = queue.pop_front() {
            let scan = scan_html(&current.html, &current.url, &self.rules);
            for (url, heuristic) in &scan.candidates {
                let heuristic = if in_frame { Heuristic::Frame } else { *heuristic };
                found.push(url, heuristic, depth);
            }

            for frame_url in scan.frames {
                if !visited.insert(normalized_key(&frame_url)) {
                    continue;
                }
                let check = SuccessCheck::on_host(frame_url.host_str().unwrap_or_default())
                    .allow_missing_title();
                match navigator.navigate(fetcher, frame_url.as_str(), &check).await {
                    Ok(frame_page) => queue.push_back((frame_page, depth, true)),
                    Err(error) => warn!(frame = %frame_url, error = %error, "skipping frame"),
                }
            }

            if depth >= max_depth {
                if !scan.onward.is_empty() {
                    debug!(depth, skipped = scan.onward.len(), "depth bound reached; not following");
                }
                continue;
            }
            for onward_url in scan.onward {
                if !visited.insert(normalized_key(&onward_url)) {
                    continue;
                }
                let check = SuccessCheck::on_host(onward_url.host_str().unwrap_or_default());
                match navigator.navigate(fetcher, onward_url.as_str(), &check).await {
                    Ok(onward_page) => {
                        debug!(url = %onward_url, depth = depth + 1, "following intermediate page");
                        queue.push_back((onward_page, depth + 1, false));
                    }
                    Err(error) => warn!(url = %onward_url, error = %error, "skipping intermediate page"),
                }
            }
        }
        debug!(found = found.links.len(), "discovery finished");
        found.links
    }
}

/// Convenience: the URLs of `links` as strings, in order.
#[must_use]
pub fn link_urls(links: &[DiscoveredLink]) -> Vec<String> {
    links.iter().map(|link| link.url.as_str().to_string()).collect()
}
