//! Shared engine handles passed to every adapter run.

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::identity::admit;
use crate::catalog::{CallRecord, call_slug, identity_key};
use crate::discover::{Discoverer, normalized_key};
use crate::document::{AcquisitionTarget, DocumentAcquirer};
use crate::navigate::{NavigationError, Navigator, Page, PageFetcher, SessionOptions, SuccessCheck};

/// Per-adapter counters reported in the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdapterStats {
    /// Listing entries enumerated.
    pub listings_seen: usize,
    /// Records returned to the orchestrator.
    pub records_emitted: usize,
    /// Listing entries skipped because extraction or navigation failed.
    pub records_failed: usize,
    /// Candidate document links found.
    pub documents_discovered: usize,
    /// Documents attached to records (new or reused).
    pub documents_acquired: usize,
    /// Attached documents whose content was already stored.
    pub documents_reused: usize,
    /// Candidate links that could not be acquired.
    pub documents_failed: usize,
}

/// Engine services an adapter uses while it runs.
///
/// The adapter brings its own [`PageFetcher`] (its session); everything else
/// is shared across adapters and owned by the orchestrator.
pub struct AdapterContext<'a> {
    /// Retrying navigator.
    pub navigator: &'a Navigator,
    /// Link discoverer.
    pub discoverer: &'a Discoverer,
    /// Options for the sessions adapters open.
    pub session_options: &'a SessionOptions,
    acquirer: &'a mut DocumentAcquirer,
    stats: AdapterStats,
}

impl<'a> AdapterContext<'a> {
    /// Creates a context with zeroed counters.
    pub fn new(
        navigator: &'a Navigator,
        discoverer: &'a Discoverer,
        acquirer: &'a mut DocumentAcquirer,
        session_options: &'a SessionOptions,
    ) -> Self {
        Self {
            navigator,
            discoverer,
            session_options,
            acquirer,
            stats: AdapterStats::default(),
        }
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    /// Consumes the context, returning its counters.
    #[must_use]
    pub fn into_stats(self) -> AdapterStats {
        self.stats
    }

    /// Loads `url` and requires it to stay on the same host and carry a title.
    ///
    /// # Errors
    ///
    /// Returns the navigator's error once retries are exhausted.
    pub async fn load_page(
        &self,
        fetcher: &dyn PageFetcher,
        url: &str,
    ) -> Result<Page, NavigationError> {
        let host = url::Url::parse(url)
            .map_err(|_| NavigationError::invalid_url(url))?
            .host_str()
            .unwrap_or_default()
            .to_string();
        self.navigator
            .navigate(fetcher, url, &SuccessCheck::on_host(host))
            .await
    }

    /// Counts one enumerated listing entry.
    pub fn listing_seen(&mut self) {
        self.stats.listings_seen += 1;
    }

    /// Counts and logs one skipped listing entry.
    pub fn record_failed(&mut self, site_id: &str, entry: &str, reason: &dyn std::fmt::Display) {
        self.stats.records_failed += 1;
        warn!(site = site_id, entry, error = %reason, "skipping listing entry");
    }

    /// Counts records handed back to the orchestrator.
    pub fn records_emitted(&mut self, count: usize) {
        self.stats.records_emitted += count;
    }

    /// Discovers document links on `pages` and acquires them into `record`.
    ///
    /// Links are unioned across pages in page order, leaving out the pages
    /// themselves and the record's landing URL. Records that will be
    /// rejected at consolidation are not downloaded for.
    pub async fn attach_documents(
        &mut self,
        fetcher: &dyn PageFetcher,
        record: &mut CallRecord,
        pages: &[&Page],
    ) {
        if let Err(rejection) = admit(record) {
            debug!(site = %record.site_id, title = %record.title, ?rejection, "not acquiring documents for rejected record");
            return;
        }

        // The record's own pages are never documents of it.
        let mut seen: std::collections::HashSet<String> =
            pages.iter().map(|page| normalized_key(&page.url)).collect();
        if let Some(landing) = record
            .landing_url
            .as_deref()
            .and_then(|url| url::Url::parse(url).ok())
        {
            seen.insert(normalized_key(&landing));
        }
        let mut urls: Vec<String> = Vec::new();
        for page in pages {
            for link in self.discoverer.discover(self.navigator, fetcher, page).await {
                if seen.insert(normalized_key(&link.url)) {
                    urls.push(link.url.as_str().to_string());
                }
            }
        }
        self.stats.documents_discovered += urls.len();
        if urls.is_empty() {
            return;
        }

        let owner_key = identity_key(record);
        let slug = call_slug(record.external_number.as_deref(), &owner_key);
        let target = AcquisitionTarget {
            site_id: &record.site_id,
            call_slug: &slug,
            owner_key: &owner_key,
        };
        let stored_before = self.acquirer.store().len();
        let (references, failed) = self
            .acquirer
            .acquire_all(self.navigator, fetcher, &urls, target)
            .await;
        let newly_stored = self.acquirer.store().len() - stored_before;

        self.stats.documents_acquired += references.len();
        self.stats.documents_reused += references.len().saturating_sub(newly_stored);
        self.stats.documents_failed += failed;
        for reference in references {
            if !record
                .documents
                .iter()
                .any(|existing| existing.content_hash == reference.content_hash)
            {
                record.documents.push(reference);
            }
        }
    }
}
