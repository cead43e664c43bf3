//! Runs adapters one after another, then consolidates and persists once.
//!
//! Adapters share the artifact store (so identical content fetched by two
//! sites is stored once) but never run concurrently. An adapter that
//! returns an error or panics is recorded as failed; its cleanup still runs
//! and the next adapter starts. The catalog is read before the first
//! adapter and written exactly once, after consolidation. A catalog that
//! cannot be read stops the run before anything is written.

mod summary;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use futures_util::FutureExt;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub use summary::{AdapterStatus, AdapterSummary, RunStatus, RunSummary};

use crate::adapter::{AdapterContext, SiteAdapter};
use crate::catalog::{Catalog, CatalogError, CallRecord, consolidate, load_catalog, save_catalog};
use crate::discover::Discoverer;
use crate::document::{ArtifactStore, DocumentAcquirer, FormatNormalizer};
use crate::navigate::{Navigator, SessionOptions};

/// Run-fatal errors.
#[derive(Debug, Error)]
pub enum RunError {
    /// The catalog could not be read before the run or written after it.
    #[error("catalog stage failed: {0}")]
    Catalog(#[source] CatalogError),
}

/// Final catalog plus the summary of how it was produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// The catalog as written.
    pub catalog: Catalog,
    /// Per-adapter and consolidation report.
    pub summary: RunSummary,
}

/// Sequential crawl driver.
#[derive(Debug)]
pub struct Orchestrator {
    navigator: Navigator,
    discoverer: Discoverer,
    normalizer: FormatNormalizer,
    session_options: SessionOptions,
    catalog_path: PathBuf,
    artifacts_dir: PathBuf,
}

impl Orchestrator {
    /// Creates an orchestrator with default engine settings.
    #[must_use]
    pub fn new(catalog_path: impl Into<PathBuf>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            navigator: Navigator::default(),
            discoverer: Discoverer::default(),
            normalizer: FormatNormalizer::default(),
            session_options: SessionOptions::default(),
            catalog_path: catalog_path.into(),
            artifacts_dir: artifacts_dir.into(),
        }
    }

    /// Replaces the navigator (retry policy).
    #[must_use]
    pub fn with_navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = navigator;
        self
    }

    /// Replaces the discoverer (discovery rules).
    #[must_use]
    pub fn with_discoverer(mut self, discoverer: Discoverer) -> Self {
        self.discoverer = discoverer;
        self
    }

    /// Replaces the format normalizer.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: FormatNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replaces the options adapters open their sessions with.
    #[must_use]
    pub fn with_session_options(mut self, options: SessionOptions) -> Self {
        self.session_options = options;
        self
    }

    /// Catalog file path.
    #[must_use]
    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Runs every adapter in order, consolidates, and writes the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Catalog`] when the catalog cannot be read (nothing
    /// is written) or cannot be written.
    #[instrument(skip_all, fields(adapters = adapters.len(), catalog = %self.catalog_path.display()))]
    pub async fn run(&self, adapters: Vec<Box<dyn SiteAdapter>>) -> Result<RunOutcome, RunError> {
        let started_at = Utc::now();
        let existing = load_catalog(&self.catalog_path).map_err(RunError::Catalog)?;
        info!(records = existing.len(), "catalog loaded");

        let mut store = ArtifactStore::new(&self.artifacts_dir);
        let seeded_artifacts = store.seed(
            existing
                .records()
                .iter()
                .flat_map(|record| record.documents.iter())
                .map(|doc| (doc.content_hash.as_str(), doc.local_path.as_path())),
        );
        let mut acquirer = DocumentAcquirer::new(self.normalizer.clone(), store);

        let mut candidates: Vec<CallRecord> = Vec::new();
        let mut summaries = Vec::with_capacity(adapters.len());
        for mut adapter in adapters {
            let site_id = adapter.site_id().to_string();
            let clock = Instant::now();
            info!(site = %site_id, "adapter starting");

            let mut ctx = AdapterContext::new(
                &self.navigator,
                &self.discoverer,
                &mut acquirer,
                &self.session_options,
            );
            let result = AssertUnwindSafe(adapter.run(&mut ctx)).catch_unwind().await;
            let stats = ctx.into_stats();
            adapter.cleanup().await;

            let (status, failure, records) = match result {
                Ok(Ok(records)) => {
                    info!(site = %site_id, records = records.len(), "adapter finished");
                    let count = records.len();
                    candidates.extend(records);
                    (AdapterStatus::Succeeded, None, count)
                }
                Ok(Err(adapter_error)) => {
                    error!(site = %site_id, error = %adapter_error, "adapter failed");
                    (AdapterStatus::Failed, Some(adapter_error.to_string()), 0)
                }
                Err(payload) => {
                    let message = format!("adapter panicked: {}", panic_message(payload.as_ref()));
                    error!(site = %site_id, "{message}");
                    (AdapterStatus::Failed, Some(message), 0)
                }
            };
            summaries.push(AdapterSummary {
                site_id,
                status,
                error: failure,
                records,
                stats,
                elapsed_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
        }

        let (catalog, consolidation) = consolidate(existing, candidates);
        save_catalog(&self.catalog_path, &catalog).map_err(RunError::Catalog)?;
        if summaries.iter().any(|s| s.status == AdapterStatus::Failed) {
            warn!("some adapters failed; catalog written from the others");
        }

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            catalog_path: self.catalog_path.clone(),
            seeded_artifacts,
            adapters: summaries,
            consolidation,
            catalog_records: catalog.len(),
        };
        info!(records = catalog.len(), status = ?summary.status(), "run complete");
        Ok(RunOutcome { catalog, summary })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}
