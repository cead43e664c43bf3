//! End-of-run summary handed to the batch operator.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapter::AdapterStats;
use crate::catalog::ConsolidationReport;

/// How one adapter's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterStatus {
    /// Returned its records.
    Succeeded,
    /// Returned an adapter-level error or panicked.
    Failed,
}

/// Per-adapter line of the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterSummary {
    /// Adapter id.
    pub site_id: String,
    /// Outcome.
    pub status: AdapterStatus,
    /// Adapter-level failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Records contributed to consolidation.
    pub records: usize,
    /// Counters collected during the run.
    pub stats: AdapterStats,
    /// Wall-clock time spent in the adapter.
    pub elapsed_ms: u64,
}

/// Overall outcome, which decides the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every adapter succeeded (or none ran).
    Success,
    /// Some adapters failed; the catalog was still written.
    Partial,
    /// Every adapter failed.
    AllFailed,
}

/// Structured end-of-run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end, after the catalog was written.
    pub finished_at: DateTime<Utc>,
    /// Catalog file that was read and rewritten.
    pub catalog_path: PathBuf,
    /// Artifacts already on disk when the run started.
    pub seeded_artifacts: usize,
    /// Adapters in registration order.
    pub adapters: Vec<AdapterSummary>,
    /// Consolidation counters.
    pub consolidation: ConsolidationReport,
    /// Records in the catalog after the run.
    pub catalog_records: usize,
}

impl RunSummary {
    /// Success when nothing failed, all-failed when nothing succeeded.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        let failed = self
            .adapters
            .iter()
            .filter(|a| a.status == AdapterStatus::Failed)
            .count();
        if failed == 0 {
            RunStatus::Success
        } else if failed < self.adapters.len() {
            RunStatus::Partial
        } else {
            RunStatus::AllFailed
        }
    }

    /// Human-readable multi-line report.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let elapsed = (self.finished_at - self.started_at).num_seconds();
        let _ = writeln!(out, "Run finished in {elapsed}s ({:?})", self.status());
        for adapter in &self.adapters {
            let s = &adapter.stats;
            let _ = write!(
                out,
                "  {:<16} {:<9} records {:>4} (failed {}), documents {} discovered / {} attached / {} reused / {} failed",
                adapter.site_id,
                match adapter.status {
                    AdapterStatus::Succeeded => "ok",
                    AdapterStatus::Failed => "FAILED",
                },
                adapter.records,
                s.records_failed,
                s.documents_discovered,
                s.documents_acquired,
                s.documents_reused,
                s.documents_failed,
            );
            if let Some(error) = &adapter.error {
                let _ = write!(out, "\n    reason: {error}");
            }
            out.push('\n');
        }
        let c = &self.consolidation;
        let _ = writeln!(
            out,
            "Catalog {}: {} records ({} inserted, {} replaced, {} kept, {} rejected title, {} rejected annex)",
            self.catalog_path.display(),
            self.catalog_records,
            c.inserted,
            c.replaced,
            c.kept,
            c.rejected_invalid_title,
            c.rejected_annex,
        );
        out
    }
}
