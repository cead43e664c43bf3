//! Merging new candidates into the catalog.
//!
//! Per identity key: insert when absent; replace only when the candidate is
//! strictly richer (more documents, or as many documents and a later
//! collection timestamp); otherwise keep what is already there. A degraded
//! re-run therefore never overwrites well-populated data.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, instrument};

use super::identity::{Rejection, admit, identity_key};
use super::record::CallRecord;

/// Keyed collection of records, at most one per identity key, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    records: Vec<CallRecord>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from stored records. Duplicate keys are resolved with the merge rule.
    #[must_use]
    pub fn from_records(records: Vec<CallRecord>) -> Self {
        let mut catalog = Self::new();
        for record in records {
            let key = identity_key(&record);
            catalog.merge(key, record);
        }
        catalog
    }

    /// Records in catalog order.
    #[must_use]
    pub fn records(&self) -> &[CallRecord] {
        &self.records
    }

    /// Consumes the catalog, returning its records in order.
    #[must_use]
    pub fn into_records(self) -> Vec<CallRecord> {
        self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when the catalog holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a record by identity key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CallRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    fn merge(&mut self, key: String, candidate: CallRecord) -> MergeOutcome {
        match self.index.get(&key) {
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(candidate);
                MergeOutcome::Inserted
            }
            Some(&slot) if is_richer(&candidate, &self.records[slot]) => {
                self.records[slot] = candidate;
                MergeOutcome::Replaced
            }
            Some(_) => MergeOutcome::Kept,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeOutcome {
    Inserted,
    Replaced,
    Kept,
}

/// Counts of what consolidation did with each candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationReport {
    /// New identity keys added.
    pub inserted: usize,
    /// Existing records replaced by richer candidates.
    pub replaced: usize,
    /// Candidates discarded in favour of the existing record.
    pub kept: usize,
    /// Candidates with an empty, short, or placeholder title.
    pub rejected_invalid_title: usize,
    /// Candidates that were annexes of another call.
    pub rejected_annex: usize,
}

impl ConsolidationReport {
    /// Total candidates considered.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted + self.replaced + self.kept + self.rejected_invalid_title + self.rejected_annex
    }
}

/// Returns true when `candidate` should replace `existing`.
#[must_use]
pub fn is_richer(candidate: &CallRecord, existing: &CallRecord) -> bool {
    let (new_docs, old_docs) = (candidate.document_count(), existing.document_count());
    new_docs > old_docs || (new_docs == old_docs && candidate.collected_at > existing.collected_at)
}

/// Merges `candidates` into `existing` in order and reports the outcome.
#[must_use]
#[instrument(skip_all, fields(existing = existing.len(), candidates = candidates.len()))]
pub fn consolidate(existing: Catalog, candidates: Vec<CallRecord>) -> (Catalog, ConsolidationReport) {
    let mut catalog = existing;
    let mut report = ConsolidationReport::default();
    for candidate in candidates {
        match admit(&candidate) {
            Err(Rejection::InvalidTitle) => {
                debug!(site = %candidate.site_id, title = %candidate.title, "rejected: invalid title");
                report.rejected_invalid_title += 1;
                continue;
            }
            Err(Rejection::Annex) => {
                debug!(site = %candidate.site_id, title = %candidate.title, "rejected: annex");
                report.rejected_annex += 1;
                continue;
            }
            Ok(()) => {}
        }
        let key = identity_key(&candidate);
        match catalog.merge(key, candidate) {
            MergeOutcome::Inserted => report.inserted += 1,
            MergeOutcome::Replaced => report.replaced += 1,
            MergeOutcome::Kept => report.kept += 1,
        }
    }
    info!(
        inserted = report.inserted,
        replaced = report.replaced,
        kept = report.kept,
        rejected_title = report.rejected_invalid_title,
        rejected_annex = report.rejected_annex,
        total = catalog.len(),
        "catalog consolidated"
    );
    (catalog, report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::catalog::DocumentReference;
    use crate::document::FileSignature;

    fn record(number: &str, title: &str, docs: usize, minute: i64) -> CallRecord {
        let mut record = CallRecord::new("portugal2030", title);
        record.external_number = Some(number.to_string());
        record.collected_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        record.documents = (0..docs)
            .map(|i| DocumentReference {
                original_url: format!("https://example.gov/{number}/{i}.pdf"),
                local_path: PathBuf::from(format!("portugal2030/{number}/{i}.pdf")),
                declared_type: None,
                detected_type: FileSignature::Pdf,
                size_bytes: 10,
                owner_key: format!("portugal2030:{number}"),
                content_hash: format!("{number}-{i}"),
            })
            .collect();
        record
    }

    #[test]
    fn test_richer_candidate_replaces() {
        let existing = Catalog::from_records(vec![record("A-1", "Aviso Alfa", 1, 0)]);
        let (catalog, report) = consolidate(existing, vec![record("A-1", "Aviso Alfa", 2, 0)]);
        assert_eq!(report.replaced, 1);
        assert_eq!(catalog.records()[0].document_count(), 2);
    }

    #[test]
    fn test_poorer_candidate_is_kept_out() {
        let existing = Catalog::from_records(vec![record("A-1", "Aviso Alfa", 3, 0)]);
        let (catalog, report) = consolidate(existing, vec![record("A-1", "Aviso Alfa", 1, 60)]);
        assert_eq!(report.kept, 1);
        assert_eq!(catalog.records()[0].document_count(), 3);
    }

    #[test]
    fn test_equal_documents_later_timestamp_wins() {
        let existing = Catalog::from_records(vec![record("A-1", "Aviso Alfa", 2, 0)]);
        let mut newer = record("A-1", "Aviso Alfa (v2)", 2, 10);
        newer.summary = Some("updated".to_string());
        let (catalog, report) = consolidate(existing.clone(), vec![newer]);
        assert_eq!(report.replaced, 1);
        assert_eq!(catalog.records()[0].summary.as_deref(), Some("updated"));

        let older = record("A-1", "Aviso Alfa (old)", 2, -10);
        let (catalog, report) = consolidate(existing, vec![older]);
        assert_eq!(report.kept, 1);
        assert_eq!(catalog.records()[0].title, "Aviso Alfa");
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let start = Catalog::from_records(vec![record("A-1", "Aviso Alfa", 1, 0)]);
        let batch = vec![
            record("A-1", "Aviso Alfa", 2, 5),
            record("B-2", "Aviso Beta", 0, 5),
            record("C-3", "N/A", 1, 5),
        ];
        let (once, _) = consolidate(start.clone(), batch.clone());
        let (twice, second_report) = consolidate(once.clone(), batch);
        assert_eq!(once, twice);
        assert_eq!(second_report.inserted + second_report.replaced, 0);
    }

    #[test]
    fn test_filters_and_order() {
        let existing = Catalog::from_records(vec![record("Z-9", "Aviso Zeta", 0, 0)]);
        let batch = vec![
            record("A-1", "Aviso Alfa", 0, 0),
            record("X-1", "Sem título", 1, 0),
            record("X-2", "Anexo III – Formulário", 1, 0),
            record("B-2", "Aviso Beta", 0, 0),
        ];
        let (catalog, report) = consolidate(existing, batch);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.rejected_invalid_title, 1);
        assert_eq!(report.rejected_annex, 1);
        assert_eq!(report.total(), 4);
        let titles: Vec<_> = catalog.records().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Aviso Zeta", "Aviso Alfa", "Aviso Beta"]);
        assert!(catalog.get("portugal2030:a-1").is_some());
    }

    #[test]
    fn test_from_records_collapses_duplicate_keys() {
        let catalog = Catalog::from_records(vec![
            record("A-1", "Aviso Alfa", 1, 0),
            record("A-1", "Aviso Alfa", 2, 0),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.records()[0].document_count(), 2);
    }
}
