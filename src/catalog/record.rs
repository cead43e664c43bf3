//! Catalog record types.
//!
//! Optional fields are `None` when the source page did not expose the value
//! in any layout the adapter understands; they are never filled with
//! placeholder text.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::document::FileSignature;

/// A published funding-opportunity announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Identifier of the adapter/site that produced the record.
    pub site_id: String,
    /// Reference number published by the issuer (e.g. `PT2030-2024-12`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_number: Option<String>,
    /// Call title.
    pub title: String,
    /// Date the call was published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDate>,
    /// Date applications close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_date: Option<NaiveDate>,
    /// Free-text summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Thematic area or programme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_area: Option<String>,
    /// Managing authority or issuing body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuing_body: Option<String>,
    /// Budget as published (free text, currency included).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Status label as published ("Aberto", "Encerrado", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Detail page URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landing_url: Option<String>,
    /// Acquired attachments in discovery order.
    #[serde(default)]
    pub documents: Vec<DocumentReference>,
    /// When the record was scraped.
    pub collected_at: DateTime<Utc>,
}

impl CallRecord {
    /// Creates a record with only the required fields, stamped now.
    #[must_use]
    pub fn new(site_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            external_number: None,
            title: title.into(),
            publication_date: None,
            closing_date: None,
            summary: None,
            funding_area: None,
            issuing_body: None,
            amount: None,
            status: None,
            landing_url: None,
            documents: Vec::new(),
            collected_at: Utc::now(),
        }
    }

    /// Number of acquired documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

/// An acquired, validated attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    /// URL the document was discovered at.
    pub original_url: String,
    /// Artifact path relative to the artifacts root.
    pub local_path: PathBuf,
    /// Content-Type the server declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    /// Format detected from the stored bytes.
    pub detected_type: FileSignature,
    /// Stored size in bytes.
    pub size_bytes: u64,
    /// Identity key of the record that first acquired the document.
    pub owner_key: String,
    /// SHA-256 of the downloaded payload, lowercase hex.
    pub content_hash: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_are_omitted_from_json() {
        let record = CallRecord::new("fct", "Concurso de Projetos IC&DT");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("external_number").is_none());
        assert!(json.get("closing_date").is_none());
        assert_eq!(json["documents"], serde_json::json!([]));
    }

    #[test]
    fn test_record_json_shape_round_trips() {
        let mut record = CallRecord::new("portugal2030", "Aviso de abertura");
        record.external_number = Some("PT2030-2024-12".to_string());
        record.closing_date = NaiveDate::from_ymd_opt(2025, 3, 12);
        record.documents.push(DocumentReference {
            original_url: "https://example.gov/aviso.pdf".to_string(),
            local_path: PathBuf::from("portugal2030/PT2030-2024-12/aviso_0123abcd.pdf"),
            declared_type: Some("application/pdf".to_string()),
            detected_type: FileSignature::Pdf,
            size_bytes: 42,
            owner_key: "portugal2030:pt2030-2024-12".to_string(),
            content_hash: "0123abcd".to_string(),
        });
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"closing_date\":\"2025-03-12\""));
        assert!(json.contains("\"detected_type\":\"pdf\""));
        let back: CallRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
