//! Document acquisition: fetch, classify, normalize, validate, hash, store.
//!
//! Every failure here is local to one document. The caller logs it and
//! moves on; a record never loses its other attachments because one link
//! was dead or served a login page.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use super::error::DocumentError;
use super::filename::{artifact_file_name, derive_filename};
use super::normalize::FormatNormalizer;
use super::signature::{Classification, SourceHints, classify_with_hints, looks_like_html};
use super::store::ArtifactStore;
use crate::catalog::DocumentReference;
use crate::navigate::{Navigator, PageFetcher};
use crate::utils::sha256_hex;

/// Where an acquired document belongs.
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionTarget<'a> {
    /// Site identifier (first path component).
    pub site_id: &'a str,
    /// Call directory slug (second path component).
    pub call_slug: &'a str,
    /// Identity key of the owning record.
    pub owner_key: &'a str,
}

/// Result of a successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredDocument {
    /// Reference to record on the call.
    pub reference: DocumentReference,
    /// True when an existing artifact with identical content was reused.
    pub reused: bool,
    /// True when the payload was converted to PDF.
    pub converted: bool,
}

/// Turns discovered URLs into stored, deduplicated artifacts.
#[derive(Debug)]
pub struct DocumentAcquirer {
    normalizer: FormatNormalizer,
    store: ArtifactStore,
}

impl DocumentAcquirer {
    /// Creates an acquirer over `store`.
    #[must_use]
    pub fn new(normalizer: FormatNormalizer, store: ArtifactStore) -> Self {
        Self { normalizer, store }
    }

    /// The underlying artifact store.
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Mutable access to the artifact store (for seeding).
    pub fn store_mut(&mut self) -> &mut ArtifactStore {
        &mut self.store
    }

    /// Artifacts root directory.
    #[must_use]
    pub fn artifacts_root(&self) -> &Path {
        self.store.root()
    }

    /// Fetches `url` through `fetcher` (with the navigator's retry policy) and stores it.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::Fetch`] when every attempt failed
    /// - [`DocumentError::Validation`] for empty or HTML payloads
    /// - [`DocumentError::Io`] when the artifact cannot be written
    #[instrument(skip(self, navigator, fetcher, target), fields(site = target.site_id))]
    pub async fn acquire(
        &mut self,
        navigator: &Navigator,
        fetcher: &dyn PageFetcher,
        url: &str,
        target: AcquisitionTarget<'_>,
    ) -> Result<AcquiredDocument, DocumentError> {
        let fetched = navigator
            .download(fetcher, url)
            .await
            .map_err(|e| DocumentError::fetch(url, e))?;

        if fetched.bytes.is_empty() {
            return Err(DocumentError::validation(url, "empty payload"));
        }

        let final_url = fetched.url.as_str().to_string();
        let hints = SourceHints {
            url: Some(&final_url),
            content_type: fetched.content_type.as_deref(),
        };
        let classification = classify_with_hints(&fetched.bytes, hints);
        if !classification.is_known() && looks_like_html(&fetched.bytes) {
            return Err(DocumentError::validation(
                url,
                "server returned an HTML page instead of a document",
            ));
        }

        let content_hash = sha256_hex(&fetched.bytes);
        if let Some(existing) = self.store.lookup(&content_hash) {
            debug!(hash = %content_hash, path = %existing.display(), "identical content already stored");
            let size_bytes = std::fs::metadata(self.store.root().join(existing))
                .map_or(fetched.bytes.len() as u64, |m| m.len());
            let detected = stored_classification(existing, classification);
            return Ok(AcquiredDocument {
                reference: DocumentReference {
                    original_url: url.to_string(),
                    local_path: existing.to_path_buf(),
                    declared_type: fetched.content_type.clone(),
                    detected_type: detected.signature,
                    size_bytes,
                    owner_key: target.owner_key.to_string(),
                    content_hash,
                },
                reused: true,
                converted: false,
            });
        }

        let raw_name = derive_filename(fetched.content_disposition.as_deref(), &fetched.url);
        let normalized = self
            .normalizer
            .normalize(fetched.bytes, classification)
            .await;
        let file_name = artifact_file_name(
            &raw_name,
            normalized.classification.extension,
            &content_hash,
        );
        let stored = self.store.store(
            target.site_id,
            target.call_slug,
            &file_name,
            &content_hash,
            &normalized.bytes,
        )?;
        info!(
            hash = %&content_hash[..12],
            path = %stored.relative_path.display(),
            detected = %normalized.classification.signature,
            converted = normalized.converted,
            "document stored"
        );
        Ok(AcquiredDocument {
            reference: DocumentReference {
                original_url: url.to_string(),
                local_path: stored.relative_path,
                declared_type: fetched.content_type,
                detected_type: normalized.classification.signature,
                size_bytes: normalized.bytes.len() as u64,
                owner_key: target.owner_key.to_string(),
                content_hash,
            },
            reused: stored.reused,
            converted: normalized.converted,
        })
    }

    /// Acquires every URL in order, skipping failures.
    ///
    /// Returns the references plus the number of URLs that failed.
    pub async fn acquire_all(
        &mut self,
        navigator: &Navigator,
        fetcher: &dyn PageFetcher,
        urls: &[String],
        target: AcquisitionTarget<'_>,
    ) -> (Vec<DocumentReference>, usize) {
        let mut references: Vec<DocumentReference> = Vec::new();
        let mut failed = 0;
        for url in urls {
            match self.acquire(navigator, fetcher, url, target).await {
                Ok(acquired) => {
                    if references
                        .iter()
                        .any(|r| r.content_hash == acquired.reference.content_hash)
                    {
                        debug!(url = %url, "same content already attached to this record");
                        continue;
                    }
                    references.push(acquired.reference);
                }
                Err(error) => {
                    warn!(url = %url, error = %error, "skipping document");
                    failed += 1;
                }
            }
        }
        (references, failed)
    }
}

/// A reused artifact may have been converted when first stored; its extension tells.
fn stored_classification(path: &Path, fetched: Classification) -> Classification {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        Classification::pdf()
    } else {
        fetched
    }
}
