//! Format normalization: word-processing office files become PDF.
//!
//! PDFs, spreadsheets, presentations, archives, and unknown payloads pass
//! through untouched. When conversion fails the original bytes and the
//! original classification are returned, so a document is never labelled
//! portable unless the converter actually produced a PDF.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::error::ConversionError;
use super::signature::{Classification, FileSignature, OfficeFlavor, classify};

/// Default wall-clock limit for one conversion.
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(120);

/// External facility that turns an office document into PDF bytes.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Converts `bytes` (whose canonical extension is `source_extension`) to PDF.
    async fn convert_to_pdf(
        &self,
        bytes: &[u8],
        source_extension: &str,
    ) -> Result<Vec<u8>, ConversionError>;
}

/// Converter that always declines; used with `converter = none`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledConverter;

#[async_trait]
impl Converter for DisabledConverter {
    fn name(&self) -> &str {
        "none"
    }

    async fn convert_to_pdf(&self, _bytes: &[u8], _ext: &str) -> Result<Vec<u8>, ConversionError> {
        Err(ConversionError::Disabled)
    }
}

/// Headless LibreOffice (`soffice --headless --convert-to pdf`).
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    program: PathBuf,
    timeout: Duration,
}

impl Default for SofficeConverter {
    fn default() -> Self {
        Self::new("soffice")
    }
}

impl SofficeConverter {
    /// Creates a converter invoking `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_CONVERSION_TIMEOUT,
        }
    }

    /// Overrides the conversion timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn program_label(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
impl Converter for SofficeConverter {
    fn name(&self) -> &str {
        "soffice"
    }

    async fn convert_to_pdf(
        &self,
        bytes: &[u8],
        source_extension: &str,
    ) -> Result<Vec<u8>, ConversionError> {
        let scratch = tempfile::tempdir()
            .map_err(|e| ConversionError::io(std::env::temp_dir(), e))?;
        let input = scratch.path().join(format!("source{source_extension}"));
        tokio::fs::write(&input, bytes)
            .await
            .map_err(|e| ConversionError::io(&input, e))?;

        let mut command = tokio::process::Command::new(&self.program);
        command
            .arg("--headless")
            .arg("--norestore")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(scratch.path())
            .arg(&input)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ConversionError::Timeout {
                program: self.program_label(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| ConversionError::Spawn {
                program: self.program_label(),
                source,
            })?;
        if !output.status.success() {
            return Err(ConversionError::Failed {
                program: self.program_label(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let produced = scratch.path().join("source.pdf");
        tokio::fs::read(&produced)
            .await
            .map_err(|e| ConversionError::io(&produced, e))
    }
}

/// Result of normalization.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Bytes to store.
    pub bytes: Vec<u8>,
    /// Classification of `bytes`.
    pub classification: Classification,
    /// Whether a conversion took place.
    pub converted: bool,
}

/// Returns true when a classification is routed to conversion.
///
/// Only word-processing (or undetermined) office documents are converted;
/// spreadsheets and presentations keep their native format.
#[must_use]
pub fn needs_conversion(classification: &Classification) -> bool {
    matches!(
        classification.signature,
        FileSignature::OfficeZipXml | FileSignature::LegacyOffice
    ) && matches!(
        classification.flavor,
        Some(OfficeFlavor::WordProcessing | OfficeFlavor::Unspecified) | None
    )
}

/// Applies the conversion policy around a [`Converter`].
#[derive(Clone)]
pub struct FormatNormalizer {
    converter: Arc<dyn Converter>,
}

impl std::fmt::Debug for FormatNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatNormalizer")
            .field("converter", &self.converter.name())
            .finish()
    }
}

impl Default for FormatNormalizer {
    fn default() -> Self {
        Self::disabled()
    }
}

impl FormatNormalizer {
    /// Creates a normalizer backed by `converter`.
    #[must_use]
    pub fn new(converter: Arc<dyn Converter>) -> Self {
        Self { converter }
    }

    /// A normalizer that never converts.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledConverter))
    }

    /// Normalizes `bytes` according to `classification`.
    #[instrument(skip(self, bytes), fields(signature = %classification.signature, len = bytes.len()))]
    pub async fn normalize(&self, bytes: Vec<u8>, classification: Classification) -> Normalized {
        if !needs_conversion(&classification) {
            return Normalized {
                bytes,
                classification,
                converted: false,
            };
        }

        let source_extension = classification.extension.unwrap_or(".doc");
        match self.converter.convert_to_pdf(&bytes, source_extension).await {
            Ok(pdf) if classify(&pdf) == FileSignature::Pdf => {
                debug!(converter = self.converter.name(), "converted office document to PDF");
                Normalized {
                    bytes: pdf,
                    classification: Classification::pdf(),
                    converted: true,
                }
            }
            Ok(_) => {
                warn!(
                    converter = self.converter.name(),
                    error = %ConversionError::NotPdf,
                    "conversion failed; keeping original format"
                );
                Normalized {
                    bytes,
                    classification,
                    converted: false,
                }
            }
            Err(ConversionError::Disabled) => Normalized {
                bytes,
                classification,
                converted: false,
            },
            Err(error) => {
                warn!(
                    converter = self.converter.name(),
                    error = %error,
                    "conversion failed; keeping original format"
                );
                Normalized {
                    bytes,
                    classification,
                    converted: false,
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FixedConverter {
        output: Result<Vec<u8>, ()>,
        calls: AtomicUsize,
    }

    impl FixedConverter {
        fn new(output: Result<Vec<u8>, ()>) -> Arc<Self> {
            Arc::new(Self {
                output,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Converter for FixedConverter {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn convert_to_pdf(&self, _bytes: &[u8], _ext: &str) -> Result<Vec<u8>, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output.clone().map_err(|()| ConversionError::Failed {
                program: "fixed".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "boom".to_string(),
            })
        }
    }

    fn docx() -> Classification {
        Classification::office(FileSignature::OfficeZipXml, OfficeFlavor::WordProcessing)
    }

    #[tokio::test]
    async fn test_pdf_passes_through() {
        let converter = FixedConverter::new(Ok(b"%PDF-1.7 converted".to_vec()));
        let normalizer = FormatNormalizer::new(converter.clone());
        let result = normalizer
            .normalize(b"%PDF-1.4 original".to_vec(), Classification::pdf())
            .await;
        assert_eq!(result.bytes, b"%PDF-1.4 original");
        assert!(!result.converted);
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_word_document_converted() {
        let normalizer = FormatNormalizer::new(FixedConverter::new(Ok(b"%PDF-1.7 out".to_vec())));
        let result = normalizer.normalize(b"PK\x03\x04docx".to_vec(), docx()).await;
        assert!(result.converted);
        assert_eq!(result.classification, Classification::pdf());
        assert_eq!(result.bytes, b"%PDF-1.7 out");
    }

    #[tokio::test]
    async fn test_conversion_failure_keeps_original() {
        let normalizer = FormatNormalizer::new(FixedConverter::new(Err(())));
        let result = normalizer.normalize(b"PK\x03\x04docx".to_vec(), docx()).await;
        assert!(!result.converted);
        assert_eq!(result.classification, docx());
        assert_eq!(result.bytes, b"PK\x03\x04docx");
    }

    #[tokio::test]
    async fn test_non_pdf_output_is_not_mislabelled() {
        let normalizer = FormatNormalizer::new(FixedConverter::new(Ok(b"not a pdf".to_vec())));
        let result = normalizer.normalize(b"PK\x03\x04docx".to_vec(), docx()).await;
        assert!(!result.converted);
        assert_eq!(result.classification.signature, FileSignature::OfficeZipXml);
    }

    #[tokio::test]
    async fn test_spreadsheet_never_coerced() {
        let converter = FixedConverter::new(Ok(b"%PDF-1.7".to_vec()));
        let normalizer = FormatNormalizer::new(converter.clone());
        let xlsx = Classification::office(FileSignature::OfficeZipXml, OfficeFlavor::Spreadsheet);
        let result = normalizer.normalize(b"PK\x03\x04xlsx".to_vec(), xlsx).await;
        assert!(!result.converted);
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_converter_passes_through() {
        let legacy = Classification::office(FileSignature::LegacyOffice, OfficeFlavor::Unspecified);
        let result = FormatNormalizer::disabled()
            .normalize(b"\xD0\xCF\x11\xE0".to_vec(), legacy)
            .await;
        assert!(!result.converted);
        assert_eq!(result.classification, legacy);
    }

    #[tokio::test]
    async fn test_soffice_missing_program_is_spawn_error() {
        let converter = SofficeConverter::new("/nonexistent/soffice-binary");
        let error = converter.convert_to_pdf(b"x", ".docx").await.unwrap_err();
        assert!(matches!(error, ConversionError::Spawn { .. }));
    }

    #[test]
    fn test_needs_conversion_matrix() {
        assert!(needs_conversion(&docx()));
        assert!(needs_conversion(&Classification::office(
            FileSignature::LegacyOffice,
            OfficeFlavor::Unspecified
        )));
        assert!(!needs_conversion(&Classification::pdf()));
        assert!(!needs_conversion(&Classification::office(
            FileSignature::LegacyOffice,
            OfficeFlavor::Presentation
        )));
        assert!(!needs_conversion(&Classification::plain(
            FileSignature::Archive,
            Some(".zip")
        )));
    }
}
