//! Binary signature classification of downloaded payloads.
//!
//! The true format is read from magic numbers at fixed offsets. URL suffixes
//! and declared content types are frequently wrong or absent on the portals
//! we crawl, so they are consulted only when the bytes are inconclusive.

use std::io::Cursor;

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const RTF_MAGIC: &[u8] = b"{\\rtf";
const RAR_MAGIC: &[u8] = b"Rar!\x1A\x07";
const SEVEN_ZIP_MAGIC: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];

/// Some servers prepend junk before `%PDF`; readers tolerate it within the first KiB.
const PDF_SCAN_WINDOW: usize = 1024;

/// Detected container format of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSignature {
    /// Portable Document Format.
    Pdf,
    /// OOXML package (docx/xlsx/pptx) inside a ZIP container.
    OfficeZipXml,
    /// OLE compound document (doc/xls/ppt) or RTF.
    LegacyOffice,
    /// Plain archive (zip/rar/7z/gzip).
    Archive,
    /// No recognized signature.
    Unknown,
}

impl FileSignature {
    /// Stable label used in catalog records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::OfficeZipXml => "office_zip_xml",
            Self::LegacyOffice => "legacy_office",
            Self::Archive => "archive",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FileSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application family of an office document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficeFlavor {
    /// Word processing (doc/docx/rtf/odt).
    WordProcessing,
    /// Spreadsheet (xls/xlsx).
    Spreadsheet,
    /// Presentation (ppt/pptx).
    Presentation,
    /// Not determinable; treated as word processing for conversion.
    Unspecified,
}

/// Full classification of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Container format from the byte signature (or hints when inconclusive).
    pub signature: FileSignature,
    /// Office family when `signature` is an office format.
    pub flavor: Option<OfficeFlavor>,
    /// Canonical file extension for the detected format, with leading dot.
    pub extension: Option<&'static str>,
}

impl Classification {
    /// A classification with no office flavor.
    #[must_use]
    pub fn plain(signature: FileSignature, extension: Option<&'static str>) -> Self {
        Self {
            signature,
            flavor: None,
            extension,
        }
    }

    /// PDF classification.
    #[must_use]
    pub fn pdf() -> Self {
        Self::plain(FileSignature::Pdf, Some(".pdf"))
    }

    /// An office classification with the canonical extension for its family.
    #[must_use]
    pub fn office(signature: FileSignature, flavor: OfficeFlavor) -> Self {
        let extension = match (signature, flavor) {
            (FileSignature::OfficeZipXml, OfficeFlavor::Spreadsheet) => ".xlsx",
            (FileSignature::OfficeZipXml, OfficeFlavor::Presentation) => ".pptx",
            (FileSignature::OfficeZipXml, _) => ".docx",
            (_, OfficeFlavor::Spreadsheet) => ".xls",
            (_, OfficeFlavor::Presentation) => ".ppt",
            _ => ".doc",
        };
        Self {
            signature,
            flavor: Some(flavor),
            extension: Some(extension),
        }
    }

    /// Returns true when the signature is anything but [`FileSignature::Unknown`].
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.signature != FileSignature::Unknown
    }
}

/// Declared metadata used only to break ties the bytes cannot settle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceHints<'a> {
    /// Source URL (final URL after redirects).
    pub url: Option<&'a str>,
    /// Declared Content-Type header.
    pub content_type: Option<&'a str>,
}

impl SourceHints<'_> {
    fn extension(&self) -> Option<String> {
        let url = url::Url::parse(self.url?).ok()?;
        let last = url.path_segments()?.next_back()?;
        let dot = last.rfind('.')?;
        let ext = last[dot + 1..].to_ascii_lowercase();
        (!ext.is_empty() && ext.len() <= 5).then_some(ext)
    }

    fn mime(&self) -> String {
        self.content_type
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    fn flavor(&self) -> Option<OfficeFlavor> {
        let ext = self.extension().unwrap_or_default();
        let mime = self.mime();
        if matches!(ext.as_str(), "xls" | "xlsx" | "xlsm" | "ods")
            || mime.contains("spreadsheet")
            || mime.contains("ms-excel")
        {
            Some(OfficeFlavor::Spreadsheet)
        } else if matches!(ext.as_str(), "ppt" | "pptx" | "odp")
            || mime.contains("presentation")
            || mime.contains("powerpoint")
        {
            Some(OfficeFlavor::Presentation)
        } else if matches!(ext.as_str(), "doc" | "docx" | "rtf" | "odt")
            || mime.contains("wordprocessing")
            || mime.contains("msword")
        {
            Some(OfficeFlavor::WordProcessing)
        } else {
            None
        }
    }

    fn says_archive(&self) -> bool {
        let ext = self.extension().unwrap_or_default();
        matches!(ext.as_str(), "zip" | "rar" | "7z" | "gz" | "tgz")
            || matches!(
                self.mime().as_str(),
                "application/zip" | "application/x-zip-compressed" | "application/x-rar-compressed"
            )
    }
}

/// Classifies a payload from its bytes alone.
#[must_use]
pub fn classify(bytes: &[u8]) -> FileSignature {
    classify_with_hints(bytes, SourceHints::default()).signature
}

/// Classifies a payload, consulting `hints` only where the signature is inconclusive.
#[must_use]
pub fn classify_with_hints(bytes: &[u8], hints: SourceHints<'_>) -> Classification {
    if is_pdf(bytes) {
        return Classification::pdf();
    }
    if bytes.starts_with(ZIP_MAGIC) {
        return classify_zip(bytes, hints);
    }
    if bytes.starts_with(OLE_MAGIC) {
        let flavor = ole_flavor(bytes)
            .or_else(|| hints.flavor())
            .unwrap_or(OfficeFlavor::Unspecified);
        return Classification::office(FileSignature::LegacyOffice, flavor);
    }
    if bytes.starts_with(RTF_MAGIC) {
        return Classification::office(FileSignature::LegacyOffice, OfficeFlavor::WordProcessing);
    }
    if bytes.starts_with(RAR_MAGIC) {
        return Classification::plain(FileSignature::Archive, Some(".rar"));
    }
    if bytes.starts_with(SEVEN_ZIP_MAGIC) {
        return Classification::plain(FileSignature::Archive, Some(".7z"));
    }
    if bytes.starts_with(GZIP_MAGIC) {
        return Classification::plain(FileSignature::Archive, Some(".gz"));
    }
    Classification::plain(FileSignature::Unknown, None)
}

fn is_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_SCAN_WINDOW)];
    window
        .windows(PDF_MAGIC.len())
        .any(|candidate| candidate == PDF_MAGIC)
}

/// ZIP containers are either OOXML packages or plain archives.
///
/// A readable central directory settles it from the entry names. A truncated
/// or unreadable container falls back to the hints and, failing those, is
/// treated as an office package.
fn classify_zip(bytes: &[u8], hints: SourceHints<'_>) -> Classification {
    match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => {
            let mut has_content_types = false;
            let mut flavor = None;
            for name in archive.file_names() {
                if name == "[Content_Types].xml" {
                    has_content_types = true;
                } else if name.starts_with("word/") {
                    flavor = Some(OfficeFlavor::WordProcessing);
                } else if name.starts_with("xl/") {
                    flavor = Some(OfficeFlavor::Spreadsheet);
                } else if name.starts_with("ppt/") {
                    flavor = Some(OfficeFlavor::Presentation);
                }
            }
            if !has_content_types && flavor.is_none() {
                return Classification::plain(FileSignature::Archive, Some(".zip"));
            }
            let flavor = flavor
                .or_else(|| hints.flavor())
                .unwrap_or(OfficeFlavor::Unspecified);
            Classification::office(FileSignature::OfficeZipXml, flavor)
        }
        Err(_) if hints.says_archive() => {
            Classification::plain(FileSignature::Archive, Some(".zip"))
        }
        Err(_) => Classification::office(
            FileSignature::OfficeZipXml,
            hints.flavor().unwrap_or(OfficeFlavor::Unspecified),
        ),
    }
}

/// Looks for the UTF-16 stream names OLE containers use for each application.
fn ole_flavor(bytes: &[u8]) -> Option<OfficeFlavor> {
    let contains_utf16 = |needle: &str| {
        let encoded: Vec<u8> = needle.encode_utf16().flat_map(u16::to_le_bytes).collect();
        bytes
            .windows(encoded.len())
            .any(|candidate| candidate == encoded.as_slice())
    };
    if contains_utf16("WordDocument") {
        Some(OfficeFlavor::WordProcessing)
    } else if contains_utf16("Workbook") || contains_utf16("Book") {
        Some(OfficeFlavor::Spreadsheet)
    } else if contains_utf16("PowerPoint Document") {
        Some(OfficeFlavor::Presentation)
    } else {
        None
    }
}

/// Returns true when the payload is an HTML document (error or login page served in place of a file).
#[must_use]
pub fn looks_like_html(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text
        .trim_start_matches('\u{feff}')
        .trim_start()
        .to_ascii_lowercase();
    trimmed.starts_with("<!doctype html")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<head")
        || trimmed.starts_with("<body")
        || (trimmed.starts_with('<') && trimmed.contains("<html"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn zip_with_entries(entries: &[&str]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for entry in entries {
            writer
                .start_file(*entry, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<xml/>").unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_pdf_magic_wins_over_docx_url() {
        let bytes = [0x25, 0x50, 0x44, 0x46, b'-', b'1', b'.', b'7'];
        let hints = SourceHints {
            url: Some("https://example.gov/aviso.docx"),
            content_type: Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        };
        assert_eq!(classify_with_hints(&bytes, hints), Classification::pdf());
        assert_eq!(classify(&bytes), FileSignature::Pdf);
    }

    #[test]
    fn test_pdf_after_leading_junk() {
        let mut bytes = b"\r\n\r\n".to_vec();
        bytes.extend_from_slice(b"%PDF-1.4\n");
        assert_eq!(classify(&bytes), FileSignature::Pdf);
    }

    #[test]
    fn test_bare_zip_header_without_hints_is_office_for_normalization() {
        let bytes = [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00];
        let classification = classify_with_hints(&bytes, SourceHints::default());
        assert_eq!(classification.signature, FileSignature::OfficeZipXml);
        assert_eq!(classification.flavor, Some(OfficeFlavor::Unspecified));
    }

    #[test]
    fn test_truncated_zip_uses_spreadsheet_hint() {
        let bytes = [0x50, 0x4B, 0x03, 0x04];
        let hints = SourceHints {
            url: Some("https://example.gov/mapa.xlsx"),
            content_type: None,
        };
        let classification = classify_with_hints(&bytes, hints);
        assert_eq!(classification.signature, FileSignature::OfficeZipXml);
        assert_eq!(classification.flavor, Some(OfficeFlavor::Spreadsheet));
        assert_eq!(classification.extension, Some(".xlsx"));
    }

    #[test]
    fn test_real_docx_and_xlsx_packages() {
        let docx = zip_with_entries(&["[Content_Types].xml", "word/document.xml"]);
        let xlsx = zip_with_entries(&["[Content_Types].xml", "xl/workbook.xml"]);
        assert_eq!(
            classify_with_hints(&docx, SourceHints::default()).flavor,
            Some(OfficeFlavor::WordProcessing)
        );
        let xlsx_class = classify_with_hints(
            &xlsx,
            SourceHints {
                url: Some("https://example.gov/file.docx"),
                content_type: None,
            },
        );
        assert_eq!(xlsx_class.flavor, Some(OfficeFlavor::Spreadsheet));
    }

    #[test]
    fn test_plain_zip_is_archive() {
        let bytes = zip_with_entries(&["anexos/a.pdf", "anexos/b.pdf"]);
        let classification = classify_with_hints(&bytes, SourceHints::default());
        assert_eq!(classification.signature, FileSignature::Archive);
        assert_eq!(classification.extension, Some(".zip"));
    }

    #[test]
    fn test_ole_flavor_from_stream_names() {
        let mut bytes = OLE_MAGIC.to_vec();
        bytes.extend(vec![0u8; 64]);
        bytes.extend("Workbook".encode_utf16().flat_map(u16::to_le_bytes));
        let classification = classify_with_hints(&bytes, SourceHints::default());
        assert_eq!(classification.signature, FileSignature::LegacyOffice);
        assert_eq!(classification.flavor, Some(OfficeFlavor::Spreadsheet));
        assert_eq!(classification.extension, Some(".xls"));
    }

    #[test]
    fn test_archives_and_unknown() {
        assert_eq!(classify(b"Rar!\x1A\x07\x00rest"), FileSignature::Archive);
        assert_eq!(
            classify(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0, 4]),
            FileSignature::Archive
        );
        assert_eq!(classify(b"plain text"), FileSignature::Unknown);
        assert_eq!(classify(b""), FileSignature::Unknown);
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html(b"\xEF\xBB\xBF  <!DOCTYPE html><html>"));
        assert!(looks_like_html(b"<?xml version=\"1.0\"?><html xmlns=\"x\">"));
        assert!(!looks_like_html(b"%PDF-1.7"));
        assert!(!looks_like_html(b"id;nome\n1;aviso"));
    }
}
