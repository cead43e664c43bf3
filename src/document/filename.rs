//! Filename extraction, sanitization, and path resolution for artifacts.
//!
//! Names come from the Content-Disposition header when the server sends one,
//! otherwise from the last URL path segment, otherwise `document`. The
//! extension is rewritten once the payload's real format is known.

use std::path::{Component, Path, PathBuf};

use url::Url;

/// Stem used when neither the header nor the URL yields a name.
pub const FALLBACK_STEM: &str = "document";

/// Longest stem kept before the hash suffix.
const MAX_STEM_CHARS: usize = 80;

/// Derives a raw filename for a fetched payload.
#[must_use]
pub fn derive_filename(content_disposition: Option<&str>, url: &Url) -> String {
    content_disposition
        .and_then(parse_content_disposition)
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.trim_matches(|c| c == '_' || c == '.').is_empty())
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| FALLBACK_STEM.to_string())
}

/// Splits a filename into `(stem, extension)`; the extension keeps its dot and is lowercased.
#[must_use]
pub fn split_extension(filename: &str) -> (String, Option<String>) {
    match filename.rfind('.') {
        Some(pos) if pos > 0 && filename.len() - pos > 1 && filename.len() - pos <= 6 => (
            filename[..pos].to_string(),
            Some(filename[pos..].to_ascii_lowercase()),
        ),
        _ => (filename.to_string(), None),
    }
}

/// Builds the final artifact name `<stem>_<hash8><ext>`.
///
/// `detected_extension` replaces whatever extension the raw name carried;
/// when the format is unknown the raw extension is kept (or `.bin` if none).
#[must_use]
pub fn artifact_file_name(raw_name: &str, detected_extension: Option<&str>, content_hash: &str) -> String {
    let (stem, raw_extension) = split_extension(raw_name);
    let stem = sanitize_filename_component(&stem);
    let stem: String = if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem.chars().take(MAX_STEM_CHARS).collect()
    };
    let extension = detected_extension
        .map(str::to_string)
        .or(raw_extension)
        .unwrap_or_else(|| ".bin".to_string());
    let hash8: String = content_hash.chars().take(8).collect();
    format!("{stem}_{hash8}{extension}")
}

pub(crate) fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |v| v.into_owned());
    let name = sanitize_filename(&decoded);
    (!name.trim_matches('_').is_empty()).then_some(name)
}

/// Reduces a free-text value to a filesystem-safe component (used for slugs and stems).
#[must_use]
pub fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            c if c.is_alphanumeric() || matches!(c, '-' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches(|c| c == '_' || c == '.').to_string()
}

/// Parses Content-Disposition header to extract filename.
///
/// Handles both:
/// - `attachment; filename="aviso.pdf"`
/// - `attachment; filename=aviso.pdf`
/// - `attachment; filename*=UTF-8''aviso%20final.pdf` (RFC 5987, preferred)
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        // charset'language'encoded_value
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name)
                && !decoded.trim().is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = header.find("filename=")?;
    let value = header[pos + 9..].trim();
    if let Some(stripped) = value.strip_prefix('"') {
        let end = stripped.find('"')?;
        let name = stripped[..end].trim();
        return (!name.is_empty()).then(|| name.to_string());
    }
    let end = value.find(';').unwrap_or(value.len());
    let name = value[..end].trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// Resolves a unique file path, adding a numeric suffix if the file exists.
///
/// `file.pdf`, then `file_2.pdf`, `file_3.pdf`, ...
pub(crate) fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let filename = {
        let sanitized = sanitize_filename(filename);
        if sanitized.contains('/')
            || sanitized.contains('\\')
            || sanitized.trim_matches('_').is_empty()
        {
            format!("{FALLBACK_STEM}.bin")
        } else {
            sanitized
        }
    };
    let base_path = dir.join(&filename);
    if !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) => (&filename[..pos], &filename[pos..]),
        None => (filename.as_str(), ""),
    };
    for i in 2..1000 {
        let candidate = dir.join(format!("{stem}_{i}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
