//! Record identity and admission rules.
//!
//! The identity key is `site_id:<external number>` when the issuer published a
//! reference number, otherwise `site_id:t:<normalized title>`. Normalization
//! strips diacritics, lowercases, drops punctuation, collapses whitespace and
//! truncates, so cosmetic edits to a title do not fork a record.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::record::CallRecord;
use crate::utils::{compile_static_regex, sha256_hex};

/// Longest normalized title kept in an identity key.
pub const MAX_TITLE_KEY_CHARS: usize = 120;

/// Titles must be strictly longer than this many characters.
pub const MIN_TITLE_CHARS: usize = 3;

const PLACEHOLDER_TITLES: &[&str] = &[
    "sem titulo",
    "sem designacao",
    "sem nome",
    "titulo",
    "no title",
    "untitled",
    "n a",
    "na",
    "nd",
    "n d",
    "null",
    "none",
    "tbd",
    "a definir",
    "undefined",
];

static ANNEX_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"^(anexo|anexos|annex|annexes|apendice|apendices|appendix|adenda|addendum)(\s|$)",
    )
});

/// Folds `value` to a comparison form: NFD, combining marks removed,
/// lowercase, every non-alphanumeric run turned into one space, trimmed.
#[must_use]
pub fn normalize_text(value: &str) -> String {
    let folded: String = value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes a published reference number: lowercase ASCII folding with
/// separators unified to single dashes.
#[must_use]
pub fn normalize_external_number(value: &str) -> String {
    let folded = normalize_text(value);
    folded.split(' ').filter(|part| !part.is_empty()).collect::<Vec<_>>().join("-")
}

/// Identity key of a record.
#[must_use]
pub fn identity_key(record: &CallRecord) -> String {
    identity_key_for(
        &record.site_id,
        record.external_number.as_deref(),
        &record.title,
    )
}

/// Identity key from its parts.
#[must_use]
pub fn identity_key_for(site_id: &str, external_number: Option<&str>, title: &str) -> String {
    let site = site_id.trim().to_ascii_lowercase();
    if let Some(number) = external_number
        .map(normalize_external_number)
        .filter(|n| !n.is_empty())
    {
        return format!("{site}:{number}");
    }
    let title: String = normalize_text(title)
        .chars()
        .take(MAX_TITLE_KEY_CHARS)
        .collect();
    format!("{site}:t:{}", title.trim_end())
}

/// Directory slug for a record's artifacts.
///
/// The sanitized external number when present, otherwise `id-<hash12>` of
/// the identity key. Stable across runs for the same identity.
#[must_use]
pub fn call_slug(external_number: Option<&str>, identity_key: &str) -> String {
    let from_number = external_number
        .map(|number| {
            number
                .trim()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
                .collect::<String>()
        })
        .map(|slug| slug.trim_matches('_').to_string())
        .filter(|slug| !slug.is_empty());
    from_number.unwrap_or_else(|| {
        let hash = sha256_hex(identity_key.as_bytes());
        format!("id-{}", &hash[..12])
    })
}

/// Why a candidate was refused admission to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Empty, too short, or a placeholder title.
    InvalidTitle,
    /// The record is an annex/attachment of another call.
    Annex,
}

/// Returns true when `title` is usable as a record title.
#[must_use]
pub fn is_valid_title(title: &str) -> bool {
    let trimmed = title.trim();
    if trimmed.chars().count() <= MIN_TITLE_CHARS {
        return false;
    }
    let normalized = normalize_text(trimmed);
    if normalized.chars().count() <= MIN_TITLE_CHARS {
        return false;
    }
    !PLACEHOLDER_TITLES.contains(&normalized.as_str())
}

/// Returns true when `title` names an annex rather than a call.
#[must_use]
pub fn is_annex_title(title: &str) -> bool {
    ANNEX_TITLE_RE.is_match(&normalize_text(title))
}

/// Checks the admission rules for a record.
///
/// # Errors
///
/// Returns the [`Rejection`] reason.
pub fn admit(record: &CallRecord) -> Result<(), Rejection> {
    if !is_valid_title(&record.title) {
        return Err(Rejection::InvalidTitle);
    }
    if is_annex_title(&record.title) {
        return Err(Rejection::Annex);
    }
    Ok(())
}
