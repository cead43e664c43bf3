//! Field extraction helpers shared by the site adapters.
//!
//! Portals render the same facts in many shapes: definition lists, two-column
//! tables, `<strong>Label:</strong> value` runs, or plain `Label: value`
//! lines. [`LabeledFields`] collects all of them into one ordered list of
//! normalized-label/value pairs so adapters can ask for a field by its
//! aliases regardless of layout.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::catalog::identity::normalize_text;
use crate::catalog::{CallRecord, is_valid_title};
use crate::discover::DiscoveryRules;
use crate::utils::{
    absolutize_url, collapse_whitespace, compile_static_regex, compile_static_selector, non_empty_text,
};

/// Labels longer than this are treated as prose, not labels.
const MAX_LABEL_CHARS: usize = 48;

static DT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("dl > dt"));
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("tr"));
static CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("th, td"));
static STRONG_LABEL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("strong, b, label, .label, .field-label, .field__label"));

static NUMERIC_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{4})\b|\b(\d{4})-(\d{2})-(\d{2})(?:\b|T)")
});

static LONG_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)\b(\d{1,2})\s+de\s+([a-zçã]+)\s+(?:de\s+)?(\d{4})\b")
});

static REFERENCE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"\b([A-Z][A-Z0-9]{1,15}(?:-[A-Z0-9]{1,12})*-(?:19|20)\d{2}-\d{1,4})\b")
});

/// Ordered normalized-label/value pairs scraped from markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledFields {
    entries: Vec<(String, String)>,
}

impl LabeledFields {
    /// Parses `html` and collects fields from the whole document.
    #[must_use]
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_fragment(html);
        Self::from_element(document.root_element())
    }

    /// Collects fields below `root`.
    #[must_use]
    pub fn from_element(root: ElementRef<'_>) -> Self {
        let mut fields = Self::default();
        fields.collect_definition_lists(root);
        fields.collect_table_rows(root);
        fields.collect_strong_labels(root);
        fields.collect_text_lines(root);
        fields
    }

    /// Builds fields from explicit pairs (table headers and cells).
    #[must_use]
    pub fn from_pairs<I, L, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, V)>,
        L: AsRef<str>,
        V: AsRef<str>,
    {
        let mut fields = Self::default();
        for (label, value) in pairs {
            fields.push(label.as_ref(), value.as_ref());
        }
        fields
    }

    /// Number of collected pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends pairs from `other` after this set's own.
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// First value whose label matches an alias, trying aliases in order.
    ///
    /// A label matches when it equals the alias or starts with it followed by a space.
    #[must_use]
    pub fn get(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| {
            let alias = normalize_text(alias);
            self.entries
                .iter()
                .find(|(label, _)| {
                    label == &alias
                        || label
                            .strip_prefix(alias.as_str())
                            .is_some_and(|rest| rest.starts_with(' '))
                })
                .map(|(_, value)| value.as_str())
        })
    }

    /// [`get`](Self::get) parsed as a date.
    #[must_use]
    pub fn date(&self, aliases: &[&str]) -> Option<NaiveDate> {
        aliases
            .iter()
            .find_map(|alias| self.get(&[alias]).and_then(parse_date))
    }

    fn push(&mut self, label: &str, value: &str) {
        let label = normalize_text(label);
        let Some(value) = non_empty_text(value) else {
            return;
        };
        if label.is_empty() || label.chars().count() > MAX_LABEL_CHARS {
            return;
        }
        if !self.entries.iter().any(|(l, v)| *l == label && *v == value) {
            self.entries.push((label, value));
        }
    }

    fn collect_definition_lists(&mut self, root: ElementRef<'_>) {
        for term in root.select(&DT_SELECTOR) {
            let definition = term
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .take_while(|el| el.value().name() != "dt")
                .find(|el| el.value().name() == "dd");
            if let Some(definition) = definition {
                self.push(&text_of(term), &text_of(definition));
            }
        }
    }

    fn collect_table_rows(&mut self, root: ElementRef<'_>) {
        for row in root.select(&ROW_SELECTOR) {
            let cells: Vec<String> = row.select(&CELL_SELECTOR).map(text_of).collect();
            if cells.len() >= 2 {
                self.push(&cells[0], &cells[1..].join(" "));
            }
        }
    }

    fn collect_strong_labels(&mut self, root: ElementRef<'_>) {
        for label in root.select(&STRONG_LABEL_SELECTOR) {
            let label_text = text_of(label);
            let Some(parent) = label.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            let parent_text = text_of(parent);
            let Some(rest) = parent_text.strip_prefix(label_text.as_str()) else {
                continue;
            };
            let value = rest.trim_start_matches([':', ' ', '-', '–']);
            self.push(label_text.trim_end_matches(':'), value);
        }
    }

    fn collect_text_lines(&mut self, root: ElementRef<'_>) {
        for chunk in root.text() {
            for line in chunk.lines() {
                if let Some((label, value)) = line.split_once(':')
                    && !label.trim().is_empty()
                    && !value.trim().starts_with("//")
                {
                    self.push(label, value);
                }
            }
        }
    }
}

/// Collapsed text content of an element.
#[must_use]
pub fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first element matching `selector` below `root`, if non-empty.
#[must_use]
pub fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector)
        .map(text_of)
        .find(|text| !text.is_empty())
}

/// Parses the first date found in `text`.
///
/// Accepts `dd/mm/yyyy`, `dd-mm-yyyy`, `dd.mm.yyyy`, `yyyy-mm-dd`, and
/// Portuguese long form (`12 de março de 2025`).
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    find_dates(text).into_iter().next()
}

/// All dates in `text`, in order of appearance.
#[must_use]
pub fn find_dates(text: &str) -> Vec<NaiveDate> {
    let mut found: Vec<(usize, NaiveDate)> = Vec::new();
    for caps in NUMERIC_DATE_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let parts = if caps.get(1).is_some() {
            (caps.get(3), caps.get(2), caps.get(1))
        } else {
            (caps.get(4), caps.get(5), caps.get(6))
        };
        if let (Some(y), Some(m), Some(d)) = parts
            && let Some(date) = ymd(y.as_str(), m.as_str(), d.as_str())
        {
            found.push((whole.start(), date));
        }
    }
    for caps in LONG_DATE_RE.captures_iter(text) {
        let (Some(whole), Some(d), Some(month), Some(y)) = (caps.get(0), caps.get(1), caps.get(2), caps.get(3)) else {
            continue;
        };
        if let Some(m) = portuguese_month(month.as_str())
            && let (Ok(year), Ok(day)) = (y.as_str().parse::<i32>(), d.as_str().parse::<u32>())
            && let Some(date) = NaiveDate::from_ymd_opt(year, m, day)
        {
            found.push((whole.start(), date));
        }
    }
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, date)| date).collect()
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn portuguese_month(name: &str) -> Option<u32> {
    let month = match normalize_text(name).as_str() {
        "janeiro" | "jan" => 1,
        "fevereiro" | "fev" => 2,
        "marco" | "mar" => 3,
        "abril" | "abr" => 4,
        "maio" | "mai" => 5,
        "junho" | "jun" => 6,
        "julho" | "jul" => 7,
        "agosto" | "ago" => 8,
        "setembro" | "set" => 9,
        "outubro" | "out" => 10,
        "novembro" | "nov" => 11,
        "dezembro" | "dez" => 12,
        _ => return None,
    };
    Some(month)
}

/// Finds a call reference code such as `PT2030-2024-12` or `COMPETE2030-2023-07`.
#[must_use]
pub fn extract_reference_code(text: &str) -> Option<String> {
    REFERENCE_CODE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Label aliases for the optional record fields.
pub mod aliases {
    /// Reference number.
    pub const NUMBER: &[&str] = &["codigo do aviso", "codigo", "n do aviso", "numero do aviso", "referencia", "aviso n", "n aviso", "reference"];
    /// Publication/opening date.
    pub const PUBLICATION: &[&str] = &["data de publicacao", "publicado em", "data de abertura", "abertura", "inicio", "data de inicio", "opening date"];
    /// Closing date.
    pub const CLOSING: &[&str] = &["data de fecho", "data de encerramento", "data limite", "prazo", "fim", "data de fim", "encerramento", "closing date", "deadline"];
    /// Funding area/programme.
    pub const AREA: &[&str] = &["programa", "area", "dominio", "tipologia", "objetivo especifico", "area cientifica", "funding area"];
    /// Issuing body.
    pub const ISSUER: &[&str] = &["autoridade de gestao", "entidade", "organismo", "entidade gestora", "promotor", "issuer"];
    /// Budget.
    pub const AMOUNT: &[&str] = &["dotacao", "dotacao orcamental", "orcamento", "montante", "financiamento", "budget"];
    /// Status.
    pub const STATUS: &[&str] = &["estado", "situacao", "status"];
    /// Summary.
    pub const SUMMARY: &[&str] = &["resumo", "descricao", "objetivo", "summary"];
}

/// Fills the record's absent optional fields from `fields`; present values are kept.
pub fn fill_record(record: &mut CallRecord, fields: &LabeledFields) {
    let owned = |value: Option<&str>| value.map(str::to_string);
    if record.external_number.is_none() {
        record.external_number = fields
            .get(aliases::NUMBER)
            .map(|value| extract_reference_code(value).unwrap_or_else(|| value.to_string()));
    }
    if record.publication_date.is_none() {
        record.publication_date = fields.date(aliases::PUBLICATION);
    }
    if record.closing_date.is_none() {
        record.closing_date = fields.date(aliases::CLOSING);
    }
    if record.funding_area.is_none() {
        record.funding_area = owned(fields.get(aliases::AREA));
    }
    if record.issuing_body.is_none() {
        record.issuing_body = owned(fields.get(aliases::ISSUER));
    }
    if record.amount.is_none() {
        record.amount = owned(fields.get(aliases::AMOUNT));
    }
    if record.status.is_none() {
        record.status = owned(fields.get(aliases::STATUS));
    }
    if record.summary.is_none() {
        record.summary = owned(fields.get(aliases::SUMMARY));
    }
}

static NEXT_PAGE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    compile_static_selector(
        "a[rel~=next], link[rel~=next], .pagination .next a, li.next a, a.next, .pager__item--next a, .page-item.next a",
    )
});
static ANY_ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a[href]"));
static HEADING_ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    compile_static_selector(
        "h1 a[href], h2 a[href], h3 a[href], h4 a[href], .titulo a[href], .title a[href], a.card-link[href], a.stretched-link[href]",
    )
});
static PAGE_HEADING_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("main h1, article h1, h1, .page-title"));
static META_DESCRIPTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    compile_static_selector(r#"meta[name="description"], meta[property="og:description"]"#)
});
static PARAGRAPH_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("main p, article p, .content p, .entry-content p, p"));

/// Shortest paragraph accepted as a summary.
const MIN_SUMMARY_CHARS: usize = 40;

/// Words that label a "next page" control when no markup hint exists.
const NEXT_PAGE_WORDS: &[&str] = &["seguinte", "proxima", "proximo", "next", "›", "»"];

/// URL of the next listing page, if the page links to one.
#[must_use]
pub fn next_page_url(document: &Html, page_url: &Url) -> Option<Url> {
    let hinted = document
        .select(&NEXT_PAGE_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| absolutize_url(href, page_url));
    hinted
        .or_else(|| {
            document.select(&ANY_ANCHOR_SELECTOR).find_map(|anchor| {
                let text = text_of(anchor);
                let normalized = normalize_text(&text);
                let is_next = NEXT_PAGE_WORDS
                    .iter()
                    .any(|word| normalized == *word || text.trim() == *word);
                if is_next {
                    anchor.value().attr("href").and_then(|href| absolutize_url(href, page_url))
                } else {
                    None
                }
            })
        })
        .filter(|next| next != page_url)
}

/// The link from a listing entry to its own detail page.
///
/// Prefers the anchor inside the entry's heading; otherwise the first
/// anchor that is neither a document nor denied navigation.
#[must_use]
pub fn detail_link(entry: ElementRef<'_>, base: &Url, rules: &DiscoveryRules) -> Option<Url> {
    let usable = |url: &Url| !rules.is_document_url(url) && !rules.is_denied(url);
    entry
        .select(&HEADING_ANCHOR_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| absolutize_url(href, base))
        .find(|url| usable(url))
        .or_else(|| {
            entry
                .select(&ANY_ANCHOR_SELECTOR)
                .filter_map(|a| a.value().attr("href"))
                .filter_map(|href| absolutize_url(href, base))
                .find(|url| usable(url) && url.path() != base.path())
        })
}

/// What a detail page adds to a listing entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailView {
    /// Main heading text.
    pub heading: Option<String>,
    /// Meta description or first substantial paragraph.
    pub summary: Option<String>,
    /// Reference code found anywhere in the page text.
    pub reference: Option<String>,
    /// Labelled fields.
    pub fields: LabeledFields,
}

impl DetailView {
    /// Parses a detail page.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let heading = first_text(root, &PAGE_HEADING_SELECTOR);
        let summary = document
            .select(&META_DESCRIPTION_SELECTOR)
            .filter_map(|meta| meta.value().attr("content"))
            .find_map(non_empty_text)
            .or_else(|| {
                document
                    .select(&PARAGRAPH_SELECTOR)
                    .map(text_of)
                    .find(|text| text.chars().count() >= MIN_SUMMARY_CHARS)
            });
        let reference = extract_reference_code(&text_of(root));
        Self {
            heading,
            summary,
            reference,
            fields: LabeledFields::from_element(root),
        }
    }

    /// Fills absent record fields from this view.
    ///
    /// The heading replaces the title only when the listing title is unusable.
    pub fn apply_to(&self, record: &mut CallRecord) {
        if !is_valid_title(&record.title)
            && let Some(heading) = &self.heading
        {
            record.title.clone_from(heading);
        }
        fill_record(record, &self.fields);
        if record.external_number.is_none() {
            record.external_number.clone_from(&self.reference);
        }
        if record.summary.is_none() {
            record.summary.clone_from(&self.summary);
        }
    }
}

/// Fills a missing publication or closing date from free text.
///
/// Only a text with at least two dates is trusted: the first opens, the second closes.
pub fn fill_dates_from_text(record: &mut CallRecord, text: &str) {
    if record.publication_date.is_some() && record.closing_date.is_some() {
        return;
    }
    if let [opens, closes, ..] = find_dates(text)[..] {
        record.publication_date.get_or_insert(opens);
        record.closing_date.get_or_insert(closes);
    }
}
