//! National funds portal: paginated card listing plus one detail page per call.
//!
//! Listing cards differ between portal themes, so several item selectors
//! are tried in order and the first one yielding titled entries wins.
//! Detail pages often only link onward to a regional programme site; the
//! discoverer follows those (see `DiscoveryConfig::intermediate_hosts`).

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::config::ListingSite;
use super::extract::{
    DetailView, LabeledFields, detail_link, extract_reference_code, fill_dates_from_text, fill_record,
    first_text, next_page_url, text_of,
};
use super::{AdapterContext, AdapterError, SiteAdapter, open_session};
use crate::catalog::CallRecord;
use crate::discover::{DiscoveryRules, page_key};
use crate::navigate::{HttpSession, Page};
use crate::utils::compile_static_selector;

/// Listing path used when the site entry has none.
pub const DEFAULT_LISTING_PATH: &str = "/avisos/";

/// Card selectors, most specific first.
static ITEM_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "article.aviso",
        ".aviso-item",
        ".views-row",
        ".card",
        "article",
        "ul.avisos > li",
    ]
    .into_iter()
    .map(compile_static_selector)
    .collect()
});

static ENTRY_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("h2, h3, h4, .titulo, .title, .card-title"));

/// One card on a listing page.
#[derive(Debug, Clone)]
struct ListingEntry {
    title: String,
    detail_url: Option<Url>,
    fields: LabeledFields,
    text: String,
    html: String,
}

#[derive(Debug, Default)]
struct ListingPage {
    entries: Vec<ListingEntry>,
    next: Option<Url>,
}

/// Adapter for the national funds portal.
#[derive(Debug)]
pub struct Portugal2030Adapter {
    id: String,
    settings: ListingSite,
    session: Option<HttpSession>,
}

impl Portugal2030Adapter {
    /// Creates an adapter for `settings`.
    #[must_use]
    pub fn new(id: impl Into<String>, settings: &ListingSite) -> Self {
        Self {
            id: id.into(),
            settings: settings.clone(),
            session: None,
        }
    }
}

#[async_trait]
impl SiteAdapter for Portugal2030Adapter {
    fn site_id(&self) -> &str {
        &self.id
    }

    #[instrument(skip(self, ctx), fields(site = %self.id))]
    async fn run(&mut self, ctx: &mut AdapterContext<'_>) -> Result<Vec<CallRecord>, AdapterError> {
        let session: &HttpSession = self.session.insert(open_session(&self.id, ctx.session_options)?);
        let site_id = self.id.as_str();
        let listing_url = self.settings.listing_url(DEFAULT_LISTING_PATH);

        let mut pages: Vec<(Page, ListingPage)> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(listing_url.clone());
        while let Some(url) = next.take() {
            if pages.len() >= self.settings.max_pages() as usize {
                debug!(max_pages = self.settings.max_pages(), "page limit reached");
                break;
            }
            let page = match ctx.load_page(session, &url).await {
                Ok(page) => page,
                Err(error) if pages.is_empty() => {
                    return Err(AdapterError::listing_unavailable(site_id, error));
                }
                Err(error) => {
                    warn!(url = %url, error = %error, "stopping pagination");
                    break;
                }
            };
            visited.insert(page_key(&page.url));
            let listing = parse_listing(&page.html, &page.url, ctx.discoverer.rules());
            debug!(url = %page.url, entries = listing.entries.len(), "listing page parsed");
            next = listing
                .next
                .as_ref()
                .filter(|url| !visited.contains(&page_key(url)))
                .map(|url| url.as_str().to_string());
            pages.push((page, listing));
        }

        let mut records = Vec::new();
        for (page, listing) in pages {
            for entry in listing.entries {
                ctx.listing_seen();
                if let Some(record) = collect_entry(ctx, session, site_id, &page.url, entry).await {
                    records.push(record);
                }
            }
        }
        ctx.records_emitted(records.len());
        info!(records = records.len(), "listing crawled");
        Ok(records)
    }

    async fn cleanup(&mut self) {
        if self.session.take().is_some() {
            debug!(site = %self.id, "session released");
        }
    }
}

/// Builds one record from a listing card and its detail page.
///
/// Returns `None` (after counting the failure) when the detail page cannot be loaded.
async fn collect_entry(
    ctx: &mut AdapterContext<'_>,
    session: &HttpSession,
    site_id: &str,
    listing_url: &Url,
    entry: ListingEntry,
) -> Option<CallRecord> {
    let mut record = CallRecord::new(site_id, entry.title.clone());
    record.landing_url = entry.detail_url.as_ref().map(|url| url.as_str().to_string());
    fill_record(&mut record, &entry.fields);
    if record.external_number.is_none() {
        record.external_number = extract_reference_code(&entry.text);
    }

    let fragment = Page::from_html(listing_url.clone(), entry.html);
    let Some(detail_url) = entry.detail_url else {
        fill_dates_from_text(&mut record, &entry.text);
        ctx.attach_documents(session, &mut record, &[&fragment]).await;
        return Some(record);
    };

    let detail = match ctx.load_page(session, detail_url.as_str()).await {
        Ok(page) => page,
        Err(error) => {
            ctx.record_failed(site_id, detail_url.as_str(), &error);
            return None;
        }
    };
    DetailView::parse(&detail.html).apply_to(&mut record);
    fill_dates_from_text(&mut record, &entry.text);
    ctx.attach_documents(session, &mut record, &[&fragment, &detail]).await;
    Some(record)
}

fn parse_listing(html: &str, page_url: &Url, rules: &DiscoveryRules) -> ListingPage {
    let document = Html::parse_document(html);
    let entries = ITEM_SELECTORS
        .iter()
        .map(|selector| {
            document
                .select(selector)
                .filter_map(|item| {
                    let title = first_text(item, &ENTRY_TITLE_SELECTOR)?;
                    Some(ListingEntry {
                        title,
                        detail_url: detail_link(item, page_url, rules),
                        fields: LabeledFields::from_element(item),
                        text: text_of(item),
                        html: item.html(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .find(|entries| !entries.is_empty())
        .unwrap_or_default();
    ListingPage {
        entries,
        next: next_page_url(&document, page_url),
    }
}
