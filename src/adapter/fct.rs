//! Science foundation calls page: calls are collapsed accordion panels.
//!
//! Each panel header is the call title and the panel body carries dates,
//! the scientific area and the document links. Some panels link to a
//! "more information" page, which is loaded when present; if that page
//! fails the record is still emitted from the panel alone.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::config::ListingSite;
use super::extract::{
    DetailView, LabeledFields, extract_reference_code, fill_dates_from_text, fill_record, first_text,
    next_page_url, text_of,
};
use super::{AdapterContext, AdapterError, SiteAdapter, open_session};
use crate::catalog::CallRecord;
use crate::catalog::identity::normalize_text;
use crate::discover::page_key;
use crate::navigate::{HttpSession, Page};
use crate::utils::{absolutize_url, compile_static_selector};

/// Listing path used when the site entry has none.
pub const DEFAULT_LISTING_PATH: &str = "/concursos/";

/// Link texts that point at a call's own information page.
const MORE_INFO_PHRASES: &[&str] = &["mais informacoes", "mais informacao", "saiba mais", "ver mais", "more information"];

/// (panel, header, body) selector triples, tried in order.
static PANEL_LAYOUTS: LazyLock<Vec<(Selector, Selector, Selector)>> = LazyLock::new(|| {
    [
        (".accordion-item", ".accordion-header, .accordion-button", ".accordion-body"),
        ("details", "summary", "div, p, ul, table"),
        (".panel", ".panel-heading, .panel-title", ".panel-body"),
        (".concurso", "h2, h3, h4", ".conteudo, .content, div"),
    ]
    .into_iter()
    .map(|(panel, header, body)| {
        (
            compile_static_selector(panel),
            compile_static_selector(header),
            compile_static_selector(body),
        )
    })
    .collect()
});

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a[href]"));

#[derive(Debug, Clone)]
struct Panel {
    title: String,
    fields: LabeledFields,
    text: String,
    html: String,
    more_info: Option<Url>,
}

#[derive(Debug, Default)]
struct PanelPage {
    panels: Vec<Panel>,
    next: Option<Url>,
}

/// Adapter for the science foundation's calls page.
#[derive(Debug)]
pub struct FctAdapter {
    id: String,
    settings: ListingSite,
    session: Option<HttpSession>,
}

impl FctAdapter {
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
impl SiteAdapter for FctAdapter {
    fn site_id(&self) -> &str {
        &self.id
    }

    #[instrument(skip(self, ctx), fields(site = %self.id))]
    async fn run(&mut self, ctx: &mut AdapterContext<'_>) -> Result<Vec<CallRecord>, AdapterError> {
        let session: &HttpSession = self.session.insert(open_session(&self.id, ctx.session_options)?);
        let site_id = self.id.as_str();
        let max_pages = self.settings.max_pages() as usize;

        let mut records = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(self.settings.listing_url(DEFAULT_LISTING_PATH));
        while let Some(url) = next.take() {
            if visited.len() >= max_pages {
                break;
            }
            let page = match ctx.load_page(session, &url).await {
                Ok(page) => page,
                Err(error) if visited.is_empty() => {
                    return Err(AdapterError::listing_unavailable(site_id, error));
                }
                Err(error) => {
                    warn!(url = %url, error = %error, "stopping pagination");
                    break;
                }
            };
            visited.insert(page_key(&page.url));
            let parsed = parse_panels(&page.html, &page.url);
            debug!(url = %page.url, panels = parsed.panels.len(), "calls page parsed");

            for panel in parsed.panels {
                ctx.listing_seen();
                records.push(collect_panel(ctx, session, site_id, &page.url, panel).await);
            }
            next = parsed
                .next
                .filter(|url| !visited.contains(&page_key(url)))
                .map(|url| url.as_str().to_string());
        }

        ctx.records_emitted(records.len());
        info!(records = records.len(), "calls page crawled");
        Ok(records)
    }

    async fn cleanup(&mut self) {
        if self.session.take().is_some() {
            debug!(site = %self.id, "session released");
        }
    }
}

async fn collect_panel(
    ctx: &mut AdapterContext<'_>,
    session: &HttpSession,
    site_id: &str,
    page_url: &Url,
    panel: Panel,
) -> CallRecord {
    let mut record = CallRecord::new(site_id, panel.title);
    fill_record(&mut record, &panel.fields);
    if record.external_number.is_none() {
        record.external_number = extract_reference_code(&panel.text);
    }
    fill_dates_from_text(&mut record, &panel.text);

    let fragment = Page::from_html(page_url.clone(), panel.html);
    let Some(more_info) = panel.more_info else {
        ctx.attach_documents(session, &mut record, &[&fragment]).await;
        return record;
    };
    record.landing_url = Some(more_info.as_str().to_string());
    match ctx.load_page(session, more_info.as_str()).await {
        Ok(detail) => {
            DetailView::parse(&detail.html).apply_to(&mut record);
            ctx.attach_documents(session, &mut record, &[&fragment, &detail]).await;
        }
        Err(error) => {
            warn!(url = %more_info, error = %error, "information page unavailable; using panel only");
            ctx.attach_documents(session, &mut record, &[&fragment]).await;
        }
    }
    record
}

fn parse_panels(html: &str, page_url: &Url) -> PanelPage {
    let document = Html::parse_document(html);
    let panels = PANEL_LAYOUTS
        .iter()
        .map(|(panel, header, body)| {
            document
                .select(panel)
                .filter_map(|item| read_panel(item, header, body, page_url))
                .collect::<Vec<_>>()
        })
        .find(|panels| !panels.is_empty())
        .unwrap_or_default();
    PanelPage {
        panels,
        next: next_page_url(&document, page_url),
    }
}

fn read_panel(item: ElementRef<'_>, header: &Selector, body: &Selector, page_url: &Url) -> Option<Panel> {
    let title = first_text(item, header)?;
    let body_html: String = item
        .select(body)
        .map(|el| el.html())
        .collect::<Vec<_>>()
        .join("\n");
    let html = if body_html.is_empty() { item.html() } else { body_html };
    let more_info = item.select(&ANCHOR_SELECTOR).find_map(|anchor| {
        let text = normalize_text(&text_of(anchor));
        MORE_INFO_PHRASES
            .iter()
            .any(|phrase| text.contains(phrase))
            .then(|| anchor.value().attr("href"))
            .flatten()
            .and_then(|href| absolutize_url(href, page_url))
    });
    Some(Panel {
        title,
        fields: LabeledFields::from_element(item),
        text: text_of(item),
        html,
        more_info,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    const PAGE: &str = r#"<html><head><title>Concursos</title></head><body>
        <div class="accordion">
          <div class="accordion-item">
            <h2 class="accordion-header"><button class="accordion-button">Concurso de Projetos IC&amp;DT 2025</button></h2>
            <div class="accordion-collapse"><div class="accordion-body">
              <p>Período de candidaturas: 15 de janeiro de 2025 a 28 de fevereiro de 2025</p>
              <p><strong>Área científica:</strong> Todas</p>
              <a href="/documentos/regulamento_ic_dt.pdf">Regulamento</a>
              <a href="/concursos/icdt-2025">Mais informações</a>
            </div></div>
          </div>
          <div class="accordion-item">
            <h2 class="accordion-header"><button class="accordion-button">Bolsas de Doutoramento</button></h2>
            <div class="accordion-collapse"><div class="accordion-body"><p>Edital em breve</p></div></div>
          </div>
        </div></body></html>"#;

    #[test]
    fn test_parse_accordion_panels() {
        let url = Url::parse("https://fct.test/concursos/").unwrap();
        let parsed = parse_panels(PAGE, &url);
        assert_eq!(parsed.panels.len(), 2);
        let first = &parsed.panels[0];
        assert_eq!(first.title, "Concurso de Projetos IC&DT 2025");
        assert_eq!(first.more_info.as_ref().unwrap().as_str(), "https://fct.test/concursos/icdt-2025");
        assert!(first.html.contains("regulamento_ic_dt.pdf"));
        assert!(parsed.panels[1].more_info.is_none());
        assert!(parsed.next.is_none());
    }

    #[test]
    fn test_panel_dates_and_area() {
        let url = Url::parse("https://fct.test/concursos/").unwrap();
        let panel = parse_panels(PAGE, &url).panels.remove(0);
        let mut record = CallRecord::new("fct", panel.title.clone());
        fill_record(&mut record, &panel.fields);
        fill_dates_from_text(&mut record, &panel.text);
        assert_eq!(record.funding_area.as_deref(), Some("Todas"));
        assert_eq!(record.publication_date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(record.closing_date, NaiveDate::from_ymd_opt(2025, 2, 28));
    }

    #[test]
    fn test_details_summary_layout() {
        let url = Url::parse("https://fct.test/concursos/").unwrap();
        let parsed = parse_panels(
            r#"<details><summary>Programa Investigador FCT</summary><p>Aviso FCT-CEEC-2025-1</p></details>"#,
            &url,
        );
        assert_eq!(parsed.panels.len(), 1);
        assert_eq!(extract_reference_code(&parsed.panels[0].text).as_deref(), Some("FCT-CEEC-2025-1"));
    }
}
