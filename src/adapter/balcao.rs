//! Authenticated applications desk.
//!
//! The desk only lists calls after login. The login form is read from the
//! login page so hidden anti-forgery inputs are posted back unchanged; the
//! credentials come from environment variables named in `sites.json`.
//! A rejected login ends this adapter with
//! [`AdapterError::AuthenticationRejected`].
//!
//! Calls are listed in a table; each row links to a detail page, which may
//! in turn link to the "create proposal" page where the application forms
//! are published. Discovery runs over all three.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::config::BalcaoSite;
use super::extract::{DetailView, LabeledFields, detail_link, fill_dates_from_text, fill_record, next_page_url, text_of};
use super::{AdapterContext, AdapterError, SiteAdapter, open_session};
use crate::catalog::CallRecord;
use crate::catalog::identity::normalize_text;
use crate::discover::{DiscoveryRules, page_key};
use crate::navigate::{HttpSession, Page};
use crate::utils::{absolutize_url, collapse_whitespace, compile_static_selector};

/// Listing path used when the site entry has none.
pub const DEFAULT_LISTING_PATH: &str = "/avisos";

/// Column headers that name the call title.
const TITLE_COLUMNS: &[&str] = &["designacao", "titulo", "nome", "aviso", "title"];

/// Link texts leading to the proposal creation page.
const PROPOSAL_PHRASES: &[&str] = &[
    "criar candidatura",
    "nova candidatura",
    "submeter candidatura",
    "iniciar candidatura",
    "criar proposta",
    "create proposal",
];

static FORM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("form"));
static INPUT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("input[name]"));
static PASSWORD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("input[type=password]"));
static ERROR_BANNER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    compile_static_selector(
        ".alert-danger, .alert-error, .login-error, .error-message, .validation-summary-errors, .field-validation-error, [role=alert]",
    )
});
static TABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("table"));
static HEADER_CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("thead th, tr:first-child th"));
static BODY_ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("tr"));
static DATA_CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("td"));
static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a[href]"));

/// The parts of a login form needed to submit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoginForm {
    pub action: Url,
    pub username_field: String,
    pub password_field: String,
    /// Hidden and pre-filled inputs, posted back as found.
    pub preserved: Vec<(String, String)>,
}

impl LoginForm {
    fn fields(&self, username: &str, password: &str) -> Vec<(String, String)> {
        let mut fields = self.preserved.clone();
        fields.push((self.username_field.clone(), username.to_string()));
        fields.push((self.password_field.clone(), password.to_string()));
        fields
    }
}

/// Credentials read from the environment. `Debug` never shows them.
struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"[redacted]")
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Clone)]
struct TableRow {
    title: String,
    fields: LabeledFields,
    text: String,
    html: String,
    detail_url: Option<Url>,
}

/// Adapter for the authenticated applications desk.
#[derive(Debug)]
pub struct BalcaoAdapter {
    id: String,
    settings: BalcaoSite,
    session: Option<HttpSession>,
}

impl BalcaoAdapter {
    /// Creates an adapter for `settings`.
    #[must_use]
    pub fn new(id: impl Into<String>, settings: &BalcaoSite) -> Self {
        Self {
            id: id.into(),
            settings: settings.clone(),
            session: None,
        }
    }

    fn credentials(&self) -> Result<Credentials, AdapterError> {
        let read = |variable: &str| {
            std::env::var(variable)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AdapterError::missing_credentials(&self.id, variable))
        };
        Ok(Credentials {
            username: read(&self.settings.username_env)?,
            password: read(&self.settings.password_env)?,
        })
    }
}

#[async_trait]
impl SiteAdapter for BalcaoAdapter {
    fn site_id(&self) -> &str {
        &self.id
    }

    #[instrument(skip(self, ctx), fields(site = %self.id))]
    async fn run(&mut self, ctx: &mut AdapterContext<'_>) -> Result<Vec<CallRecord>, AdapterError> {
        let credentials = self.credentials()?;
        let session: &HttpSession = self.session.insert(open_session(&self.id, ctx.session_options)?);
        let site_id = self.id.as_str();
        let settings = &self.settings;

        log_in(ctx, session, site_id, settings, &credentials).await?;
        info!("logged in");

        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(settings.listing.listing_url(DEFAULT_LISTING_PATH));
        let mut records = Vec::new();
        while let Some(url) = next.take() {
            if visited.len() >= settings.listing.max_pages() as usize {
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
            let (rows, next_url) = parse_table(&page.html, &page.url, ctx.discoverer.rules());
            debug!(url = %page.url, rows = rows.len(), "listing table parsed");
            for row in rows {
                ctx.listing_seen();
                if let Some(record) = collect_row(ctx, session, site_id, &page.url, row).await {
                    records.push(record);
                }
            }
            next = next_url
                .filter(|url| !visited.contains(&page_key(url)))
                .map(|url| url.as_str().to_string());
        }

        ctx.records_emitted(records.len());
        info!(records = records.len(), "desk listing crawled");
        Ok(records)
    }

    async fn cleanup(&mut self) {
        if self.session.take().is_some() {
            debug!(site = %self.id, "session released");
        }
    }
}

async fn log_in(
    ctx: &AdapterContext<'_>,
    session: &HttpSession,
    site_id: &str,
    settings: &BalcaoSite,
    credentials: &Credentials,
) -> Result<(), AdapterError> {
    let login_url = settings.login_url();
    let login_page = ctx
        .load_page(session, &login_url)
        .await
        .map_err(|e| AdapterError::listing_unavailable(site_id, e))?;
    let form = parse_login_form(&login_page.html, &login_page.url)
        .ok_or_else(|| AdapterError::authentication_rejected(site_id, "no login form on the login page"))?;
    debug!(action = %form.action, preserved = form.preserved.len(), "submitting login form");

    let response = session
        .post_form(form.action.as_str(), &form.fields(&credentials.username, &credentials.password))
        .await
        .map_err(|e| AdapterError::authentication_rejected(site_id, e.to_string()))?;
    let login_path = Url::parse(&login_url).map_or_else(|_| settings.login_path.clone(), |url| url.path().to_string());
    match login_rejection(&response, &login_path) {
        Some(reason) => Err(AdapterError::authentication_rejected(site_id, reason)),
        None => Ok(()),
    }
}

/// Finds the form that holds a password input.
pub(crate) fn parse_login_form(html: &str, page_url: &Url) -> Option<LoginForm> {
    let document = Html::parse_document(html);
    let form = document
        .select(&FORM_SELECTOR)
        .find(|form| form.select(&PASSWORD_SELECTOR).next().is_some())?;
    let action = form
        .value()
        .attr("action")
        .and_then(|action| absolutize_url(action, page_url))
        .unwrap_or_else(|| page_url.clone());

    let mut username_field = None;
    let mut password_field = None;
    let mut preserved = Vec::new();
    for input in form.select(&INPUT_SELECTOR) {
        let element = input.value();
        let Some(name) = element.attr("name") else { continue };
        let kind = element.attr("type").unwrap_or("text").to_ascii_lowercase();
        match kind.as_str() {
            "password" if password_field.is_none() => password_field = Some(name.to_string()),
            "text" | "email" | "tel" if username_field.is_none() => username_field = Some(name.to_string()),
            "hidden" => preserved.push((name.to_string(), element.attr("value").unwrap_or_default().to_string())),
            "checkbox" | "radio" if element.attr("checked").is_some() => {
                preserved.push((name.to_string(), element.attr("value").unwrap_or("on").to_string()));
            }
            _ => {}
        }
    }
    Some(LoginForm {
        action,
        username_field: username_field.unwrap_or_else(|| "username".to_string()),
        password_field: password_field?,
        preserved,
    })
}

/// Why a login response means the credentials were not accepted, if it does.
pub(crate) fn login_rejection(response: &Page, login_path: &str) -> Option<String> {
    if response.status >= 400 {
        return Some(format!("login returned HTTP {}", response.status));
    }
    let document = Html::parse_document(&response.html);
    if let Some(banner) = document
        .select(&ERROR_BANNER_SELECTOR)
        .map(text_of)
        .find(|text| !text.is_empty())
    {
        return Some(format!("error banner: {}", collapse_whitespace(&banner)));
    }
    if document.select(&PASSWORD_SELECTOR).next().is_some() {
        return Some("login form still present after submitting".to_string());
    }
    let trimmed = login_path.trim_end_matches('/');
    if !trimmed.is_empty() && response.url.path().trim_end_matches('/') == trimmed {
        return Some("redirected back to the login page".to_string());
    }
    None
}

async fn collect_row(
    ctx: &mut AdapterContext<'_>,
    session: &HttpSession,
    site_id: &str,
    listing_url: &Url,
    row: TableRow,
) -> Option<CallRecord> {
    let mut record = CallRecord::new(site_id, row.title);
    record.landing_url = row.detail_url.as_ref().map(|url| url.as_str().to_string());
    fill_record(&mut record, &row.fields);
    fill_dates_from_text(&mut record, &row.text);
    let fragment = Page::from_html(listing_url.clone(), row.html);

    let Some(detail_url) = row.detail_url else {
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

    let proposal = match proposal_link(&detail.html, &detail.url) {
        Some(url) => match ctx.load_page(session, url.as_str()).await {
            Ok(page) => Some(page),
            Err(error) => {
                warn!(url = %url, error = %error, "proposal page unavailable");
                None
            }
        },
        None => None,
    };
    let mut pages: Vec<&Page> = vec![&fragment, &detail];
    pages.extend(proposal.as_ref());
    ctx.attach_documents(session, &mut record, &pages).await;
    Some(record)
}

/// Link to the "create proposal" page, matched by its visible text.
fn proposal_link(html: &str, page_url: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    document.select(&ANCHOR_SELECTOR).find_map(|anchor| {
        let text = normalize_text(&text_of(anchor));
        if PROPOSAL_PHRASES.iter().any(|phrase| text.contains(phrase)) {
            anchor.value().attr("href").and_then(|href| absolutize_url(href, page_url))
        } else {
            None
        }
    })
}

/// Reads the first table with a header row; columns are mapped by header text.
fn parse_table(html: &str, page_url: &Url, rules: &DiscoveryRules) -> (Vec<TableRow>, Option<Url>) {
    let document = Html::parse_document(html);
    let next = next_page_url(&document, page_url);
    let Some((table, headers)) = document.select(&TABLE_SELECTOR).find_map(|table| {
        let headers: Vec<String> = table.select(&HEADER_CELL_SELECTOR).map(text_of).collect();
        (!headers.is_empty()).then_some((table, headers))
    }) else {
        return (Vec::new(), next);
    };
    let title_column = headers.iter().position(|header| {
        let header = normalize_text(header);
        TITLE_COLUMNS.iter().any(|name| header == *name || header.starts_with(&format!("{name} ")))
    });

    let rows = table
        .select(&BODY_ROW_SELECTOR)
        .filter_map(|row| read_row(row, &headers, title_column, page_url, rules))
        .collect();
    (rows, next)
}

fn read_row(
    row: ElementRef<'_>,
    headers: &[String],
    title_column: Option<usize>,
    page_url: &Url,
    rules: &DiscoveryRules,
) -> Option<TableRow> {
    let cells: Vec<String> = row.select(&DATA_CELL_SELECTOR).map(text_of).collect();
    if cells.is_empty() {
        return None;
    }
    let title = title_column
        .and_then(|column| cells.get(column).cloned())
        .filter(|title| !title.is_empty())
        .or_else(|| cells.iter().max_by_key(|cell| cell.chars().count()).cloned())?;
    Some(TableRow {
        title,
        fields: LabeledFields::from_pairs(headers.iter().zip(cells.iter())),
        text: text_of(row),
        html: format!("<table>{}</table>", row.html()),
        detail_url: detail_link(row, page_url, rules),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn url(value: &str) -> Url {
        Url::parse(value).unwrap()
    }

    const LOGIN: &str = r#"<html><head><title>Entrar</title></head><body>
        <form id="search" action="/pesquisa"><input name="q"></form>
        <form method="post" action="/login/submit">
          <input type="hidden" name="__RequestVerificationToken" value="tok-123">
          <input type="email" name="Email">
          <input type="password" name="Password">
          <input type="checkbox" name="RememberMe" value="true" checked>
          <button type="submit">Entrar</button>
        </form></body></html>"#;

    #[test]
    fn test_parse_login_form_preserves_hidden_inputs() {
        let form = parse_login_form(LOGIN, &url("https://desk.test/login")).unwrap();
        assert_eq!(form.action.as_str(), "https://desk.test/login/submit");
        assert_eq!(form.username_field, "Email");
        assert_eq!(form.password_field, "Password");
        assert_eq!(
            form.fields("ana@example.pt", "s3cret"),
            vec![
                ("__RequestVerificationToken".to_string(), "tok-123".to_string()),
                ("RememberMe".to_string(), "true".to_string()),
                ("Email".to_string(), "ana@example.pt".to_string()),
                ("Password".to_string(), "s3cret".to_string()),
            ]
        );
    }

    #[test]
    fn test_page_without_password_input_has_no_login_form() {
        assert!(parse_login_form(r#"<form><input name="q"></form>"#, &url("https://desk.test/")).is_none());
    }

    #[test]
    fn test_login_rejection_signals() {
        let page = |at: &str, html: &str| Page::from_html(url(at), html);
        assert!(login_rejection(&page("https://desk.test/painel", "<h1>Bem-vindo</h1>"), "/login").is_none());
        assert_eq!(
            login_rejection(
                &page("https://desk.test/login", r#"<div class="alert-danger">Credenciais inválidas</div>"#),
                "/login"
            )
            .unwrap(),
            "error banner: Credenciais inválidas"
        );
        assert!(login_rejection(&page("https://desk.test/x", LOGIN), "/login").unwrap().contains("still present"));
        assert!(login_rejection(&page("https://desk.test/login/", "<p>ok</p>"), "/login").unwrap().contains("redirected back"));
        let mut failed = page("https://desk.test/login/submit", "");
        failed.status = 401;
        assert_eq!(login_rejection(&failed, "/login").unwrap(), "login returned HTTP 401");
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials {
            username: "ana".to_string(),
            password: "s3cret".to_string(),
        };
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("ana"));
    }

    #[test]
    fn test_parse_table_maps_columns() {
        let (rows, next) = parse_table(
            r#"<table><thead><tr><th>Código</th><th>Designação</th><th>Data de fecho</th><th></th></tr></thead>
               <tbody>
                 <tr><td>CENTRO2030-2025-07</td><td>Apoio à contratação</td><td>31/07/2025</td>
                     <td><a href="/avisos/detalhe/77">Consultar</a></td></tr>
               </tbody></table>"#,
            &url("https://desk.test/avisos"),
            &DiscoveryRules::default(),
        );
        assert!(next.is_none());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.title, "Apoio à contratação");
        assert_eq!(row.detail_url.as_ref().unwrap().as_str(), "https://desk.test/avisos/detalhe/77");

        let mut record = CallRecord::new("balcao", row.title.clone());
        fill_record(&mut record, &row.fields);
        assert_eq!(record.external_number.as_deref(), Some("CENTRO2030-2025-07"));
        assert_eq!(record.closing_date, NaiveDate::from_ymd_opt(2025, 7, 31));
    }

    #[test]
    fn test_proposal_link_by_text() {
        let link = proposal_link(
            r#"<a href="/avisos">Voltar</a><a class="btn" href="/candidaturas/nova?aviso=77">Criar candidatura</a>"#,
            &url("https://desk.test/avisos/detalhe/77"),
        )
        .unwrap();
        assert_eq!(link.as_str(), "https://desk.test/candidaturas/nova?aviso=77");
    }
}
