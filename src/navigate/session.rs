//! HTTP crawl session: one cookie jar, one paced request stream.
//!
//! A [`HttpSession`] is owned by exactly one site adapter for the duration of
//! its run. Cookies set during login stay in the session's jar and are sent
//! with every later page load and document download, so acquisition uses the
//! adapter's active credentials without any extra plumbing.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, Proxy, Response};
use tracing::{debug, instrument, warn};
use url::Url;

use super::pacer::RequestPacer;
use super::page::{FetchedDocument, Page};
use super::NavigationError;
use crate::user_agent;

/// Default HTTP connect timeout (20 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 20;

/// Default HTTP read timeout (2 minutes; some portals stream large annexes slowly).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;

/// Default cap on a single downloaded document (100 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 100 * 1024 * 1024;

/// Default gap between consecutive requests of one session.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(1500);

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Something that can load pages and raw payloads.
///
/// [`HttpSession`] is the production implementation; tests substitute
/// scripted fetchers.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Loads an HTML page, following redirects.
    async fn fetch_page(&self, url: &str) -> Result<Page, NavigationError>;

    /// Downloads a raw payload, following redirects.
    async fn fetch_document(&self, url: &str) -> Result<FetchedDocument, NavigationError>;
}

/// Tunables for a crawl session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: u64,
    /// Minimum gap between consecutive requests.
    pub request_delay: Duration,
    /// Cap on a single downloaded payload.
    pub max_document_bytes: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            request_delay: DEFAULT_REQUEST_DELAY,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

/// A cookie-carrying, paced HTTP session.
pub struct HttpSession {
    label: String,
    client: Client,
    cookie_jar: Arc<Jar>,
    pacer: RequestPacer,
    max_document_bytes: u64,
}

impl std::fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSession")
            .field("label", &self.label)
            .field("request_delay", &self.pacer.delay())
            .field("max_document_bytes", &self.max_document_bytes)
            .finish_non_exhaustive()
    }
}

impl HttpSession {
    /// Opens a new session with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::Session`] when the HTTP client cannot be built.
    #[instrument(level = "debug", skip(options))]
    pub fn open(label: &str, options: &SessionOptions) -> Result<Self, NavigationError> {
        let cookie_jar = Arc::new(Jar::default());
        let client = build_client(label, Arc::clone(&cookie_jar), options)?;
        Ok(Self {
            label: label.to_string(),
            client,
            cookie_jar,
            pacer: RequestPacer::new(options.request_delay),
            max_document_bytes: options.max_document_bytes,
        })
    }

    /// Returns the session's cookie jar.
    #[must_use]
    pub fn cookie_jar(&self) -> Arc<Jar> {
        Arc::clone(&self.cookie_jar)
    }

    /// Submits an urlencoded form and returns the resulting page.
    ///
    /// The response is returned even for non-2xx statuses so callers can
    /// inspect a rejected login.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError`] on network failure or an invalid URL.
    #[instrument(skip(self, fields), fields(session = %self.label, url = %url))]
    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
    ) -> Result<Page, NavigationError> {
        Url::parse(url).map_err(|_| NavigationError::invalid_url(url))?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();

        self.pacer.wait_turn().await;
        let response = self
            .client
            .post(url)
            .header(ACCEPT, HTML_ACCEPT)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| NavigationError::network(url, e))?;

        read_page(url, response).await
    }

    async fn get(&self, url: &str, accept: &str) -> Result<Response, NavigationError> {
        Url::parse(url).map_err(|_| NavigationError::invalid_url(url))?;
        self.pacer.wait_turn().await;
        let response = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| NavigationError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            return Err(NavigationError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl PageFetcher for HttpSession {
    #[instrument(level = "debug", skip(self), fields(session = %self.label))]
    async fn fetch_page(&self, url: &str) -> Result<Page, NavigationError> {
        let response = self.get(url, HTML_ACCEPT).await?;
        read_page(url, response).await
    }

    #[instrument(level = "debug", skip(self), fields(session = %self.label))]
    async fn fetch_document(&self, url: &str) -> Result<FetchedDocument, NavigationError> {
        let response = self.get(url, "*/*").await?;
        let final_url = response.url().clone();
        let content_type = header_string(&response, CONTENT_TYPE.as_str());
        let content_disposition = header_string(&response, CONTENT_DISPOSITION.as_str());

        let declared_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared_length.is_some_and(|len| len > self.max_document_bytes) {
            return Err(NavigationError::body_too_large(url, self.max_document_bytes));
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| NavigationError::network(url, e))?;
            if (bytes.len() + chunk.len()) as u64 > self.max_document_bytes {
                return Err(NavigationError::body_too_large(url, self.max_document_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }
        debug!(url, bytes = bytes.len(), "payload fetched");

        Ok(FetchedDocument {
            requested_url: url.to_string(),
            url: final_url,
            content_type,
            content_disposition,
            bytes,
        })
    }
}

async fn read_page(requested_url: &str, response: Response) -> Result<Page, NavigationError> {
    let status = response.status().as_u16();
    let final_url = response.url().clone();
    let content_type = header_string(&response, CONTENT_TYPE.as_str());
    let html = response
        .text()
        .await
        .map_err(|e| NavigationError::network(requested_url, e))?;
    Ok(Page::new(requested_url, final_url, status, content_type, html))
}

fn header_string(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(std::string::ToString::to_string)
}

fn build_client(
    label: &str,
    cookie_jar: Arc<Jar>,
    options: &SessionOptions,
) -> Result<Client, NavigationError> {
    match try_build_client(Arc::clone(&cookie_jar), options, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; env proxies still apply on the fallback path.
            warn!(
                session = label,
                "HTTP client hit system proxy panic; using env-proxy fallback builder"
            );
            match try_build_client(cookie_jar, options, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(NavigationError::session(
                    "HTTP client construction panicked while loading proxy settings",
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(NavigationError::session(error.to_string()))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(NavigationError::session(error.to_string())),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    cookie_jar: Arc<Jar>,
    options: &SessionOptions,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let options = options.clone();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(cookie_jar, &options);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(cookie_jar: Arc<Jar>, options: &SessionOptions) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
        .timeout(Duration::from_secs(options.read_timeout_secs))
        .user_agent(user_agent::crawler_user_agent())
        .gzip(true)
        .cookie_provider(cookie_jar)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    let names: &[&str] = match scheme {
        "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
        _ => return None,
    };
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_options_default() {
        let options = SessionOptions::default();
        assert_eq!(options.connect_timeout_secs, 20);
        assert_eq!(options.read_timeout_secs, 120);
        assert_eq!(options.request_delay, Duration::from_millis(1500));
        assert_eq!(options.max_document_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn test_session_debug_omits_client_internals() {
        let session = HttpSession::open("fct", &SessionOptions::default()).unwrap();
        let debug = format!("{session:?}");
        assert!(debug.contains("fct"));
        assert!(!debug.contains("cookie_jar"));
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_invalid_url() {
        let session = HttpSession::open("test", &SessionOptions::default()).unwrap();
        let result = session.fetch_page("not a url").await;
        assert!(matches!(result, Err(NavigationError::InvalidUrl { .. })));
    }
}
