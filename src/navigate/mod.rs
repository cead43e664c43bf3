//! Resilient navigation: bounded retry with exponential backoff around page loads.
//!
//! # Overview
//!
//! - [`PageFetcher`] - async trait for loading pages and raw payloads
//! - [`HttpSession`] - cookie-carrying, paced reqwest implementation
//! - [`Navigator`] - retry loop shared by every site adapter
//! - [`SuccessCheck`] - the default success predicate (title, error page, host)
//!
//! A navigation succeeds only when the page loads *and* passes the caller's
//! predicate. A silent redirect to an unrelated domain fails the host check
//! and is retried like any other bad page. Once the attempt budget is spent
//! the navigator returns [`NavigationError::Exhausted`], which adapters treat
//! as a per-record skip.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::navigate::{HttpSession, Navigator, SessionOptions, SuccessCheck};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = HttpSession::open("fct", &SessionOptions::default())?;
//! let navigator = Navigator::default();
//! let page = navigator
//!     .navigate(&session, "https://www.fct.pt/financiamento/concursos/", &SuccessCheck::on_host("fct.pt"))
//!     .await?;
//! println!("{}", page.title().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

mod error;
pub mod pacer;
mod page;
mod retry;
mod session;

pub use error::NavigationError;
pub use pacer::{RequestPacer, parse_retry_after};
pub use page::{FetchedDocument, Page};
pub use retry::{
    BackoffPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision,
    classify_error,
};
pub use session::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_READ_TIMEOUT_SECS,
    DEFAULT_REQUEST_DELAY, HttpSession, PageFetcher, SessionOptions,
};

use tracing::{debug, instrument, warn};

use crate::utils::host_within;

/// Default success predicate for a navigation.
///
/// - the page must carry a non-empty `<title>` (when `require_title`)
/// - the page must not read like an error/maintenance page
/// - when `expected_host` is set, the final URL must be on that host or a subdomain
#[derive(Debug, Clone)]
pub struct SuccessCheck {
    /// Host the final URL must belong to.
    pub expected_host: Option<String>,
    /// Whether a missing title fails the check.
    pub require_title: bool,
}

impl Default for SuccessCheck {
    fn default() -> Self {
        Self {
            expected_host: None,
            require_title: true,
        }
    }
}

impl SuccessCheck {
    /// A check that additionally pins the final host.
    #[must_use]
    pub fn on_host(host: impl Into<String>) -> Self {
        Self {
            expected_host: Some(host.into()),
            ..Self::default()
        }
    }

    /// Returns a copy that tolerates pages without a title (fragments, frames).
    #[must_use]
    pub fn allow_missing_title(mut self) -> Self {
        self.require_title = false;
        self
    }

    /// Evaluates the page, returning the rejection reason on failure.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the page does not qualify.
    pub fn evaluate(&self, page: &Page) -> Result<(), String> {
        if let Some(expected) = &self.expected_host {
            let host = page.host().unwrap_or_default();
            if !host_within(host, expected) {
                return Err(format!("redirected to unrelated host '{host}' (expected '{expected}')"));
            }
        }
        if self.require_title && page.title().is_none() {
            return Err("page has no title".to_string());
        }
        if page.looks_like_error_page() {
            return Err(format!(
                "page looks like an error page (title: {:?})",
                page.title().unwrap_or_default()
            ));
        }
        Ok(())
    }
}

/// Retry-with-backoff wrapper around [`PageFetcher::fetch_page`].
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    policy: BackoffPolicy,
}

impl Navigator {
    /// Creates a navigator with the given backoff policy.
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    /// Returns the backoff policy.
    #[must_use]
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Navigates with the configured attempt bound and a [`SuccessCheck`].
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::Exhausted`] when no attempt produced an acceptable page.
    pub async fn navigate(
        &self,
        fetcher: &dyn PageFetcher,
        url: &str,
        check: &SuccessCheck,
    ) -> Result<Page, NavigationError> {
        self.navigate_with(fetcher, url, self.policy.max_attempts(), |page| {
            check.evaluate(page)
        })
        .await
    }

    /// Navigates with an explicit attempt bound and success predicate.
    ///
    /// Waits `base * 2^(attempt-1)` (raised to any `Retry-After` the server
    /// sent) between attempts. Permanent failures such as 404 stop early.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::Exhausted`] wrapping the last attempt's error.
    #[instrument(skip(self, fetcher, success), fields(url = %url))]
    pub async fn navigate_with<F>(
        &self,
        fetcher: &dyn PageFetcher,
        url: &str,
        max_attempts: u32,
        success: F,
    ) -> Result<Page, NavigationError>
    where
        F: Fn(&Page) -> Result<(), String> + Send + Sync,
    {
        let page = self
            .with_retry(url, max_attempts, || fetcher.fetch_page(url), success)
            .await?;
        debug!(final_url = %page.url, "navigation succeeded");
        Ok(page)
    }

    /// Fetches a raw payload under the same retry policy as page navigation.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::Exhausted`] wrapping the last attempt's error.
    #[instrument(skip(self, fetcher), fields(url = %url))]
    pub async fn download(
        &self,
        fetcher: &dyn PageFetcher,
        url: &str,
    ) -> Result<FetchedDocument, NavigationError> {
        self.with_retry(
            url,
            self.policy.max_attempts(),
            || fetcher.fetch_document(url),
            |_| Ok(()),
        )
        .await
    }

    async fn with_retry<T, Op, Fut, Check>(
        &self,
        url: &str,
        max_attempts: u32,
        operation: Op,
        success: Check,
    ) -> Result<T, NavigationError>
    where
        Op: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, NavigationError>> + Send,
        Check: Fn(&T) -> Result<(), String> + Send + Sync,
        T: Send,
    {
        let policy = self.policy.clone().with_max_attempts(max_attempts);
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => match success(&value) {
                    Ok(()) => return Ok(value),
                    Err(reason) => NavigationError::rejected(url, reason),
                },
                Err(error) => error,
            };

            let failure = classify_error(&error);
            match policy.should_retry(failure, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    let delay = retry_after_floor(&error).map_or(delay, |floor| delay.max(floor));
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "attempt failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next_attempt;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(attempt, error = %error, reason = %reason, "giving up");
                    return Err(NavigationError::exhausted(url, attempt, error));
                }
            }
        }
    }
}

fn retry_after_floor(error: &NavigationError) -> Option<std::time::Duration> {
    match error {
        NavigationError::HttpStatus {
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}
