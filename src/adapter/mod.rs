//! Site adapters: one contract, one implementation per portal.
//!
//! Each adapter owns its [`HttpSession`] for the duration of a run. The
//! session is opened inside [`SiteAdapter::run`] and released by
//! [`SiteAdapter::cleanup`], which the orchestrator calls on every exit
//! path, including adapter errors and panics.
//!
//! Listing entries fail independently: a detail page that cannot be loaded
//! is logged, counted in [`AdapterStats::records_failed`], and skipped.
//! Only failures that make the whole site unusable (rejected login, listing
//! entry point unreachable) are returned as [`AdapterError`].

mod balcao;
mod config;
mod context;
mod error;
pub mod extract;
mod fct;
mod portugal2030;

use async_trait::async_trait;

pub use balcao::BalcaoAdapter;
pub use config::{BalcaoSite, DEFAULT_MAX_PAGES, ListingSite, SiteConfig, SitesFile, SitesFileError, join_url};
pub use context::{AdapterContext, AdapterStats};
pub use error::AdapterError;
pub use fct::FctAdapter;
pub use portugal2030::Portugal2030Adapter;

use crate::catalog::CallRecord;
use crate::navigate::{HttpSession, SessionOptions};

/// The scraping contract every site implements.
#[async_trait]
pub trait SiteAdapter: Send {
    /// Stable adapter id, also the first component of artifact paths.
    fn site_id(&self) -> &str;

    /// Crawls the site and returns its records in listing order.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] only for site-wide failures.
    async fn run(&mut self, ctx: &mut AdapterContext<'_>) -> Result<Vec<CallRecord>, AdapterError>;

    /// Releases the session and any other per-run resources.
    async fn cleanup(&mut self) {}
}

/// Opens a fresh session labelled with the adapter id.
pub(crate) fn open_session(
    site_id: &str,
    options: &SessionOptions,
) -> Result<HttpSession, AdapterError> {
    HttpSession::open(site_id, options).map_err(|e| AdapterError::session(site_id, e))
}
