//! Site definitions loaded from `sites.json`.
//!
//! ```json
//! {
//!   "discovery": { "intermediate_hosts": ["(^|\\.)norte2030\\.pt$"] },
//!   "sites": [
//!     { "kind": "portugal2030", "base_url": "https://portugal2030.pt" },
//!     { "kind": "fct", "base_url": "https://www.fct.pt", "max_pages": 1 },
//!     { "kind": "balcao", "base_url": "https://balcaofundosue.pt",
//!       "username_env": "BALCAO_USERNAME", "password_env": "BALCAO_PASSWORD" }
//!   ]
//! }
//! ```
//!
//! Credentials never live in the file; only the names of the environment
//! variables that hold them do.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::SiteAdapter;
use super::balcao::BalcaoAdapter;
use super::fct::FctAdapter;
use super::portugal2030::Portugal2030Adapter;
use crate::discover::DiscoveryConfig;

/// Default listing page limit.
pub const DEFAULT_MAX_PAGES: u32 = 20;

/// Errors reading or interpreting `sites.json`.
#[derive(Debug, Error)]
pub enum SitesFileError {
    /// The file could not be read.
    #[error("failed to read sites file {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid site configuration.
    #[error("invalid sites file: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two sites share an id.
    #[error("duplicate site id '{0}'")]
    DuplicateId(String),

    /// A base URL does not parse.
    #[error("site '{site}' has an invalid base_url '{url}'")]
    InvalidBaseUrl {
        /// Site id.
        site: String,
        /// The offending value.
        url: String,
    },
}

/// Top-level `sites.json` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SitesFile {
    /// Discovery vocabulary and host patterns; defaults fill omitted fields.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Sites in registration order.
    pub sites: Vec<SiteConfig>,
}

impl SitesFile {
    /// Parses and validates a sites document.
    ///
    /// # Errors
    ///
    /// Returns [`SitesFileError`] on malformed JSON, duplicate ids, or bad URLs.
    pub fn parse(contents: &str) -> Result<Self, SitesFileError> {
        let file: Self = serde_json::from_str(contents)?;
        let mut ids = std::collections::HashSet::new();
        for site in &file.sites {
            let id = site.id();
            if !ids.insert(id.to_string()) {
                return Err(SitesFileError::DuplicateId(id.to_string()));
            }
            if url::Url::parse(site.base_url()).is_err() {
                return Err(SitesFileError::InvalidBaseUrl {
                    site: id.to_string(),
                    url: site.base_url().to_string(),
                });
            }
        }
        Ok(file)
    }

    /// Reads and parses `path`.
    ///
    /// # Errors
    ///
    /// See [`SitesFile::parse`]; also fails when the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, SitesFileError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SitesFileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Instantiates adapters in registration order.
    ///
    /// When `only` is non-empty, sites whose id is not listed are left out.
    #[must_use]
    pub fn build_adapters(&self, only: &[String]) -> Vec<Box<dyn SiteAdapter>> {
        self.sites
            .iter()
            .filter(|site| only.is_empty() || only.iter().any(|id| id == site.id()))
            .map(SiteConfig::build)
            .collect()
    }
}

/// One site, tagged by the adapter that handles it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteConfig {
    /// The national funds portal's call listing.
    Portugal2030(ListingSite),
    /// The science foundation's open calls.
    Fct(ListingSite),
    /// The authenticated applications desk.
    Balcao(BalcaoSite),
}

impl SiteConfig {
    /// Adapter id: the configured `id`, else the kind name.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Portugal2030(site) => site.id.as_deref().unwrap_or("portugal2030"),
            Self::Fct(site) => site.id.as_deref().unwrap_or("fct"),
            Self::Balcao(site) => site.listing.id.as_deref().unwrap_or("balcao"),
        }
    }

    /// Configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match self {
            Self::Portugal2030(site) | Self::Fct(site) => &site.base_url,
            Self::Balcao(site) => &site.listing.base_url,
        }
    }

    fn build(&self) -> Box<dyn SiteAdapter> {
        let id = self.id().to_string();
        match self {
            Self::Portugal2030(site) => Box::new(Portugal2030Adapter::new(id, site)),
            Self::Fct(site) => Box::new(FctAdapter::new(id, site)),
            Self::Balcao(site) => Box::new(BalcaoAdapter::new(id, site)),
        }
    }
}

/// Settings shared by every listing-driven site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListingSite {
    /// Adapter id override.
    #[serde(default)]
    pub id: Option<String>,
    /// Scheme and host, optionally with a path prefix.
    pub base_url: String,
    /// Listing path relative to `base_url`; each adapter has its own default.
    #[serde(default)]
    pub listing_path: Option<String>,
    /// Upper bound on listing pages followed.
    #[serde(default)]
    pub max_pages: Option<u32>,
}

impl ListingSite {
    /// Creates settings for `base_url` with adapter defaults.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            id: None,
            base_url: base_url.into(),
            listing_path: None,
            max_pages: None,
        }
    }

    /// Page limit, defaulting to [`DEFAULT_MAX_PAGES`].
    #[must_use]
    pub fn max_pages(&self) -> u32 {
        self.max_pages.unwrap_or(DEFAULT_MAX_PAGES).max(1)
    }

    /// Absolute listing URL, using `default_path` when none is configured.
    #[must_use]
    pub fn listing_url(&self, default_path: &str) -> String {
        let path = self.listing_path.as_deref().unwrap_or(default_path);
        join_url(&self.base_url, path)
    }
}

/// Settings for the authenticated desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalcaoSite {
    /// Listing settings.
    #[serde(flatten)]
    pub listing: ListingSite,
    /// Login form page, relative to `base_url`.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Environment variable holding the username.
    #[serde(default = "default_username_env")]
    pub username_env: String,
    /// Environment variable holding the password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl BalcaoSite {
    /// Creates settings for `base_url` with the default login path and variable names.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            listing: ListingSite::new(base_url),
            login_path: default_login_path(),
            username_env: default_username_env(),
            password_env: default_password_env(),
        }
    }

    /// Absolute login page URL.
    #[must_use]
    pub fn login_url(&self) -> String {
        join_url(&self.listing.base_url, &self.login_path)
    }
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_username_env() -> String {
    "BALCAO_USERNAME".to_string()
}

fn default_password_env() -> String {
    "BALCAO_PASSWORD".to_string()
}

/// Joins a base URL and a path without doubling or dropping the slash.
///
/// Absolute `path` values are returned unchanged.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
