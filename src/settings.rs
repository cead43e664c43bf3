//! Merges CLI flags, config file values, and built-in defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use harvester_core::navigate::{
    DEFAULT_BASE_DELAY, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_READ_TIMEOUT_SECS, DEFAULT_REQUEST_DELAY,
};
use harvester_core::{BackoffPolicy, FormatNormalizer, Navigator, SessionOptions, SofficeConverter};

use crate::app_config::{ConverterSetting, FileConfig};
use crate::cli::Args;

const DEFAULT_CATALOG_PATH: &str = "catalog.json";
const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
const DEFAULT_SITES_FILE: &str = "sites.json";
const DEFAULT_SOFFICE: &str = "soffice";
const BACKOFF_JITTER: Duration = Duration::from_millis(250);

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunSettings {
    pub catalog_path: PathBuf,
    pub artifacts_dir: PathBuf,
    pub sites_file: PathBuf,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub request_delay: Duration,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_document_bytes: u64,
    /// `None` when conversion is off.
    pub soffice: Option<PathBuf>,
}

impl RunSettings {
    /// Explicit flags win over the file, which wins over defaults.
    pub(crate) fn resolve(args: &Args, file: &FileConfig) -> Self {
        let convert = !args.no_convert && file.converter != Some(ConverterSetting::None);
        Self {
            catalog_path: pick_path(args.catalog.as_ref(), file.catalog_path.as_ref(), DEFAULT_CATALOG_PATH),
            artifacts_dir: pick_path(args.artifacts.as_ref(), file.artifacts_dir.as_ref(), DEFAULT_ARTIFACTS_DIR),
            sites_file: pick_path(args.sites.as_ref(), file.sites_file.as_ref(), DEFAULT_SITES_FILE),
            max_attempts: args
                .max_attempts
                .or(file.max_attempts)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            backoff_base: file
                .backoff_base_ms
                .map_or(DEFAULT_BASE_DELAY, Duration::from_millis),
            request_delay: args
                .delay_ms
                .or(file.request_delay_ms)
                .map_or(DEFAULT_REQUEST_DELAY, Duration::from_millis),
            connect_timeout_secs: file
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout_secs: file.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
            max_document_bytes: file
                .max_document_bytes
                .unwrap_or(DEFAULT_MAX_DOCUMENT_BYTES),
            soffice: convert.then(|| {
                file.soffice_path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SOFFICE))
            }),
        }
    }

    pub(crate) fn session_options(&self) -> SessionOptions {
        SessionOptions {
            connect_timeout_secs: self.connect_timeout_secs,
            read_timeout_secs: self.read_timeout_secs,
            request_delay: self.request_delay,
            max_document_bytes: self.max_document_bytes,
        }
    }

    pub(crate) fn navigator(&self) -> Navigator {
        Navigator::new(BackoffPolicy::new(self.max_attempts, self.backoff_base).with_jitter(BACKOFF_JITTER))
    }

    pub(crate) fn normalizer(&self) -> FormatNormalizer {
        match &self.soffice {
            Some(program) => FormatNormalizer::new(Arc::new(SofficeConverter::new(program))),
            None => FormatNormalizer::disabled(),
        }
    }
}

fn pick_path(flag: Option<&PathBuf>, file: Option<&PathBuf>, default: &str) -> PathBuf {
    flag.or(file).cloned().unwrap_or_else(|| PathBuf::from(default))
}
