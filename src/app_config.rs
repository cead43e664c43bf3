//! Runtime configuration file for the harvester binary.
//!
//! The file is a flat `key = value` list with `#` comments and double-quoted
//! strings. Every value is optional; CLI flags given explicitly win over it.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

const APP_DIR: &str = "calls-harvester";

/// Values read from the config file. `None` means "not set in the file".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub catalog_path: Option<PathBuf>,
    pub artifacts_dir: Option<PathBuf>,
    pub sites_file: Option<PathBuf>,
    pub max_attempts: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub request_delay_ms: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub max_document_bytes: Option<u64>,
    pub converter: Option<ConverterSetting>,
    pub soffice_path: Option<PathBuf>,
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    fn validate(&self) -> Result<()> {
        validate_max_attempts(self.max_attempts)?;
        validate_millis("backoff_base_ms", self.backoff_base_ms)?;
        validate_millis("request_delay_ms", self.request_delay_ms)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if self.max_document_bytes == Some(0) {
            bail!("Invalid config value for `max_document_bytes`: 0. Expected a positive byte count");
        }
        Ok(())
    }
}

fn validate_max_attempts(value: Option<u32>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=10).contains(&value) {
        bail!("Invalid config value for `max_attempts`: {value}. Expected range: 1..=10");
    }
    Ok(())
}

fn validate_millis(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value > 60_000 {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 0..=60000");
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Office document conversion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterSetting {
    /// Headless LibreOffice.
    Soffice,
    /// Keep office documents in their original format.
    None,
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }

    /// Tracing filter level this setting stands for.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose | Self::Debug => "debug",
            Self::Quiet => "error",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    /// The parsed values, or an empty config when no file was found.
    #[must_use]
    pub fn values(&self) -> FileConfig {
        self.config.clone().unwrap_or_default()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/calls-harvester/config.toml`
/// 2. `$HOME/.config/calls-harvester/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist. The default path is optional: when it is
/// missing the returned config is empty.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig { path, config: None });
    };
    if !path_ref.exists() {
        return Ok(LoadedConfig { path, config: None });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "catalog_path" => {
                cfg.catalog_path = Some(parse_path(value).with_context(context)?);
            }
            "artifacts_dir" => {
                cfg.artifacts_dir = Some(parse_path(value).with_context(context)?);
            }
            "sites_file" => {
                cfg.sites_file = Some(parse_path(value).with_context(context)?);
            }
            "soffice_path" => {
                cfg.soffice_path = Some(parse_path(value).with_context(context)?);
            }
            "max_attempts" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_attempts out of range for u32"))?;
                cfg.max_attempts = Some(n);
            }
            "backoff_base_ms" => {
                cfg.backoff_base_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "request_delay_ms" => {
                cfg.request_delay_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "max_document_bytes" => {
                cfg.max_document_bytes = Some(parse_integer_u64(value).with_context(context)?);
            }
            "converter" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.converter = Some(parse_converter(&parsed).with_context(|| {
                    format!("Invalid `converter` value '{parsed}' on line {line_no}")
                })?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_path(raw_value: &str) -> Result<PathBuf> {
    let parsed = parse_string_literal(raw_value)?;
    if parsed.trim().is_empty() {
        bail!("Expected a non-empty path");
    }
    Ok(PathBuf::from(parsed))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_converter(value: &str) -> Result<ConverterSetting> {
    match value {
        "soffice" => Ok(ConverterSetting::Soffice),
        "none" => Ok(ConverterSetting::None),
        _ => bail!("Expected one of: soffice, none"),
    }
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
max_attempts = 5
verbosity = "verbose"
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.max_attempts, Some(5));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
        assert!(cfg.catalog_path.is_none());
    }

    #[test]
    fn test_parse_config_paths_and_converter() {
        let cfg = parse_config_str(
            r#"
catalog_path = "data/catalog.json"
artifacts_dir = "data/artifacts"
sites_file = "config/sites.json"
converter = "soffice"
soffice_path = "/opt/libreoffice/program/soffice"
"#,
        )
        .expect("path config should parse");
        assert_eq!(cfg.catalog_path, Some(PathBuf::from("data/catalog.json")));
        assert_eq!(cfg.artifacts_dir, Some(PathBuf::from("data/artifacts")));
        assert_eq!(cfg.sites_file, Some(PathBuf::from("config/sites.json")));
        assert_eq!(cfg.converter, Some(ConverterSetting::Soffice));
        assert_eq!(
            cfg.soffice_path,
            Some(PathBuf::from("/opt/libreoffice/program/soffice"))
        );
    }

    #[test]
    fn test_parse_config_rejects_invalid_max_attempts() {
        let err = parse_config_str("max_attempts = 0").expect_err("0 is below range");
        assert!(err.to_string().contains("max_attempts"));

        let err = parse_config_str("max_attempts = 11").expect_err("11 is above range");
        assert!(err.to_string().contains("1..=10"));
    }

    #[test]
    fn test_parse_config_rejects_delay_over_one_minute() {
        let err = parse_config_str("request_delay_ms = 60001").expect_err("out of range");
        assert!(err.to_string().contains("request_delay_ms"));

        let err = parse_config_str("backoff_base_ms = 90000").expect_err("out of range");
        assert!(err.to_string().contains("backoff_base_ms"));
    }

    #[test]
    fn test_parse_config_zero_delay_disables_pacing() {
        let cfg = parse_config_str("request_delay_ms = 0").unwrap();
        assert_eq!(cfg.request_delay_ms, Some(0));
    }

    #[test]
    fn test_parse_config_timeout_fields() {
        let cfg = parse_config_str(
            r#"
connect_timeout_secs = 15
read_timeout_secs = 120
"#,
        )
        .expect("timeout config should parse");
        assert_eq!(cfg.connect_timeout_secs, Some(15));
        assert_eq!(cfg.read_timeout_secs, Some(120));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout_value() {
        let err = parse_config_str("read_timeout_secs = 0").expect_err("invalid timeout expected");
        assert!(err.to_string().contains("read_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_zero_document_cap() {
        let err = parse_config_str("max_document_bytes = 0").expect_err("zero cap rejected");
        assert!(err.to_string().contains("max_document_bytes"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err =
            parse_config_str("max_attempts = 4 trailing").expect_err("expected trailing token error");
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_parse_config_reports_line_numbers() {
        let err = parse_config_str("max_attempts = 3\n\nconverter = \"pandoc\"")
            .expect_err("unknown converter");
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
max_attempts = 4 # per page
sites_file = "sites#1.json" # hash inside the string is kept
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.max_attempts, Some(4));
        assert_eq!(cfg.sites_file, Some(PathBuf::from("sites#1.json")));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_path() {
        let err = parse_config_str("catalog_path = catalog.json").expect_err("path must be quoted");
        assert!(err.to_string().contains("catalog_path"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("unknown_key = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("unknown_key"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("max_attempts 3").expect_err("syntax error expected");
        assert!(err.to_string().contains("expected key = value"));
    }

    #[test]
    fn test_verbosity_labels_and_levels() {
        assert_eq!(VerbositySetting::Default.as_str(), "default");
        assert_eq!(VerbositySetting::Quiet.as_str(), "quiet");
        assert_eq!(VerbositySetting::Default.log_level(), "info");
        assert_eq!(VerbositySetting::Debug.log_level(), "debug");
        assert_eq!(VerbositySetting::Quiet.log_level(), "error");
    }

    #[test]
    fn test_load_config_explicit_path_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = load_config(Some(&missing)).expect_err("missing explicit config");
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_config_explicit_path_parses() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "converter = \"none\"\n").unwrap();
        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.values().converter, Some(ConverterSetting::None));
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
    }
}
