//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Crawl public funding-call portals into a consolidated catalog.
///
/// Every configured site is visited in order; calls and their documents
/// are validated, deduplicated, and merged into the catalog file.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/calls-harvester/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Site definitions file
    #[arg(long, value_name = "PATH")]
    pub sites: Option<PathBuf>,

    /// Catalog file to read and rewrite
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Directory holding downloaded document artifacts
    #[arg(long, value_name = "DIR")]
    pub artifacts: Option<PathBuf>,

    /// Run only the named site (repeatable)
    #[arg(long = "only", value_name = "SITE")]
    pub only: Vec<String>,

    /// Attempts per page or document before giving up (1-10)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Minimum delay between requests in milliseconds (0 to disable, max 60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay_ms: Option<u64>,

    /// Keep office documents in their original format
    #[arg(long)]
    pub no_convert: bool,

    /// Also write the run summary as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["harvester"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.only.is_empty());
        assert!(args.max_attempts.is_none());
        assert!(args.delay_ms.is_none());
        assert!(!args.no_convert);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["harvester", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["harvester", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["harvester", "-q"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["harvester", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["harvester", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_only_is_repeatable_and_ordered() {
        let args =
            Args::try_parse_from(["harvester", "--only", "fct", "--only", "balcao"]).unwrap();
        assert_eq!(args.only, ["fct", "balcao"]);
    }

    #[test]
    fn test_cli_paths() {
        let args = Args::try_parse_from([
            "harvester",
            "--sites",
            "sites.json",
            "--catalog",
            "out/catalog.json",
            "--artifacts",
            "out/docs",
            "--summary-json",
            "out/summary.json",
        ])
        .unwrap();
        assert_eq!(args.sites, Some(PathBuf::from("sites.json")));
        assert_eq!(args.catalog, Some(PathBuf::from("out/catalog.json")));
        assert_eq!(args.artifacts, Some(PathBuf::from("out/docs")));
        assert_eq!(args.summary_json, Some(PathBuf::from("out/summary.json")));
    }

    #[test]
    fn test_cli_max_attempts_range() {
        let args = Args::try_parse_from(["harvester", "--max-attempts", "10"]).unwrap();
        assert_eq!(args.max_attempts, Some(10));

        let err = Args::try_parse_from(["harvester", "--max-attempts", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err = Args::try_parse_from(["harvester", "--max-attempts", "11"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_delay_range() {
        let args = Args::try_parse_from(["harvester", "--delay-ms", "0"]).unwrap();
        assert_eq!(args.delay_ms, Some(0));

        let err = Args::try_parse_from(["harvester", "--delay-ms", "60001"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_no_convert() {
        let args = Args::try_parse_from(["harvester", "--no-convert"]).unwrap();
        assert!(args.no_convert);
    }
}
