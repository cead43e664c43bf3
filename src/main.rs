//! CLI entry point for the harvester tool.

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use harvester_core::{Discoverer, Orchestrator, SitesFile};
use tracing::{debug, info};

mod app_config;
mod cli;
mod exit_handler;
mod settings;
mod terminal;

use cli::Args;
use exit_handler::{ProcessExit, determine_exit_outcome};
use settings::RunSettings;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    match run(args).await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("error: {error:#}");
            ProcessExit::Failure.into()
        }
    }
}

async fn run(args: Args) -> Result<ProcessExit> {
    let loaded = app_config::load_config(args.config.as_deref())?;
    let file = loaded.values();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let level = terminal::resolve_default_log_level(args.quiet, args.verbose, file.verbosity);
    terminal::init_tracing(level, terminal::is_no_color_requested());
    debug!(
        ?args,
        config = ?loaded.path,
        from_file = loaded.config.is_some(),
        verbosity = file.verbosity.map(app_config::VerbositySetting::as_str),
        "CLI arguments parsed"
    );

    let settings = RunSettings::resolve(&args, &file);
    let sites = SitesFile::load(&settings.sites_file)
        .with_context(|| format!("Failed to load sites from '{}'", settings.sites_file.display()))?;
    for id in &args.only {
        if !sites.sites.iter().any(|site| site.id() == id) {
            bail!("Unknown site id '{id}' passed to --only");
        }
    }
    let rules = sites
        .discovery
        .compile()
        .context("Invalid discovery pattern in sites file")?;
    let adapters = sites.build_adapters(&args.only);
    info!(
        adapters = adapters.len(),
        catalog = %settings.catalog_path.display(),
        converter = settings.soffice.is_some(),
        "Harvester starting"
    );

    let orchestrator = Orchestrator::new(&settings.catalog_path, &settings.artifacts_dir)
        .with_navigator(settings.navigator())
        .with_discoverer(Discoverer::new(rules))
        .with_normalizer(settings.normalizer())
        .with_session_options(settings.session_options());
    let outcome = orchestrator.run(adapters).await.context("Run aborted")?;

    print!("{}", outcome.summary.render());
    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&outcome.summary)
            .context("Failed to serialize run summary")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run summary to '{}'", path.display()))?;
    }

    Ok(determine_exit_outcome(outcome.summary.status()))
}
