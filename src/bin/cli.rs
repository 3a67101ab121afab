//! Job crawler CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use jobs_crawler::{
    error::Result,
    fetch::ResilientFetcher,
    models::{Config, SourceKind},
    notify::{LogSink, NotificationSink},
    pipeline::{self, RunContext},
    sources::SourceRegistry,
    storage::{LocalStorage, RunStorage},
};

/// Job listing aggregator
#[derive(Parser, Debug)]
#[command(
    name = "jobs-crawler",
    version,
    about = "Aggregate job listings and notify matching recipients"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run full pipeline: Crawl → Clean → Store → Notify
    Run {
        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,

        /// Do not write output files
        #[arg(long)]
        no_store: bool,
    },

    /// Crawl, clean and store without notifying anyone
    Crawl,

    /// Validate the configuration file
    Validate,

    /// List configured sources
    Sources,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[cfg(feature = "email")]
fn email_sink(config: &Config) -> Result<Box<dyn NotificationSink>> {
    Ok(Box::new(jobs_crawler::notify::EmailSink::from_env(
        &config.email,
    )?))
}

#[cfg(not(feature = "email"))]
fn email_sink(_config: &Config) -> Result<Box<dyn NotificationSink>> {
    log::warn!("Built without the `email` feature; notifications are only logged");
    Ok(Box::new(LogSink))
}

/// Load the configuration file.
///
/// Commands that crawl or validate need the real file; only `sources` may
/// fall back to the built-in defaults.
fn load_config(path: &Path, strict: bool) -> Result<Config> {
    if strict {
        let config = Config::load(path).inspect_err(|e| {
            log::error!("Failed to load configuration from {}: {}", path.display(), e);
        })?;
        log::info!("Loaded configuration from {}", path.display());
        return Ok(config);
    }

    Ok(Config::load_or_default(path))
}

/// Crawl and optionally store and notify.
async fn run(config: &Config, store: bool, sink: Option<&dyn NotificationSink>) -> Result<()> {
    let registry = SourceRegistry::from_config(config)?;
    let fetcher = ResilientFetcher::new(&config.crawler, &config.retry)?;
    let storage = LocalStorage::from_config(&config.output);
    let store = store && config.output.enabled;

    let summary = pipeline::run_pipeline(RunContext {
        registry: &registry,
        fetch: Arc::new(fetcher),
        deadline: config.crawler.deadline(),
        recipients: &config.recipients,
        storage: store.then_some(&storage as &dyn RunStorage),
        sink,
    })
    .await?;

    if let Some(write) = &summary.write {
        log::info!("Dataset: {}", write.dataset_location.display());
    }
    if let Some(error) = &summary.store_error {
        log::warn!("Run output was not written: {}", error);
    }
    if !summary.notify_failed.is_empty() {
        log::warn!(
            "{} notifications failed: {}",
            summary.notify_failed.len(),
            summary.notify_failed.join(", ")
        );
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_logging(cli.verbose);

    let strict = !matches!(cli.command, Command::Sources);
    let config = load_config(&cli.config, strict)?;

    match cli.command {
        Command::Run { dry_run, no_store } => {
            config.validate()?;
            let sink: Box<dyn NotificationSink> = if dry_run {
                Box::new(LogSink)
            } else {
                email_sink(&config)?
            };
            run(&config, !no_store, Some(sink.as_ref())).await?;
        }

        Command::Crawl => {
            config.validate()?;
            run(&config, true, None).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            SourceRegistry::from_config(&config)?;
            log::info!(
                "✓ Config OK ({} sources, {} recipients)",
                config.sources.len(),
                config.recipients.len()
            );
        }

        Command::Sources => {
            for source in &config.sources {
                let (kind, url) = match &source.kind {
                    SourceKind::Html(html) => ("html", html.url.as_str()),
                    SourceKind::Json(json) => ("json", json.url.as_str()),
                };
                let state = if source.enabled { "" } else { " (disabled)" };
                log::info!("{:<16} {:<4} {}{}", source.name, kind, url, state);
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
