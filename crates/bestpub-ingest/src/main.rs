//! BestPub Ingest - content package ingestion service

use anyhow::{Context, Result};
use bestpub_common::logging::{init_logging, LogConfig, LogLevel};
use bestpub_ingest::{
    api,
    config::IngestConfig,
    ingest::{Destination, IngestOrchestrator, JobScheduler, Taxonomy},
    repository::FsRepository,
};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "bestpub-ingest")]
#[command(author, version, about = "BestPub content ZIP ingestion service")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run the scheduler and the introspection API until Ctrl-C
    Serve,

    /// Run a single ingestion cycle and exit
    RunOnce,

    /// Show how archive entry paths would be classified
    Classify {
        /// Content taxonomy: epub or chapter-xml
        taxonomy: Taxonomy,

        /// Archive entry paths, e.g. content/9780486282146-chapter-1.xhtml
        #[arg(required = true)]
        entries: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("bestpub-ingest")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Command::Serve => serve().await?,
        Command::RunOnce => run_once().await?,
        Command::Classify { taxonomy, entries } => classify(taxonomy, &entries),
    }

    Ok(())
}

async fn build_orchestrator(config: &IngestConfig) -> Result<IngestOrchestrator> {
    let repository = FsRepository::open(&config.repository_root)
        .await
        .with_context(|| format!("Failed to open repository at {}", config.repository_root.display()))?;
    info!(root = %config.repository_root.display(), "Opened content repository");
    Ok(IngestOrchestrator::from_config(config, Arc::new(repository)))
}

async fn serve() -> Result<()> {
    let config = IngestConfig::from_env()?;
    let orchestrator = Arc::new(build_orchestrator(&config).await?);
    let stats = orchestrator.stats();
    let shutdown = CancellationToken::new();

    let scheduler = JobScheduler::new(orchestrator, &config.schedule)?;
    let scheduler_handle = scheduler.start(shutdown.clone());
    info!(cron = %config.schedule.cron, run_as = %config.schedule.run_as, "Scheduled content ingestion");

    let api_handle = if config.api.enabled {
        let api_config = config.clone();
        let api_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = api::serve(&api_config, stats, api_shutdown).await {
                error!("Introspection API failed: {:#}", e);
            }
        }))
    } else {
        info!("Introspection API disabled");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    shutdown.cancel();

    scheduler_handle.await.context("Scheduler task panicked")?;
    if let Some(handle) = api_handle {
        handle.await.context("API task panicked")?;
    }

    info!("Shut down gracefully");
    Ok(())
}

async fn run_once() -> Result<()> {
    let config = IngestConfig::from_env()?;
    let orchestrator = build_orchestrator(&config).await?;

    let summary = orchestrator.run().await;
    info!(
        discovered = summary.discovered,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Run complete"
    );
    Ok(())
}

fn classify(taxonomy: Taxonomy, entries: &[String]) {
    let rules = taxonomy.build();
    for entry in entries {
        let classified = rules.classify(entry);
        let destination = match classified.destination {
            Destination::PackageRoot => "{package}".to_string(),
            Destination::Folder(name) => format!("{{package}}/{}", name),
            Destination::Skip => "-".to_string(),
        };
        println!(
            "{}\t{}\t{}\t{}",
            entry, classified.category, destination, classified.filename
        );
    }
}
