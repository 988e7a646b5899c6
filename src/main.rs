//! ziplift - extract a ZIP archive into a folder tree
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use ziplift::cli::Cli;
use ziplift::progress::{print_summary, ProgressObserver, Summary};
use ziplift::{
    read_entry_tree, Collaborators, Config, ExtractionOutcome, LocalStore, Session,
    ZipArchiveSource,
};

/// Exit code after Ctrl-C, as shells report SIGINT
const EXIT_CANCELED: u8 = 130;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.log_level())?;

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let config = cli.merge(config);
    config
        .session
        .validate()
        .context("Invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(extract(cli, config))
}

async fn extract(cli: Cli, config: Config) -> Result<ExitCode> {
    let tree = read_entry_tree(&cli.archive)
        .with_context(|| format!("Failed to read archive {}", cli.archive.display()))?;
    let store = LocalStore::new(&cli.dest)
        .with_context(|| format!("Failed to open destination {}", cli.dest.display()))?;
    let exclusions = cli.exclusions().context("Invalid --exclude pattern")?;
    info!(
        archive = %cli.archive.display(),
        dest = %store.root().display(),
        entries = tree.len(),
        "Extracting"
    );

    let observer = Arc::new(ProgressObserver::new(!cli.no_progress && !cli.quiet));
    let collaborators = Collaborators::new(
        Arc::new(store),
        Arc::new(ZipArchiveSource::new(&cli.archive)),
    )
    .with_observer(observer.clone())
    .with_selection(Arc::new(exclusions));
    let mut session = Session::new(tree, "", collaborators, config.session.clone());

    // Ctrl-C aborts the running session
    let abort = session.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, canceling...");
            abort.abort();
        }
    });

    let started = Instant::now();
    let mut outcome = session.execute(false).await?;
    let mut round = 0;
    while outcome == ExtractionOutcome::Complete && session.has_errors() && round < config.retries
    {
        round += 1;
        info!(round, "Retrying failed entries");
        observer.println(format!(
            "{} retrying failed entries ({}/{})",
            "↻".yellow(),
            round,
            config.retries
        ));
        outcome = session.execute(true).await?;
    }
    observer.finish();

    let summary = Summary::from_tree(session.tree().context("Session already closed")?);
    let auth_errors = session.has_auth_errors();
    let failed = session.has_errors() || summary.pending_retry > 0;
    session.close()?;

    if auth_errors {
        eprintln!(
            "{} permission denied while writing to {}",
            "Error:".red().bold(),
            cli.dest.display()
        );
    }
    if !cli.quiet {
        print_summary(&summary, outcome, started.elapsed());
    }

    Ok(match outcome {
        ExtractionOutcome::Canceled => ExitCode::from(EXIT_CANCELED),
        ExtractionOutcome::Complete if failed => ExitCode::FAILURE,
        ExtractionOutcome::Complete => ExitCode::SUCCESS,
    })
}

fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("ziplift={}", level)))
        .context("Invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    Ok(())
}
