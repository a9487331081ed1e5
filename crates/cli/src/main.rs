//! `tf-index`: crawl Terraform workspaces into an in-memory index and optionally keep it up to
//! date while files change.
//!
//! ```text
//! tf-index ./stacks/prod ./stacks/staging --exclude 'legacy/**'
//! tf-index . --watch
//! tf-index . --json > summary.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use terraform_indexer::{
    Collaborators, Coordinator, CoordinatorHandle, DiagnosticCollection, IndexRegistry,
    WatcherConfig, WorkspaceScanner, WorkspaceWatcher,
};
use tokio::sync::RwLock;

mod config;
mod progress;
mod summary;

use config::{Overrides, WorkspaceConfig};
use progress::CrawlBar;
use summary::Summary;

#[derive(Debug, Parser)]
#[command(name = "tf-index", version, about = "Index Terraform templates and plans")]
struct Cli {
    /// Workspace roots to index
    #[arg(value_name = "ROOT", default_value = ".")]
    roots: Vec<PathBuf>,

    /// Glob of files to leave out, relative to their root (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Keep running and re-index files as they change
    #[arg(long)]
    watch: bool,

    /// While watching, only apply deletions
    #[arg(long)]
    no_live: bool,

    /// Capacity of the event queue
    #[arg(long, value_name = "N")]
    queue_capacity: Option<usize>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let roots = cli
        .roots
        .iter()
        .map(|root| {
            std::fs::canonicalize(root)
                .with_context(|| format!("Workspace root not found: {}", root.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let overrides = Overrides {
        exclude: cli.exclude.clone(),
        no_live: cli.no_live,
        queue_capacity: cli.queue_capacity,
    };
    let config = Arc::new(WorkspaceConfig::load(&roots, &overrides).await?);

    let mut registry = IndexRegistry::new();
    for root in &roots {
        registry.register_root(root)?;
    }
    let registry = Arc::new(RwLock::new(registry));
    let diagnostics = Arc::new(DiagnosticCollection::new());

    let collaborators = Collaborators::filesystem(config.clone(), diagnostics.clone());
    let handle = Coordinator::new(Arc::clone(&registry), collaborators).start(config.queue_capacity());

    // Events that land while the crawl runs are ordered against it per file.
    let watcher = if cli.watch {
        Some(start_watcher(&roots, handle.clone(), config.live_indexing())?)
    } else {
        None
    };

    let show_progress = !cli.quiet && !cli.json && std::io::stderr().is_terminal();
    let report = handle
        .crawl(&WorkspaceScanner::with_roots(&roots), &CrawlBar::new(show_progress))
        .await?;

    let summary = Summary::collect(report, &*registry.read().await, &diagnostics);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }

    if let Some(watcher) = watcher {
        eprintln!("Watching for changes. Press Ctrl-C to stop.");
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        log::info!("Stopping watcher");
        drop(watcher);
    }
    handle.shutdown().await?;
    Ok(())
}

fn start_watcher(
    roots: &[PathBuf],
    handle: CoordinatorHandle,
    live_indexing: bool,
) -> Result<WorkspaceWatcher> {
    let config = WatcherConfig {
        live_indexing,
        ..WatcherConfig::default()
    };
    let watcher = WorkspaceWatcher::start(roots, handle, config)?;
    log::info!("Watching {} root(s)", roots.len());
    Ok(watcher)
}
