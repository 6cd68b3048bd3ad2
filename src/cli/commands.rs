use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{IndexerError, Result};
use crate::index::cache::InvalidationCache;
use crate::index::notifier::ChangeNotifier;
use crate::indexer::builder::IndexBuilder;
use crate::indexer::extractor::CsfExtractor;
use crate::indexer::walker::SpecifierWalker;
use crate::indexer::watcher::{spawn_pump, SpecifierWatcher};
use crate::server::{self, AppState};

const WATCH_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "story-indexer")]
#[command(about = "Story catalog indexer and dev server")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Serve the catalog with live updates
    story-indexer serve

    # Serve on a specific address
    story-indexer serve --addr 127.0.0.1:7007

    # Serve without watching the file system
    story-indexer serve --no-watch

    # Write the catalog to a file once and exit
    story-indexer build --output index.json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the catalog configuration file
    #[arg(long, default_value = "stories.yaml")]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the index over HTTP and keep it fresh as files change
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:6006")]
        addr: SocketAddr,

        /// Serve the initial index without watching for changes
        #[arg(long)]
        no_watch: bool,
    },

    /// Build the index once and write it to a file
    Build {
        /// Output file path
        #[arg(long, default_value = "index.json")]
        output: PathBuf,
    },
}

fn make_builder(config: &Config, working_dir: &Path) -> Result<IndexBuilder> {
    let walker = SpecifierWalker::new(config.stories.clone())?;
    let extractor = Arc::new(CsfExtractor::new(working_dir));
    Ok(IndexBuilder::new(walker, extractor).with_collision_policy(config.collision_policy))
}

pub async fn serve(config_path: &Path, addr: SocketAddr, watch: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    let working_dir = std::env::current_dir()?;
    let notifier = ChangeNotifier::new();
    let cache = InvalidationCache::new(make_builder(&config, &working_dir)?, notifier.clone());

    // Prime the cache; a failure here is not fatal, requests retry it.
    match cache.get_index().await {
        Ok(index) => info!(entries = index.len(), "initial story index built"),
        Err(e) => warn!("initial index build failed: {}", e),
    }

    if watch {
        let watcher = SpecifierWatcher::new(config.stories.clone(), WATCH_DEBOUNCE)?;
        spawn_pump(watcher, cache.clone());
        info!(
            specifiers = config.stories.len(),
            "watching story files for changes"
        );
    }

    server::serve(addr, AppState { cache, notifier }).await
}

pub async fn build_once(config_path: &Path, output: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let working_dir = std::env::current_dir()?;
    let builder = make_builder(&config, &working_dir)?;

    let (_, index, diagnostics) = tokio::task::spawn_blocking(move || builder.build())
        .await
        .map_err(|e| IndexerError::Build(e.to_string()))??;

    for diagnostic in &diagnostics {
        warn!("{}", diagnostic);
    }

    let json = serde_json::to_string_pretty(&index)?;
    fs::write(output, json)?;
    info!(
        entries = index.len(),
        output = %output.display(),
        "story index written"
    );

    Ok(())
}
