use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use tokio::task;
use tracing::{debug, info, warn};

use crate::error::{IndexerError, Result};
use crate::index::cache::InvalidationCache;
use crate::index::models::Specifier;
use crate::indexer::walker::SpecifierWalker;

/// One debounced file-system change, routed to its owning specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub specifier: usize,
    pub path: PathBuf,
    pub removed: bool,
}

/// Watches every specifier root and yields debounced change batches.
///
/// Debouncing coalesces event bursts before they reach the cache, and the
/// routing step drops anything no specifier covers. Duplicate or stale
/// events are fine; invalidation marks are idempotent.
pub struct SpecifierWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    receiver: Receiver<std::result::Result<Vec<DebouncedEvent>, notify::Error>>,
    walker: SpecifierWalker,
}

impl SpecifierWatcher {
    pub fn new(specifiers: Vec<Specifier>, debounce: Duration) -> Result<Self> {
        let walker = SpecifierWalker::new(specifiers)?;
        let (tx, rx) = channel();

        let mut debouncer =
            new_debouncer(debounce, tx).map_err(|e| IndexerError::Watcher(e.to_string()))?;

        for spec in walker.specifiers() {
            debouncer
                .watcher()
                .watch(&spec.directory, RecursiveMode::Recursive)
                .map_err(|e| IndexerError::Watcher(e.to_string()))?;
        }

        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
            walker,
        })
    }

    /// Blocks until the next batch. `None` means the watch channel closed;
    /// an empty batch just means nothing relevant changed.
    pub fn recv(&self) -> Option<Vec<ChangeEvent>> {
        match self.receiver.recv() {
            Ok(Ok(events)) => Some(self.route(events)),
            Ok(Err(e)) => {
                warn!("file watch error: {}", e);
                Some(Vec::new())
            }
            Err(_) => None,
        }
    }

    fn route(&self, events: Vec<DebouncedEvent>) -> Vec<ChangeEvent> {
        events
            .into_iter()
            .filter_map(|event| {
                let path = event.path;
                let specifier = self.walker.owner_of(&path)?;
                let removed = !path.exists();
                if !removed && !path.is_file() {
                    return None;
                }
                Some(ChangeEvent {
                    specifier,
                    path,
                    removed,
                })
            })
            .collect()
    }
}

/// Bridges the watcher into the cache: applies invalidations, then forces
/// one rebuild per batch so subscribers hear about real changes promptly.
pub fn spawn_pump(watcher: SpecifierWatcher, cache: InvalidationCache) -> task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut slot = Some(watcher);
        loop {
            let watcher = slot.take().expect("watcher returns each iteration");
            let received = task::spawn_blocking(move || {
                let batch = watcher.recv();
                (watcher, batch)
            })
            .await;

            let (watcher, batch) = match received {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("watcher pump stopped: {}", e);
                    return;
                }
            };
            slot = Some(watcher);

            let Some(events) = batch else {
                info!("watch channel closed, stopping pump");
                return;
            };
            if events.is_empty() {
                continue;
            }

            debug!(count = events.len(), "applying watch batch");
            for event in &events {
                cache.invalidate(event.path.clone(), event.removed);
            }

            // Drive the rebuild so the notifier can fire; on failure the
            // cache stays dirty and the next batch or reader retries.
            if let Err(e) = cache.get_index().await {
                warn!("rebuild after watch batch failed: {}", e);
            }
        }
    })
}
