use std::collections::HashMap;
use std::mem;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task;
use tracing::{debug, info, warn};

use crate::error::IndexerError;
use crate::index::models::{Diagnostic, DirtyKind, StoryIndex};
use crate::index::notifier::ChangeNotifier;
use crate::indexer::builder::{IndexBuilder, ScannedFiles};

/// Result of one build, shared between every caller that awaited it.
pub type SharedIndexResult = Result<Arc<StoryIndex>, Arc<IndexerError>>;

/// `None` while the build is running, `Some` once it settled.
type BuildSlot = Option<SharedIndexResult>;

struct CacheState {
    /// Last good snapshot; replaced wholesale, never patched in place
    current: Option<Arc<StoryIndex>>,
    /// Per-file extraction results backing the next splice rebuild
    scanned: Option<ScannedFiles>,
    /// Paths known to be stale, drained atomically at build start
    dirty: HashMap<PathBuf, DirtyKind>,
    /// Receiver every concurrent reader attaches to while a build runs
    in_flight: Option<watch::Receiver<BuildSlot>>,
    /// Diagnostics of the last completed build
    diagnostics: Vec<Diagnostic>,
}

/// Caches the story index and keeps it correct under invalidation.
///
/// `get_index` is the only operation that rebuilds; `invalidate` just marks
/// paths stale and returns. At most one build runs at a time: readers that
/// arrive while one is in flight attach to it instead of starting another,
/// and a build runs to completion even if every reader goes away.
///
/// Clones are handles onto the same cache.
#[derive(Clone)]
pub struct InvalidationCache {
    builder: Arc<IndexBuilder>,
    notifier: ChangeNotifier,
    state: Arc<Mutex<CacheState>>,
}

impl InvalidationCache {
    pub fn new(builder: IndexBuilder, notifier: ChangeNotifier) -> Self {
        Self {
            builder: Arc::new(builder),
            notifier,
            state: Arc::new(Mutex::new(CacheState {
                current: None,
                scanned: None,
                dirty: HashMap::new(),
                in_flight: None,
                diagnostics: Vec::new(),
            })),
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Marks a path stale. Never suspends the caller; the actual rebuild
    /// happens on the next `get_index`. The newest mark per path wins.
    pub fn invalidate(&self, path: impl Into<PathBuf>, removed: bool) {
        let kind = if removed {
            DirtyKind::Removed
        } else {
            DirtyKind::Changed
        };
        let path = path.into();
        debug!(path = %path.display(), ?kind, "invalidated");
        self.lock_state().dirty.insert(path, kind);
    }

    /// Returns the current snapshot, rebuilding first if the cache is empty
    /// or dirty. Suspends while a build is in flight; concurrent callers
    /// share one build and one outcome.
    pub async fn get_index(&self) -> SharedIndexResult {
        let mut rx = {
            let mut state = self.lock_state();
            if let Some(rx) = &state.in_flight {
                rx.clone()
            } else if state.dirty.is_empty() && state.current.is_some() {
                return Ok(Arc::clone(state.current.as_ref().expect("checked above")));
            } else {
                self.start_build(&mut state)
            }
        };

        let result = match rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => slot.clone().expect("slot checked by wait_for"),
            // The build task never drops the sender before publishing, so
            // this only fires if the runtime tore the task down mid-flight.
            Err(_) => Err(Arc::new(IndexerError::Build(
                "index build task vanished".to_string(),
            ))),
        };
        result
    }

    /// Diagnostics recorded by the last completed build.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock_state().diagnostics.clone()
    }

    /// True when invalidations are pending and no build has started yet.
    pub fn is_dirty(&self) -> bool {
        !self.lock_state().dirty.is_empty()
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().expect("cache lock poisoned")
    }

    /// Drains the dirty set and spawns the build task. Caller holds the
    /// state lock, which guarantees at most one in-flight build.
    fn start_build(&self, state: &mut CacheState) -> watch::Receiver<BuildSlot> {
        let (tx, rx) = watch::channel(None);
        state.in_flight = Some(rx.clone());
        let drained = mem::take(&mut state.dirty);
        let prev = state.scanned.clone();

        let cache = self.clone();
        tokio::spawn(async move {
            cache.run_build(prev, drained, tx).await;
        });

        rx
    }

    async fn run_build(
        &self,
        prev: Option<ScannedFiles>,
        drained: HashMap<PathBuf, DirtyKind>,
        tx: watch::Sender<BuildSlot>,
    ) {
        let builder = Arc::clone(&self.builder);
        let dirty = drained.clone();
        let built = task::spawn_blocking(move || {
            let scanned = match prev {
                Some(prev) => builder.rescan(&prev, &dirty)?,
                None => builder.scan_all()?,
            };
            let (index, diagnostics) = builder.merge(&scanned);
            Ok::<_, IndexerError>((scanned, index, diagnostics))
        })
        .await;

        let outcome = match built {
            Ok(Ok((scanned, index, diagnostics))) => {
                self.finish_build(scanned, index, diagnostics)
            }
            Ok(Err(e)) => self.fail_build(drained, e),
            Err(join_err) => self.fail_build(
                drained,
                IndexerError::Build(format!("build task panicked: {}", join_err)),
            ),
        };

        // Waiters hold their own receiver clones; nobody left is fine.
        let _ = tx.send(Some(outcome));
    }

    fn finish_build(
        &self,
        scanned: ScannedFiles,
        index: StoryIndex,
        diagnostics: Vec<Diagnostic>,
    ) -> SharedIndexResult {
        for diagnostic in &diagnostics {
            warn!("{}", diagnostic);
        }

        let index = Arc::new(index);
        let (snapshot, changed) = {
            let mut state = self.lock_state();
            let changed = match &state.current {
                Some(current) => **current != *index,
                None => true,
            };
            state.scanned = Some(scanned);
            state.diagnostics = diagnostics;
            if changed {
                state.current = Some(Arc::clone(&index));
            }
            let snapshot = Arc::clone(state.current.as_ref().expect("set on first build"));
            state.in_flight = None;
            (snapshot, changed)
        };

        if changed {
            info!(entries = snapshot.len(), "story index updated");
            self.notifier.emit();
        } else {
            debug!("rebuild produced an identical index, no signal emitted");
        }

        Ok(snapshot)
    }

    fn fail_build(
        &self,
        drained: HashMap<PathBuf, DirtyKind>,
        error: IndexerError,
    ) -> SharedIndexResult {
        warn!("index rebuild failed: {}", error);

        let mut state = self.lock_state();
        // Put the drained marks back so the next get_index retries; marks
        // that arrived during the failed build are newer and win.
        for (path, kind) in drained {
            state.dirty.entry(path).or_insert(kind);
        }
        state.in_flight = None;

        Err(Arc::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::models::Specifier;
    use crate::indexer::extractor::CsfExtractor;
    use crate::indexer::walker::SpecifierWalker;
    use std::path::Path;

    fn cache_for(root: &Path) -> InvalidationCache {
        let walker = SpecifierWalker::new(vec![Specifier::new(root)]).unwrap();
        let builder = IndexBuilder::new(walker, Arc::new(CsfExtractor::new(root)));
        InvalidationCache::new(builder, ChangeNotifier::new())
    }

    #[tokio::test]
    async fn test_missing_root_surfaces_error_and_stays_retryable() {
        let cache = cache_for(Path::new("/nonexistent/stories-root"));

        let err = cache.get_index().await.unwrap_err();
        assert!(matches!(*err, IndexerError::SpecifierRoot(_)));

        // retry goes through another build and fails the same way
        let err = cache.get_index().await.unwrap_err();
        assert!(matches!(*err, IndexerError::SpecifierRoot(_)));
    }

    #[tokio::test]
    async fn test_invalidate_marks_dirty_without_building() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cache = cache_for(temp_dir.path());

        cache.invalidate(temp_dir.path().join("a.stories.ts"), false);
        assert!(cache.is_dirty());

        // latest mark per path wins
        cache.invalidate(temp_dir.path().join("a.stories.ts"), true);
        assert!(cache.is_dirty());
    }

    #[tokio::test]
    async fn test_clean_cache_serves_same_snapshot() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cache = cache_for(temp_dir.path());

        let first = cache.get_index().await.unwrap();
        let second = cache.get_index().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
