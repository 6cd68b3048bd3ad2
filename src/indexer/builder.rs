use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::Result;
use crate::index::models::{
    CollisionPolicy, Diagnostic, DirtyKind, Specifier, StoryEntry, StoryIndex,
};
use crate::indexer::extractor::StoryExtractor;
use crate::indexer::walker::SpecifierWalker;

/// Outcome of extracting one file. Failures are carried here so a later
/// splice pass still reports them without re-reading the file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileRecord {
    Entries(Vec<StoryEntry>),
    Failed(String),
}

/// Per-file extraction results, kept between rebuilds for splicing.
///
/// Outer Vec follows specifier order, inner maps are sorted by path; walking
/// the structure front to back reproduces enumeration order exactly.
#[derive(Debug, Clone, Default)]
pub struct ScannedFiles {
    per_specifier: Vec<BTreeMap<PathBuf, FileRecord>>,
}

impl ScannedFiles {
    pub fn file_count(&self) -> usize {
        self.per_specifier.iter().map(|m| m.len()).sum()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.per_specifier.iter().any(|m| m.contains_key(path))
    }
}

/// Owns the construction pass that turns scanned files into an index.
pub struct IndexBuilder {
    walker: SpecifierWalker,
    extractor: Arc<dyn StoryExtractor>,
    collision_policy: CollisionPolicy,
}

impl IndexBuilder {
    pub fn new(walker: SpecifierWalker, extractor: Arc<dyn StoryExtractor>) -> Self {
        Self {
            walker,
            extractor,
            collision_policy: CollisionPolicy::default(),
        }
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn specifiers(&self) -> &[Specifier] {
        self.walker.specifiers()
    }

    pub fn walker(&self) -> &SpecifierWalker {
        &self.walker
    }

    /// Full enumeration and extraction pass over every specifier.
    ///
    /// Extraction runs file-parallel; a per-file failure becomes a
    /// `Failed` record. Only specifier enumeration errors are fatal.
    pub fn scan_all(&self) -> Result<ScannedFiles> {
        let mut per_specifier = Vec::with_capacity(self.specifiers().len());

        for (index, spec) in self.walker.specifiers().iter().enumerate() {
            let files = self.walker.walk(index)?;
            let records: BTreeMap<PathBuf, FileRecord> = files
                .par_iter()
                .map(|path| (path.clone(), self.extract_record(path, spec)))
                .collect();
            per_specifier.push(records);
        }

        Ok(ScannedFiles { per_specifier })
    }

    /// Splice pass: carries `prev` forward and re-extracts only the dirty
    /// paths. Removed paths drop out; paths no specifier covers are ignored,
    /// which also absorbs duplicate and stale watcher events.
    pub fn rescan(
        &self,
        prev: &ScannedFiles,
        dirty: &HashMap<PathBuf, DirtyKind>,
    ) -> Result<ScannedFiles> {
        let mut next = prev.clone();
        next.per_specifier
            .resize_with(self.specifiers().len(), BTreeMap::new);

        for (path, kind) in dirty {
            let Some(owner) = self.walker.owner_of(path) else {
                debug!(path = %path.display(), "ignoring change outside all specifiers");
                continue;
            };

            match kind {
                DirtyKind::Removed => {
                    next.per_specifier[owner].remove(path);
                }
                DirtyKind::Changed => {
                    // The event may be stale; a path that vanished since is
                    // treated as removed.
                    if path.is_file() {
                        let record = self.extract_record(path, &self.specifiers()[owner]);
                        next.per_specifier[owner].insert(path.clone(), record);
                    } else {
                        next.per_specifier[owner].remove(path);
                    }
                }
            }
        }

        Ok(next)
    }

    /// Folds per-file records into one snapshot, applying the collision
    /// policy in enumeration order.
    pub fn merge(&self, scanned: &ScannedFiles) -> (StoryIndex, Vec<Diagnostic>) {
        let mut entries: BTreeMap<String, StoryEntry> = BTreeMap::new();
        let mut origin: HashMap<String, PathBuf> = HashMap::new();
        let mut diagnostics = Vec::new();

        for records in &scanned.per_specifier {
            for (path, record) in records {
                let file_entries = match record {
                    FileRecord::Failed(message) => {
                        diagnostics.push(Diagnostic::Extraction {
                            path: path.clone(),
                            message: message.clone(),
                        });
                        continue;
                    }
                    FileRecord::Entries(file_entries) => file_entries,
                };

                for story in file_entries {
                    match entries.entry(story.id.clone()) {
                        Entry::Vacant(slot) => {
                            slot.insert(story.clone());
                            origin.insert(story.id.clone(), path.clone());
                        }
                        Entry::Occupied(mut slot) => {
                            let earlier = origin
                                .get(&story.id)
                                .cloned()
                                .unwrap_or_else(|| path.clone());
                            match self.collision_policy {
                                CollisionPolicy::LastWins => {
                                    diagnostics.push(Diagnostic::Collision {
                                        id: story.id.clone(),
                                        kept: path.clone(),
                                        dropped: earlier,
                                    });
                                    slot.insert(story.clone());
                                    origin.insert(story.id.clone(), path.clone());
                                }
                                CollisionPolicy::FirstWins => {
                                    diagnostics.push(Diagnostic::Collision {
                                        id: story.id.clone(),
                                        kept: earlier,
                                        dropped: path.clone(),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        (StoryIndex::new(entries), diagnostics)
    }

    /// Full build: scan everything, then merge.
    pub fn build(&self) -> Result<(ScannedFiles, StoryIndex, Vec<Diagnostic>)> {
        let scanned = self.scan_all()?;
        let (index, diagnostics) = self.merge(&scanned);
        Ok((scanned, index, diagnostics))
    }

    fn extract_record(&self, path: &Path, specifier: &Specifier) -> FileRecord {
        match self.extractor.extract(path, specifier) {
            Ok(entries) => FileRecord::Entries(entries),
            Err(e) => {
                warn!(path = %path.display(), "extraction failed: {}", e);
                FileRecord::Failed(e.to_string())
            }
        }
    }
}
