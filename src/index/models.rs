use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Format version tag carried by every serialized index.
pub const INDEX_VERSION: u32 = 4;

fn default_files_pattern() -> String {
    "**/*.stories.*".to_string()
}

/// Describes one set of files to scan for story entries.
///
/// A specifier is fixed once a cache is constructed; its identity is the
/// full configuration tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specifier {
    /// Root directory to scan
    pub directory: PathBuf,
    /// Glob pattern matched against paths relative to `directory`
    #[serde(default = "default_files_pattern")]
    pub files: String,
    /// Prefix prepended to every title extracted under this specifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_prefix: Option<String>,
}

impl Specifier {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            files: default_files_pattern(),
            title_prefix: None,
        }
    }

    pub fn with_files(mut self, pattern: impl Into<String>) -> Self {
        self.files = pattern.into();
        self
    }

    pub fn with_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.title_prefix = Some(prefix.into());
        self
    }
}

/// One catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryEntry {
    /// Unique id within one index snapshot
    pub id: String,
    /// Component title, including any specifier prefix
    pub title: String,
    /// Story name within the component
    pub name: String,
    /// Path the client imports the story from
    pub import_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Immutable snapshot of the full catalog, keyed by entry id.
///
/// Handed out as `Arc<StoryIndex>`; the cache never mutates a snapshot it
/// has already returned. `BTreeMap` keeps serialization deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryIndex {
    pub v: u32,
    pub entries: BTreeMap<String, StoryEntry>,
}

impl StoryIndex {
    pub fn new(entries: BTreeMap<String, StoryEntry>) -> Self {
        Self {
            v: INDEX_VERSION,
            entries,
        }
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Non-fatal issue recorded during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A file failed extraction and contributed no entries
    Extraction { path: PathBuf, message: String },
    /// Two files declared the same story id
    Collision {
        id: String,
        kept: PathBuf,
        dropped: PathBuf,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Extraction { path, message } => {
                write!(f, "extraction failed for {}: {}", path.display(), message)
            }
            Diagnostic::Collision { id, kept, dropped } => {
                write!(
                    f,
                    "duplicate story id '{}': kept {}, dropped {}",
                    id,
                    kept.display(),
                    dropped.display()
                )
            }
        }
    }
}

/// What to do when two files declare the same story id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The file enumerated later replaces the earlier entry
    #[default]
    LastWins,
    /// The file enumerated first keeps the entry
    FirstWins,
}

/// Staleness tag for a path in the dirty set.
///
/// Created and changed files collapse to `Changed`; the rebuild re-reads
/// the file either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyKind {
    Changed,
    Removed,
}
