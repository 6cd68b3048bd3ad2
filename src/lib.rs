pub mod config;
pub mod error;
pub mod index;
pub mod indexer;
pub mod server;

pub use config::Config;
pub use error::{IndexerError, Result};
pub use index::{
    ChangeNotifier, ChangeSubscription, CollisionPolicy, Diagnostic, DirtyKind, InvalidationCache,
    SharedIndexResult, Specifier, StoryEntry, StoryIndex, INDEX_VERSION,
};
pub use indexer::{
    story_id, ChangeEvent, CsfExtractor, IndexBuilder, ScannedFiles, SpecifierWalker,
    SpecifierWatcher, StoryExtractor,
};
pub use server::{create_router, AppState};
