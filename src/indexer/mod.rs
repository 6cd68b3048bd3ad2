pub mod builder;
pub mod extractor;
pub mod walker;
pub mod watcher;

pub use builder::{IndexBuilder, ScannedFiles};
pub use extractor::{story_id, CsfExtractor, StoryExtractor};
pub use walker::SpecifierWalker;
pub use watcher::{ChangeEvent, SpecifierWatcher};
