pub mod cache;
pub mod models;
pub mod notifier;

pub use cache::{InvalidationCache, SharedIndexResult};
pub use models::{
    CollisionPolicy, Diagnostic, DirtyKind, Specifier, StoryEntry, StoryIndex, INDEX_VERSION,
};
pub use notifier::{ChangeNotifier, ChangeSubscription};
