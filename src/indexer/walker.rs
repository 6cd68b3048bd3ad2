use std::path::{Path, PathBuf};

use glob::Pattern;
use ignore::WalkBuilder;

use crate::error::{IndexerError, Result};
use crate::index::models::Specifier;

/// Enumerates story files for a fixed set of specifiers.
///
/// Patterns are compiled once at construction; enumeration order within a
/// specifier is sorted path order, so the same tree always yields the same
/// collision tie-breaks.
#[derive(Debug)]
pub struct SpecifierWalker {
    specifiers: Vec<Specifier>,
    patterns: Vec<Pattern>,
}

impl SpecifierWalker {
    pub fn new(specifiers: Vec<Specifier>) -> Result<Self> {
        let patterns = specifiers
            .iter()
            .map(|spec| {
                Pattern::new(&spec.files).map_err(|e| IndexerError::Pattern {
                    pattern: spec.files.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            specifiers,
            patterns,
        })
    }

    pub fn specifiers(&self) -> &[Specifier] {
        &self.specifiers
    }

    /// Lists files matched by the specifier at `index`, in sorted order.
    ///
    /// A missing root directory is a fatal build error.
    pub fn walk(&self, index: usize) -> Result<Vec<PathBuf>> {
        let spec = &self.specifiers[index];
        if !spec.directory.is_dir() {
            return Err(IndexerError::SpecifierRoot(spec.directory.clone()));
        }

        let mut files = Vec::new();
        let walker = WalkBuilder::new(&spec.directory)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            if path.is_file() && self.matches(index, path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Returns the first specifier that covers `path`, if any.
    ///
    /// Used to route an invalidated path back to its owning specifier;
    /// first match wins, mirroring enumeration order.
    pub fn owner_of(&self, path: &Path) -> Option<usize> {
        (0..self.specifiers.len()).find(|&i| self.matches(i, path))
    }

    fn matches(&self, index: usize, path: &Path) -> bool {
        let spec = &self.specifiers[index];
        match path.strip_prefix(&spec.directory) {
            Ok(relative) => self.patterns[index].matches_path(relative),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn walker_for(dir: &Path) -> SpecifierWalker {
        SpecifierWalker::new(vec![Specifier::new(dir)]).unwrap()
    }

    #[test]
    fn test_walk_matches_default_pattern() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "button.stories.ts", "");
        create_file(temp_dir.path(), "nested/card.stories.tsx", "");
        create_file(temp_dir.path(), "button.ts", "");
        create_file(temp_dir.path(), "README.md", "");

        let walker = walker_for(temp_dir.path());
        let files = walker.walk(0).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| {
            p.file_name()
                .unwrap()
                .to_string_lossy()
                .contains(".stories.")
        }));
    }

    #[test]
    fn test_walk_returns_sorted_paths() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "zeta.stories.ts", "");
        create_file(temp_dir.path(), "alpha.stories.ts", "");
        create_file(temp_dir.path(), "mid.stories.ts", "");

        let walker = walker_for(temp_dir.path());
        let files = walker.walk(0).unwrap();

        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[test]
    fn test_walk_custom_pattern() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "button.stories.json", "{}");
        create_file(temp_dir.path(), "button.stories.ts", "");

        let spec = Specifier::new(temp_dir.path()).with_files("**/*.stories.json");
        let walker = SpecifierWalker::new(vec![spec]).unwrap();
        let files = walker.walk(0).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with(".json"));
    }

    #[test]
    fn test_walk_missing_root_is_fatal() {
        let walker = walker_for(Path::new("/nonexistent/stories-root"));
        let err = walker.walk(0).unwrap_err();
        assert!(matches!(err, IndexerError::SpecifierRoot(_)));
    }

    #[test]
    fn test_walk_ignores_hidden_files() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "visible.stories.ts", "");
        create_file(temp_dir.path(), ".hidden.stories.ts", "");

        let walker = walker_for(temp_dir.path());
        let files = walker.walk(0).unwrap();

        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_owner_of_routes_to_first_match() {
        let temp_a = TempDir::new().unwrap();
        let temp_b = TempDir::new().unwrap();
        let walker = SpecifierWalker::new(vec![
            Specifier::new(temp_a.path()),
            Specifier::new(temp_b.path()),
        ])
        .unwrap();

        assert_eq!(walker.owner_of(&temp_a.path().join("a.stories.ts")), Some(0));
        assert_eq!(walker.owner_of(&temp_b.path().join("b.stories.ts")), Some(1));
        assert_eq!(walker.owner_of(&temp_b.path().join("b.ts")), None);
        assert_eq!(walker.owner_of(Path::new("/elsewhere/c.stories.ts")), None);
    }

    #[test]
    fn test_invalid_pattern_rejected_at_construction() {
        let spec = Specifier::new("/tmp").with_files("[unclosed");
        let err = SpecifierWalker::new(vec![spec]).unwrap_err();
        assert!(matches!(err, IndexerError::Pattern { .. }));
    }
}
