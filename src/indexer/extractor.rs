use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

use crate::error::{IndexerError, Result};
use crate::index::models::{Specifier, StoryEntry};

/// Turns one story file into catalog entries.
///
/// Implementations must be cheap to call repeatedly; the cache invokes
/// `extract` once per relevant file per rebuild. A failure only drops that
/// file from the index, it never aborts a build.
pub trait StoryExtractor: Send + Sync {
    fn extract(&self, path: &Path, specifier: &Specifier) -> Result<Vec<StoryEntry>>;
}

/// Default extractor for CSF-style story modules and JSON story manifests.
///
/// Code files (`.js`, `.jsx`, `.ts`, `.tsx`, `.mjs`) are scanned with a
/// lightweight pattern match: the default export's `title`, optional
/// file-level `tags`, and every `export const Name`. JSON manifests declare
/// the same data literally.
pub struct CsfExtractor {
    working_dir: PathBuf,
    title_re: Regex,
    export_re: Regex,
    tags_re: Regex,
}

#[derive(Deserialize)]
struct Manifest {
    title: String,
    #[serde(default)]
    tags: Vec<String>,
    stories: Vec<ManifestStory>,
}

#[derive(Deserialize)]
struct ManifestStory {
    name: String,
    #[serde(default)]
    tags: Vec<String>,
}

const CODE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs"];

impl CsfExtractor {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            title_re: Regex::new(r#"title\s*:\s*['"`]([^'"`]+)['"`]"#).unwrap(),
            export_re: Regex::new(r"(?m)^\s*export\s+const\s+([A-Za-z_][A-Za-z0-9_]*)\s*=")
                .unwrap(),
            tags_re: Regex::new(r"tags\s*:\s*\[([^\]]*)\]").unwrap(),
        }
    }

    fn extract_code(&self, path: &Path, content: &str, specifier: &Specifier) -> Result<Vec<StoryEntry>> {
        let title = self
            .title_re
            .captures(content)
            .map(|c| c[1].to_string())
            .ok_or_else(|| IndexerError::Extraction {
                path: path.to_path_buf(),
                message: "no default export title found".to_string(),
            })?;
        let title = prefixed_title(specifier, &title);

        let tags = self
            .tags_re
            .captures(content)
            .map(|c| parse_tag_list(&c[1]))
            .unwrap_or_default();

        let import_path = self.import_path(path);
        let entries = self
            .export_re
            .captures_iter(content)
            .map(|c| c[1].to_string())
            .filter(|name| name != "default")
            .map(|export| {
                let name = story_name_from_export(&export);
                StoryEntry {
                    id: story_id(&title, &name),
                    title: title.clone(),
                    name,
                    import_path: import_path.clone(),
                    tags: tags.clone(),
                }
            })
            .collect();

        Ok(entries)
    }

    fn extract_manifest(&self, path: &Path, content: &str, specifier: &Specifier) -> Result<Vec<StoryEntry>> {
        let manifest: Manifest =
            serde_json::from_str(content).map_err(|e| IndexerError::Extraction {
                path: path.to_path_buf(),
                message: format!("invalid story manifest: {}", e),
            })?;

        let title = prefixed_title(specifier, &manifest.title);
        let import_path = self.import_path(path);

        Ok(manifest
            .stories
            .into_iter()
            .map(|story| {
                let mut tags = manifest.tags.clone();
                tags.extend(story.tags);
                StoryEntry {
                    id: story_id(&title, &story.name),
                    title: title.clone(),
                    name: story.name,
                    import_path: import_path.clone(),
                    tags,
                }
            })
            .collect())
    }

    fn import_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.working_dir) {
            Ok(relative) => format!("./{}", relative.display()).replace('\\', "/"),
            Err(_) => path.to_string_lossy().replace('\\', "/"),
        }
    }
}

impl StoryExtractor for CsfExtractor {
    fn extract(&self, path: &Path, specifier: &Specifier) -> Result<Vec<StoryEntry>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let content = fs::read_to_string(path).map_err(|e| IndexerError::Extraction {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if extension == "json" {
            self.extract_manifest(path, &content, specifier)
        } else if CODE_EXTENSIONS.contains(&extension.as_str()) {
            self.extract_code(path, &content, specifier)
        } else {
            Err(IndexerError::Extraction {
                path: path.to_path_buf(),
                message: format!("unsupported story file type '.{}'", extension),
            })
        }
    }
}

fn prefixed_title(specifier: &Specifier, title: &str) -> String {
    match &specifier.title_prefix {
        Some(prefix) => format!("{}/{}", prefix, title),
        None => title.to_string(),
    }
}

fn parse_tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().trim_matches(|c| c == '\'' || c == '"' || c == '`'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds the catalog id for one story: `widgets-button--primary`.
pub fn story_id(title: &str, name: &str) -> String {
    format!("{}--{}", sanitize(title), sanitize(name))
}

/// Lowercases and collapses every run of non-alphanumerics to a single dash.
fn sanitize(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut pending_dash = false;
    for c in part.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Derives a display name from an export identifier:
/// `PrimaryButton` and `primary_button` both become "Primary Button".
fn story_name_from_export(export: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for raw in export.split('_') {
        let mut current = String::new();
        for c in raw.chars() {
            if c.is_uppercase() && !current.is_empty() {
                words.push(current);
                current = String::new();
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
        .into_iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
