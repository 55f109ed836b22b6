//! Project knowledge index.
//!
//! The executive enriches conversation and job payloads with snippets pulled
//! from the project the coder operates on. The index is deliberately simple:
//! a full-file keyword-overlap search over source files, rebuilt on demand
//! (after every completed coder job, so retrieval stays fresh). Persisting
//! the index is out of scope.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::MemoryError;

/// Directories never scanned into the index.
const IGNORED_DIRS: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    "venv",
    "__pycache__",
    ".vox_memory",
];

/// File extensions considered source material.
const INDEXED_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "toml", "md", "html", "css", "json", "yaml", "yml",
];

/// Files larger than this are skipped (generated blobs, lockfiles).
const MAX_FILE_BYTES: u64 = 256 * 1024;

/// Retrieval interface the executive and job pipeline depend on.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Return context snippets ordered by relevance to `text`.
    async fn query(&self, text: &str, limit: usize) -> Vec<Snippet>;

    /// Rescan the underlying sources.
    async fn rebuild(&self) -> Result<(), MemoryError>;
}

/// One retrieved piece of context.
#[derive(Debug, Clone)]
pub struct Snippet {
    /// Path of the file the snippet came from, relative to the project root.
    pub path: PathBuf,
    /// Leading portion of the file contents.
    pub excerpt: String,
}

#[derive(Debug)]
struct IndexedFile {
    path: PathBuf,
    excerpt: String,
    tokens: HashMap<String, usize>,
}

/// Keyword-overlap index over the project directory.
pub struct KeywordIndex {
    root: PathBuf,
    files: RwLock<Vec<IndexedFile>>,
}

impl KeywordIndex {
    /// Create an empty index rooted at `root`. Call `rebuild` to populate it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: RwLock::new(Vec::new()),
        }
    }

    /// Number of files currently indexed.
    pub fn len(&self) -> usize {
        self.files.read().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn scan(root: &Path) -> Result<Vec<IndexedFile>, MemoryError> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                // A missing or unreadable root is fatal; a bad subdirectory
                // mid-walk is skipped so one odd mount cannot kill a rebuild.
                Err(e) if dir.as_path() == root => {
                    return Err(MemoryError::ScanFailed {
                        root: root.display().to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if path.is_dir() {
                    if !IGNORED_DIRS.contains(&name.as_ref()) && !name.starts_with('.') {
                        pending.push(path);
                    }
                    continue;
                }
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                if !INDEXED_EXTENSIONS.contains(&ext) {
                    continue;
                }
                if entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX) > MAX_FILE_BYTES {
                    continue;
                }
                let Ok(content) = std::fs::read_to_string(&path) else {
                    continue; // non-UTF-8 or unreadable, skip
                };
                let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                files.push(IndexedFile {
                    excerpt: content.chars().take(1200).collect(),
                    tokens: tokenize(&content),
                    path: rel,
                });
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl KnowledgeStore for KeywordIndex {
    async fn query(&self, text: &str, limit: usize) -> Vec<Snippet> {
        let query_tokens = tokenize(text);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let files = self.files.read().expect("index lock poisoned");
        let mut scored: Vec<(usize, &IndexedFile)> = files
            .iter()
            .map(|file| {
                let score: usize = query_tokens
                    .keys()
                    .filter_map(|token| file.tokens.get(token))
                    .sum();
                (score, file)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(limit)
            .map(|(_, file)| Snippet {
                path: file.path.clone(),
                excerpt: file.excerpt.clone(),
            })
            .collect()
    }

    async fn rebuild(&self) -> Result<(), MemoryError> {
        let root = self.root.clone();
        // The directory walk is blocking filesystem work; keep it off the
        // runtime worker threads.
        let scanned = tokio::task::spawn_blocking(move || Self::scan(&root))
            .await
            .map_err(|e| MemoryError::ScanFailed {
                root: self.root.display().to_string(),
                reason: e.to_string(),
            })??;

        tracing::info!(files = scanned.len(), root = %self.root.display(), "Knowledge index rebuilt");
        *self.files.write().expect("index lock poisoned") = scanned;
        Ok(())
    }
}

fn tokenize(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 3)
    {
        *counts.entry(token.to_lowercase()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.py"),
            "# config loader\nCONFIG = {}\ndef load_config():\n    return CONFIG\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("audio.rs"),
            "fn play_sound() { /* mixer */ }\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git").join("junk.py"), "config config").unwrap();
        dir
    }

    #[tokio::test]
    async fn rebuild_indexes_source_files_and_skips_vcs() {
        let dir = project();
        let index = KeywordIndex::new(dir.path());
        index.rebuild().await.unwrap();
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn query_ranks_by_keyword_overlap() {
        let dir = project();
        let index = KeywordIndex::new(dir.path());
        index.rebuild().await.unwrap();

        let hits = index.query("fix the config loader", 5).await;
        assert!(!hits.is_empty());
        assert_eq!(hits[0].path, PathBuf::from("config.py"));
    }

    #[tokio::test]
    async fn query_with_no_overlap_returns_nothing() {
        let dir = project();
        let index = KeywordIndex::new(dir.path());
        index.rebuild().await.unwrap();

        let hits = index.query("zzz qqq www", 5).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn query_before_rebuild_is_empty() {
        let dir = project();
        let index = KeywordIndex::new(dir.path());
        let hits = index.query("config", 5).await;
        assert!(hits.is_empty());
    }

    #[test]
    fn tokenize_splits_and_counts() {
        let tokens = tokenize("fix the config; config.py needs fixing");
        assert_eq!(tokens.get("config"), Some(&2));
        assert!(!tokens.contains_key("py"), "short tokens dropped");
    }

    #[tokio::test]
    async fn missing_root_fails_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let index = KeywordIndex::new(dir.path().join("does-not-exist"));
        assert!(index.rebuild().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bad_subdirectory_does_not_fail_the_rebuild() {
        use std::os::unix::fs::PermissionsExt;

        let dir = project();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden.py"), "secret = 1").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let index = KeywordIndex::new(dir.path());
        let result = index.rebuild().await;

        // Restore so the tempdir can be removed.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        result.unwrap();
        let hits = index.query("fix the config loader", 5).await;
        assert_eq!(hits[0].path, PathBuf::from("config.py"));
    }
}
