//! Gitignore-aware recursive listing of the project root and fuzzy path
//! matching used to resolve `/toggle` queries.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use ignore::WalkBuilder;
use tokio::task::spawn_blocking;
use tracing::warn;

/// Boxed async result used by [`FileLister`] trait methods.
pub type ListFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// One file or directory found under the listing root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListedEntry {
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Relative path from the listing root (e.g., `src/main.rs`).
    pub path: String,
}

impl ListedEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            is_dir: false,
            path: path.into(),
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            is_dir: true,
            path: path.into(),
        }
    }
}

/// Recursive project listing boundary.
#[cfg_attr(test, mockall::automock)]
pub trait FileLister: Send + Sync {
    /// Lists files and directories under `root`, relative to `root`.
    fn list_entries(&self, root: PathBuf) -> ListFuture<Vec<ListedEntry>>;
}

/// Production [`FileLister`] walking the filesystem with `ignore`.
pub struct WalkFileLister;

impl FileLister for WalkFileLister {
    fn list_entries(&self, root: PathBuf) -> ListFuture<Vec<ListedEntry>> {
        Box::pin(async move {
            spawn_blocking(move || list_entries(&root))
                .await
                .unwrap_or_else(|error| {
                    warn!(%error, "file listing task failed");

                    Vec::new()
                })
        })
    }
}

/// Lists files and directories recursively under `root`, respecting
/// `.gitignore` and skipping the `.git` directory.
///
/// The walk has no depth or entry limit: a path missing from the listing
/// is treated as deleted by the tracker. Directories sort before files;
/// within each group, results are sorted alphabetically by path.
pub fn list_entries(root: &Path) -> Vec<ListedEntry> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut entries: Vec<ListedEntry> = walker
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let file_type = entry.file_type()?;
            if !file_type.is_file() && !file_type.is_dir() {
                return None;
            }

            let relative = entry.path().strip_prefix(root).ok()?;
            let path = relative_path_string(relative)?;

            Some(ListedEntry {
                is_dir: file_type.is_dir(),
                path,
            })
        })
        .collect();

    sort_entries(&mut entries);

    entries
}

/// Joins path components with `/`, returning `None` for the root itself.
fn relative_path_string(relative: &Path) -> Option<String> {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }

    Some(parts.join("/"))
}

fn sort_entries(entries: &mut [ListedEntry]) {
    entries.sort_by(|first, second| {
        second
            .is_dir
            .cmp(&first.is_dir)
            .then(first.path.cmp(&second.path))
    });
}

/// Returns the path in `paths` that best matches `query`.
///
/// An exact match wins. Otherwise query characters must appear in order
/// (case-insensitive); ties on score resolve to the shorter, then
/// alphabetically first, path.
pub fn best_match<'a>(paths: &[&'a str], query: &str) -> Option<&'a str> {
    if let Some(exact) = paths.iter().find(|path| **path == query) {
        return Some(exact);
    }
    if query.is_empty() {
        return None;
    }

    let query_chars: Vec<char> = query.to_lowercase().chars().collect();

    paths
        .iter()
        .filter_map(|path| fuzzy_score(path, &query_chars).map(|score| (*path, score)))
        .max_by(|(first_path, first_score), (second_path, second_score)| {
            first_score
                .cmp(second_score)
                .then(second_path.len().cmp(&first_path.len()))
                .then(second_path.cmp(first_path))
        })
        .map(|(path, _)| path)
}

/// Scores an in-order match of `query_chars` against `path`.
///
/// Consecutive matches and matches at the start of a path segment score
/// higher. Returns `None` when not every query character is found.
fn fuzzy_score(path: &str, query_chars: &[char]) -> Option<i32> {
    let path_chars: Vec<char> = path.to_lowercase().chars().collect();
    let mut score = 0;
    let mut query_index = 0;
    let mut previous_matched = false;

    for (path_index, path_char) in path_chars.iter().enumerate() {
        let Some(query_char) = query_chars.get(query_index) else {
            break;
        };
        if path_char != query_char {
            previous_matched = false;

            continue;
        }

        score += 1;
        if previous_matched {
            score += 3;
        }
        let at_segment_start = path_index == 0
            || matches!(path_chars[path_index - 1], '/' | '.' | '_' | '-');
        if at_segment_start {
            score += 5;
        }
        query_index += 1;
        previous_matched = true;
    }

    (query_index == query_chars.len()).then_some(score)
}
