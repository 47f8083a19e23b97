//! Tracked project files and the reconciliation that keeps them stable
//! across rescans.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// Normalized version-control status for one tracked path.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum FileStatus {
    Unmodified,
    Modified,
    Untracked,
    Directory,
    /// Status could not be determined or did not match a known pattern.
    #[default]
    Unknown,
}

impl FileStatus {
    /// Maps `git status --porcelain -- <path>` output to a status.
    ///
    /// Empty output means git knows the path and it is clean. Any output that
    /// does not match a known code maps to [`FileStatus::Unknown`].
    pub fn from_porcelain(output: &str) -> Self {
        let Some(line) = output.lines().find(|line| !line.trim().is_empty()) else {
            return Self::Unmodified;
        };
        let mut codes = line.chars();
        let (Some(index), Some(worktree)) = (codes.next(), codes.next()) else {
            return Self::Unknown;
        };

        match (index, worktree) {
            ('?', '?') => Self::Untracked,
            ('!', '!') => Self::Unknown,
            (index, worktree)
                if is_change_code(index) || is_change_code(worktree) =>
            {
                Self::Modified
            }
            _ => Self::Unknown,
        }
    }
}

fn is_change_code(code: char) -> bool {
    matches!(code, 'M' | 'A' | 'D' | 'R' | 'C' | 'U' | 'T')
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Unmodified => write!(f, "Unmodified"),
            FileStatus::Modified => write!(f, "Modified"),
            FileStatus::Untracked => write!(f, "Untracked"),
            FileStatus::Directory => write!(f, "Directory"),
            FileStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One file or directory under the project root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileEntry {
    /// Path relative to the project root. Stable identity across rescans.
    pub path: String,
    pub status: FileStatus,
    /// Whether the file's contents are injected into the next turn.
    pub active: bool,
}

impl FileEntry {
    /// Creates an inactive entry.
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
            active: false,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.status == FileStatus::Directory
    }
}

/// One path seen by a filesystem and status scan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObservedFile {
    pub path: String,
    pub status: FileStatus,
}

impl ObservedFile {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// Counts of changes applied by one [`reconcile`] call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub removed: usize,
    pub status_changed: usize,
}

impl ReconcileSummary {
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.status_changed == 0
    }
}

/// Merges a fresh observation into the held entry set.
///
/// Known paths keep their entry and `active` flag and take the observed
/// status. New paths are added inactive. Paths missing from `observed` are
/// dropped. The resulting order follows `observed`; repeated paths in
/// `observed` after the first are ignored.
///
/// An entry that turns into a directory loses its `active` flag because
/// directories cannot be active.
pub fn reconcile(entries: &mut Vec<FileEntry>, observed: Vec<ObservedFile>) -> ReconcileSummary {
    let mut previous: HashMap<String, FileEntry> = entries
        .drain(..)
        .map(|entry| (entry.path.clone(), entry))
        .collect();
    let mut seen_paths = HashSet::with_capacity(observed.len());
    let mut summary = ReconcileSummary::default();

    for observed_file in observed {
        if !seen_paths.insert(observed_file.path.clone()) {
            continue;
        }

        let entry = match previous.remove(&observed_file.path) {
            Some(mut entry) => {
                if entry.status != observed_file.status {
                    entry.status = observed_file.status;
                    summary.status_changed += 1;
                }
                if entry.is_dir() {
                    entry.active = false;
                }

                entry
            }
            None => {
                summary.added += 1;

                FileEntry::new(observed_file.path, observed_file.status)
            }
        };
        entries.push(entry);
    }

    summary.removed = previous.len();

    summary
}
