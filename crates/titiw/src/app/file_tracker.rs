//! Project scanning with a per-path status cache.
//!
//! [`FileTracker::scan`] produces an observation only; merging it into
//! session state is [`crate::domain::file::reconcile`], applied under the
//! session lock by [`crate::app::session::SessionCore::apply_reconciliation`].

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use crate::domain::file::{FileStatus, ObservedFile};
use crate::infra::file_index::FileLister;
use crate::infra::git::GitClient;

/// Memoized status for one path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusCacheEntry {
    pub status: FileStatus,
    /// `None` when the expiry is not representable; the entry never expires.
    pub expires_at: Option<Instant>,
}

/// Status memo with a time-to-live plus per-entry random jitter.
///
/// Jitter is drawn when an entry is written so entries written in the same
/// scan expire at different times instead of in one burst.
#[derive(Debug)]
pub struct StatusCache {
    entries: HashMap<String, StatusCacheEntry>,
    max_jitter: Duration,
    ttl: Duration,
}

impl StatusCache {
    pub fn new(ttl: Duration, max_jitter: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_jitter,
            ttl,
        }
    }

    /// Returns the memoized status when it has not expired at `now`.
    pub fn get(&self, path: &str, now: Instant) -> Option<FileStatus> {
        self.entries
            .get(path)
            .filter(|entry| entry.expires_at.is_none_or(|expires_at| now < expires_at))
            .map(|entry| entry.status)
    }

    /// Memoizes `status` for `path` and returns the entry's expiry.
    pub fn insert(&mut self, path: String, status: FileStatus, now: Instant) -> Option<Instant> {
        let expires_at = self
            .ttl
            .checked_add(self.draw_jitter())
            .and_then(|lifetime| now.checked_add(lifetime));
        self.entries
            .insert(path, StatusCacheEntry { status, expires_at });

        expires_at
    }

    /// Drops entries for paths not in `paths`.
    pub fn retain_paths(&mut self, paths: &HashSet<&str>) {
        self.entries
            .retain(|path, _| paths.contains(path.as_str()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn draw_jitter(&self) -> Duration {
        let max_jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_jitter_ms == 0 {
            return Duration::ZERO;
        }

        Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter_ms))
    }
}

/// Observes the project root: recursive listing plus cached git status.
pub struct FileTracker {
    cache: StatusCache,
    file_lister: Arc<dyn FileLister>,
    git_client: Arc<dyn GitClient>,
    root: PathBuf,
}

impl FileTracker {
    pub fn new(
        root: PathBuf,
        file_lister: Arc<dyn FileLister>,
        git_client: Arc<dyn GitClient>,
        cache: StatusCache,
    ) -> Self {
        Self {
            cache,
            file_lister,
            git_client,
            root,
        }
    }

    /// Lists the project and resolves each path's status.
    ///
    /// Directories are reported as [`FileStatus::Directory`] without a git
    /// lookup. File statuses come from the cache while fresh; misses query
    /// git and are memoized.
    pub async fn scan(&mut self) -> Vec<ObservedFile> {
        let listed = self.file_lister.list_entries(self.root.clone()).await;
        let mut observed = Vec::with_capacity(listed.len());
        let mut lookups = 0_usize;

        for entry in listed {
            let status = if entry.is_dir {
                FileStatus::Directory
            } else if let Some(status) = self.cache.get(&entry.path, Instant::now()) {
                status
            } else {
                lookups += 1;
                let status = self
                    .git_client
                    .status_of(self.root.clone(), entry.path.clone())
                    .await;
                self.cache
                    .insert(entry.path.clone(), status, Instant::now());

                status
            };
            observed.push(ObservedFile::new(entry.path, status));
        }

        let observed_paths: HashSet<&str> =
            observed.iter().map(|file| file.path.as_str()).collect();
        self.cache.retain_paths(&observed_paths);
        debug!(
            entries = observed.len(),
            lookups,
            cached = self.cache.len(),
            "project scan complete"
        );

        observed
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::infra::file_index::{ListedEntry, MockFileLister};
    use crate::infra::git::MockGitClient;

    fn lister_returning(entries: Vec<ListedEntry>) -> MockFileLister {
        let mut file_lister = MockFileLister::new();
        file_lister.expect_list_entries().returning(move |_| {
            let entries = entries.clone();

            Box::pin(async move { entries })
        });

        file_lister
    }

    #[test]
    fn test_status_cache_hit_within_ttl_and_miss_after_expiry() {
        // Arrange
        let mut cache = StatusCache::new(Duration::from_secs(2), Duration::ZERO);
        let written_at = Instant::now();

        // Act
        cache.insert("a.txt".to_string(), FileStatus::Modified, written_at);
        let fresh = cache.get("a.txt", written_at + Duration::from_secs(1));
        let expired = cache.get("a.txt", written_at + Duration::from_secs(2));

        // Assert
        assert_eq!(fresh, Some(FileStatus::Modified));
        assert_eq!(expired, None);
    }

    #[test]
    fn test_status_cache_jitter_extends_expiry_within_bounds() {
        // Arrange
        let ttl = Duration::from_secs(2);
        let max_jitter = Duration::from_millis(500);
        let mut cache = StatusCache::new(ttl, max_jitter);
        let written_at = Instant::now();

        // Act
        let expiries: Vec<Option<Instant>> = (0..50)
            .map(|index| cache.insert(format!("f{index}"), FileStatus::Unmodified, written_at))
            .collect();

        // Assert
        assert!(expiries.iter().all(|expires_at| {
            expires_at.is_some_and(|expires_at| {
                expires_at >= written_at + ttl && expires_at <= written_at + ttl + max_jitter
            })
        }));
    }

    #[test]
    fn test_status_cache_unrepresentable_expiry_never_expires() {
        // Arrange
        let mut cache = StatusCache::new(Duration::MAX, Duration::ZERO);
        let written_at = Instant::now();

        // Act
        let expires_at = cache.insert("a.txt".to_string(), FileStatus::Modified, written_at);

        // Assert
        assert_eq!(expires_at, None);
        assert_eq!(
            cache.get("a.txt", written_at + Duration::from_secs(3600)),
            Some(FileStatus::Modified)
        );
    }

    #[test]
    fn test_status_cache_retain_paths_prunes_unobserved_entries() {
        // Arrange
        let mut cache = StatusCache::new(Duration::from_secs(2), Duration::ZERO);
        let now = Instant::now();
        cache.insert("kept.txt".to_string(), FileStatus::Unmodified, now);
        cache.insert("gone.txt".to_string(), FileStatus::Unmodified, now);

        // Act
        cache.retain_paths(&HashSet::from(["kept.txt"]));

        // Assert
        assert_eq!(cache.len(), 1);
        assert!(cache.get("kept.txt", now).is_some());
    }

    #[test]
    fn test_status_cache_retain_no_paths_empties_cache() {
        // Arrange
        let mut cache = StatusCache::new(Duration::from_secs(2), Duration::ZERO);
        cache.insert("a.txt".to_string(), FileStatus::Unmodified, Instant::now());

        // Act
        cache.retain_paths(&HashSet::new());

        // Assert
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_scan_reports_directories_without_git_lookup() {
        // Arrange
        let file_lister = lister_returning(vec![
            ListedEntry::dir("src"),
            ListedEntry::file("src/main.rs"),
        ]);
        let mut git_client = MockGitClient::new();
        git_client
            .expect_status_of()
            .with(eq(PathBuf::from("/repo")), eq("src/main.rs".to_string()))
            .times(1)
            .returning(|_, _| Box::pin(async { FileStatus::Modified }));
        let mut tracker = FileTracker::new(
            PathBuf::from("/repo"),
            Arc::new(file_lister),
            Arc::new(git_client),
            StatusCache::new(Duration::from_secs(60), Duration::ZERO),
        );

        // Act
        let observed = tracker.scan().await;

        // Assert
        assert_eq!(
            observed,
            vec![
                ObservedFile::new("src", FileStatus::Directory),
                ObservedFile::new("src/main.rs", FileStatus::Modified),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_uses_cache_for_repeated_scans_within_ttl() {
        // Arrange
        let file_lister = lister_returning(vec![
            ListedEntry::file("a.txt"),
            ListedEntry::file("b.txt"),
        ]);
        let mut git_client = MockGitClient::new();
        git_client
            .expect_status_of()
            .times(2)
            .returning(|_, _| Box::pin(async { FileStatus::Unmodified }));
        let mut tracker = FileTracker::new(
            PathBuf::from("/repo"),
            Arc::new(file_lister),
            Arc::new(git_client),
            StatusCache::new(Duration::from_secs(60), Duration::from_secs(1)),
        );

        // Act
        let first_scan = tracker.scan().await;
        let second_scan = tracker.scan().await;

        // Assert
        assert_eq!(first_scan, second_scan);
    }

    #[tokio::test]
    async fn test_scan_queries_again_after_ttl_expires() {
        // Arrange
        let file_lister = lister_returning(vec![ListedEntry::file("a.txt")]);
        let mut git_client = MockGitClient::new();
        git_client
            .expect_status_of()
            .times(2)
            .returning(|_, _| Box::pin(async { FileStatus::Untracked }));
        let mut tracker = FileTracker::new(
            PathBuf::from("/repo"),
            Arc::new(file_lister),
            Arc::new(git_client),
            StatusCache::new(Duration::ZERO, Duration::ZERO),
        );

        // Act
        tracker.scan().await;
        let observed = tracker.scan().await;

        // Assert
        assert_eq!(
            observed,
            vec![ObservedFile::new("a.txt", FileStatus::Untracked)]
        );
    }
}
