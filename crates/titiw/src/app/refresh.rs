//! Periodic project observation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::app::AppEvent;
use crate::app::file_tracker::FileTracker;
use crate::app::session::NO_COMMITS_FOUND;
use crate::domain::file::ObservedFile;
use crate::infra::git::GitClient;

/// Result of one project observation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Observation {
    /// Latest commit summary, or the placeholder when git has none.
    pub commit: String,
    pub files: Vec<ObservedFile>,
}

/// Shared entry point for on-demand and periodic observations.
///
/// The tracker sits behind an async lock of its own so the status cache is
/// reused by both paths; the session lock is never involved.
#[derive(Clone)]
pub struct ProjectObserver {
    git_client: Arc<dyn GitClient>,
    root: PathBuf,
    tracker: Arc<Mutex<FileTracker>>,
}

impl ProjectObserver {
    pub fn new(root: PathBuf, git_client: Arc<dyn GitClient>, tracker: FileTracker) -> Self {
        Self {
            git_client,
            root,
            tracker: Arc::new(Mutex::new(tracker)),
        }
    }

    /// Scans the project and looks up the latest commit.
    pub async fn observe(&self) -> Observation {
        let files = self.tracker.lock().await.scan().await;
        let commit = match self.git_client.latest_commit(self.root.clone()).await {
            Ok(summary) => summary,
            Err(error) => {
                debug!(%error, "latest commit lookup failed");

                NO_COMMITS_FOUND.to_string()
            }
        };

        Observation { commit, files }
    }
}

/// Spawns the periodic refresh loop.
///
/// Each tick emits [`AppEvent::FilesObserved`] and
/// [`AppEvent::CommitObserved`]. The loop stops when `cancel` fires or the
/// event bus closes.
pub(super) fn spawn_refresh_task(
    observer: ProjectObserver,
    interval: Duration,
    cancel: CancellationToken,
    event_tx: mpsc::UnboundedSender<AppEvent>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let observation = tokio::select! {
                () = cancel.cancelled() => break,
                observation = observer.observe() => observation,
            };
            let files_sent = event_tx.send(AppEvent::FilesObserved {
                observed: observation.files,
            });
            let commit_sent = event_tx.send(AppEvent::CommitObserved {
                summary: observation.commit,
            });
            if files_sent.is_err() || commit_sent.is_err() {
                break;
            }
        }

        debug!("refresh task stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::file_tracker::StatusCache;
    use crate::domain::file::FileStatus;
    use crate::infra::file_index::{ListedEntry, MockFileLister};
    use crate::infra::git::MockGitClient;

    fn observer(commit: Result<String, String>) -> ProjectObserver {
        let mut file_lister = MockFileLister::new();
        file_lister
            .expect_list_entries()
            .returning(|_| Box::pin(async { vec![ListedEntry::file("a.txt")] }));
        let mut git_client = MockGitClient::new();
        git_client
            .expect_status_of()
            .returning(|_, _| Box::pin(async { FileStatus::Modified }));
        git_client.expect_latest_commit().returning(move |_| {
            let commit = commit.clone();

            Box::pin(async move { commit })
        });
        let git_client: Arc<dyn GitClient> = Arc::new(git_client);
        let tracker = FileTracker::new(
            PathBuf::from("/repo"),
            Arc::new(file_lister),
            Arc::clone(&git_client),
            StatusCache::new(Duration::from_secs(60), Duration::ZERO),
        );

        ProjectObserver::new(PathBuf::from("/repo"), git_client, tracker)
    }

    #[tokio::test]
    async fn test_observe_returns_files_and_commit() {
        // Arrange
        let project_observer = observer(Ok("abc1234 Add parser".to_string()));

        // Act
        let observation = project_observer.observe().await;

        // Assert
        assert_eq!(
            observation,
            Observation {
                commit: "abc1234 Add parser".to_string(),
                files: vec![ObservedFile::new("a.txt", FileStatus::Modified)],
            }
        );
    }

    #[tokio::test]
    async fn test_observe_uses_placeholder_when_commit_lookup_fails() {
        // Arrange
        let project_observer = observer(Err("not a git repository".to_string()));

        // Act
        let observation = project_observer.observe().await;

        // Assert
        assert_eq!(observation.commit, NO_COMMITS_FOUND);
    }

    #[tokio::test]
    async fn test_refresh_task_emits_events_until_cancelled() {
        // Arrange
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        // Act
        spawn_refresh_task(
            observer(Ok("abc1234 Add parser".to_string())),
            Duration::from_millis(10),
            cancel.clone(),
            event_tx,
        );
        let first_event = event_rx.recv().await;
        let second_event = event_rx.recv().await;
        cancel.cancel();
        while event_rx.recv().await.is_some() {}

        // Assert
        assert_eq!(
            first_event,
            Some(AppEvent::FilesObserved {
                observed: vec![ObservedFile::new("a.txt", FileStatus::Modified)],
            })
        );
        assert_eq!(
            second_event,
            Some(AppEvent::CommitObserved {
                summary: "abc1234 Add parser".to_string(),
            })
        );
    }
}
