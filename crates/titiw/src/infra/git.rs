use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Command;

use tokio::task::spawn_blocking;
use tracing::debug;

use crate::domain::file::FileStatus;

/// Boxed async result used by [`GitClient`] trait methods.
pub type GitFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Async git boundary used by the file tracker and refresh task.
///
/// Production uses [`RealGitClient`], while tests can inject
/// `MockGitClient` to avoid spawning git processes.
#[cfg_attr(test, mockall::automock)]
pub trait GitClient: Send + Sync {
    /// Returns the normalized status of `path` relative to `repo_path`.
    ///
    /// Never fails: lookup errors map to [`FileStatus::Unknown`].
    fn status_of(&self, repo_path: PathBuf, path: String) -> GitFuture<FileStatus>;

    /// Returns `"<short hash> <message>"` for the latest commit on `HEAD`.
    ///
    /// # Errors
    /// Returns an error when `repo_path` is not a repository or has no
    /// commits.
    fn latest_commit(&self, repo_path: PathBuf) -> GitFuture<Result<String, String>>;
}

/// Production [`GitClient`] implementation backed by real git commands.
pub struct RealGitClient;

impl GitClient for RealGitClient {
    fn status_of(&self, repo_path: PathBuf, path: String) -> GitFuture<FileStatus> {
        Box::pin(async move { status_of(repo_path, path).await })
    }

    fn latest_commit(&self, repo_path: PathBuf) -> GitFuture<Result<String, String>> {
        Box::pin(async move { latest_commit(repo_path).await })
    }
}

/// Runs `git status --porcelain -- <path>` and normalizes the result.
///
/// # Arguments
/// * `repo_path` - Path to the git repository
/// * `path` - File path relative to `repo_path`
///
/// # Returns
/// The normalized status, [`FileStatus::Unknown`] when git fails.
pub async fn status_of(repo_path: PathBuf, path: String) -> FileStatus {
    let args = vec![
        "status".to_string(),
        "--porcelain".to_string(),
        "--".to_string(),
        path.clone(),
    ];

    match run_git_command(repo_path, args, "Git status failed".to_string()).await {
        Ok(output) => FileStatus::from_porcelain(&output),
        Err(error) => {
            debug!(%path, %error, "status lookup failed");

            FileStatus::Unknown
        }
    }
}

/// Returns the short hash and full message of the latest commit.
///
/// # Arguments
/// * `repo_path` - Path to the git repository
///
/// # Returns
/// Ok(summary) on success, Err(msg) with detailed error message on failure
///
/// # Errors
/// Returns an error if `git log` fails or prints nothing.
pub async fn latest_commit(repo_path: PathBuf) -> Result<String, String> {
    let output = run_git_command(
        repo_path,
        vec![
            "log".to_string(),
            "-1".to_string(),
            "--pretty=%h %B".to_string(),
        ],
        "Git log failed".to_string(),
    )
    .await?;
    let summary = output.trim().to_string();
    if summary.is_empty() {
        return Err("Git log failed: empty output".to_string());
    }

    Ok(summary)
}

/// Runs a git command in a blocking task and returns stdout text.
///
/// # Errors
/// Returns an error if spawning the command fails, the command exits with a
/// non-zero status, or the blocking task cannot be joined.
async fn run_git_command(
    repo_path: PathBuf,
    args: Vec<String>,
    error_context: String,
) -> Result<String, String> {
    spawn_blocking(move || {
        let argument_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        run_git_command_sync(&repo_path, &argument_refs, &error_context)
    })
    .await
    .map_err(|error| format!("Join error: {error}"))?
}

/// Runs a git command in `repo_path` and returns stdout text.
fn run_git_command_sync(
    repo_path: &Path,
    args: &[&str],
    error_context: &str,
) -> Result<String, String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .map_err(|error| format!("{error_context}: failed to execute git: {error}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        return Err(format!("{error_context}: {stderr}"));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
