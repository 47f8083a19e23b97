use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;

/// Boxed async result used by [`FileReader`] trait methods.
pub type ReadFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Failure to read one file's contents.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// File content boundary used when injecting active files into a turn.
#[cfg_attr(test, mockall::automock)]
pub trait FileReader: Send + Sync {
    /// Reads `path` as UTF-8 text, replacing invalid sequences.
    ///
    /// # Errors
    /// Returns [`ReadError`] when the file cannot be read.
    fn read_contents(&self, path: PathBuf) -> ReadFuture<Result<String, ReadError>>;
}

/// Production [`FileReader`] backed by `tokio::fs`.
pub struct FsFileReader;

impl FileReader for FsFileReader {
    fn read_contents(&self, path: PathBuf) -> ReadFuture<Result<String, ReadError>> {
        Box::pin(async move {
            tokio::fs::read(&path)
                .await
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .map_err(|source| ReadError::Io { path, source })
        })
    }
}
