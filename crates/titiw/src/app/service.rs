//! Shared app dependency container for the session loop and background
//! tasks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::app::AppEvent;
use crate::config::AppConfig;
use crate::domain::catalog::Catalog;
use crate::infra::file_index::{FileLister, WalkFileLister};
use crate::infra::file_reader::{FileReader, FsFileReader};
use crate::infra::git::{GitClient, RealGitClient};
use crate::infra::provider::openai::OpenAiProvider;
use crate::infra::provider::{CompletionProvider, ProviderError};

/// External collaborators injected into [`crate::app::App`].
#[derive(Clone)]
pub struct AppClients {
    pub file_lister: Arc<dyn FileLister>,
    pub file_reader: Arc<dyn FileReader>,
    pub git_client: Arc<dyn GitClient>,
    pub provider: Arc<dyn CompletionProvider>,
}

impl AppClients {
    /// Builds the production adapters from `config`.
    ///
    /// # Errors
    /// Returns [`ProviderError::Transport`] when the HTTP client cannot be
    /// built.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let provider = OpenAiProvider::new(
            config.api_key.clone(),
            config.api_url.clone(),
            config.request_timeout,
        )?;

        Ok(Self {
            file_lister: Arc::new(WalkFileLister),
            file_reader: Arc::new(FsFileReader),
            git_client: Arc::new(RealGitClient),
            provider: Arc::new(provider),
        })
    }
}

/// Shared app dependencies used by the loop and background workflows.
pub struct AppServices {
    catalog: Arc<Catalog>,
    clients: AppClients,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    project_dir: PathBuf,
}

impl AppServices {
    /// Creates a shared service container.
    pub(crate) fn new(
        project_dir: PathBuf,
        catalog: Arc<Catalog>,
        event_tx: mpsc::UnboundedSender<AppEvent>,
        clients: AppClients,
    ) -> Self {
        Self {
            catalog,
            clients,
            event_tx,
            project_dir,
        }
    }

    /// Returns the project root every relative path is resolved against.
    pub(crate) fn project_dir(&self) -> &Path {
        self.project_dir.as_path()
    }

    pub(crate) fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    /// Returns a clone of the app event sender.
    pub(crate) fn event_sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.event_tx.clone()
    }

    pub(crate) fn file_lister(&self) -> Arc<dyn FileLister> {
        Arc::clone(&self.clients.file_lister)
    }

    pub(crate) fn file_reader(&self) -> Arc<dyn FileReader> {
        Arc::clone(&self.clients.file_reader)
    }

    /// Returns the shared git client for async git operations.
    pub(crate) fn git_client(&self) -> Arc<dyn GitClient> {
        Arc::clone(&self.clients.git_client)
    }

    pub(crate) fn provider(&self) -> Arc<dyn CompletionProvider> {
        Arc::clone(&self.clients.provider)
    }
}
