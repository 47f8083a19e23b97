//! One conversation turn: snapshot, context rebuild, provider dispatch.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::app::session::SessionCore;
use crate::domain::message::total_chars;
use crate::domain::usage::estimate_tokens;
use crate::infra::file_reader::FileReader;
use crate::infra::provider::{CompletionProvider, ProviderError};

/// Contents of one active file injected as a system turn.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileContext {
    pub path: String,
    pub contents: String,
}

impl FileContext {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Returns the system turn text for this file.
    pub fn to_system_content(&self) -> String {
        format!("File: {}\nContent:\n{}", self.path, self.contents)
    }
}

/// Reason a turn produced an error reply.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TurnError {
    #[error("agent {agent} has no available service")]
    NoService { agent: String },
    #[error("turn worker is not available")]
    WorkerUnavailable,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result of executing a turn, applied to the session by
/// [`SessionCore::record_turn`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TurnOutcome {
    /// No agent was active; nothing was sent or logged.
    NoActiveAgent,
    Completed {
        reply: String,
        /// Characters of every turn sent to the provider.
        sent_chars: usize,
        service: String,
    },
    Failed { error: TurnError },
}

/// Executes turns against shared session state.
///
/// The session lock is held only while snapshotting and rebuilding context;
/// file reads and the provider call run without it. Clones share one turn
/// lock, so [`TurnPipeline::run`] executes at most one turn at a time.
#[derive(Clone)]
pub struct TurnPipeline {
    core: SessionCore,
    file_reader: Arc<dyn FileReader>,
    project_dir: PathBuf,
    provider: Arc<dyn CompletionProvider>,
    turn_lock: Arc<Mutex<()>>,
}

impl TurnPipeline {
    pub fn new(
        core: SessionCore,
        project_dir: PathBuf,
        file_reader: Arc<dyn FileReader>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            core,
            file_reader,
            project_dir,
            provider,
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Runs a turn and records its outcome, returning the reply text.
    ///
    /// Overlapping calls wait for the turn in flight, so each reply is
    /// logged directly after its own user turn.
    pub async fn run(&self, text: &str) -> String {
        let _turn_guard = self.turn_lock.lock().await;
        let outcome = self.execute(text).await;

        self.core.record_turn(&outcome)
    }

    /// Runs a turn up to the provider reply without recording it.
    ///
    /// When no agent is active the session is left untouched. Otherwise the
    /// user turn is in the log by the time this returns.
    pub async fn execute(&self, text: &str) -> TurnOutcome {
        let Some(plan) = self.core.begin_turn() else {
            return TurnOutcome::NoActiveAgent;
        };
        let file_contexts = self.read_file_contexts(&plan.active_paths).await;
        let messages = self
            .core
            .rebuild_context(plan.agent.directive(), &file_contexts, text);
        let Some(service) = plan.service else {
            warn!(agent = plan.agent.name(), "agent has no resolvable service");

            return TurnOutcome::Failed {
                error: TurnError::NoService {
                    agent: plan.agent.name().to_string(),
                },
            };
        };

        let sent_chars = total_chars(&messages);
        let service_name = service.name.clone();
        info!(
            agent = plan.agent.name(),
            service = service_name.as_str(),
            messages = messages.len(),
            sent_chars,
            "dispatching turn"
        );

        match self.provider.complete(messages, service).await {
            Ok(completion) => {
                if let Some(usage) = completion.usage {
                    info!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        total_tokens = usage.total_tokens,
                        "provider reported usage"
                    );
                }

                TurnOutcome::Completed {
                    reply: completion.text,
                    sent_chars,
                    service: service_name,
                }
            }
            Err(error) => {
                warn!(service = service_name.as_str(), %error, "completion failed");

                TurnOutcome::Failed {
                    error: TurnError::Provider(error),
                }
            }
        }
    }

    /// Reads active files in order, skipping any that fail.
    async fn read_file_contexts(&self, paths: &[String]) -> Vec<FileContext> {
        let mut file_contexts = Vec::with_capacity(paths.len());
        for path in paths {
            match self
                .file_reader
                .read_contents(self.project_dir.join(path))
                .await
            {
                Ok(contents) => {
                    info!(
                        path = path.as_str(),
                        estimated_tokens = estimate_tokens(contents.chars().count()),
                        "injecting file"
                    );
                    file_contexts.push(FileContext::new(path.as_str(), contents));
                }
                Err(error) => {
                    warn!(path = path.as_str(), %error, "skipping unreadable file");
                }
            }
        }

        file_contexts
    }
}
