//! Session composition root and internal event bus.

pub mod file_tracker;
pub mod refresh;
pub mod service;
pub mod session;
pub mod turn;
mod worker;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app::file_tracker::{FileTracker, StatusCache};
use crate::app::refresh::ProjectObserver;
use crate::app::service::{AppClients, AppServices};
use crate::app::session::{NO_ACTIVE_AGENTS, SessionCore};
use crate::app::turn::{TurnError, TurnPipeline};
use crate::app::worker::TurnCommand;
use crate::config::AppConfig;
use crate::domain::catalog::Catalog;
use crate::domain::file::{ObservedFile, ReconcileSummary};

/// Internal app events emitted by background tasks.
///
/// Producers only emit events; state mutation is centralized in
/// [`App::apply_app_events`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppEvent {
    /// Latest project listing with statuses from the refresh task.
    FilesObserved { observed: Vec<ObservedFile> },
    /// Latest commit summary from the refresh task.
    CommitObserved { summary: String },
    /// A queued turn was executed and recorded.
    TurnFinished { reply: String, turn_id: String },
}

#[derive(Default)]
struct AppEventBatch {
    commit_summary: Option<String>,
    finished_turns: Vec<TurnReply>,
    observed_files: Option<Vec<ObservedFile>>,
}

impl AppEventBatch {
    /// Keeps only the latest observation while preserving turn order.
    fn collect_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::FilesObserved { observed } => {
                self.observed_files = Some(observed);
            }
            AppEvent::CommitObserved { summary } => {
                self.commit_summary = Some(summary);
            }
            AppEvent::TurnFinished { reply, turn_id } => {
                self.finished_turns.push(TurnReply {
                    text: reply,
                    turn_id,
                });
            }
        }
    }
}

/// Text produced by a recorded turn.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TurnReply {
    pub text: String,
    pub turn_id: String,
}

/// Result of submitting user input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Submission {
    /// Turn accepted; its reply arrives as [`AppEvent::TurnFinished`].
    Queued { turn_id: String },
    /// No agent is active, so nothing was queued.
    NoActiveAgent,
}

impl Submission {
    /// Returns the immediate reply for rejected input.
    pub fn immediate_reply(&self) -> Option<&'static str> {
        match self {
            Self::Queued { .. } => None,
            Self::NoActiveAgent => Some(NO_ACTIVE_AGENTS),
        }
    }
}

/// Owns session state and coordinates background refresh and turns.
pub struct App {
    core: SessionCore,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,
    observer: ProjectObserver,
    pipeline: TurnPipeline,
    refresh_cancel: CancellationToken,
    services: AppServices,
    turn_worker: Option<mpsc::UnboundedSender<TurnCommand>>,
}

impl App {
    /// Builds the session, performs the first project observation, and
    /// starts the refresh task when `config.refresh_interval` is non-zero.
    pub async fn new(config: &AppConfig, catalog: Arc<Catalog>, clients: AppClients) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let services = AppServices::new(config.project_dir.clone(), catalog, event_tx, clients);
        let core = SessionCore::new(services.catalog());
        let tracker = FileTracker::new(
            services.project_dir().to_path_buf(),
            services.file_lister(),
            services.git_client(),
            StatusCache::new(config.status_ttl, config.status_jitter),
        );
        let observer = ProjectObserver::new(
            services.project_dir().to_path_buf(),
            services.git_client(),
            tracker,
        );
        let pipeline = TurnPipeline::new(
            core.clone(),
            services.project_dir().to_path_buf(),
            services.file_reader(),
            services.provider(),
        );

        let app = Self {
            core,
            event_rx,
            observer,
            pipeline,
            refresh_cancel: CancellationToken::new(),
            services,
            turn_worker: None,
        };
        app.update().await;

        if config.refresh_interval.is_zero() {
            debug!("periodic refresh disabled");
        } else {
            refresh::spawn_refresh_task(
                app.observer.clone(),
                config.refresh_interval,
                app.refresh_cancel.clone(),
                app.services.event_sender(),
            );
        }

        app
    }

    /// Returns the shared session state.
    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    pub fn project_dir(&self) -> &Path {
        self.services.project_dir()
    }

    /// Observes the project now and merges the result into the session.
    pub async fn update(&self) -> ReconcileSummary {
        let observation = self.observer.observe().await;
        self.core.set_last_commit(observation.commit);

        self.core.apply_reconciliation(observation.files)
    }

    /// Runs one turn to completion and returns the reply text.
    ///
    /// Returns `"No active agents."` without touching the session when no
    /// agent is active. Waits for any turn already running, including turns
    /// queued through [`App::submit_input`].
    pub async fn handle_input(&self, text: &str) -> String {
        self.pipeline.run(text).await
    }

    /// Queues one turn on the serialized turn worker.
    ///
    /// # Errors
    /// Returns [`TurnError::WorkerUnavailable`] when the turn worker has
    /// stopped.
    pub fn submit_input(&mut self, text: &str) -> Result<Submission, TurnError> {
        if self.core.acting_agent().is_none() {
            return Ok(Submission::NoActiveAgent);
        }

        let turn_id = Uuid::new_v4().to_string();
        let command = TurnCommand {
            text: text.to_string(),
            turn_id: turn_id.clone(),
        };
        let sender = self.ensure_turn_worker();
        if sender.send(command).is_err() {
            self.turn_worker = None;
            warn!(turn_id = turn_id.as_str(), "turn worker is not available");

            return Err(TurnError::WorkerUnavailable);
        }

        Ok(Submission::Queued { turn_id })
    }

    /// Waits for the next internal app event.
    pub async fn next_app_event(&mut self) -> Option<AppEvent> {
        self.event_rx.recv().await
    }

    /// Applies `first_event` and every event already queued behind it
    /// through a single reducer path.
    ///
    /// Observations are coalesced to the latest one. Replies of finished
    /// turns are returned in arrival order.
    pub fn apply_app_events(&mut self, first_event: AppEvent) -> Vec<TurnReply> {
        let drained_events = self.drain_app_events(first_event);
        let event_batch = Self::reduce_app_events(drained_events);

        self.apply_app_event_batch(event_batch)
    }

    /// Processes currently queued app events without waiting.
    pub fn process_pending_app_events(&mut self) -> Vec<TurnReply> {
        let Ok(first_event) = self.event_rx.try_recv() else {
            return Vec::new();
        };

        self.apply_app_events(first_event)
    }

    /// Stops background refresh and the turn worker.
    pub fn shutdown(&mut self) {
        self.refresh_cancel.cancel();
        self.turn_worker = None;
    }

    fn ensure_turn_worker(&mut self) -> mpsc::UnboundedSender<TurnCommand> {
        if let Some(sender) = &self.turn_worker {
            return sender.clone();
        }

        let sender = worker::spawn_turn_worker(self.pipeline.clone(), self.services.event_sender());
        self.turn_worker = Some(sender.clone());

        sender
    }

    fn drain_app_events(&mut self, first_event: AppEvent) -> Vec<AppEvent> {
        let mut events = vec![first_event];
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }

        events
    }

    fn reduce_app_events(events: Vec<AppEvent>) -> AppEventBatch {
        let mut event_batch = AppEventBatch::default();
        for event in events {
            event_batch.collect_event(event);
        }

        event_batch
    }

    fn apply_app_event_batch(&mut self, event_batch: AppEventBatch) -> Vec<TurnReply> {
        if let Some(observed) = event_batch.observed_files {
            self.core.apply_reconciliation(observed);
        }

        if let Some(summary) = event_batch.commit_summary {
            self.core.set_last_commit(summary);
        }

        event_batch.finished_turns
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.refresh_cancel.cancel();
    }
}
