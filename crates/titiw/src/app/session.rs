//! Shared session state behind one lock.
//!
//! [`SessionCore`] is the single owner of tracked files, agent activation,
//! the message log, usage counters, and the latest commit summary. Every
//! operation takes the lock for its whole duration and never awaits while
//! holding it; getters hand back owned snapshots.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::app::turn::{FileContext, TurnOutcome};
use crate::domain::catalog::{Agent, AgentActivation, Catalog, Service};
use crate::domain::file::{FileEntry, ObservedFile, ReconcileSummary, reconcile};
use crate::domain::message::{Message, MessageLog, Role};
use crate::domain::usage::{UsageMeter, estimate_tokens};

/// Reply returned for input submitted while no agent is active.
pub const NO_ACTIVE_AGENTS: &str = "No active agents.";
/// Commit summary shown before the first lookup or when git has none.
pub const NO_COMMITS_FOUND: &str = "No commits found.";

/// Rejected toggle request.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no tracked file at {0}")]
    UnknownFile(String),
    #[error("{0} is a directory and cannot be activated")]
    DirectoryNotToggleable(String),
    #[error("no agent named {0}")]
    UnknownAgent(String),
}

/// Snapshot taken at the start of a turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnPlan {
    pub agent: Agent,
    /// Service the turn is sent to, `None` when none of the agent's
    /// services resolve.
    pub service: Option<Service>,
    pub active_paths: Vec<String>,
}

#[derive(Debug)]
struct SessionState {
    /// Agent names in activation order.
    active_agents: Vec<String>,
    files: Vec<FileEntry>,
    last_commit: String,
    log: MessageLog,
    usage: UsageMeter,
}

/// Cloneable handle to the shared session state.
#[derive(Clone)]
pub struct SessionCore {
    catalog: Arc<Catalog>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionCore {
    /// Creates an empty session with no files, no active agents, and an empty
    /// log.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            state: Arc::new(Mutex::new(SessionState {
                active_agents: Vec::new(),
                files: Vec::new(),
                last_commit: NO_COMMITS_FOUND.to_string(),
                log: MessageLog::default(),
                usage: UsageMeter::default(),
            })),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Merges one project observation into the tracked file set.
    pub fn apply_reconciliation(&self, observed: Vec<ObservedFile>) -> ReconcileSummary {
        let mut state = self.lock();
        let summary = reconcile(&mut state.files, observed);
        if !summary.is_unchanged() {
            debug!(
                added = summary.added,
                removed = summary.removed,
                status_changed = summary.status_changed,
                tracked = state.files.len(),
                "file set reconciled"
            );
        }

        summary
    }

    pub fn files(&self) -> Vec<FileEntry> {
        self.lock().files.clone()
    }

    /// Returns paths of active files in tracked order.
    pub fn active_file_paths(&self) -> Vec<String> {
        active_paths(&self.lock().files)
    }

    /// Flips the `active` flag of the file at `path` and returns the new
    /// value.
    ///
    /// # Errors
    /// Returns [`SessionError`] when `path` is not tracked or is a directory.
    pub fn toggle_file(&self, path: &str) -> Result<bool, SessionError> {
        let mut state = self.lock();
        let entry = state
            .files
            .iter_mut()
            .find(|entry| entry.path == path)
            .ok_or_else(|| SessionError::UnknownFile(path.to_string()))?;
        if entry.is_dir() {
            return Err(SessionError::DirectoryNotToggleable(path.to_string()));
        }
        entry.active = !entry.active;

        Ok(entry.active)
    }

    /// Returns every catalog agent with its activation flag, in catalog
    /// order.
    pub fn agent_activations(&self) -> Vec<AgentActivation> {
        let state = self.lock();

        self.catalog
            .agents()
            .iter()
            .map(|agent| AgentActivation {
                name: agent.name().to_string(),
                active: state
                    .active_agents
                    .iter()
                    .any(|active| active == agent.name()),
            })
            .collect()
    }

    /// Flips activation for the agent named `name` and returns the new
    /// value. Activating appends to the activation order.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownAgent`] when the catalog has no such
    /// agent.
    pub fn toggle_agent(&self, name: &str) -> Result<bool, SessionError> {
        if self.catalog.agent(name).is_none() {
            return Err(SessionError::UnknownAgent(name.to_string()));
        }

        let mut state = self.lock();
        if let Some(position) = state.active_agents.iter().position(|active| active == name) {
            state.active_agents.remove(position);

            return Ok(false);
        }
        state.active_agents.push(name.to_string());

        Ok(true)
    }

    /// Returns active agent names in activation order.
    pub fn active_agents(&self) -> Vec<String> {
        self.lock().active_agents.clone()
    }

    /// Returns the agent that serves the next turn.
    ///
    /// When several agents are active, the earliest activated one acts.
    pub fn acting_agent(&self) -> Option<Agent> {
        let state = self.lock();

        self.acting_agent_locked(&state)
    }

    pub fn usage(&self) -> UsageMeter {
        self.lock().usage.clone()
    }

    /// Returns per-1K `(input_cost, output_cost)` for the first catalog
    /// service named `service_name`.
    pub fn service_cost(&self, service_name: &str) -> Option<(f64, f64)> {
        self.catalog
            .find_service(service_name)
            .map(|service| (service.input_cost, service.output_cost))
    }

    /// Returns one display line per used service.
    pub fn usage_summary(&self) -> Vec<String> {
        self.lock().usage.summary_lines(&self.catalog)
    }

    pub fn last_commit(&self) -> String {
        self.lock().last_commit.clone()
    }

    pub fn set_last_commit(&self, summary: impl Into<String>) {
        self.lock().last_commit = summary.into();
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().log.all_messages().to_vec()
    }

    pub fn render_plain(&self) -> String {
        self.lock().log.render_plain()
    }

    pub fn render_formatted(&self) -> String {
        self.lock().log.render_formatted()
    }

    /// Drops every turn. Usage counters are kept.
    pub fn clear_conversation(&self) {
        self.lock().log.clear();
    }

    /// Snapshots what a turn needs, or `None` when no agent is active.
    pub fn begin_turn(&self) -> Option<TurnPlan> {
        let state = self.lock();
        let agent = self.acting_agent_locked(&state)?;
        let service = self.catalog.agent_service(&agent).cloned();

        Some(TurnPlan {
            agent,
            service,
            active_paths: active_paths(&state.files),
        })
    }

    /// Replaces system turns with `directive` and one turn per file context,
    /// appends `user_text`, and returns the full sequence to send.
    pub fn rebuild_context(
        &self,
        directive: &str,
        file_contexts: &[FileContext],
        user_text: &str,
    ) -> Vec<Message> {
        let mut state = self.lock();
        state.log.clear_by_role(Role::System);
        state.log.insert_system(directive);
        for file_context in file_contexts {
            state.log.insert_system(file_context.to_system_content());
        }
        state.log.insert_user(user_text);

        state.log.all_messages().to_vec()
    }

    /// Appends the turn's reply or error to the log and returns the text
    /// shown to the user. Usage grows only for completed turns.
    pub fn record_turn(&self, outcome: &TurnOutcome) -> String {
        let mut state = self.lock();
        match outcome {
            TurnOutcome::NoActiveAgent => NO_ACTIVE_AGENTS.to_string(),
            TurnOutcome::Completed {
                reply,
                sent_chars,
                service,
            } => {
                let input_tokens = estimate_tokens(*sent_chars);
                let output_tokens = estimate_tokens(reply.chars().count());
                state.usage.record(service, input_tokens, output_tokens);
                state.log.insert_assistant(reply.as_str());
                info!(
                    service = service.as_str(),
                    input_tokens, output_tokens, "turn recorded"
                );

                reply.clone()
            }
            TurnOutcome::Failed { error } => {
                let text = format!("Error: {error}");
                state.log.insert_assistant(text.as_str());

                text
            }
        }
    }

    fn acting_agent_locked(&self, state: &SessionState) -> Option<Agent> {
        state
            .active_agents
            .iter()
            .find_map(|name| self.catalog.agent(name))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn active_paths(files: &[FileEntry]) -> Vec<String> {
    files
        .iter()
        .filter(|entry| entry.active)
        .map(|entry| entry.path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::turn::TurnError;
    use crate::domain::catalog::{ModelFamily, ServiceRef};
    use crate::domain::file::FileStatus;
    use crate::infra::provider::ProviderError;

    fn test_catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(
            vec![ModelFamily {
                name: "gpt-4".to_string(),
                services: vec![Service::new("gpt-4", 8192).with_costs(0.03, 0.06)],
            }],
            vec![
                Agent::new(
                    "Reviewer",
                    "You review code.",
                    vec![ServiceRef::new("gpt-4", "gpt-4")],
                ),
                Agent::new(
                    "Pirate",
                    "You talk like a pirate.",
                    vec![ServiceRef::new("gpt-4", "gpt-4")],
                ),
                Agent::new(
                    "Orphan",
                    "No backing service.",
                    vec![ServiceRef::new("missing", "missing")],
                ),
            ],
        ))
    }

    fn observed(paths: &[(&str, FileStatus)]) -> Vec<ObservedFile> {
        paths
            .iter()
            .map(|(path, status)| ObservedFile::new(*path, *status))
            .collect()
    }

    #[test]
    fn test_toggle_file_activates_and_survives_reconciliation() {
        // Arrange
        let core = SessionCore::new(test_catalog());
        core.apply_reconciliation(observed(&[("a.txt", FileStatus::Unmodified)]));

        // Act
        let active = core.toggle_file("a.txt").expect("file should toggle");
        core.apply_reconciliation(observed(&[
            ("a.txt", FileStatus::Modified),
            ("b.txt", FileStatus::Untracked),
        ]));

        // Assert
        assert!(active);
        assert_eq!(core.active_file_paths(), vec!["a.txt".to_string()]);
        assert_eq!(core.files()[0].status, FileStatus::Modified);
        assert!(!core.files()[1].active);
    }

    #[test]
    fn test_toggle_file_rejects_directories_and_unknown_paths() {
        // Arrange
        let core = SessionCore::new(test_catalog());
        core.apply_reconciliation(observed(&[("src", FileStatus::Directory)]));

        // Act
        let directory_result = core.toggle_file("src");
        let unknown_result = core.toggle_file("missing.txt");

        // Assert
        assert_eq!(
            directory_result,
            Err(SessionError::DirectoryNotToggleable("src".to_string()))
        );
        assert_eq!(
            unknown_result,
            Err(SessionError::UnknownFile("missing.txt".to_string()))
        );
        assert!(core.active_file_paths().is_empty());
    }

    #[test]
    fn test_toggle_agent_is_two_state() {
        // Arrange
        let core = SessionCore::new(test_catalog());

        // Act
        let first = core.toggle_agent("Reviewer").expect("agent should toggle");
        let second = core.toggle_agent("Reviewer").expect("agent should toggle");

        // Assert
        assert!(first);
        assert!(!second);
        assert!(core.active_agents().is_empty());
    }

    #[test]
    fn test_toggle_agent_rejects_unknown_name() {
        // Arrange
        let core = SessionCore::new(test_catalog());

        // Act
        let result = core.toggle_agent("Nobody");

        // Assert
        assert_eq!(result, Err(SessionError::UnknownAgent("Nobody".to_string())));
    }

    #[test]
    fn test_acting_agent_is_first_in_activation_order() {
        // Arrange
        let core = SessionCore::new(test_catalog());
        core.toggle_agent("Pirate").expect("agent should toggle");
        core.toggle_agent("Reviewer").expect("agent should toggle");

        // Act
        let acting = core.acting_agent();

        // Assert
        assert_eq!(acting.map(|agent| agent.name().to_string()), Some("Pirate".to_string()));
        assert_eq!(
            core.agent_activations(),
            vec![
                AgentActivation {
                    name: "Reviewer".to_string(),
                    active: true,
                },
                AgentActivation {
                    name: "Pirate".to_string(),
                    active: true,
                },
                AgentActivation {
                    name: "Orphan".to_string(),
                    active: false,
                },
            ]
        );
    }

    #[test]
    fn test_begin_turn_returns_none_without_active_agent() {
        // Arrange
        let core = SessionCore::new(test_catalog());

        // Act
        let plan = core.begin_turn();

        // Assert
        assert_eq!(plan, None);
    }

    #[test]
    fn test_begin_turn_snapshots_agent_service_and_active_paths() {
        // Arrange
        let core = SessionCore::new(test_catalog());
        core.apply_reconciliation(observed(&[
            ("a.txt", FileStatus::Unmodified),
            ("b.txt", FileStatus::Unmodified),
        ]));
        core.toggle_file("b.txt").expect("file should toggle");
        core.toggle_agent("Orphan").expect("agent should toggle");

        // Act
        let plan = core.begin_turn().expect("agent is active");

        // Assert
        assert_eq!(plan.agent.name(), "Orphan");
        assert_eq!(plan.service, None);
        assert_eq!(plan.active_paths, vec!["b.txt".to_string()]);
    }

    #[test]
    fn test_rebuild_context_never_duplicates_directive() {
        // Arrange
        let core = SessionCore::new(test_catalog());
        let file_contexts = vec![FileContext::new("main.txt", "fn main() {}")];

        // Act
        core.rebuild_context("You review code.", &file_contexts, "first");
        core.record_turn(&TurnOutcome::Completed {
            reply: "ok".to_string(),
            sent_chars: 40,
            service: "gpt-4".to_string(),
        });
        let messages = core.rebuild_context("You review code.", &file_contexts, "second");

        // Assert
        let system_messages: Vec<&Message> = messages
            .iter()
            .filter(|message| message.role == Role::System)
            .collect();
        assert_eq!(system_messages.len(), 2);
        assert_eq!(system_messages[0].content, "You review code.");
        assert_eq!(
            system_messages[1].content,
            "File: main.txt\nContent:\nfn main() {}"
        );
        assert_eq!(
            messages
                .iter()
                .filter(|message| message.role != Role::System)
                .map(|message| message.content.as_str())
                .collect::<Vec<_>>(),
            vec!["first", "ok", "second"]
        );
    }

    #[test]
    fn test_record_turn_completed_updates_usage_and_log() {
        // Arrange
        let core = SessionCore::new(test_catalog());
        core.rebuild_context("directive", &[], "hello");

        // Act
        let reply = core.record_turn(&TurnOutcome::Completed {
            reply: "a".repeat(40),
            sent_chars: 4000,
            service: "gpt-4".to_string(),
        });

        // Assert
        let usage = core.usage().get("gpt-4");
        assert_eq!(reply, "a".repeat(40));
        assert_eq!(usage.requests, 1);
        assert_eq!(usage.input_tokens, 1000);
        assert_eq!(usage.output_tokens, 10);
        assert_eq!(
            core.usage_summary(),
            vec!["gpt-4 (API Requests: 1, Tokens in/out: 1000/10, Cost: $0.03)".to_string()]
        );
    }

    #[test]
    fn test_record_turn_failed_appends_error_without_usage() {
        // Arrange
        let core = SessionCore::new(test_catalog());
        core.rebuild_context("directive", &[], "hello");

        // Act
        let text = core.record_turn(&TurnOutcome::Failed {
            error: TurnError::Provider(ProviderError::MissingCredential),
        });

        // Assert
        assert!(text.starts_with("Error: "));
        assert_eq!(core.messages().last().map(|message| message.content.clone()), Some(text));
        assert_eq!(core.usage().get("gpt-4").requests, 0);
    }

    #[test]
    fn test_record_turn_without_agent_returns_sentinel_and_keeps_log() {
        // Arrange
        let core = SessionCore::new(test_catalog());

        // Act
        let text = core.record_turn(&TurnOutcome::NoActiveAgent);

        // Assert
        assert_eq!(text, NO_ACTIVE_AGENTS);
        assert!(core.messages().is_empty());
    }

    #[test]
    fn test_usage_cost_never_decreases_across_turns() {
        // Arrange
        let core = SessionCore::new(test_catalog());
        let mut previous_cost = 0.0;

        // Act & Assert
        for sent_chars in [0, 7, 400, 4000] {
            core.record_turn(&TurnOutcome::Completed {
                reply: "reply".to_string(),
                sent_chars,
                service: "gpt-4".to_string(),
            });
            let cost = core
                .usage()
                .cost(core.catalog(), "gpt-4")
                .expect("service is in catalog");
            assert!(cost >= previous_cost);
            previous_cost = cost;
        }
    }

    #[test]
    fn test_clear_conversation_keeps_usage_and_commit() {
        // Arrange
        let core = SessionCore::new(test_catalog());
        core.set_last_commit("abc123 Initial commit");
        core.rebuild_context("directive", &[], "hello");
        core.record_turn(&TurnOutcome::Completed {
            reply: "hi".to_string(),
            sent_chars: 8,
            service: "gpt-4".to_string(),
        });

        // Act
        core.clear_conversation();

        // Assert
        assert!(core.messages().is_empty());
        assert_eq!(core.usage().get("gpt-4").requests, 1);
        assert_eq!(core.last_commit(), "abc123 Initial commit");
    }

    #[test]
    fn test_new_session_starts_with_commit_placeholder() {
        // Arrange & Act
        let core = SessionCore::new(test_catalog());

        // Assert
        assert_eq!(core.last_commit(), NO_COMMITS_FOUND);
        assert_eq!(core.service_cost("gpt-4"), Some((0.03, 0.06)));
        assert_eq!(core.service_cost("missing"), None);
    }
}
