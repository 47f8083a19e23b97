use std::io::{self, Write};

use tokio::sync::mpsc;

use crate::app::{App, AppEvent, Submission};
use crate::infra::file_index::best_match;

mod command;
mod input;

use command::{Command, HELP_TEXT};

pub(crate) enum EventResult {
    Continue,
    Quit,
}

/// Runs the line-oriented session loop on stdin and stdout until the user
/// quits or input ends.
///
/// # Errors
/// Returns an error if writing to stdout fails.
pub async fn run(app: &mut App) -> io::Result<()> {
    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    input::spawn_input_reader(input_tx);

    let mut stdout = io::stdout();
    run_main_loop(app, &mut input_rx, &mut stdout).await
}

async fn run_main_loop<W: Write>(
    app: &mut App,
    input_rx: &mut mpsc::UnboundedReceiver<String>,
    out: &mut W,
) -> io::Result<()> {
    enum LoopSignal {
        App(Option<AppEvent>),
        Input(Option<String>),
        Interrupt,
    }

    writeln!(out, "Latest commit: {}", app.core().last_commit())?;
    writeln!(out, "Type /help for commands.")?;
    out.flush()?;

    let mut input_closed = false;
    let mut pending_turns = 0_usize;

    loop {
        if input_closed && pending_turns == 0 {
            break;
        }

        let signal = tokio::select! {
            biased;
            event = app.next_app_event() => LoopSignal::App(event),
            line = input_rx.recv(), if !input_closed => LoopSignal::Input(line),
            _ = tokio::signal::ctrl_c() => LoopSignal::Interrupt,
        };

        match signal {
            LoopSignal::App(Some(event)) => {
                for reply in app.apply_app_events(event) {
                    pending_turns = pending_turns.saturating_sub(1);
                    writeln!(out, "Assistant:: {}", reply.text)?;
                }
            }
            LoopSignal::App(None) | LoopSignal::Interrupt => break,
            LoopSignal::Input(None) => input_closed = true,
            LoopSignal::Input(Some(line)) => {
                if matches!(
                    process_line(app, out, &line, &mut pending_turns).await?,
                    EventResult::Quit
                ) {
                    break;
                }
            }
        }
        out.flush()?;
    }

    app.shutdown();
    out.flush()
}

async fn process_line<W: Write>(
    app: &mut App,
    out: &mut W,
    line: &str,
    pending_turns: &mut usize,
) -> io::Result<EventResult> {
    match Command::parse(line) {
        Command::Empty => {}
        Command::Say(text) => match app.submit_input(&text) {
            Ok(Submission::Queued { .. }) => *pending_turns += 1,
            Ok(submission) => {
                if let Some(reply) = submission.immediate_reply() {
                    writeln!(out, "{reply}")?;
                }
            }
            Err(error) => writeln!(out, "Error: {error}")?,
        },
        Command::Files => write_files(app, out)?,
        Command::Toggle(query) => writeln!(out, "{}", toggle_file(app, &query))?,
        Command::Agents => write_agents(app, out)?,
        Command::Agent(query) => writeln!(out, "{}", toggle_agent(app, &query))?,
        Command::Usage => {
            let lines = app.core().usage_summary();
            if lines.is_empty() {
                writeln!(out, "No usage yet.")?;
            }
            for line in lines {
                writeln!(out, "{line}")?;
            }
        }
        Command::Commit => writeln!(out, "{}", app.core().last_commit())?,
        Command::Refresh => {
            let summary = app.update().await;
            writeln!(
                out,
                "Rescanned: {} added, {} removed, {} changed.",
                summary.added, summary.removed, summary.status_changed
            )?;
        }
        Command::History => writeln!(out, "{}", app.core().render_plain())?,
        Command::Context => writeln!(out, "{}", app.core().render_formatted())?,
        Command::Clear => {
            app.core().clear_conversation();
            writeln!(out, "Conversation cleared.")?;
        }
        Command::Help => writeln!(out, "{HELP_TEXT}")?,
        Command::Quit => return Ok(EventResult::Quit),
        Command::Unknown(name) => {
            writeln!(out, "Unknown command /{name}. Type /help for commands.")?;
        }
    }

    Ok(EventResult::Continue)
}

fn write_files<W: Write>(app: &App, out: &mut W) -> io::Result<()> {
    let files = app.core().files();
    if files.is_empty() {
        return writeln!(out, "No files tracked.");
    }

    for entry in files {
        if entry.is_dir() {
            writeln!(out, "    {}/", entry.path)?;
        } else {
            let marker = if entry.active { "[x]" } else { "[ ]" };
            writeln!(out, "{marker} {} ({})", entry.path, entry.status)?;
        }
    }

    Ok(())
}

fn write_agents<W: Write>(app: &App, out: &mut W) -> io::Result<()> {
    let acting = app.core().acting_agent();
    for activation in app.core().agent_activations() {
        let marker = if activation.active { "[x]" } else { "[ ]" };
        let is_acting = acting
            .as_ref()
            .is_some_and(|agent| agent.name() == activation.name);
        if is_acting {
            writeln!(out, "{marker} {} (acting)", activation.name)?;
        } else {
            writeln!(out, "{marker} {}", activation.name)?;
        }
    }

    Ok(())
}

/// Toggles the exact path when tracked, otherwise the best fuzzy match among
/// files.
fn toggle_file(app: &App, query: &str) -> String {
    let files = app.core().files();
    let path = if files.iter().any(|entry| entry.path == query) {
        query.to_string()
    } else {
        let candidates: Vec<&str> = files
            .iter()
            .filter(|entry| !entry.is_dir())
            .map(|entry| entry.path.as_str())
            .collect();
        let Some(path) = best_match(&candidates, query) else {
            return format!("No file matches {query}.");
        };

        path.to_string()
    };

    match app.core().toggle_file(&path) {
        Ok(true) => format!("Activated {path}."),
        Ok(false) => format!("Deactivated {path}."),
        Err(error) => format!("Error: {error}"),
    }
}

/// Toggles the agent named `query`, ignoring case, or the best fuzzy match.
fn toggle_agent(app: &App, query: &str) -> String {
    let activations = app.core().agent_activations();
    let names: Vec<&str> = activations
        .iter()
        .map(|activation| activation.name.as_str())
        .collect();
    let name = names
        .iter()
        .find(|name| name.eq_ignore_ascii_case(query))
        .copied()
        .or_else(|| best_match(&names, query));
    let Some(name) = name else {
        return format!("No agent matches {query}.");
    };

    match app.core().toggle_agent(name) {
        Ok(true) => format!("Activated {name}."),
        Ok(false) => format!("Deactivated {name}."),
        Err(error) => format!("Error: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::app::service::AppClients;
    use crate::config::AppConfig;
    use crate::domain::catalog::{Agent, Catalog, ModelFamily, Service, ServiceRef};
    use crate::domain::file::FileStatus;
    use crate::infra::file_index::{ListedEntry, MockFileLister};
    use crate::infra::file_reader::MockFileReader;
    use crate::infra::git::MockGitClient;
    use crate::infra::provider::{Completion, MockCompletionProvider};

    async fn test_app(provider: MockCompletionProvider) -> App {
        let config = AppConfig {
            api_key: Some("sk-test".to_string()),
            api_url: "http://127.0.0.1:9/unused".to_string(),
            project_dir: PathBuf::from("/repo"),
            refresh_interval: Duration::ZERO,
            status_ttl: Duration::from_secs(60),
            status_jitter: Duration::ZERO,
            request_timeout: Duration::from_secs(1),
        };
        let catalog = Arc::new(Catalog::new(
            vec![ModelFamily {
                name: "gpt-4".to_string(),
                services: vec![Service::new("gpt-4", 8192).with_costs(0.03, 0.06)],
            }],
            vec![Agent::new(
                "Code Reviewer (friendly)",
                "You review code.",
                vec![ServiceRef::new("gpt-4", "gpt-4")],
            )],
        ));
        let mut file_lister = MockFileLister::new();
        file_lister.expect_list_entries().returning(|_| {
            Box::pin(async {
                vec![
                    ListedEntry::dir("src"),
                    ListedEntry::file("README.md"),
                    ListedEntry::file("src/main.rs"),
                ]
            })
        });
        let mut git_client = MockGitClient::new();
        git_client
            .expect_status_of()
            .returning(|_, _| Box::pin(async { FileStatus::Unmodified }));
        git_client
            .expect_latest_commit()
            .returning(|_| Box::pin(async { Err("no commits".to_string()) }));
        let mut file_reader = MockFileReader::new();
        file_reader
            .expect_read_contents()
            .returning(|_| Box::pin(async { Ok("fn main() {}".to_string()) }));
        let clients = AppClients {
            file_lister: Arc::new(file_lister),
            file_reader: Arc::new(file_reader),
            git_client: Arc::new(git_client),
            provider: Arc::new(provider),
        };

        App::new(&config, catalog, clients).await
    }

    async fn run_lines(app: &mut App, lines: &[&str]) -> String {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        for line in lines {
            input_tx.send((*line).to_string()).expect("input channel should be open");
        }
        drop(input_tx);
        let mut out = Vec::new();

        run_main_loop(app, &mut input_rx, &mut out)
            .await
            .expect("loop should succeed");

        String::from_utf8(out).expect("output should be UTF-8")
    }

    #[tokio::test]
    async fn test_loop_reports_sentinel_without_active_agent() {
        // Arrange
        let mut provider = MockCompletionProvider::new();
        provider.expect_complete().never();
        let mut app = test_app(provider).await;

        // Act
        let output = run_lines(&mut app, &["hello"]).await;

        // Assert
        assert!(output.starts_with("Latest commit: No commits found.\n"));
        assert!(output.contains("No active agents.\n"));
    }

    #[tokio::test]
    async fn test_loop_waits_for_queued_turns_before_exiting() {
        // Arrange
        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .times(1)
            .withf(|messages, _| {
                messages
                    .iter()
                    .any(|message| message.content == "File: src/main.rs\nContent:\nfn main() {}")
            })
            .returning(|_, _| Box::pin(async { Ok(Completion::new("Looks fine.")) }));
        let mut app = test_app(provider).await;

        // Act
        let output = run_lines(&mut app, &["/agent reviewer", "/toggle main", "review"]).await;

        // Assert
        assert!(output.contains("Activated Code Reviewer (friendly).\n"));
        assert!(output.contains("Activated src/main.rs.\n"));
        assert!(output.contains("Assistant:: Looks fine.\n"));
        assert_eq!(app.core().usage().get("gpt-4").requests, 1);
    }

    #[tokio::test]
    async fn test_loop_lists_files_and_rejects_directory_toggle() {
        // Arrange
        let mut app = test_app(MockCompletionProvider::new()).await;

        // Act
        let output = run_lines(&mut app, &["/toggle README.md", "/toggle src", "/files"]).await;

        // Assert
        assert!(output.contains("Error: src is a directory and cannot be activated\n"));
        assert!(output.contains("    src/\n"));
        assert!(output.contains("[x] README.md (Unmodified)\n"));
        assert!(output.contains("[ ] src/main.rs (Unmodified)\n"));
    }

    #[tokio::test]
    async fn test_loop_stops_at_quit() {
        // Arrange
        let mut app = test_app(MockCompletionProvider::new()).await;

        // Act
        let output = run_lines(&mut app, &["/quit", "/help"]).await;

        // Assert
        assert!(!output.contains("Commands:"));
    }
}
