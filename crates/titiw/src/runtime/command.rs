//! Line-level command parsing for the interactive session.

pub(crate) const HELP_TEXT: &str = "\
Commands:
  /files            list tracked files ([x] marks active files)
  /toggle <path>    activate or deactivate a file (exact or fuzzy path)
  /agents           list agents ([x] marks active agents)
  /agent <name>     activate or deactivate an agent (exact or fuzzy name)
  /usage            show requests, tokens, and cost per service
  /commit           show the latest commit
  /refresh          rescan the project now
  /history          show the conversation
  /context          show every turn including file and directive context
  /clear            clear the conversation
  /help             show this help
  /quit             exit
Any other line is sent to the acting agent.";

/// One parsed input line.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Command {
    Agent(String),
    Agents,
    Clear,
    Commit,
    Context,
    Empty,
    Files,
    Help,
    History,
    Quit,
    Refresh,
    /// User turn text.
    Say(String),
    Toggle(String),
    /// Unrecognized slash command, carrying the command word.
    Unknown(String),
    Usage,
}

impl Command {
    /// Parses one input line. Lines not starting with `/` are user turns.
    pub(crate) fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        let Some(command_line) = trimmed.strip_prefix('/') else {
            return Self::Say(trimmed.to_string());
        };

        let (name, argument) = command_line
            .split_once(char::is_whitespace)
            .map_or((command_line, ""), |(name, argument)| {
                (name, argument.trim())
            });

        match (name, argument) {
            ("agent", argument) if !argument.is_empty() => Self::Agent(argument.to_string()),
            ("agents", _) => Self::Agents,
            ("clear", _) => Self::Clear,
            ("commit", _) => Self::Commit,
            ("context", _) => Self::Context,
            ("files", _) => Self::Files,
            ("help", _) => Self::Help,
            ("history", _) => Self::History,
            ("quit" | "exit", _) => Self::Quit,
            ("refresh", _) => Self::Refresh,
            ("toggle", argument) if !argument.is_empty() => Self::Toggle(argument.to_string()),
            ("usage", _) => Self::Usage,
            (name, _) => Self::Unknown(name.to_string()),
        }
    }
}
