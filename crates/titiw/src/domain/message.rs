//! Role-tagged conversation turns and the ordered log that holds them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Speaker of one conversation turn.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Returns the wire name used by chat-completion APIs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Returns the transcript label shown before a turn.
    fn label(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable conversation turn.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Ordered turn history for one session.
///
/// Turns are appended in insertion order and only removed through
/// [`MessageLog::clear_by_role`] or [`MessageLog::clear`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Removes every turn of `role`, keeping the others in order.
    pub fn clear_by_role(&mut self, role: Role) {
        self.messages.retain(|message| message.role != role);
    }

    pub fn insert_system(&mut self, content: impl Into<String>) {
        self.push(Role::System, content);
    }

    pub fn insert_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content);
    }

    pub fn insert_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content);
    }

    fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// Returns the full ordered sequence, exactly as sent to a provider.
    pub fn all_messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn messages_by_role(&self, role: Role) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|message| message.role == role)
            .collect()
    }

    pub fn system_messages(&self) -> Vec<&Message> {
        self.messages_by_role(Role::System)
    }

    pub fn user_messages(&self) -> Vec<&Message> {
        self.messages_by_role(Role::User)
    }

    pub fn assistant_messages(&self) -> Vec<&Message> {
        self.messages_by_role(Role::Assistant)
    }

    /// Renders the conversation without system scaffolding, one turn per
    /// line.
    pub fn render_plain(&self) -> String {
        self.messages
            .iter()
            .filter(|message| message.role != Role::System)
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Renders every turn prefixed by its role label.
    pub fn render_formatted(&self) -> String {
        self.messages
            .iter()
            .map(|message| format!("{}:: {}", message.role.label(), message.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Sums the content length in characters of `messages`.
pub fn total_chars(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|message| message.content.chars().count())
        .sum()
}
