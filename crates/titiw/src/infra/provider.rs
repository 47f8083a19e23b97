//! Completion provider abstraction for session turn execution.
//!
//! Defines the [`CompletionProvider`] trait and the request/response types
//! used to dispatch one turn's ordered message sequence without coupling
//! callers to a specific HTTP API.

pub mod openai;

use std::future::Future;
use std::pin::Pin;

use crate::domain::catalog::Service;
use crate::domain::message::Message;

/// Boxed async result used by [`CompletionProvider`] trait methods.
pub type ProviderFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Token usage reported by the provider, when it reports any.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProviderUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Normalized result of one successful completion call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Completion {
    /// Assistant reply text.
    pub text: String,
    pub usage: Option<ProviderUsage>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// Failure of one completion call.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("no API credential configured; set OPENAI_KEY")]
    MissingCredential,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response format: {0}")]
    MalformedResponse(String),
}

/// Remote chat-completion boundary.
///
/// The trait is object-safe so it can be held as
/// `Arc<dyn CompletionProvider>`.
#[cfg_attr(test, mockall::automock)]
pub trait CompletionProvider: Send + Sync {
    /// Sends the full ordered `messages` to `service` and returns the reply.
    ///
    /// # Errors
    /// Returns [`ProviderError`] when the call cannot be completed or the
    /// response payload is malformed.
    fn complete(
        &self,
        messages: Vec<Message>,
        service: Service,
    ) -> ProviderFuture<Result<Completion, ProviderError>>;
}
