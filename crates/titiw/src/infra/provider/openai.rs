//! `OpenAI`-compatible chat-completions client over `reqwest`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Completion, CompletionProvider, ProviderError, ProviderFuture, ProviderUsage};
use crate::domain::catalog::Service;
use crate::domain::message::Message;

/// Default chat-completions endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const TEMPERATURE: f32 = 0.7;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// [`CompletionProvider`] that talks to an `OpenAI`-style HTTP API.
#[derive(Clone)]
pub struct OpenAiProvider {
    api_key: Option<String>,
    api_url: String,
    client: Client,
}

impl OpenAiProvider {
    /// Creates a provider. A missing `api_key` is reported on the first call,
    /// not here.
    ///
    /// # Errors
    /// Returns [`ProviderError::Transport`] when the HTTP client cannot be
    /// built.
    pub fn new(
        api_key: Option<String>,
        api_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        Ok(Self {
            api_key,
            api_url: api_url.into(),
            client,
        })
    }
}

impl CompletionProvider for OpenAiProvider {
    fn complete(
        &self,
        messages: Vec<Message>,
        service: Service,
    ) -> ProviderFuture<Result<Completion, ProviderError>> {
        let provider = self.clone();

        Box::pin(async move {
            let Some(api_key) = provider.api_key.as_deref() else {
                return Err(ProviderError::MissingCredential);
            };
            let request = ChatRequest {
                model: &service.name,
                messages: &messages,
                temperature: TEMPERATURE,
            };
            let response = provider
                .client
                .post(&provider.api_url)
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await
                .map_err(|error| ProviderError::Transport(error.to_string()))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|error| ProviderError::Transport(error.to_string()))?;
            if !status.is_success() {
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            parse_completion_body(&body)
        })
    }
}

/// Extracts the first choice's text and optional usage from a response body.
///
/// # Errors
/// Returns [`ProviderError::MalformedResponse`] when the body is not JSON or
/// has no first choice with string content.
pub fn parse_completion_body(body: &str) -> Result<Completion, ProviderError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::MalformedResponse(error.to_string()))?;
    let text = response
        .choices
        .and_then(|choices| choices.into_iter().next())
        .ok_or_else(|| {
            ProviderError::MalformedResponse("'choices' missing or empty".to_string())
        })?
        .message
        .and_then(|message| message.content)
        .ok_or_else(|| {
            ProviderError::MalformedResponse("'content' missing or not a string".to_string())
        })?;
    let usage = response.usage.map(|usage| ProviderUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });

    Ok(Completion { text, usage })
}
