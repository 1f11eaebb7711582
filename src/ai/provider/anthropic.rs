//! Anthropic Messages API Provider
//!
//! System messages are lifted into the top-level `system` field and only the
//! first text block of the reply is used. Rate limiting (429,
//! `rate_limit_error`), overload (529, `overloaded_error`) and transport
//! timeouts are retried.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    ChatMessage, Completion, CompletionOptions, LlmClient, ProviderSettings, RetryPolicy, Role,
    TokenUsage, retry_after_header, with_retry,
};
use crate::constants::provider as defaults;
use crate::types::{ErrorCategory, LlmError, ReportError, Result};

const PROVIDER: &str = "anthropic";

pub struct AnthropicClient {
    api_key: SecretString,
    api_base: String,
    model: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicClient {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ReportError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: settings.api_key,
            api_base: settings.api_base,
            model: settings
                .model
                .unwrap_or_else(|| defaults::ANTHROPIC_DEFAULT_MODEL.to_string()),
            retry: settings.retry,
            client,
        })
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &'a CompletionOptions,
    ) -> MessagesRequest<'a> {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        MessagesRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            max_tokens: options.max_tokens_or_default(),
            temperature: options.temperature_or_default(),
            system: (!system.is_empty()).then_some(system),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| RequestMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        }
    }

    async fn send_once(
        &self,
        request: &MessagesRequest<'_>,
        timeout: Option<Duration>,
    ) -> Result<Completion> {
        let url = format!("{}/messages", self.api_base);

        let mut builder = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", defaults::ANTHROPIC_VERSION)
            .json(request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e, PROVIDER))?;

        let status = response.status();
        let retry_after = retry_after_header(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::from_transport(&e, PROVIDER))?;

        if !status.is_success() {
            let mut err = classify_status(status.as_u16(), &body);
            if let Some(wait) = retry_after {
                err = err.retry_after(wait);
            }
            return Err(err.into());
        }

        parse_response(&body, request.model)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn generate_completion(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let request = self.build_request(messages, options);

        info!(
            provider = PROVIDER,
            model = request.model,
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            "Requesting completion"
        );

        let completion = with_retry(&self.retry, PROVIDER, || {
            self.send_once(&request, options.timeout)
        })
        .await?;

        debug!(
            provider = PROVIDER,
            tokens = completion.usage.total_tokens,
            "Completion received"
        );
        Ok(completion)
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn classify_status(status: u16, body: &str) -> LlmError {
    let (error_type, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.error_type, envelope.error.message),
        Err(_) => (String::new(), body.chars().take(500).collect()),
    };

    let category = match (status, error_type.as_str()) {
        (429, _) | (_, "rate_limit_error") => ErrorCategory::RateLimit,
        (529, _) | (_, "overloaded_error") => ErrorCategory::Transient,
        (401 | 403, _) | (_, "authentication_error" | "permission_error") => ErrorCategory::Auth,
        (400..=499, _) => ErrorCategory::BadRequest,
        _ => ErrorCategory::Unknown,
    };

    LlmError::with_provider(category, format!("HTTP {}: {}", status, message), PROVIDER)
        .status(status)
}

fn parse_response(body: &str, requested_model: &str) -> Result<Completion> {
    let parsed: MessagesResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::with_provider(
            ErrorCategory::MalformedResponse,
            format!("Invalid Anthropic response body: {}", e),
            PROVIDER,
        )
    })?;

    let text = parsed
        .content
        .into_iter()
        .find(|block| block.block_type == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| {
            LlmError::with_provider(
                ErrorCategory::MalformedResponse,
                "Unexpected response type from Anthropic: no text block",
                PROVIDER,
            )
        })?;

    let usage = parsed
        .usage
        .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens, None))
        .unwrap_or_default();

    Ok(Completion {
        content: text.trim().to_string(),
        usage,
        model: parsed
            .model
            .unwrap_or_else(|| requested_model.to_string()),
    })
}

// Request/Response types

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<UsageInfo>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
