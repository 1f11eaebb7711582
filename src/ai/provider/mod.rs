//! LLM Provider Abstraction
//!
//! Defines the `LlmClient` trait for chat completions.
//! Every client returns the trimmed completion text with token usage so the
//! generator can account for budgets across chunk calls.
//!
//! ## Modules
//!
//! - `retry`: shared exponential backoff around one provider call
//! - `openai`: OpenAI Chat Completions adapter
//! - `anthropic`: Anthropic Messages adapter

mod anthropic;
mod openai;
mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
pub use retry::{RetryPolicy, with_retry};
pub(crate) use retry::retry_after_header;

pub use crate::types::{ErrorCategory, LlmError};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{LlmConfig, ProviderKind};
use crate::constants::provider as defaults;
use crate::types::{ReportError, Result};

// =============================================================================
// Messages & Options
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call overrides; unset fields use the client's defaults
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout: Option<Duration>,
}

impl CompletionOptions {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
            ..Default::default()
        }
    }

    pub(crate) fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(defaults::DEFAULT_MAX_TOKENS)
    }

    pub(crate) fn temperature_or_default(&self) -> f32 {
        self.temperature.unwrap_or(defaults::DEFAULT_TEMPERATURE)
    }
}

// =============================================================================
// Completion with Usage Metrics
// =============================================================================

/// Token usage reported by one or more calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Build usage; a missing total is derived from its parts
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: Option<u64>) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: total_tokens.unwrap_or(prompt_tokens + completion_tokens),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Trimmed completion text
    pub content: String,
    pub usage: TokenUsage,
    /// Model that served the request
    pub model: String,
}

// =============================================================================
// LLM Client Trait
// =============================================================================

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one chat completion, retrying transient failures internally
    async fn generate_completion(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Default model in use
    fn model(&self) -> &str;
}

/// Shared LLM client for concurrent generation requests
pub type SharedClient = Arc<dyn LlmClient>;

// =============================================================================
// Provider Settings
// =============================================================================

/// Everything an adapter needs to build its HTTP client
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: SecretString,
    pub api_base: String,
    pub model: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ProviderSettings {
    fn from_config(config: &LlmConfig, api_key: SecretString, api_base: &str) -> Self {
        Self {
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// Provider API keys, read from the environment only
#[derive(Clone, Default)]
pub struct Credentials {
    pub anthropic: Option<SecretString>,
    pub openai: Option<SecretString>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("anthropic", &self.anthropic.as_ref().map(|_| "[REDACTED]"))
            .field("openai", &self.openai.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
        };
        Self {
            anthropic: read(defaults::ANTHROPIC_KEY_ENV),
            openai: read(defaults::OPENAI_KEY_ENV),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anthropic.is_none() && self.openai.is_none()
    }
}

/// Construct the configured client
///
/// `auto` prefers Anthropic when both keys are present. A missing key is a
/// configuration error.
pub fn create_client(config: &LlmConfig, credentials: &Credentials) -> Result<SharedClient> {
    let anthropic = || {
        credentials.anthropic.clone().map(|key| {
            ProviderSettings::from_config(config, key, &config.anthropic_api_base)
        })
    };
    let openai = || {
        credentials
            .openai
            .clone()
            .map(|key| ProviderSettings::from_config(config, key, &config.openai_api_base))
    };

    let client: SharedClient = match config.provider {
        ProviderKind::Anthropic => {
            let settings = anthropic().ok_or_else(|| missing_key(defaults::ANTHROPIC_KEY_ENV))?;
            Arc::new(AnthropicClient::new(settings)?)
        }
        ProviderKind::OpenAi => {
            let settings = openai().ok_or_else(|| missing_key(defaults::OPENAI_KEY_ENV))?;
            Arc::new(OpenAiClient::new(settings)?)
        }
        ProviderKind::Auto => {
            if let Some(settings) = anthropic() {
                Arc::new(AnthropicClient::new(settings)?)
            } else if let Some(settings) = openai() {
                Arc::new(OpenAiClient::new(settings)?)
            } else {
                return Err(ReportError::Config(format!(
                    "No LLM API key configured. Set {} or {}",
                    defaults::ANTHROPIC_KEY_ENV,
                    defaults::OPENAI_KEY_ENV
                )));
            }
        }
    };

    info!(provider = client.name(), model = client.model(), "LLM client ready");
    Ok(client)
}

fn missing_key(var: &str) -> ReportError {
    ReportError::Config(format!("{} is not set", var))
}

// =============================================================================
// Lazy Client Handle
// =============================================================================

/// Explicitly owned, lazily constructed client handle
///
/// The first successful construction wins; later calls return the same client.
#[derive(Default)]
pub struct LazyClient {
    cell: OnceLock<SharedClient>,
}

impl LazyClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle pre-filled with an existing client
    pub fn with_client(client: SharedClient) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(client);
        Self { cell }
    }

    pub fn get_or_try_init<F>(&self, init: F) -> Result<SharedClient>
    where
        F: FnOnce() -> Result<SharedClient>,
    {
        if let Some(client) = self.cell.get() {
            return Ok(client.clone());
        }
        let client = init()?;
        debug!(provider = client.name(), "Initialized shared LLM client");
        Ok(self.cell.get_or_init(|| client).clone())
    }

    pub fn get(&self) -> Option<SharedClient> {
        self.cell.get().cloned()
    }
}

impl std::fmt::Debug for LazyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyClient")
            .field("provider", &self.cell.get().map(|c| c.name().to_string()))
            .finish()
    }
}
