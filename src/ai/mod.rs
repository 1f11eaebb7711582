//! AI Integration Layer
//!
//! Token estimation, provider clients and prompt assembly for report generation.

pub mod json_repair;
pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod tokenizer;

pub use provider::{
    AnthropicClient, ChatMessage, Completion, CompletionOptions, Credentials, LazyClient,
    LlmClient, OpenAiClient, RetryPolicy, Role, SharedClient, TokenUsage, create_client,
};
pub use timeout::{with_cancellation, with_timeout};
pub use tokenizer::{TokenCounter, Tokenizer, count_messages_tokens, count_tokens};
