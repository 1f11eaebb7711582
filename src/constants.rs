//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Token estimation constants
pub mod tokens {
    /// Characters per token for the approximation fallback
    pub const CHARS_PER_TOKEN: usize = 4;

    /// Fixed overhead added per chat message
    pub const MESSAGE_OVERHEAD: usize = 4;

    /// Fixed overhead added once per message list
    pub const CONVERSATION_OVERHEAD: usize = 2;
}

/// Retry constants shared by all LLM providers
pub mod retry {
    /// Retries after the first attempt (3 attempts in total)
    pub const MAX_RETRIES: usize = 2;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 2000;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 60;
}

/// LLM provider defaults
pub mod provider {
    /// Default maximum completion tokens
    pub const DEFAULT_MAX_TOKENS: u32 = 16_000;

    /// Default sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    /// Default client-side request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
    pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";

    pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
    pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
    pub const ANTHROPIC_VERSION: &str = "2023-06-01";

    pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
    pub const ANTHROPIC_KEY_ENV: &str = "ANTHROPIC_API_KEY";
}

/// Report generation constants
pub mod generation {
    /// Estimated input tokens (system + content) that still fit one call
    pub const SAFE_INPUT_LIMIT: usize = 100_000;

    /// Token budget per chunk when chunking
    pub const MAX_TOKENS_PER_CHUNK: usize = 25_000;

    /// Pause between consecutive chunk calls (milliseconds)
    pub const CHUNK_DELAY_MS: u64 = 1000;

    /// Completion token limit for the main pass
    pub const MAX_OUTPUT_TOKENS: u32 = 16_000;

    /// Temperature for the main pass
    pub const TEMPERATURE: f32 = 0.4;

    /// Temperature for the coherence pass
    pub const COHERENCE_TEMPERATURE: f32 = 0.5;

    /// Smallest chunk count that triggers a coherence pass
    pub const COHERENCE_MIN_CHUNKS: usize = 3;

    /// Separator placed between chunk outputs
    pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";
}

/// Reference document style analysis constants
pub mod style {
    /// Reference text is truncated to this many characters
    pub const MAX_CHARS: usize = 50_000;

    pub const TEMPERATURE: f32 = 0.3;

    pub const MAX_TOKENS: u32 = 4000;

    /// Phrases from the analysis listed in the system prompt
    pub const MAX_PROMPT_PHRASES: usize = 10;
}

/// Single-section regeneration constants
pub mod section {
    pub const MAX_TOKENS: u32 = 8000;

    pub const TEMPERATURE: f32 = 0.7;
}
