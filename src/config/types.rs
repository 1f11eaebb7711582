//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/reportforge/) and project (.reportforge/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{generation, provider, retry, section, style};
use crate::types::{ReportError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Report generation tuning
    pub generation: GenerationConfig,

    /// Reference document analysis settings
    pub style_analysis: StyleAnalysisConfig,

    /// Single-section regeneration settings
    pub section_rewrite: SectionRewriteConfig,

    /// Local report store
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            generation: GenerationConfig::default(),
            style_analysis: StyleAnalysisConfig::default(),
            section_rewrite: SectionRewriteConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ReportError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        check_temperature("generation.temperature", self.generation.temperature)?;
        check_temperature(
            "generation.coherence.temperature",
            self.generation.coherence.temperature,
        )?;
        check_temperature("style_analysis.temperature", self.style_analysis.temperature)?;
        check_temperature("section_rewrite.temperature", self.section_rewrite.temperature)?;

        check_api_base("llm.openai_api_base", &self.llm.openai_api_base)?;
        check_api_base("llm.anthropic_api_base", &self.llm.anthropic_api_base)?;

        if self.llm.timeout_secs == 0 {
            return Err(ReportError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.generation.max_tokens_per_chunk == 0 {
            return Err(ReportError::Config(
                "generation.max_tokens_per_chunk must be greater than 0".to_string(),
            ));
        }

        if self.generation.safe_input_limit == 0 {
            return Err(ReportError::Config(
                "generation.safe_input_limit must be greater than 0".to_string(),
            ));
        }

        if self.generation.max_tokens == 0 || self.generation.coherence.max_tokens == 0 {
            return Err(ReportError::Config(
                "generation max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.generation.coherence.min_chunks < generation::COHERENCE_MIN_CHUNKS {
            return Err(ReportError::Config(format!(
                "generation.coherence.min_chunks must be at least {}, got {}",
                generation::COHERENCE_MIN_CHUNKS,
                self.generation.coherence.min_chunks
            )));
        }

        if self.style_analysis.max_chars == 0 {
            return Err(ReportError::Config(
                "style_analysis.max_chars must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_temperature(key: &str, value: f32) -> Result<()> {
    if !(0.0..=2.0).contains(&value) {
        return Err(ReportError::Config(format!(
            "{} must be between 0.0 and 2.0, got {}",
            key, value
        )));
    }
    Ok(())
}

/// API keys travel to this host, so only http(s) URLs are accepted
fn check_api_base(key: &str, value: &str) -> Result<()> {
    let url = url::Url::parse(value)
        .map_err(|e| ReportError::Config(format!("{} is not a valid URL '{}': {}", key, value, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ReportError::Config(format!(
            "{} must use http or https, got: {}",
            key,
            url.scheme()
        )));
    }
    Ok(())
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// Which provider to construct when credentials are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic when its key is set, otherwise OpenAI
    #[default]
    Auto,
    Anthropic,
    OpenAi,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Auto => write!(f, "auto"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ProviderKind::Auto),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            _ => Err(format!(
                "Unknown provider: {}. Valid values: auto, anthropic, openai",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider preference
    pub provider: ProviderKind,

    /// Model override (provider default when unset)
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after the first attempt
    pub max_retries: usize,

    /// First backoff delay in milliseconds, doubled per retry
    pub retry_base_delay_ms: u64,

    /// OpenAI-compatible API base URL
    pub openai_api_base: String,

    /// Anthropic API base URL
    pub anthropic_api_base: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Auto,
            model: None,
            timeout_secs: provider::DEFAULT_TIMEOUT_SECS,
            max_retries: retry::MAX_RETRIES,
            retry_base_delay_ms: retry::BASE_DELAY_MS,
            openai_api_base: provider::OPENAI_API_BASE.to_string(),
            anthropic_api_base: provider::ANTHROPIC_API_BASE.to_string(),
        }
    }
}

// =============================================================================
// Generation Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Estimated input tokens that still go out as one call
    pub safe_input_limit: usize,

    /// Token budget per chunk in chunked mode
    pub max_tokens_per_chunk: usize,

    /// Pause between chunk calls in milliseconds
    pub chunk_delay_ms: u64,

    /// Completion token limit for the main pass
    pub max_tokens: u32,

    /// Temperature for the main pass
    pub temperature: f32,

    /// Merge pass over chunked output
    pub coherence: CoherenceConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            safe_input_limit: generation::SAFE_INPUT_LIMIT,
            max_tokens_per_chunk: generation::MAX_TOKENS_PER_CHUNK,
            chunk_delay_ms: generation::CHUNK_DELAY_MS,
            max_tokens: generation::MAX_OUTPUT_TOKENS,
            temperature: generation::TEMPERATURE,
            coherence: CoherenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoherenceConfig {
    pub enabled: bool,

    /// Chunk count at which the pass runs; never below 3
    pub min_chunks: usize,

    pub temperature: f32,

    pub max_tokens: u32,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_chunks: generation::COHERENCE_MIN_CHUNKS,
            temperature: generation::COHERENCE_TEMPERATURE,
            max_tokens: generation::MAX_OUTPUT_TOKENS,
        }
    }
}

impl CoherenceConfig {
    /// Whether a report split into `chunks` pieces gets a coherence pass.
    /// Two or fewer chunks never do, whatever `min_chunks` says.
    pub fn applies_to(&self, chunks: usize) -> bool {
        self.enabled && chunks >= self.min_chunks.max(generation::COHERENCE_MIN_CHUNKS)
    }
}

// =============================================================================
// Style Analysis / Section Rewrite
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleAnalysisConfig {
    /// Reference text is truncated to this many characters
    pub max_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for StyleAnalysisConfig {
    fn default() -> Self {
        Self {
            max_chars: style::MAX_CHARS,
            temperature: style::TEMPERATURE,
            max_tokens: style::MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionRewriteConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for SectionRewriteConfig {
    fn default() -> Self {
        Self {
            max_tokens: section::MAX_TOKENS,
            temperature: section::TEMPERATURE,
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file backing the local store
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".reportforge/store.json"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
