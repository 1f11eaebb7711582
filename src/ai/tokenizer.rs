//! Token Counting
//!
//! Provides token estimation for LLM context budgeting.
//!
//! ## Strategy
//! - An exact sub-word tokenizer can be plugged in when one is available
//! - Without one, `ceil(chars / 4)` is used; every caller must work correctly
//!   on the fallback alone
//! - Message lists add a fixed per-message and per-conversation overhead

use std::sync::Arc;

use crate::ai::provider::ChatMessage;
use crate::constants::tokens;

/// Exact tokenizer hook
///
/// Returning `None` for a text falls back to the character estimate for that text.
pub trait Tokenizer: Send + Sync {
    fn encode_len(&self, text: &str) -> Option<usize>;
}

/// Token counter for context budgeting
#[derive(Clone, Default)]
pub struct TokenCounter {
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("exact", &self.tokenizer.is_some())
            .finish()
    }
}

impl TokenCounter {
    /// Counter using the character estimate only
    pub fn fallback() -> Self {
        Self { tokenizer: None }
    }

    pub fn with_tokenizer(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer: Some(tokenizer),
        }
    }

    pub fn has_tokenizer(&self) -> bool {
        self.tokenizer.is_some()
    }

    /// Estimate token count for a string
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.tokenizer
            .as_ref()
            .and_then(|t| t.encode_len(text))
            .unwrap_or_else(|| estimate_chars(text))
    }

    /// Estimate tokens for a chat message list including framing overhead
    pub fn count_messages(&self, messages: &[ChatMessage]) -> usize {
        messages
            .iter()
            .map(|m| {
                tokens::MESSAGE_OVERHEAD + self.count(m.role.as_str()) + self.count(&m.content)
            })
            .sum::<usize>()
            + tokens::CONVERSATION_OVERHEAD
    }

    /// Check if content fits within token budget
    pub fn fits_budget(&self, text: &str, budget: usize) -> bool {
        self.count(text) <= budget
    }
}

fn estimate_chars(text: &str) -> usize {
    text.chars().count().div_ceil(tokens::CHARS_PER_TOKEN)
}

/// Estimate tokens with the character fallback
pub fn count_tokens(text: &str) -> usize {
    TokenCounter::fallback().count(text)
}

/// Estimate tokens for a message list with the character fallback
pub fn count_messages_tokens(messages: &[ChatMessage]) -> usize {
    TokenCounter::fallback().count_messages(messages)
}
