//! Token Estimator
//!
//! Character-based token approximation used for the context efficiency metric.
//! Not a real tokenizer: a fixed ratio of 4 characters per token plus a fixed
//! per-message overhead for role and formatting.

use crate::llm::ChatMessage;

/// Characters per token (~4 for English text)
pub const CHARS_PER_TOKEN: usize = 4;

/// Overhead tokens per message for role and formatting
pub const MESSAGE_OVERHEAD: usize = 4;

/// Token estimator with a fixed chars/token ratio
#[derive(Debug, Clone, Copy)]
pub struct TokenCounter {
    chars_per_token: usize,
    message_overhead: usize,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    pub const fn new() -> Self {
        Self {
            chars_per_token: CHARS_PER_TOKEN,
            message_overhead: MESSAGE_OVERHEAD,
        }
    }

    /// Estimate tokens in text: `ceil(chars / 4)`, 0 for empty text
    pub fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        text.chars().count().div_ceil(self.chars_per_token)
    }

    /// Count tokens in a single message including role overhead
    pub fn count_message(&self, content: &str) -> usize {
        self.message_overhead + self.estimate(content)
    }

    /// Estimate tokens for a message sequence
    pub fn estimate_messages(&self, messages: &[ChatMessage]) -> usize {
        messages.iter().map(|m| self.count_message(&m.content)).sum()
    }
}

/// Estimate tokens in text with the default counter
pub fn estimate(text: &str) -> usize {
    TokenCounter::new().estimate(text)
}

/// Estimate tokens for a message sequence with the default counter
pub fn estimate_messages(messages: &[ChatMessage]) -> usize {
    TokenCounter::new().estimate_messages(messages)
}
