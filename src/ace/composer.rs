//! Context Composer
//!
//! Builds the system prompt sent to the primary model from a playbook's
//! helpful strategies, and compares the resulting context size against a
//! naive baseline that carries the full conversation history.
//!
//! ```text
//! regular: [base system] + [full history]   + [user]
//! ace:     [enhanced]    + [last N history] + [user]
//! ```

use serde::{Deserialize, Serialize};

use super::playbook::Playbook;
use super::strategy::Strategy;
use crate::llm::ChatMessage;
use crate::tokenizer::TokenCounter;

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";
pub const STRATEGY_HEADER: &str =
    "Based on previous successful interactions, consider these strategies:";

/// Composer configuration
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Base system message for both the baseline and the enhanced prompt
    pub system_message: String,
    /// Maximum helpful strategies injected into the prompt
    pub max_strategies: usize,
    /// History messages kept in the ACE context
    pub recent_history: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            max_strategies: 5,
            recent_history: 6,
        }
    }
}

/// Estimated context sizes of ACE vs. full-history prompting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextComparison {
    pub ace_context_length: usize,
    pub regular_context_length: usize,
    pub reduction_percentage: u32,
    pub tokens_saved: usize,
}

impl ContextComparison {
    pub fn new(ace_context_length: usize, regular_context_length: usize) -> Self {
        let tokens_saved = regular_context_length.saturating_sub(ace_context_length);
        let reduction_percentage = if regular_context_length > 0 {
            (tokens_saved as f64 * 100.0 / regular_context_length as f64).round() as u32
        } else {
            0
        };

        Self {
            ace_context_length,
            regular_context_length,
            reduction_percentage,
            tokens_saved,
        }
    }
}

/// Composed prompt plus metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedContext {
    pub enhanced_system_message: String,
    pub context_comparison: ContextComparison,
    pub strategies_used: usize,
}

/// Builds enhanced system prompts from playbooks
#[derive(Debug, Clone, Default)]
pub struct ContextComposer {
    config: ComposerConfig,
    counter: TokenCounter,
}

impl ContextComposer {
    pub fn new() -> Self {
        Self::with_config(ComposerConfig::default())
    }

    pub fn with_config(config: ComposerConfig) -> Self {
        Self {
            config,
            counter: TokenCounter::new(),
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// The most recent helpful strategies, oldest first
    pub fn select_strategies<'a>(&self, playbook: &'a Playbook) -> Vec<&'a Strategy> {
        let mut selected: Vec<&Strategy> = playbook
            .strategies()
            .iter()
            .rev()
            .filter(|s| s.is_helpful())
            .take(self.config.max_strategies)
            .collect();
        selected.reverse();
        selected
    }

    /// Base system message with the strategy block appended
    pub fn system_message(&self, strategies: &[&Strategy]) -> String {
        let mut message = self.config.system_message.clone();
        if !strategies.is_empty() {
            let bullets = strategies
                .iter()
                .map(|s| s.content.as_str())
                .collect::<Vec<_>>()
                .join("\n- ");
            message.push_str(&format!("\n\n{}\n- {}", STRATEGY_HEADER, bullets));
        }
        message
    }

    pub fn compose(
        &self,
        user_message: &str,
        history: &[ChatMessage],
        playbook: &Playbook,
    ) -> ComposedContext {
        let strategies = self.select_strategies(playbook);
        let enhanced_system_message = self.system_message(&strategies);

        let context_comparison =
            self.compare(user_message, history, &enhanced_system_message);

        ComposedContext {
            enhanced_system_message,
            context_comparison,
            strategies_used: strategies.len(),
        }
    }

    /// Compare full-history context against the enhanced, truncated one
    pub fn compare(
        &self,
        user_message: &str,
        history: &[ChatMessage],
        enhanced_system_message: &str,
    ) -> ContextComparison {
        let regular = self.context_tokens(&self.config.system_message, history, user_message);

        let recent_start = history.len().saturating_sub(self.config.recent_history);
        let ace = self.context_tokens(
            enhanced_system_message,
            &history[recent_start..],
            user_message,
        );

        ContextComparison::new(ace, regular)
    }

    fn context_tokens(&self, system: &str, history: &[ChatMessage], user_message: &str) -> usize {
        self.counter.count_message(system)
            + self.counter.estimate_messages(history)
            + self.counter.count_message(user_message)
    }
}
