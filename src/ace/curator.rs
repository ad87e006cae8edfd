//! Curator - turns graded exchanges into playbook strategies
//!
//! Only high-confidence signal is learned from:
//! - average >= 7: extract up to 2 helpful strategies
//! - average < 4: extract 1 thing to avoid
//! - anything in between: nothing is learned

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::reflector::Reflection;
use super::registry::SharedPlaybook;
use super::strategy::Strategy;
use crate::llm::{complete_with_timeout, CompletionRequest, LlmClient};

pub const LEARN_THRESHOLD: f64 = 7.0;
pub const AVOID_THRESHOLD: f64 = 4.0;
/// Extracted text must be longer than this many characters
pub const MIN_STRATEGY_CHARS: usize = 10;
pub const MAX_LEARNED_PER_TURN: usize = 2;

/// Which extraction a score triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurationBranch {
    Learn,
    Avoid,
    Skip,
}

impl CurationBranch {
    pub fn for_score(average: f64) -> Self {
        if average >= LEARN_THRESHOLD {
            Self::Learn
        } else if average < AVOID_THRESHOLD {
            Self::Avoid
        } else {
            Self::Skip
        }
    }
}

/// Configuration for the curator
#[derive(Debug, Clone)]
pub struct CuratorConfig {
    pub learn_max_tokens: u32,
    pub avoid_max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            learn_max_tokens: 200,
            avoid_max_tokens: 100,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Extracts strategies from graded exchanges
#[derive(Clone)]
pub struct Curator {
    client: Arc<dyn LlmClient>,
    model: String,
    config: CuratorConfig,
}

impl Curator {
    pub fn new(client: Arc<dyn LlmClient>, model: &str) -> Self {
        Self::with_config(client, model, CuratorConfig::default())
    }

    pub fn with_config(client: Arc<dyn LlmClient>, model: &str, config: CuratorConfig) -> Self {
        Self {
            client,
            model: model.to_string(),
            config,
        }
    }

    /// Extract strategies and append them to the playbook.
    /// Returns the number appended.
    pub async fn curate(
        &self,
        user_message: &str,
        response: &str,
        reflection: &Reflection,
        playbook: &SharedPlaybook,
    ) -> usize {
        // Network calls happen before the playbook lock is taken
        let strategies = self.extract(user_message, response, reflection).await;
        let learned = strategies.len();

        if learned > 0 {
            let mut playbook = playbook.lock();
            for strategy in strategies {
                playbook.add_strategy(strategy);
            }
        }

        learned
    }

    /// Extract new strategies without touching any playbook
    pub async fn extract(
        &self,
        user_message: &str,
        response: &str,
        reflection: &Reflection,
    ) -> Vec<Strategy> {
        let average = reflection.average_score();

        info!(
            avg_score = average,
            helpfulness = reflection.helpfulness,
            clarity = reflection.clarity,
            relevance = reflection.relevance,
            completeness = reflection.completeness,
            "ACE learning"
        );

        match CurationBranch::for_score(average) {
            CurationBranch::Learn => self.learn_helpful(user_message, response, average).await,
            CurationBranch::Avoid => self
                .learn_avoidance(user_message, response, reflection, average)
                .await
                .into_iter()
                .collect(),
            CurationBranch::Skip => {
                debug!("Score {} between {} and {}, not learning", average, AVOID_THRESHOLD, LEARN_THRESHOLD);
                Vec::new()
            }
        }
    }

    async fn learn_helpful(&self, user_message: &str, response: &str, average: f64) -> Vec<Strategy> {
        let prompt = format!(
            r#"
Based on this successful interaction:

User: {}
Assistant: {}
Quality Score: {}/10

Extract 1-2 specific strategies that made this response effective.
Each strategy should be a concise, actionable principle.
Format as a simple list, one strategy per line.
"#,
            user_message, response, average
        );

        let request = CompletionRequest::prompt(
            &self.model,
            prompt,
            self.config.learn_max_tokens,
            self.config.temperature,
        );

        match complete_with_timeout(self.client.as_ref(), request, self.config.timeout).await {
            Ok(completion) => parse_strategy_lines(&completion.text)
                .into_iter()
                .map(|line| Strategy::helpful(line, average / 10.0))
                .collect(),
            Err(e) => {
                warn!("Strategy learning failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn learn_avoidance(
        &self,
        user_message: &str,
        response: &str,
        reflection: &Reflection,
        average: f64,
    ) -> Option<Strategy> {
        let prompt = format!(
            r#"
Based on this problematic interaction:

User: {}
Assistant: {}
Quality Score: {}/10
Issues: {}

Identify 1 specific thing to avoid in future responses.
Be concise and actionable.
"#,
            user_message, response, average, reflection.summary
        );

        let request = CompletionRequest::prompt(
            &self.model,
            prompt,
            self.config.avoid_max_tokens,
            self.config.temperature,
        );

        match complete_with_timeout(self.client.as_ref(), request, self.config.timeout).await {
            Ok(completion) => {
                parse_avoidance(&completion.text).map(|text| Strategy::harmful(text, average / 10.0))
            }
            Err(e) => {
                warn!("Avoidance learning failed: {}", e);
                None
            }
        }
    }
}

fn is_substantive(text: &str) -> bool {
    text.chars().count() > MIN_STRATEGY_CHARS
}

/// Keep up to two substantive lines, trimmed
pub fn parse_strategy_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| is_substantive(line))
        .take(MAX_LEARNED_PER_TURN)
        .map(str::to_string)
        .collect()
}

/// Whole trimmed response, if substantive
pub fn parse_avoidance(text: &str) -> Option<String> {
    let trimmed = text.trim();
    is_substantive(trimmed).then(|| trimmed.to_string())
}
