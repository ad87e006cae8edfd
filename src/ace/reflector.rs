//! Reflector - LLM-as-judge grading of a single exchange
//!
//! Scores helpfulness, clarity, relevance and completeness (0-10) and asks
//! for a short summary. Grading never fails the turn: unparseable output
//! becomes a neutral score carrying the raw text, and transport failures
//! become a fixed neutral fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::llm::{complete_with_timeout, ChatMessage, CompletionRequest, LlmClient};

pub const NEUTRAL_SCORE: f64 = 5.0;
pub const UNAVAILABLE_SUMMARY: &str = "Unable to analyze response quality";

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:json|JSON)?\s*(.*?)\s*```$").expect("valid fence regex")
});

/// Quality assessment of one exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub helpfulness: f64,
    pub clarity: f64,
    pub relevance: f64,
    pub completeness: f64,
    #[serde(default)]
    pub summary: String,
}

impl Reflection {
    /// Neutral 5/5/5/5 score with the given summary
    pub fn neutral(summary: impl Into<String>) -> Self {
        Self {
            helpfulness: NEUTRAL_SCORE,
            clarity: NEUTRAL_SCORE,
            relevance: NEUTRAL_SCORE,
            completeness: NEUTRAL_SCORE,
            summary: summary.into(),
        }
    }

    /// Fallback used when the grading call itself fails
    pub fn unavailable() -> Self {
        Self::neutral(UNAVAILABLE_SUMMARY)
    }

    /// Mean of the four dimension scores
    pub fn average_score(&self) -> f64 {
        (self.helpfulness + self.clarity + self.relevance + self.completeness) / 4.0
    }
}

/// Result of parsing the grader's text
#[derive(Debug, Clone, PartialEq)]
pub enum ReflectionOutcome {
    Parsed(Reflection),
    Unparsed(String),
}

impl ReflectionOutcome {
    /// Validate model output against the reflection schema
    ///
    /// The whole text (optionally wrapped in a markdown code fence) must be a
    /// JSON object with the four numeric fields.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let body = CODE_FENCE
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(trimmed);

        match serde_json::from_str::<Reflection>(body) {
            Ok(reflection) => Self::Parsed(reflection),
            Err(e) => {
                debug!("Reflection output failed schema validation: {}", e);
                Self::Unparsed(text.to_string())
            }
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    pub fn into_reflection(self) -> Reflection {
        match self {
            Self::Parsed(reflection) => reflection,
            Self::Unparsed(raw) => Reflection::neutral(raw),
        }
    }
}

/// Configuration for the reflector
#[derive(Debug, Clone)]
pub struct ReflectorConfig {
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Grades exchanges with an LLM
#[derive(Clone)]
pub struct Reflector {
    client: Arc<dyn LlmClient>,
    model: String,
    config: ReflectorConfig,
}

impl Reflector {
    pub fn new(client: Arc<dyn LlmClient>, model: &str) -> Self {
        Self::with_config(client, model, ReflectorConfig::default())
    }

    pub fn with_config(client: Arc<dyn LlmClient>, model: &str, config: ReflectorConfig) -> Self {
        Self {
            client,
            model: model.to_string(),
            config,
        }
    }

    pub fn prompt(user_message: &str, response: &str) -> String {
        format!(
            r#"
Analyze this conversation exchange:

User: {}
Assistant: {}

Evaluate the assistant's response on:
1. Helpfulness (0-10)
2. Clarity (0-10)
3. Relevance (0-10)
4. Completeness (0-10)

Provide a brief analysis of what worked well and what could be improved.
Format your response as JSON with fields: helpfulness, clarity, relevance, completeness, summary.
"#,
            user_message, response
        )
    }

    /// Grade one exchange. History is context only and is not scored.
    pub async fn reflect(
        &self,
        user_message: &str,
        response: &str,
        history: &[ChatMessage],
        conversation_id: &str,
    ) -> Reflection {
        let request = CompletionRequest::prompt(
            &self.model,
            Self::prompt(user_message, response),
            self.config.max_tokens,
            self.config.temperature,
        );

        debug!(
            conversation_id,
            history_len = history.len(),
            "Reflecting on exchange"
        );

        let start = Instant::now();
        let result = complete_with_timeout(self.client.as_ref(), request, self.config.timeout).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(completion) => {
                let usage = completion.usage.unwrap_or_default();
                info!(
                    conversation_id,
                    model = %completion.model,
                    duration_ms,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "ACE reflection call succeeded"
                );

                let outcome = ReflectionOutcome::parse(&completion.text);
                if !outcome.is_parsed() {
                    warn!(conversation_id, "Reflection was not valid JSON, using neutral score");
                }
                outcome.into_reflection()
            }
            Err(e) => {
                warn!(
                    conversation_id,
                    duration_ms,
                    code = e.code().unwrap_or("none"),
                    "ACE reflection call failed: {}",
                    e
                );
                Reflection::unavailable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ace::testing::ScriptedClient;

    #[test]
    fn test_parse_valid_json() {
        let text = r#"{"helpfulness": 8, "clarity": 9, "relevance": 7.5, "completeness": 6, "summary": "Solid answer"}"#;
        match ReflectionOutcome::parse(text) {
            ReflectionOutcome::Parsed(r) => {
                assert_eq!(r.helpfulness, 8.0);
                assert_eq!(r.relevance, 7.5);
                assert_eq!(r.summary, "Solid answer");
                assert_eq!(r.average_score(), 7.625);
            }
            other => panic!("expected parsed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"helpfulness\": 9, \"clarity\": 9, \"relevance\": 9, \"completeness\": 9, \"summary\": \"Great\"}\n```";
        assert!(ReflectionOutcome::parse(text).is_parsed());
    }

    #[test]
    fn test_scores_not_clamped() {
        let text = r#"{"helpfulness": 12, "clarity": -1, "relevance": 5, "completeness": 5}"#;
        let r = ReflectionOutcome::parse(text).into_reflection();
        assert_eq!(r.helpfulness, 12.0);
        assert_eq!(r.clarity, -1.0);
        assert_eq!(r.summary, "");
    }

    #[test]
    fn test_prose_falls_back_to_neutral_with_raw_text() {
        let text = "The response was pretty good overall.";
        let outcome = ReflectionOutcome::parse(text);
        assert_eq!(outcome, ReflectionOutcome::Unparsed(text.to_string()));

        let r = outcome.into_reflection();
        assert_eq!(r, Reflection::neutral(text));
        assert_eq!(r.average_score(), 5.0);
    }

    #[test]
    fn test_missing_dimension_is_unparsed() {
        let text = r#"{"helpfulness": 8, "clarity": 9, "summary": "partial"}"#;
        assert!(!ReflectionOutcome::parse(text).is_parsed());
    }

    #[tokio::test]
    async fn test_reflect_uses_grader_output() {
        let client = ScriptedClient::new(vec![Ok(
            r#"{"helpfulness": 9, "clarity": 8, "relevance": 9, "completeness": 8, "summary": "Clear"}"#
                .to_string(),
        )]);
        let reflector = Reflector::new(client.clone(), "gpt-4o-mini");

        let r = reflector.reflect("What is Rust?", "A systems language.", &[], "chat-1").await;
        assert_eq!(r.summary, "Clear");
        assert_eq!(r.average_score(), 8.5);

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, 500);
        assert_eq!(requests[0].temperature, 0.3);
        assert!(requests[0].messages[0].content.contains("User: What is Rust?"));
    }

    #[tokio::test]
    async fn test_reflect_call_failure_returns_fallback() {
        let client = ScriptedClient::failing();
        let reflector = Reflector::new(client, "gpt-4o-mini");

        let r = reflector.reflect("Hi", "Hello", &[], "chat-1").await;
        assert_eq!(r, Reflection::unavailable());
        assert_eq!(r.summary, "Unable to analyze response quality");
    }

    #[tokio::test]
    async fn test_reflect_timeout_returns_fallback() {
        let client = ScriptedClient::stalled();
        let config = ReflectorConfig {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let reflector = Reflector::with_config(client, "gpt-4o-mini", config);

        let r = reflector.reflect("Hi", "Hello", &[], "chat-1").await;
        assert_eq!(r, Reflection::unavailable());
    }
}
