//! Shared fixtures for integration tests

#![allow(dead_code)]

use ace_engine::llm::{Completion, CompletionRequest, LlmClient, LlmError};
use ace_engine::{AceManager, Config};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Answers by prompt kind: grading, strategy extraction or avoidance
pub struct PromptRoutedClient {
    score: f64,
    strategies: String,
    avoidance: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl PromptRoutedClient {
    pub fn new(score: f64, strategies: &str, avoidance: &str) -> Arc<Self> {
        Arc::new(Self {
            score,
            strategies: strategies.to_string(),
            avoidance: avoidance.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Grades every exchange with `score` on all four axes
    pub fn grading(score: f64) -> Arc<Self> {
        Self::new(
            score,
            "Answer the question before elaborating\nUse one concrete example",
            "Avoid answering a different question than the one asked",
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmClient for PromptRoutedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().push(prompt.clone());

        let text = if prompt.contains("Analyze this conversation exchange") {
            serde_json::json!({
                "helpfulness": self.score,
                "clarity": self.score,
                "relevance": self.score,
                "completeness": self.score,
                "summary": format!("Graded {}", self.score),
            })
            .to_string()
        } else if prompt.contains("successful interaction") {
            self.strategies.clone()
        } else if prompt.contains("problematic interaction") {
            self.avoidance.clone()
        } else {
            return Err(LlmError::EmptyResponse);
        };

        Ok(Completion {
            text,
            model: request.model,
            usage: None,
        })
    }
}

/// Manager wired to `client`
pub fn manager_with(client: Arc<PromptRoutedClient>) -> AceManager {
    manager_with_config(client, Config::default())
}

pub fn manager_with_config(client: Arc<PromptRoutedClient>, config: Config) -> AceManager {
    let mut manager = AceManager::new(config);
    assert!(manager.initialize_with_client(client));
    manager
}
