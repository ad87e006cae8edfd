//! Scripted LLM client for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::llm::{Completion, CompletionRequest, LlmClient, LlmError, Usage};

enum Mode {
    Script(Mutex<VecDeque<Result<String, String>>>),
    Failing,
    Stalled,
}

/// Replays canned completions in order and records every request
pub struct ScriptedClient {
    mode: Mode,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    /// `Ok(text)` is returned as a completion, `Err(msg)` as an API error
    pub fn new(script: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            mode: Mode::Script(Mutex::new(script.into())),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replies(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// Every call fails with an authentication error
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            mode: Mode::Failing,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Every call hangs until cancelled
    pub fn stalled() -> Arc<Self> {
        Arc::new(Self {
            mode: Mode::Stalled,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    fn next_reply(&self) -> Result<String, String> {
        match &self.mode {
            Mode::Failing => Err("Incorrect API key provided".to_string()),
            Mode::Stalled => Err("stalled".to_string()),
            Mode::Script(script) => script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err("script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let model = request.model.clone();
        self.requests.lock().push(request);

        if matches!(self.mode, Mode::Stalled) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let next = self.next_reply();

        match next {
            Ok(text) => Ok(Completion {
                text,
                model,
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
            }),
            Err(message) => Err(LlmError::Api {
                status: 401,
                message,
                code: Some("invalid_api_key".to_string()),
            }),
        }
    }
}
