//! ACE Manager - per-conversation orchestration
//!
//! ```text
//! enhance(turn N) ──► model call ──► reply to user ──► reflect(turn N)
//!                                                          │
//! enhance(turn N+1) ◄── waits for queued learning ◄────────┘
//! ```
//!
//! Administrative reads (stats, strategies, clear, save/load) work whether or
//! not the manager was initialized. Enhance and reflect require a client.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::composer::{ComposerConfig, ContextComparison, ContextComposer};
use super::curator::{Curator, CuratorConfig};
use super::playbook::{Playbook, PlaybookData, PlaybookStats};
use super::queue::{Learner, LearningOutcome, ReflectJob};
use super::reflector::{Reflector, ReflectorConfig};
use super::registry::{PlaybookRegistry, SharedPlaybook};
use super::strategy::Strategy;
use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, OpenAiClient};

pub const DEFAULT_STRATEGY_LIMIT: usize = 10;

/// Manager errors
#[derive(Debug, thiserror::Error)]
pub enum AceError {
    #[error("ACE Manager not initialized")]
    NotInitialized,

    #[error("Invalid playbook data: {0}")]
    InvalidPlaybook(String),

    #[error("Learning for conversation {0} was aborted")]
    LearningAborted(String),

    #[error("No async runtime available to run learning")]
    NoRuntime,
}

/// Output of `enhance_context`
#[derive(Debug, Clone, Serialize)]
pub struct EnhancedContext {
    pub enhanced_system_message: String,
    pub context_comparison: ContextComparison,
    pub strategies_used: usize,
    /// Handle to the conversation's playbook for later reflection
    #[serde(skip)]
    pub playbook: SharedPlaybook,
}

/// Manager status, read without any network call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AceStatus {
    pub enabled: bool,
    pub initialized: bool,
    pub model: String,
    pub conversations: usize,
}

/// Agentic Context Engine manager
pub struct AceManager {
    config: Config,
    composer: ContextComposer,
    registry: PlaybookRegistry,
    learner: Option<Arc<Learner>>,
}

impl AceManager {
    pub fn new(config: Config) -> Self {
        let composer = ContextComposer::with_config(ComposerConfig {
            system_message: config.system_message.clone(),
            ..Default::default()
        });
        let registry = PlaybookRegistry::new(config.max_strategies);

        Self {
            config,
            composer,
            registry,
            learner: None,
        }
    }

    /// Build the completion client from configured credentials
    pub fn initialize(&mut self) -> bool {
        if !self.config.enabled {
            info!("ACE disabled by configuration");
            return false;
        }

        match OpenAiClient::from_config(&self.config) {
            Ok(client) => self.initialize_with_client(Arc::new(client)),
            Err(e) => {
                warn!("Failed to initialize ACE Manager: {}", e);
                false
            }
        }
    }

    /// Initialize with an already-built client
    pub fn initialize_with_client(&mut self, client: Arc<dyn LlmClient>) -> bool {
        if !self.config.enabled {
            return false;
        }

        let model = self.config.model.as_str();
        let reflector = Reflector::with_config(
            Arc::clone(&client),
            model,
            ReflectorConfig {
                timeout: self.config.request_timeout,
                ..Default::default()
            },
        );
        let curator = Curator::with_config(
            client,
            model,
            CuratorConfig {
                timeout: self.config.request_timeout,
                ..Default::default()
            },
        );

        self.learner = Some(Arc::new(Learner::new(reflector, curator)));
        info!(model, "ACE Manager initialized");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.learner.is_some()
    }

    pub fn status(&self) -> AceStatus {
        AceStatus {
            enabled: self.config.enabled,
            initialized: self.is_initialized(),
            model: self.config.model.clone(),
            conversations: self.registry.len(),
        }
    }

    fn learner(&self) -> Result<&Arc<Learner>, AceError> {
        self.learner.as_ref().ok_or(AceError::NotInitialized)
    }

    /// Compose the system prompt for the next model call.
    ///
    /// Waits for learning already queued for this conversation so the prompt
    /// reflects settled strategies only.
    pub async fn enhance_context(
        &self,
        conversation_id: &str,
        user_message: &str,
        history: &[ChatMessage],
    ) -> Result<EnhancedContext, AceError> {
        self.learner()?;

        let slot = self.registry.get_or_create(conversation_id);
        slot.queue().settle().await;

        let composed = {
            let playbook = slot.playbook().lock();
            self.composer.compose(user_message, history, &playbook)
        };

        info!(
            conversation_id,
            strategies_used = composed.strategies_used,
            ace_tokens = composed.context_comparison.ace_context_length,
            regular_tokens = composed.context_comparison.regular_context_length,
            "ACE context enhanced"
        );

        Ok(EnhancedContext {
            enhanced_system_message: composed.enhanced_system_message,
            context_comparison: composed.context_comparison,
            strategies_used: composed.strategies_used,
            playbook: Arc::clone(slot.playbook()),
        })
    }

    /// Queue reflection on an exchange without waiting for it.
    ///
    /// Jobs for one conversation run in submission order, and a later
    /// `enhance_context` for the same conversation waits for them.
    pub fn schedule_reflection(
        &self,
        conversation_id: &str,
        user_message: &str,
        response: &str,
        history: &[ChatMessage],
    ) -> Result<oneshot::Receiver<LearningOutcome>, AceError> {
        let learner = self.learner()?;
        tokio::runtime::Handle::try_current().map_err(|_| AceError::NoRuntime)?;

        let slot = self.registry.get_or_create(conversation_id);
        let job = ReflectJob {
            user_message: user_message.to_string(),
            response: response.to_string(),
            history: history.to_vec(),
        };

        Ok(slot.queue().submit(learner, job))
    }

    /// Reflect on an exchange and learn from it, waiting for the result
    pub async fn reflect_and_learn(
        &self,
        conversation_id: &str,
        user_message: &str,
        response: &str,
        history: &[ChatMessage],
    ) -> Result<LearningOutcome, AceError> {
        let pending = self.schedule_reflection(conversation_id, user_message, response, history)?;
        pending
            .await
            .map_err(|_| AceError::LearningAborted(conversation_id.to_string()))
    }

    /// Aggregate stats; zeroed for unknown conversations
    pub fn get_stats(&self, conversation_id: &str) -> PlaybookStats {
        self.registry
            .get(conversation_id)
            .map(|slot| slot.playbook().lock().stats())
            .unwrap_or_default()
    }

    /// Up to `limit` strategies, most recent first
    pub fn get_strategies(&self, conversation_id: &str, limit: usize) -> Vec<Strategy> {
        self.registry
            .get(conversation_id)
            .map(|slot| {
                slot.playbook()
                    .lock()
                    .strategies()
                    .iter()
                    .rev()
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Forget everything learned for a conversation
    pub fn clear_playbook(&self, conversation_id: &str) -> bool {
        let removed = self.registry.remove(conversation_id);
        if removed {
            info!(conversation_id, "ACE playbook cleared");
        }
        removed
    }

    /// Load a serialized playbook blob. Returns false if the blob is malformed.
    pub fn load_playbook(&self, conversation_id: &str, blob: serde_json::Value) -> bool {
        match self.try_load_playbook(conversation_id, blob) {
            Ok(()) => true,
            Err(e) => {
                warn!(conversation_id, "Failed to load playbook: {}", e);
                false
            }
        }
    }

    /// Like `load_playbook`, but reports why a blob was rejected
    pub fn try_load_playbook(
        &self,
        conversation_id: &str,
        blob: serde_json::Value,
    ) -> Result<(), AceError> {
        let data: PlaybookData = serde_json::from_value(blob)
            .map_err(|e| AceError::InvalidPlaybook(e.to_string()))?;
        self.restore_playbook(conversation_id, data);
        Ok(())
    }

    /// Install typed playbook data for a conversation
    pub fn restore_playbook(&self, conversation_id: &str, data: PlaybookData) {
        self.registry
            .replace(conversation_id, Playbook::from_data(data));
    }

    /// Serialize a conversation's playbook, if it has one
    pub fn save_playbook(&self, conversation_id: &str) -> Option<PlaybookData> {
        self.registry
            .get(conversation_id)
            .map(|slot| slot.playbook().lock().to_data())
    }

    /// Conversation ids with a playbook in memory
    pub fn conversation_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
