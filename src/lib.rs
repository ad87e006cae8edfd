//! Agentic Context Engine
//!
//! Per-conversation strategy learning for chat assistants. After each
//! exchange the engine grades the reply with an LLM judge, distills what
//! worked (or what to avoid) into short strategies, and folds the most
//! recent helpful ones into the next system prompt while trimming history.
//!
//! # Features
//!
//! - **Context composition**: enhanced system prompt + token savings estimate
//! - **Reflection**: four-axis quality grading with deterministic fallbacks
//! - **Curation**: threshold-gated strategy extraction
//! - **Ordered learning**: per-conversation worker queue, parallel across conversations
//! - **Snapshots**: optional JSON playbook files across restarts
//! - **HTTP API**: axum endpoints for the host chat server
//!
//! # Architecture
//!
//! ```text
//! Chat host ──► HTTP API ──► AceManager ──► ContextComposer ──► enhanced prompt
//!                                │
//!                                ├── PlaybookRegistry (conversation → playbook)
//!                                ├── LearningQueue (one worker per conversation)
//!                                │      └── Reflector ──► Curator ──► Playbook
//!                                └── LlmClient (OpenAI-compatible)
//! ```

pub mod ace;
pub mod api;
pub mod config;
pub mod llm;
pub mod persistence;
pub mod server;
pub mod tokenizer;

pub use ace::{
    AceError, AceManager, AceStatus, EnhancedContext, LearningOutcome, Playbook, PlaybookData,
    PlaybookStats, Polarity, Reflection, Strategy,
};
pub use config::Config;
pub use llm::{ChatMessage, Completion, CompletionRequest, LlmClient, LlmError, OpenAiClient, Role};
pub use persistence::{PlaybookSnapshotStore, SnapshotError};
pub use server::AceServer;
pub use tokenizer::TokenCounter;
