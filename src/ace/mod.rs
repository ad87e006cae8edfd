//! Agentic Context Engine
//!
//! Learns per-conversation strategies from graded exchanges and feeds the
//! most recent helpful ones back into the system prompt.
//!
//! - `strategy` / `playbook`: learned directives and their per-conversation store
//! - `composer`: enhanced system prompt + token savings
//! - `reflector`: LLM-as-judge grading of one exchange
//! - `curator`: turns a grade into new strategies
//! - `registry` / `queue`: keyed playbooks and per-conversation learning workers
//! - `manager`: lifecycle facade used by the host

pub mod composer;
pub mod curator;
pub mod manager;
pub mod playbook;
pub mod queue;
pub mod reflector;
pub mod registry;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use composer::{ComposedContext, ComposerConfig, ContextComparison, ContextComposer};
pub use curator::{CurationBranch, Curator, CuratorConfig};
pub use manager::{AceError, AceManager, AceStatus, EnhancedContext, DEFAULT_STRATEGY_LIMIT};
pub use playbook::{Playbook, PlaybookData, PlaybookStats};
pub use queue::{Learner, LearningOutcome, LearningQueue, ReflectJob};
pub use reflector::{Reflection, ReflectionOutcome, Reflector, ReflectorConfig};
pub use registry::{ConversationSlot, PlaybookRegistry, SharedPlaybook};
pub use strategy::{Polarity, Strategy};
