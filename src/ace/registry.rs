//! Playbook registry - conversation id → playbook slot
//!
//! The map lock is only taken briefly to look up, insert or remove a slot.
//! Each slot has its own playbook lock and learning queue, so conversations
//! never contend with each other on the hot path.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::playbook::Playbook;
use super::queue::LearningQueue;

/// Playbook shared between a slot and its learning worker
pub type SharedPlaybook = Arc<Mutex<Playbook>>;

/// State owned by one conversation
pub struct ConversationSlot {
    playbook: SharedPlaybook,
    queue: LearningQueue,
}

impl ConversationSlot {
    fn new(id: &str, playbook: Playbook) -> Self {
        let playbook = Arc::new(Mutex::new(playbook));
        Self {
            queue: LearningQueue::new(id, Arc::clone(&playbook)),
            playbook,
        }
    }

    pub fn playbook(&self) -> &SharedPlaybook {
        &self.playbook
    }

    pub fn queue(&self) -> &LearningQueue {
        &self.queue
    }
}

/// Keyed store of conversation slots
pub struct PlaybookRegistry {
    slots: RwLock<HashMap<String, Arc<ConversationSlot>>>,
    limit: Option<usize>,
}

impl Default for PlaybookRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PlaybookRegistry {
    /// Create a registry whose playbooks are capped at `limit` strategies
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            limit,
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<ConversationSlot>> {
        self.slots.read().get(id).cloned()
    }

    /// Look up a slot, lazily creating an empty playbook
    pub fn get_or_create(&self, id: &str) -> Arc<ConversationSlot> {
        if let Some(slot) = self.get(id) {
            return slot;
        }

        let mut slots = self.slots.write();
        Arc::clone(slots.entry(id.to_string()).or_insert_with(|| {
            debug!(conversation_id = id, "Creating playbook");
            Arc::new(ConversationSlot::new(id, Playbook::with_limit(self.limit)))
        }))
    }

    /// Replace a conversation's playbook contents, creating the slot if needed
    pub fn replace(&self, id: &str, mut playbook: Playbook) -> Arc<ConversationSlot> {
        playbook.set_limit(self.limit);
        let slot = self.get_or_create(id);
        *slot.playbook.lock() = playbook;
        slot
    }

    /// Drop a conversation's slot. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.slots.write().remove(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ace::strategy::Strategy;

    #[test]
    fn test_lazy_create_returns_same_slot() {
        let registry = PlaybookRegistry::default();
        assert!(registry.get("a").is_none());

        let first = registry.get_or_create("a");
        let second = registry.get_or_create("a");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_detaches_slot() {
        let registry = PlaybookRegistry::default();
        let old = registry.get_or_create("a");
        old.playbook().lock().add_strategy(Strategy::helpful("stale strategy text", 0.8));

        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));

        let fresh = registry.get_or_create("a");
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(fresh.playbook().lock().is_empty());
    }

    #[test]
    fn test_replace_applies_limit() {
        let registry = PlaybookRegistry::new(Some(1));
        let mut playbook = Playbook::new();
        playbook.add_strategy(Strategy::helpful("first strategy text", 0.8));
        playbook.add_strategy(Strategy::helpful("second strategy text", 0.8));

        let slot = registry.replace("a", playbook);
        let pb = slot.playbook().lock();
        assert_eq!(pb.len(), 1);
        assert_eq!(pb.strategies()[0].content, "second strategy text");
    }

    #[test]
    fn test_ids_sorted() {
        let registry = PlaybookRegistry::default();
        registry.get_or_create("b");
        registry.get_or_create("a");
        assert_eq!(registry.ids(), vec!["a".to_string(), "b".to_string()]);
    }
}
