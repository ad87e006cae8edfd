//! Playbook - per-conversation strategy collection
//!
//! Strategies are kept in learning order and never re-sorted or deduplicated.
//! An optional capacity limit evicts the oldest entries; it is runtime
//! configuration and does not travel with the serialized data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::strategy::{Polarity, Strategy};

/// Aggregate playbook statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybookStats {
    pub total_strategies: usize,
    pub helpful_strategies: usize,
    pub harmful_strategies: usize,
    pub neutral_strategies: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Serialized playbook blob exchanged with the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub strategies: Vec<Strategy>,
    #[serde(default = "Utc::now", deserialize_with = "null_as_now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "null_as_now")]
    pub updated_at: DateTime<Utc>,
}

// Hosts send explicit nulls for fields they never set
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Strategy>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<Strategy>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn null_as_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<DateTime<Utc>>::deserialize(deserializer).map(|t| t.unwrap_or_else(Utc::now))
}

/// Ordered collection of learned strategies for one conversation
#[derive(Debug, Clone)]
pub struct Playbook {
    strategies: Vec<Strategy>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    limit: Option<usize>,
}

impl Default for Playbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Playbook {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            strategies: Vec::new(),
            created_at: now,
            updated_at: now,
            limit: None,
        }
    }

    /// Create with a capacity limit (None = unbounded)
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::new()
        }
    }

    /// Apply a capacity limit, evicting the oldest strategies if needed
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        self.enforce_limit();
    }

    fn enforce_limit(&mut self) {
        if let Some(max) = self.limit {
            if self.strategies.len() > max {
                let excess = self.strategies.len() - max;
                self.strategies.drain(..excess);
            }
        }
    }

    pub fn add_strategy(&mut self, strategy: Strategy) {
        self.strategies.push(strategy);
        self.enforce_limit();
        self.updated_at = Utc::now();
    }

    /// All strategies in learning order
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn stats(&self) -> PlaybookStats {
        let count = |polarity: Polarity| {
            self.strategies
                .iter()
                .filter(|s| s.polarity == polarity)
                .count()
        };

        PlaybookStats {
            total_strategies: self.strategies.len(),
            helpful_strategies: count(Polarity::Helpful),
            harmful_strategies: count(Polarity::Harmful),
            neutral_strategies: count(Polarity::Neutral),
            last_updated: Some(self.updated_at),
        }
    }

    pub fn to_data(&self) -> PlaybookData {
        PlaybookData {
            strategies: self.strategies.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn from_data(data: PlaybookData) -> Self {
        Self {
            strategies: data.strategies,
            created_at: data.created_at,
            updated_at: data.updated_at,
            limit: None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_data())
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<PlaybookData>(json).map(Self::from_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_preserves_order_and_duplicates() {
        let mut playbook = Playbook::new();
        playbook.add_strategy(Strategy::helpful("Lead with the answer", 0.8));
        playbook.add_strategy(Strategy::harmful("Avoid walls of text", 0.2));
        playbook.add_strategy(Strategy::helpful("Lead with the answer", 0.9));

        let contents: Vec<_> = playbook.strategies().iter().map(|s| s.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["Lead with the answer", "Avoid walls of text", "Lead with the answer"]
        );
    }

    #[test]
    fn test_add_refreshes_updated_at() {
        let mut playbook = Playbook::new();
        let before = playbook.updated_at();
        std::thread::sleep(std::time::Duration::from_millis(2));
        playbook.add_strategy(Strategy::helpful("Ask clarifying questions", 0.7));
        assert!(playbook.updated_at() > before);
        assert_eq!(playbook.created_at(), before);
    }

    #[test]
    fn test_stats() {
        let mut playbook = Playbook::new();
        playbook.add_strategy(Strategy::helpful("one strategy here", 0.8));
        playbook.add_strategy(Strategy::helpful("two strategy here", 0.8));
        playbook.add_strategy(Strategy::harmful("three strategy here", 0.3));
        playbook.add_strategy(Strategy::new("four strategy here", Polarity::Neutral, 0.5));

        let stats = playbook.stats();
        assert_eq!(stats.total_strategies, 4);
        assert_eq!(stats.helpful_strategies, 2);
        assert_eq!(stats.harmful_strategies, 1);
        assert_eq!(stats.neutral_strategies, 1);
        assert_eq!(stats.last_updated, Some(playbook.updated_at()));
    }

    #[test]
    fn test_round_trip() {
        let mut playbook = Playbook::new();
        playbook.add_strategy(Strategy::helpful("Summarize before detailing", 0.85));
        playbook.add_strategy(Strategy::harmful("Do not invent citations", 0.25));

        let json = playbook.to_json().unwrap();
        let restored = Playbook::from_json(&json).unwrap();

        assert_eq!(restored.strategies(), playbook.strategies());
        assert_eq!(restored.created_at(), playbook.created_at());
        assert_eq!(restored.updated_at(), playbook.updated_at());
    }

    #[test]
    fn test_from_data_tolerates_missing_fields() {
        let restored = Playbook::from_json("{}").unwrap();
        assert!(restored.is_empty());
        assert!(restored.updated_at() <= Utc::now());
    }

    #[test]
    fn test_from_data_treats_null_as_missing() {
        let json = r#"{"strategies": null, "created_at": "2026-01-01T00:00:00Z", "updated_at": null}"#;
        let restored = Playbook::from_json(json).unwrap();
        assert!(restored.is_empty());
        assert_eq!(restored.created_at().to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert!(restored.updated_at() > restored.created_at());
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let mut playbook = Playbook::with_limit(Some(2));
        for i in 0..4 {
            playbook.add_strategy(Strategy::helpful(format!("strategy number {}", i), 0.8));
        }
        assert_eq!(playbook.len(), 2);
        assert_eq!(playbook.strategies()[0].content, "strategy number 2");
        assert_eq!(playbook.strategies()[1].content, "strategy number 3");
    }
}
