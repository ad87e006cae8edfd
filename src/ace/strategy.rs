//! Learned strategies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a strategy should be followed or avoided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Helpful,
    Harmful,
    #[default]
    Neutral,
}

/// One learned behavioral rule. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub content: String,
    #[serde(alias = "type", default)]
    pub polarity: Polarity,
    #[serde(default = "default_score")]
    pub score: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_score() -> f64 {
    0.5
}

impl Strategy {
    pub fn new(content: impl Into<String>, polarity: Polarity, score: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            polarity,
            score,
            created_at: Utc::now(),
        }
    }

    pub fn helpful(content: impl Into<String>, score: f64) -> Self {
        Self::new(content, Polarity::Helpful, score)
    }

    pub fn harmful(content: impl Into<String>, score: f64) -> Self {
        Self::new(content, Polarity::Harmful, score)
    }

    pub fn is_helpful(&self) -> bool {
        self.polarity == Polarity::Helpful
    }
}
