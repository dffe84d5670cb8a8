//! Conversation turn log
//!
//! Append-only; insertion order is conversation order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One customer message and the reply to it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub user: String,
    /// Filled in once the reply is computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnLog {
    turns: Vec<Turn>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the customer side of a new turn
    pub fn begin_turn(&mut self, user: impl Into<String>) {
        self.turns.push(Turn {
            user: user.into(),
            assistant: None,
            timestamp: Utc::now(),
        });
    }

    /// Attach the reply to the most recent turn
    pub fn complete_turn(&mut self, assistant: impl Into<String>) {
        if let Some(turn) = self.turns.last_mut() {
            turn.assistant = Some(assistant.into());
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
