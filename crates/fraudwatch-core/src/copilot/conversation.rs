//! Per-session chat history
//!
//! A plain value: turn handlers take it by value and hand back the updated
//! copy. Nothing here is persisted.

use serde::{Deserialize, Serialize};

use crate::models::{ChatRole, ChatTurn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    /// Append in arrival order
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// Number of questions asked so far
    pub fn question_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.role == ChatRole::User)
            .count()
    }

    /// Drop the oldest turns beyond `max`
    pub fn truncate_front(&mut self, max: usize) {
        if self.turns.len() > max {
            let excess = self.turns.len() - max;
            self.turns.drain(..excess);
        }
    }

    /// Clear Chat
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
