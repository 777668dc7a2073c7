//! Chat session state.
//!
//! A [`ChatSession`] is owned by the caller (the CLI keeps one per `chat`
//! run) and is an append-only log of question/answer turns that can be
//! cleared. The pipeline only reads it, and only when history rendering is
//! enabled.

use crate::types::{Answer, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of recent turns shown by `/history`.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One question and the answer it received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub asked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            turns: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append a completed turn.
    pub fn record(&mut self, question: impl Into<String>, answer: &Answer) {
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.text.clone(),
            sources: answer.sources.clone(),
            asked_at: Utc::now(),
        });
    }

    pub fn clear(&mut self) {
        self.turns.clear();
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

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Messages in chronological order, alternating user and assistant.
    pub fn messages(&self) -> impl Iterator<Item = (MessageRole, &str)> {
        self.turns.iter().flat_map(|t| {
            [
                (MessageRole::User, t.question.as_str()),
                (MessageRole::Assistant, t.answer.as_str()),
            ]
        })
    }

    /// The last `n` turns as prompt text; empty when `n == 0`.
    pub fn render_history(&self, n: usize) -> String {
        self.recent(n)
            .iter()
            .map(|t| format!("User: {}\nAssistant: {}", t.question, t.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> Answer {
        Answer {
            text: text.to_string(),
            sources: Vec::new(),
        }
    }

    #[test]
    fn test_record_and_clear() {
        let mut session = ChatSession::new();
        session.record("q1", &answer("a1"));
        session.record("q2", &answer("a2"));
        assert_eq!(session.len(), 2);

        let roles: Vec<_> = session.messages().map(|(r, _)| r).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant
            ]
        );

        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn test_render_history_window() {
        let mut session = ChatSession::new();
        for i in 1..=3 {
            session.record(format!("q{i}"), &answer(&format!("a{i}")));
        }

        assert_eq!(session.render_history(0), "");
        assert_eq!(session.render_history(1), "User: q3\nAssistant: a3");
        assert_eq!(session.recent(10).len(), 3);
        assert!(session.render_history(2).starts_with("User: q2"));
    }
}
