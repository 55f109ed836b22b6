//! Rolling conversation context.
//!
//! An append-only log of (speaker, text) records owned exclusively by the
//! executive loop. Total stored characters are capped; when an append pushes
//! the log past the cap, the oldest half of the records is discarded so the
//! suffix of the conversation survives. Records are never split, except that
//! a single record larger than the whole cap keeps only its trailing chars.

use std::fmt;

/// Who produced a context record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    /// Synthetic notes the executive records (e.g. "dispatched a coder job").
    System,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Assistant => write!(f, "Assistant"),
            Self::System => write!(f, "System"),
        }
    }
}

/// One record in the conversation log.
#[derive(Debug, Clone)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Bounded append-only conversation log.
#[derive(Debug)]
pub struct ConversationContext {
    turns: Vec<Turn>,
    max_chars: usize,
}

impl ConversationContext {
    pub fn new(max_chars: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_chars,
        }
    }

    /// Append a record and apply the trim policy.
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.turns.push(Turn {
            speaker,
            text: text.into(),
        });
        self.trim();
    }

    /// Total characters currently stored across all records.
    pub fn total_chars(&self) -> usize {
        self.turns.iter().map(|t| t.text.chars().count()).sum()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Render the log for inclusion in a model prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str(&format!("{}: {}\n", turn.speaker, turn.text));
        }
        out
    }

    /// Discard the oldest half of the records while the total exceeds the
    /// cap. A lone oversized record is cut down to its trailing characters.
    fn trim(&mut self) {
        while self.total_chars() > self.max_chars && self.turns.len() > 1 {
            let drop = (self.turns.len() + 1) / 2;
            self.turns.drain(..drop);
            tracing::debug!(dropped = drop, kept = self.turns.len(), "Trimmed context");
        }
        if self.total_chars() > self.max_chars {
            // Single record larger than the whole budget: keep its suffix.
            let turn = &mut self.turns[0];
            let excess = turn.text.chars().count() - self.max_chars;
            turn.text = turn.text.chars().skip(excess).collect();
        }
    }
}
