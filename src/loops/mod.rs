//! The three long-lived tasks and the queues between them.
//!
//! Perception captures utterances, the executive interprets them, and the
//! speech loop renders replies. The loops never call each other; they only
//! push to and drain the two shared queues.

mod executive;
mod perception;
mod speech;

pub use executive::ExecutiveLoop;
pub use perception::PerceptionLoop;
pub use speech::SpeechLoop;

use chrono::{DateTime, Utc};

/// One captured user utterance, already filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub heard_at: DateTime<Utc>,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            heard_at: Utc::now(),
        }
    }
}

/// One pending line of assistant speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
