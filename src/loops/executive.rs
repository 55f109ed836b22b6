//! Executive loop: reflexes, routing, dispatch.
//!
//! Sits between the two queues. Reflex phrases are handled without any model
//! call so that "abort" works even when every backend is down; everything
//! else goes through the intent router.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::audio::BargeController;
use crate::context::{ConversationContext, Speaker};
use crate::intent::{Intent, IntentRouter};
use crate::jobs::{JobKind, JobScheduler};
use crate::queue::FlushableQueue;

use super::{SpeechRequest, Utterance};

/// Emergency stop. Matched anywhere in the utterance (on word boundaries) so
/// "please abort the task" still stops the job without a model round-trip.
const ABORT_PHRASES: &[&str] = &[
    "stop task",
    "abort",
    "cancel",
    "terminate",
    "stop everything",
    "emergency stop",
];

/// Cuts speech without any reply at all. Matched like the stop phrases.
const SILENCE_PHRASES: &[&str] = &["shut up", "stop talking", "be quiet", "silence"];

/// Matched exactly: "tell me a status joke" is conversation, not a query.
const STATUS_PHRASES: &[&str] = &["status", "status report", "what are you doing"];

const ABORT_ACK: &str = "Aborting mission.";
const CLOSING_PHRASE: &str = "Going dark.";

/// How long shutdown waits for the closing phrase to finish rendering.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct ExecutiveLoop {
    utterances: FlushableQueue<Utterance>,
    speech: FlushableQueue<SpeechRequest>,
    router: IntentRouter,
    scheduler: JobScheduler,
    context: ConversationContext,
    barge: Arc<BargeController>,
    shutdown: CancellationToken,
}

impl ExecutiveLoop {
    pub fn new(
        utterances: FlushableQueue<Utterance>,
        speech: FlushableQueue<SpeechRequest>,
        router: IntentRouter,
        scheduler: JobScheduler,
        context: ConversationContext,
        barge: Arc<BargeController>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            utterances,
            speech,
            router,
            scheduler,
            context,
            barge,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        loop {
            let utterance = tokio::select! {
                utterance = self.utterances.recv() => utterance,
                _ = self.shutdown.cancelled() => break,
            };

            tracing::debug!(text = %utterance.text, "Handling utterance");
            if self.handle(&utterance.text).await {
                break;
            }
        }
    }

    /// Process one utterance. Returns true when the session should end.
    async fn handle(&mut self, text: &str) -> bool {
        match reflex(text) {
            Some(Reflex::Abort) => {
                // Ack first so it is spoken before the worker's own report.
                self.speech.push(SpeechRequest::new(ABORT_ACK));
                self.scheduler.abort();
                return false;
            }
            Some(Reflex::Silence) => return false,
            Some(Reflex::Status) => {
                self.speech.push(SpeechRequest::new(self.scheduler.status()));
                return false;
            }
            None => {}
        }

        let intent = match self.router.route(text, &self.context).await {
            Ok(intent) => intent,
            Err(err) => {
                tracing::warn!(error = %err, "Routing failed");
                self.speech
                    .push(SpeechRequest::new("Sorry, I had trouble with that."));
                return false;
            }
        };

        self.context.push(Speaker::User, text);

        match intent {
            Intent::Conversation(reply) => {
                self.context.push(Speaker::Assistant, reply.clone());
                self.speech.push(SpeechRequest::new(reply));
            }
            Intent::Action { kind, payload } => {
                let kind = JobKind::from(kind);
                // Acknowledge before the job starts so the user is never left
                // wondering whether they were heard.
                self.speech
                    .push(SpeechRequest::new(format!("On it. Starting the {kind} task.")));
                match self.scheduler.submit(kind, payload) {
                    Ok(id) => {
                        self.context
                            .push(Speaker::System, format!("Dispatched {kind} job {id}."));
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "Job submission failed");
                        self.speech
                            .push(SpeechRequest::new("I could not start that task."));
                    }
                }
            }
            Intent::Abort => {
                self.speech.push(SpeechRequest::new(ABORT_ACK));
                self.scheduler.abort();
            }
            Intent::Shutdown => {
                self.speech.push(SpeechRequest::new(CLOSING_PHRASE));
                self.wait_for_silence().await;
                self.shutdown.cancel();
                return true;
            }
        }
        false
    }

    /// Give the speech loop a bounded window to finish the farewell.
    async fn wait_for_silence(&self) {
        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while tokio::time::Instant::now() < deadline {
            if self.speech.is_empty() && !self.barge.is_playing() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reflex {
    Abort,
    Silence,
    Status,
}

fn reflex(text: &str) -> Option<Reflex> {
    let normalized = text.trim().to_lowercase();
    if ABORT_PHRASES
        .iter()
        .any(|phrase| contains_phrase(&normalized, phrase))
    {
        Some(Reflex::Abort)
    } else if SILENCE_PHRASES
        .iter()
        .any(|phrase| contains_phrase(&normalized, phrase))
    {
        Some(Reflex::Silence)
    } else if STATUS_PHRASES.contains(&normalized.trim_end_matches(['.', '!'])) {
        Some(Reflex::Status)
    } else {
        None
    }
}

/// Whole-word containment: `phrase` occurs in `text` with no alphanumeric
/// character touching either end, so "abortion debate" and "exterminate"
/// never trip the reflex.
fn contains_phrase(text: &str, phrase: &str) -> bool {
    let mut from = 0;
    while let Some(offset) = text[from..].find(phrase) {
        let start = from + offset;
        let end = start + phrase.len();
        let clear_before = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let clear_after = text[end..].chars().next().map_or(true, |c| !c.is_alphanumeric());
        if clear_before && clear_after {
            return true;
        }
        from = end;
    }
    false
}
