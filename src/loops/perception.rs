//! Perception loop: capture, filter, barge-in.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::audio::{BargeController, VoiceEngine};
use crate::queue::FlushableQueue;

use super::{SpeechRequest, Utterance};

/// Phrases speech recognizers emit for silence or breath noise. Compared
/// exactly after trimming and lowercasing, so real sentences that merely
/// contain one pass through.
const HALLUCINATIONS: &[&str] = &[
    "thank you.",
    "thank you",
    "thanks for watching.",
    "thanks for watching",
    "you.",
    "you",
    "bye.",
    ".",
];

/// Recognizer watermark lines start with this.
const SUBTITLE_MARKER: &str = "subtitles by";

/// Captures utterances, drops recognizer noise, and cuts assistant speech
/// short when the user talks over it.
pub struct PerceptionLoop {
    engine: Arc<dyn VoiceEngine>,
    utterances: FlushableQueue<Utterance>,
    speech: FlushableQueue<SpeechRequest>,
    barge: Arc<BargeController>,
    min_chars: usize,
    shutdown: CancellationToken,
}

impl PerceptionLoop {
    pub fn new(
        engine: Arc<dyn VoiceEngine>,
        utterances: FlushableQueue<Utterance>,
        speech: FlushableQueue<SpeechRequest>,
        barge: Arc<BargeController>,
        min_chars: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            utterances,
            speech,
            barge,
            min_chars,
            shutdown,
        }
    }

    pub async fn run(self) {
        loop {
            let captured = tokio::select! {
                result = self.engine.capture() => result,
                _ = self.shutdown.cancelled() => break,
            };

            let text = match captured {
                Ok(Some(text)) => text,
                Ok(None) => {
                    // Input source closed; end the session.
                    tracing::info!("Capture source closed, shutting down");
                    self.shutdown.cancel();
                    break;
                }
                Err(err) => {
                    // One bad capture must not kill the loop.
                    tracing::warn!(error = %err, "Capture failed");
                    continue;
                }
            };

            let Some(text) = filter_capture(&text, self.min_chars) else {
                tracing::debug!(raw = %text, "Dropped capture");
                continue;
            };

            if self.barge.is_playing() {
                // The user talked over us: stop mid-sentence and forget
                // whatever else we were about to say.
                let flushed = self.speech.drain();
                self.barge.interrupt();
                tracing::info!(flushed, "Barge-in, speech interrupted");
            }

            self.utterances.push(Utterance::new(text));
        }
    }
}

/// Returns the cleaned utterance, or `None` when it is noise.
fn filter_capture(raw: &str, min_chars: usize) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < min_chars {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if HALLUCINATIONS.contains(&lowered.as_str()) || lowered.starts_with(SUBTITLE_MARKER) {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::audio::test_support::ScriptedVoice;

    use super::*;

    fn spawn_loop(
        lines: &[&str],
        barge: Arc<BargeController>,
        speech: FlushableQueue<SpeechRequest>,
    ) -> (FlushableQueue<Utterance>, CancellationToken) {
        let utterances = FlushableQueue::new();
        let shutdown = CancellationToken::new();
        let perception = PerceptionLoop::new(
            Arc::new(ScriptedVoice::new(lines)),
            utterances.clone(),
            speech,
            barge,
            2,
            shutdown.clone(),
        );
        tokio::spawn(perception.run());
        (utterances, shutdown)
    }

    #[tokio::test]
    async fn clean_captures_are_queued_in_order() {
        let (utterances, shutdown) = spawn_loop(
            &["fix config.py", "what is the status"],
            Arc::new(BargeController::new()),
            FlushableQueue::new(),
        );
        shutdown.cancelled().await;

        assert_eq!(utterances.try_recv().map(|u| u.text), Some("fix config.py".to_string()));
        assert_eq!(
            utterances.try_recv().map(|u| u.text),
            Some("what is the status".to_string())
        );
        assert!(utterances.try_recv().is_none());
    }

    #[tokio::test]
    async fn hallucinations_and_short_noise_are_dropped() {
        let (utterances, shutdown) = spawn_loop(
            &["  Thank you.  ", "you", "Subtitles by the Amara.org community", "a", "real words"],
            Arc::new(BargeController::new()),
            FlushableQueue::new(),
        );
        shutdown.cancelled().await;

        assert_eq!(utterances.try_recv().map(|u| u.text), Some("real words".to_string()));
        assert!(utterances.try_recv().is_none());
    }

    #[test]
    fn sentences_containing_noise_phrases_survive() {
        assert_eq!(
            filter_capture("thank you for fixing that bug", 2),
            Some("thank you for fixing that bug".to_string())
        );
    }

    #[tokio::test]
    async fn barge_in_interrupts_and_flushes_pending_speech() {
        let barge = Arc::new(BargeController::new());
        let token = barge.begin_render();
        let speech = FlushableQueue::new();
        speech.push(SpeechRequest::new("queued line one"));
        speech.push(SpeechRequest::new("queued line two"));

        let (utterances, shutdown) =
            spawn_loop(&["stop reading that"], Arc::clone(&barge), speech.clone());
        shutdown.cancelled().await;

        assert!(token.is_cancelled());
        assert!(speech.try_recv().is_none(), "pending speech must be flushed");
        // The interrupting utterance still reaches the executive.
        assert_eq!(
            utterances.try_recv().map(|u| u.text),
            Some("stop reading that".to_string())
        );
    }
}
