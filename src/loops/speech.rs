//! Speech loop: strict FIFO rendering.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::audio::{BargeController, VoiceEngine};
use crate::queue::FlushableQueue;

use super::{SpeechRequest, Utterance};

/// Renders queued speech one request at a time, in order.
pub struct SpeechLoop {
    engine: Arc<dyn VoiceEngine>,
    speech: FlushableQueue<SpeechRequest>,
    utterances: FlushableQueue<Utterance>,
    barge: Arc<BargeController>,
    shutdown: CancellationToken,
}

impl SpeechLoop {
    pub fn new(
        engine: Arc<dyn VoiceEngine>,
        speech: FlushableQueue<SpeechRequest>,
        utterances: FlushableQueue<Utterance>,
        barge: Arc<BargeController>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            speech,
            utterances,
            barge,
            shutdown,
        }
    }

    pub async fn run(self) {
        loop {
            let request = tokio::select! {
                request = self.speech.recv() => request,
                _ = self.shutdown.cancelled() => break,
            };

            if request.text.trim().is_empty() {
                continue;
            }

            // Echo cancellation: anything the microphone picked up while this
            // line waited is stale or our own voice.
            let flushed = self.utterances.drain();
            if flushed > 0 {
                tracing::debug!(flushed, "Flushed stale captures before render");
            }

            let token = self.barge.begin_render();
            let result = self.engine.render(&request.text, &token).await;
            self.barge.end_render();

            if let Err(err) = result {
                tracing::warn!(error = %err, "Render failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::audio::test_support::ScriptedVoice;

    use super::*;

    fn spawn_loop(
        speech: FlushableQueue<SpeechRequest>,
        utterances: FlushableQueue<Utterance>,
    ) -> (Arc<ScriptedVoice>, CancellationToken) {
        let engine = Arc::new(ScriptedVoice::new(&[]));
        let shutdown = CancellationToken::new();
        let speech_loop = SpeechLoop::new(
            engine.clone(),
            speech,
            utterances,
            Arc::new(BargeController::new()),
            shutdown.clone(),
        );
        tokio::spawn(speech_loop.run());
        (engine, shutdown)
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn requests_render_in_fifo_order() {
        let speech = FlushableQueue::new();
        speech.push(SpeechRequest::new("first"));
        speech.push(SpeechRequest::new("second"));
        let (engine, shutdown) = spawn_loop(speech, FlushableQueue::new());

        settle().await;
        shutdown.cancel();

        assert_eq!(*engine.spoken.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn blank_requests_are_skipped() {
        let speech = FlushableQueue::new();
        speech.push(SpeechRequest::new("   "));
        speech.push(SpeechRequest::new("real line"));
        let (engine, shutdown) = spawn_loop(speech, FlushableQueue::new());

        settle().await;
        shutdown.cancel();

        assert_eq!(*engine.spoken.lock().unwrap(), vec!["real line"]);
    }

    #[tokio::test]
    async fn stale_captures_are_flushed_before_rendering() {
        let speech = FlushableQueue::new();
        let utterances = FlushableQueue::new();
        utterances.push(Utterance::new("echo of our own voice"));
        speech.push(SpeechRequest::new("hello"));
        let (engine, shutdown) = spawn_loop(speech, utterances.clone());

        settle().await;
        shutdown.cancel();

        assert_eq!(*engine.spoken.lock().unwrap(), vec!["hello"]);
        assert!(utterances.try_recv().is_none());
    }
}
