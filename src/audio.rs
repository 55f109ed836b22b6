//! Voice I/O seam.
//!
//! The rest of the system talks to a [`VoiceEngine`] and never to a concrete
//! device. The default engine is line-oriented console I/O, which keeps the
//! pipeline runnable anywhere; a real microphone/TTS engine slots in behind
//! the same trait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::error::AudioError;

/// Capture and render primitives.
///
/// `capture` blocks until the next utterance arrives and returns `Ok(None)`
/// when the input source is exhausted. `render` speaks one request to
/// completion unless the supplied token fires first.
#[async_trait]
pub trait VoiceEngine: Send + Sync {
    async fn capture(&self) -> Result<Option<String>, AudioError>;

    async fn render(&self, text: &str, cancel: &CancellationToken) -> Result<(), AudioError>;
}

/// Console-backed engine: stdin lines in, stdout lines out.
pub struct ConsoleVoice {
    reader: tokio::sync::Mutex<BufReader<tokio::io::Stdin>>,
}

impl ConsoleVoice {
    pub fn new() -> Self {
        Self {
            reader: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for ConsoleVoice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceEngine for ConsoleVoice {
    async fn capture(&self) -> Result<Option<String>, AudioError> {
        let mut line = String::new();
        let mut reader = self.reader.lock().await;
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|err| AudioError::CaptureFailed {
                reason: err.to_string(),
            })?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    async fn render(&self, text: &str, cancel: &CancellationToken) -> Result<(), AudioError> {
        let mut stdout = tokio::io::stdout();
        let line = format!(">> {text}\n");
        tokio::select! {
            result = stdout.write_all(line.as_bytes()) => {
                result.map_err(|err| AudioError::RenderFailed {
                    reason: err.to_string(),
                })?;
                stdout.flush().await.map_err(|err| AudioError::RenderFailed {
                    reason: err.to_string(),
                })?;
                Ok(())
            }
            _ = cancel.cancelled() => Ok(()),
        }
    }
}

/// Tracks whether a render is in flight and lets the perception side cut it
/// short mid-utterance.
pub struct BargeController {
    playing: AtomicBool,
    active: Mutex<CancellationToken>,
}

impl BargeController {
    pub fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            active: Mutex::new(CancellationToken::new()),
        }
    }

    /// True between `begin_render` and `end_render`.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Arm a fresh token for the render about to start. A token is never
    /// reused across renders, so a stale interrupt cannot cancel a later one.
    pub fn begin_render(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = token.clone();
        self.playing.store(true, Ordering::SeqCst);
        token
    }

    pub fn end_render(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    /// Cut the current render short. Harmless when nothing is playing.
    pub fn interrupt(&self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }
}

impl Default for BargeController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted voice engine for loop tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use crate::error::AudioError;

    use super::VoiceEngine;

    pub struct ScriptedVoice {
        input: Mutex<VecDeque<String>>,
        pub spoken: Mutex<Vec<String>>,
    }

    impl ScriptedVoice {
        pub fn new(lines: &[&str]) -> Self {
            Self {
                input: Mutex::new(lines.iter().map(|s| s.to_string()).collect()),
                spoken: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VoiceEngine for ScriptedVoice {
        async fn capture(&self) -> Result<Option<String>, AudioError> {
            // Pace the script: give earlier speech time to render before the
            // next line arrives (or before end of input ends the session).
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Ok(self.input.lock().unwrap().pop_front())
        }

        async fn render(
            &self,
            text: &str,
            cancel: &CancellationToken,
        ) -> Result<(), AudioError> {
            if cancel.is_cancelled() {
                return Ok(());
            }
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_starts_idle() {
        let barge = BargeController::new();
        assert!(!barge.is_playing());
    }

    #[test]
    fn begin_and_end_render_toggle_playing() {
        let barge = BargeController::new();
        let _token = barge.begin_render();
        assert!(barge.is_playing());
        barge.end_render();
        assert!(!barge.is_playing());
    }

    #[test]
    fn interrupt_cancels_only_the_active_token() {
        let barge = BargeController::new();
        let first = barge.begin_render();
        barge.interrupt();
        assert!(first.is_cancelled());
        barge.end_render();

        let second = barge.begin_render();
        assert!(!second.is_cancelled(), "stale interrupt must not leak");
    }

    #[test]
    fn interrupt_while_idle_is_harmless() {
        let barge = BargeController::new();
        barge.interrupt();
        let token = barge.begin_render();
        assert!(!token.is_cancelled());
    }
}
