//! Ordered backend fallback chain.
//!
//! Wraps an ordered list of backend identifiers and tries each in sequence
//! until one completes a unit of work. The chain is stateless across calls:
//! every call re-walks it from the first backend. Exhausting the chain is a
//! distinct terminal error, not the last backend's error.

use std::fmt::Display;
use std::future::Future;

use crate::error::LlmError;

/// An ordered, stateless fallback chain over backends of type `B`.
///
/// `B` is a `String` backend identifier for both the external coder and the
/// research path; the chain itself only needs to name backends in logs.
pub struct FallbackChain<B> {
    backends: Vec<B>,
}

impl<B: Display> FallbackChain<B> {
    /// Create a chain. Fails if `backends` is empty.
    pub fn new(backends: Vec<B>) -> Result<Self, LlmError> {
        if backends.is_empty() {
            return Err(LlmError::RequestFailed {
                backend: "fallback".to_string(),
                reason: "fallback chain requires at least one backend".to_string(),
            });
        }
        Ok(Self { backends })
    }

    pub fn backends(&self) -> &[B] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Try each backend in order until `attempt` succeeds.
    ///
    /// Any failure advances to the next backend; running out of backends
    /// yields `LlmError::ChainExhausted`.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T, LlmError>
    where
        F: FnMut(&B) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        for (i, backend) in self.backends.iter().enumerate() {
            match attempt(backend).await {
                Ok(value) => {
                    if i > 0 {
                        tracing::info!(backend = %backend, skipped = i, "Fallback succeeded");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if i + 1 < self.backends.len() {
                        tracing::warn!(
                            backend = %backend,
                            error = %err,
                            next = %self.backends[i + 1],
                            "Backend failed, trying next in chain"
                        );
                    } else {
                        tracing::warn!(backend = %backend, error = %err, "Last backend failed");
                    }
                }
            }
        }
        Err(LlmError::ChainExhausted {
            attempts: self.backends.len(),
        })
    }
}
