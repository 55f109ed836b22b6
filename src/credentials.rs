//! Credential pool with round-robin rotation.
//!
//! Cloud backends call [`CredentialPool::rotate`] after a quota/rate-limit
//! failure. The pool is an owned value held by the backend that performs the
//! calls; there is no process-wide key state.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Ordered API credentials plus the index of the one currently in use.
///
/// Invariant: the pool is never empty after construction. A configuration
/// with zero credentials refuses to start (`ConfigError::NoCredentials`).
#[derive(Debug)]
pub struct CredentialPool {
    keys: Vec<SecretString>,
    current: usize,
}

impl CredentialPool {
    /// Build a pool from the configured credentials.
    ///
    /// Fails if `keys` is empty; an executive without credentials is a fatal
    /// configuration error, not a retryable condition.
    pub fn new(keys: Vec<SecretString>) -> Result<Self, ConfigError> {
        if keys.is_empty() {
            return Err(ConfigError::NoCredentials {
                hint: "set VOXEC_API_KEY in the environment or .env".to_string(),
            });
        }
        Ok(Self { keys, current: 0 })
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        // Construction guarantees non-empty; kept for API completeness.
        self.keys.is_empty()
    }

    /// The credential currently in rotation.
    pub fn active(&self) -> &SecretString {
        &self.keys[self.current]
    }

    /// Index of the active credential (for logging; never the key itself).
    pub fn active_index(&self) -> usize {
        self.current
    }

    /// Advance to the next credential, wrapping around.
    ///
    /// Returns `false` for single-credential pools: no rotation happened and
    /// the caller should stop retrying via rotation.
    pub fn rotate(&mut self) -> bool {
        if self.keys.len() <= 1 {
            return false;
        }
        let prev = self.current;
        self.current = (self.current + 1) % self.keys.len();
        tracing::info!(
            from = prev + 1,
            to = self.current + 1,
            total = self.keys.len(),
            "Rotating API credential"
        );
        true
    }
}
