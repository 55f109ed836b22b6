//! Model backends.
//!
//! A fast local backend handles intent classification and default chat; the
//! cloud backend (with credential rotation) takes over for heavier turns.
//! Background jobs walk a [`FallbackChain`] of backend identifiers.

mod cloud;
mod fallback;
mod local;
mod provider;

pub use cloud::CloudProvider;
pub use fallback::FallbackChain;
pub use local::LocalProvider;
pub use provider::{ChatMessage, LlmProvider, Role};
