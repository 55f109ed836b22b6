//! voxec: a voice-driven executive.
//!
//! Spoken commands either get an immediate reply or become background jobs
//! (an external coding agent, or deep research through a model fallback
//! chain). Three loops connected by two queues do all the work: perception
//! captures and filters, the executive interprets and dispatches, and the
//! speech loop renders replies. The user can talk over the assistant at any
//! time; "abort" stops a running job without touching a model.

pub mod audio;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod intent;
pub mod jobs;
pub mod llm;
pub mod loops;
pub mod memory;
pub mod queue;

pub use config::Config;
pub use error::{Error, Result};
