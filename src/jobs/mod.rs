//! Background job model and scheduler.
//!
//! Jobs are long-running pieces of delegated work. They execute strictly one
//! at a time on a single worker so two coding agents can never touch the same
//! project concurrently; everything submitted while a job runs waits its turn
//! in FIFO order.

mod coder;
mod researcher;
mod scheduler;

pub use coder::{extract_file_targets, CoderRunner};
pub use researcher::ResearchRunner;
pub use scheduler::{JobRunner, JobScheduler};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::intent::ActionKind;

/// The kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Drives the external coding agent against the project directory.
    Coder,
    /// Deep multi-step lookup through the model fallback chain.
    Researcher,
}

impl From<ActionKind> for JobKind {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Coder => Self::Coder,
            ActionKind::Researcher => Self::Researcher,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coder => write!(f, "coding"),
            Self::Researcher => write!(f, "research"),
        }
    }
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Aborted,
}

/// A unit of delegated work.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    /// The user's request, verbatim.
    pub payload: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(kind: JobKind, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload: payload.into(),
            status: JobStatus::Queued,
            submitted_at: Utc::now(),
        }
    }

    /// Short description used in status speech.
    pub fn describe(&self) -> String {
        let mut summary = self.payload.clone();
        if summary.chars().count() > 60 {
            summary = summary.chars().take(60).collect::<String>() + "...";
        }
        format!("{} task: {}", self.kind, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_queued() {
        let job = Job::new(JobKind::Coder, "fix the parser");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.kind, JobKind::Coder);
    }

    #[test]
    fn describe_truncates_long_payloads() {
        let long = "a".repeat(200);
        let job = Job::new(JobKind::Researcher, long);
        let described = job.describe();
        assert!(described.starts_with("research task: "));
        assert!(described.ends_with("..."));
        assert!(described.len() < 100);
    }

    #[test]
    fn action_kinds_map_to_job_kinds() {
        assert_eq!(JobKind::from(ActionKind::Coder), JobKind::Coder);
        assert_eq!(JobKind::from(ActionKind::Researcher), JobKind::Researcher);
    }
}
