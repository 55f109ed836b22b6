//! Single-worker FIFO job scheduler.
//!
//! One worker task owns the run loop; jobs execute strictly in submission
//! order and never overlap. Abort is a signal, not a handle grab: the worker
//! races the running job against an abort notification and drops the job
//! future when the notification wins, which tears down any child process the
//! runner spawned.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::error::JobError;
use crate::loops::SpeechRequest;
use crate::memory::KnowledgeStore;
use crate::queue::FlushableQueue;

use super::{Job, JobKind, JobStatus};

/// Executes one job to completion. Implementations must tolerate being
/// dropped mid-run; that is how aborts are delivered.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run the job. The returned string is spoken on success.
    async fn run(&self, job: &Job) -> Result<String, JobError>;
}

#[derive(Default)]
struct State {
    running: Option<Job>,
    queued: usize,
    last: Option<Job>,
}

/// Handle for submitting, inspecting, and aborting background jobs.
#[derive(Clone)]
pub struct JobScheduler {
    tx: mpsc::UnboundedSender<Job>,
    state: Arc<Mutex<State>>,
    abort: Arc<Notify>,
}

impl JobScheduler {
    /// Spawn the worker and return the submission handle. The worker stops
    /// once every handle is dropped and the queue drains.
    pub fn start(
        coder: Arc<dyn JobRunner>,
        researcher: Arc<dyn JobRunner>,
        knowledge: Arc<dyn KnowledgeStore>,
        speech: FlushableQueue<SpeechRequest>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(State::default()));
        let abort = Arc::new(Notify::new());

        tokio::spawn(worker(
            rx,
            Arc::clone(&state),
            Arc::clone(&abort),
            coder,
            researcher,
            knowledge,
            speech,
        ));

        Self { tx, state, abort }
    }

    /// Queue a job. Returns immediately; the job waits its FIFO turn.
    pub fn submit(&self, kind: JobKind, payload: impl Into<String>) -> Result<Uuid, JobError> {
        let job = Job::new(kind, payload);
        let id = job.id;
        {
            let mut state = self.lock_state();
            state.queued += 1;
        }
        self.tx.send(job).map_err(|_| {
            self.lock_state().queued -= 1;
            JobError::QueueClosed
        })?;
        tracing::info!(%id, "Job queued");
        Ok(id)
    }

    /// Spoken description of the current workload.
    pub fn status(&self) -> String {
        let state = self.lock_state();
        match (&state.running, state.queued) {
            (Some(job), 0) => format!("I am working on a {}.", job.describe()),
            (Some(job), n) => {
                format!("I am working on a {}. {} more waiting.", job.describe(), n)
            }
            (None, n) if n > 0 => format!("{n} tasks are waiting to start."),
            (None, _) => "No background task is running.".to_string(),
        }
    }

    /// Signal the running job to stop. Returns false, silently, when nothing
    /// is running; queued jobs are unaffected and run next.
    pub fn abort(&self) -> bool {
        let state = self.lock_state();
        if state.running.is_some() {
            self.abort.notify_waiters();
            true
        } else {
            false
        }
    }

    pub fn is_busy(&self) -> bool {
        let state = self.lock_state();
        state.running.is_some() || state.queued > 0
    }

    /// The most recently finished job, carrying its terminal status.
    pub fn last_finished(&self) -> Option<Job> {
        self.lock_state().last.clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn worker(
    mut rx: mpsc::UnboundedReceiver<Job>,
    state: Arc<Mutex<State>>,
    abort: Arc<Notify>,
    coder: Arc<dyn JobRunner>,
    researcher: Arc<dyn JobRunner>,
    knowledge: Arc<dyn KnowledgeStore>,
    speech: FlushableQueue<SpeechRequest>,
) {
    while let Some(mut job) = rx.recv().await {
        // Register abort interest before the job is visible as running, so a
        // signal sent right after submission cannot slip past the select.
        let aborted = abort.notified();
        tokio::pin!(aborted);
        aborted.as_mut().enable();

        job.status = JobStatus::Running;
        {
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            state.queued = state.queued.saturating_sub(1);
            state.running = Some(job.clone());
        }
        tracing::info!(id = %job.id, kind = %job.kind, "Job started");

        let runner = match job.kind {
            JobKind::Coder => &coder,
            JobKind::Researcher => &researcher,
        };

        job.status = tokio::select! {
            result = runner.run(&job) => match result {
                Ok(report) => {
                    tracing::info!(id = %job.id, "Job completed");
                    speech.push(SpeechRequest::new(report));
                    if job.kind == JobKind::Coder {
                        if let Err(err) = knowledge.rebuild().await {
                            tracing::warn!(error = %err, "Knowledge rebuild failed");
                        }
                    }
                    JobStatus::Completed
                }
                Err(err) => {
                    tracing::warn!(id = %job.id, error = %err, "Job failed");
                    speech.push(SpeechRequest::new(format!(
                        "The {} task failed.",
                        job.kind
                    )));
                    JobStatus::Failed
                }
            },
            _ = &mut aborted => {
                tracing::info!(id = %job.id, "Job aborted");
                speech.push(SpeechRequest::new("Task aborted."));
                JobStatus::Aborted
            }
        };

        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
        state.running = None;
        state.last = Some(job);
    }
}
