//! Session wiring.
//!
//! Builds every component from [`Config`], spawns the three loops and the job
//! worker, and runs until a shutdown intent, end of input, or Ctrl-C.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::audio::{BargeController, ConsoleVoice, VoiceEngine};
use crate::config::Config;
use crate::context::ConversationContext;
use crate::credentials::CredentialPool;
use crate::error::Result;
use crate::intent::IntentRouter;
use crate::jobs::{CoderRunner, JobScheduler, ResearchRunner};
use crate::llm::{CloudProvider, FallbackChain, LocalProvider};
use crate::loops::{ExecutiveLoop, PerceptionLoop, SpeechLoop, SpeechRequest, Utterance};
use crate::memory::{KeywordIndex, KnowledgeStore};
use crate::queue::FlushableQueue;

const STARTUP_PHRASE: &str = "Online. Listening.";

/// Run one full session on the console voice engine.
pub async fn run(config: Config) -> Result<()> {
    let engine: Arc<dyn VoiceEngine> = Arc::new(ConsoleVoice::new());
    run_with_engine(config, engine).await
}

/// Run one full session on the given engine. Returns once the session ends.
pub async fn run_with_engine(config: Config, engine: Arc<dyn VoiceEngine>) -> Result<()> {
    let pool = CredentialPool::new(config.llm.credentials.clone())?;
    let local = Arc::new(LocalProvider::new(
        &config.llm.local_url,
        &config.llm.local_model,
    ));
    let cloud = Arc::new(CloudProvider::new(
        &config.llm.cloud_url,
        &config.llm.cloud_model,
        pool,
    ));

    let knowledge: Arc<dyn KnowledgeStore> =
        Arc::new(KeywordIndex::new(&config.jobs.project_dir));
    if let Err(err) = knowledge.rebuild().await {
        // Start without project context rather than refusing to start.
        tracing::warn!(error = %err, "Initial knowledge scan failed");
    }

    let utterances: FlushableQueue<Utterance> = FlushableQueue::new();
    let speech: FlushableQueue<SpeechRequest> = FlushableQueue::new();
    let barge = Arc::new(BargeController::new());
    let shutdown = CancellationToken::new();

    let coder = Arc::new(CoderRunner::new(
        &config.jobs.coder_bin,
        &config.jobs.project_dir,
        FallbackChain::new(config.jobs.fallback_backends.clone())?,
        Arc::clone(&knowledge),
    ));
    let researcher = Arc::new(ResearchRunner::new(
        Arc::clone(&cloud),
        FallbackChain::new(config.jobs.fallback_backends.clone())?,
    ));
    let scheduler = JobScheduler::start(coder, researcher, Arc::clone(&knowledge), speech.clone());

    let router = IntentRouter::new(local, cloud, knowledge);
    let context = ConversationContext::new(config.agent.context_max_chars);

    let perception = PerceptionLoop::new(
        Arc::clone(&engine),
        utterances.clone(),
        speech.clone(),
        Arc::clone(&barge),
        config.agent.min_utterance_chars,
        shutdown.clone(),
    );
    let speech_loop = SpeechLoop::new(
        Arc::clone(&engine),
        speech.clone(),
        utterances.clone(),
        Arc::clone(&barge),
        shutdown.clone(),
    );
    let executive = ExecutiveLoop::new(
        utterances,
        speech.clone(),
        router,
        scheduler.clone(),
        context,
        Arc::clone(&barge),
        shutdown.clone(),
    );

    speech.push(SpeechRequest::new(STARTUP_PHRASE));

    let perception_task = tokio::spawn(perception.run());
    let speech_task = tokio::spawn(speech_loop.run());
    let executive_task = tokio::spawn(executive.run());

    tokio::select! {
        _ = shutdown.cancelled() => {
            tracing::info!("Session ended");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::warn!(error = %err, "Ctrl-C handler failed");
            }
            tracing::info!("Interrupted, shutting down");
            shutdown.cancel();
        }
    }

    // A job may still be running; it has no user left to report to.
    scheduler.abort();

    let _ = executive_task.await;
    let _ = speech_task.await;
    let _ = perception_task.await;
    Ok(())
}
