//! Deep research jobs.
//!
//! Research runs through the same ordered backend chain as coding: each
//! backend identifier is tried in turn and the first full answer wins. The
//! spoken result is a short preview; long answers are not read out in full.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::JobError;
use crate::llm::{CloudProvider, FallbackChain};

use super::scheduler::JobRunner;
use super::Job;

/// Character budget for the spoken answer preview.
const PREVIEW_CHARS: usize = 200;

const RESEARCH_PROMPT: &str = "\
You are a research assistant. Investigate the following request thoroughly \
and answer with the key findings, most important first. Be factual and \
concrete.";

pub struct ResearchRunner {
    cloud: Arc<CloudProvider>,
    chain: FallbackChain<String>,
}

impl ResearchRunner {
    pub fn new(cloud: Arc<CloudProvider>, chain: FallbackChain<String>) -> Self {
        Self { cloud, chain }
    }
}

#[async_trait]
impl JobRunner for ResearchRunner {
    async fn run(&self, job: &Job) -> Result<String, JobError> {
        let prompt = format!("{RESEARCH_PROMPT}\n\nRequest: {}", job.payload);

        let answer = self
            .chain
            .run(|backend| {
                let cloud = Arc::clone(&self.cloud);
                let model = model_id(backend).to_string();
                let prompt = prompt.clone();
                async move { cloud.generate_with_model(&model, &prompt).await }
            })
            .await?;

        tracing::info!(id = %job.id, answer_chars = answer.len(), "Research finished");
        Ok(preview(&answer, PREVIEW_CHARS))
    }
}

/// Backend identifiers carry a routing prefix (`gemini/gemini-2.0-flash`);
/// the API only wants the part after it.
fn model_id(backend: &str) -> &str {
    match backend.split_once('/') {
        Some((_, rest)) => rest,
        None => backend,
    }
}

/// Truncate at a char boundary with an ellipsis, so the speech engine never
/// drones through a full report.
fn preview(text: &str, limit: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    // Back off to the last word boundary when one is close.
    let trimmed = match cut.rfind(' ') {
        Some(pos) if pos > limit / 2 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{trimmed}...")
}
