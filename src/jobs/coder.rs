//! External coding agent driver.
//!
//! Runs the configured agent binary once per request, walking the backend
//! chain until one run succeeds. The child is spawned with `kill_on_drop`, so
//! cancelling the run future tears the agent down immediately.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::{JobError, LlmError};
use crate::llm::FallbackChain;
use crate::memory::KnowledgeStore;

use super::scheduler::JobRunner;
use super::Job;

/// How many knowledge snippets enrich the agent prompt.
const SNIPPET_LIMIT: usize = 3;

/// Drives the coding agent binary against the project directory.
pub struct CoderRunner {
    bin: String,
    project_dir: PathBuf,
    chain: FallbackChain<String>,
    knowledge: Arc<dyn KnowledgeStore>,
}

impl CoderRunner {
    pub fn new(
        bin: impl Into<String>,
        project_dir: impl Into<PathBuf>,
        chain: FallbackChain<String>,
        knowledge: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            bin: bin.into(),
            project_dir: project_dir.into(),
            chain,
            knowledge,
        }
    }

    async fn build_message(&self, payload: &str) -> String {
        let snippets = self.knowledge.query(payload, SNIPPET_LIMIT).await;
        if snippets.is_empty() {
            return payload.to_string();
        }
        let mut message = payload.to_string();
        message.push_str("\n\nRelevant project context:\n");
        for snippet in &snippets {
            message.push_str(&format!("--- {} ---\n", snippet.path.display()));
            message.push_str(&snippet.excerpt);
            message.push('\n');
        }
        message
    }
}

#[async_trait]
impl JobRunner for CoderRunner {
    async fn run(&self, job: &Job) -> Result<String, JobError> {
        let message = self.build_message(&job.payload).await;
        let files = extract_file_targets(&job.payload);

        tracing::info!(
            id = %job.id,
            bin = %self.bin,
            files = ?files,
            "Starting coding agent"
        );

        self.chain
            .run(|backend| {
                let bin = self.bin.clone();
                let dir = self.project_dir.clone();
                let backend = backend.clone();
                let message = message.clone();
                let files = files.clone();
                async move { run_agent_once(&bin, &dir, &backend, &message, &files).await }
            })
            .await?;

        Ok("Done. The coding task is finished.".to_string())
    }
}

/// One agent invocation against one backend. Any failure is reported as a
/// backend error so the chain moves on.
async fn run_agent_once(
    bin: &str,
    dir: &PathBuf,
    backend: &str,
    message: &str,
    files: &[String],
) -> Result<(), LlmError> {
    let mut cmd = Command::new(bin);
    cmd.arg("--model")
        .arg(backend)
        .arg("--yes")
        .arg("--message")
        .arg(message)
        .args(files)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| LlmError::RequestFailed {
        backend: backend.to_string(),
        reason: format!("failed to spawn {bin}: {err}"),
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_handle = tokio::spawn(async move {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("agent stdout: {}", line);
            }
        }
    });

    let stderr_handle = tokio::spawn(async move {
        let mut collected = String::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("agent stderr: {}", line);
                if !collected.is_empty() {
                    collected.push('\n');
                }
                collected.push_str(&line);
            }
        }
        collected
    });

    let status = child.wait().await.map_err(|err| LlmError::RequestFailed {
        backend: backend.to_string(),
        reason: format!("wait failed: {err}"),
    })?;
    let _ = stdout_handle.await;
    let stderr_text = stderr_handle.await.unwrap_or_default();

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        let tail: String = stderr_text.chars().rev().take(300).collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return Err(LlmError::RequestFailed {
            backend: backend.to_string(),
            reason: format!("agent exited with code {code}: {tail}"),
        });
    }

    Ok(())
}

/// Pull tokens that look like file paths out of a spoken request, so the
/// agent gets explicit targets instead of scanning the whole tree.
pub fn extract_file_targets(payload: &str) -> Vec<String> {
    payload
        .split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '/')
                .trim_end_matches('.')
        })
        .filter(|token| looks_like_path(token))
        .map(|token| token.to_string())
        .collect()
}

fn looks_like_path(token: &str) -> bool {
    let Some((stem, ext)) = token.rsplit_once('.') else {
        return false;
    };
    !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= 5
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn file_targets_are_extracted_from_speech() {
        assert_eq!(
            extract_file_targets("please fix config.py and src/main.rs now"),
            vec!["config.py".to_string(), "src/main.rs".to_string()]
        );
    }

    #[test]
    fn trailing_punctuation_is_stripped() {
        assert_eq!(
            extract_file_targets("update readme.md."),
            vec!["readme.md".to_string()]
        );
    }

    #[test]
    fn plain_words_are_not_paths() {
        assert!(extract_file_targets("fix the login page").is_empty());
        // A bare trailing period is not an extension.
        assert!(extract_file_targets("do it now.").is_empty());
    }

    #[test]
    fn version_like_tokens_are_ignored() {
        // "v2.longextension" has an implausible extension.
        assert!(extract_file_targets("upgrade to v2.megarelease").is_empty());
    }
}
