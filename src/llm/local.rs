//! Local fast backend (Ollama-compatible HTTP API).
//!
//! This is the cheap path: intent classification and default chat run here
//! before anything remote is considered. Replies are kept short (`num_predict`
//! cap) because this backend feeds text-to-speech, not a terminal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, LlmProvider, Role};

/// Token budget for local replies. Spoken answers should stay short.
const NUM_PREDICT: u32 = 200;

/// Ollama-compatible local backend.
pub struct LocalProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct LocalChatRequest<'a> {
    model: &'a str,
    messages: Vec<LocalMessage>,
    stream: bool,
    options: serde_json::Value,
}

#[derive(Serialize)]
struct LocalMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct LocalChatResponse {
    message: LocalResponseMessage,
}

#[derive(Deserialize)]
struct LocalResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct LocalGenerateResponse {
    response: String,
}

impl LocalProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited {
                backend: self.model.clone(),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailed {
                backend: self.model.clone(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                backend: self.model.clone(),
                reason: format!("HTTP {status}: {body}"),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for LocalProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = LocalChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| LocalMessage {
                    role: Self::role_str(m.role),
                    content: m.content.clone(),
                })
                .collect(),
            stream: false,
            options: json!({ "temperature": 0.3, "num_predict": NUM_PREDICT }),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;
        let response = self.check_status(response).await?;

        let parsed: LocalChatResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                backend: self.model.clone(),
                reason: e.to_string(),
            })?;
        Ok(parsed.message.content.trim().to_string())
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": 0.1, "num_predict": NUM_PREDICT },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;
        let response = self.check_status(response).await?;

        let parsed: LocalGenerateResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                backend: self.model.clone(),
                reason: e.to_string(),
            })?;
        Ok(parsed.response.trim().to_string())
    }
}
