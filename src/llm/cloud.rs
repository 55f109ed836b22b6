//! Cloud model backend with credential rotation.
//!
//! Speaks the Gemini `generateContent` API. Quota failures rotate the owned
//! [`CredentialPool`] and retry; every other error propagates immediately.
//! With pool size K a fully rate-limited call makes exactly K attempts before
//! reporting `CredentialsExhausted`.

use std::future::Future;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{json, Value};

use crate::credentials::CredentialPool;
use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, LlmProvider, Role};

/// Gemini-style cloud backend.
pub struct CloudProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    pool: Mutex<CredentialPool>,
}

impl CloudProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        pool: CredentialPool,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            pool: Mutex::new(pool),
        }
    }

    /// Request a completion with a specific model, bypassing the default.
    /// Used by the research path when walking the fallback chain.
    pub async fn generate_with_model(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        let contents = json!([{ "role": "user", "parts": [{ "text": prompt }] }]);
        self.request(model, json!({ "contents": contents })).await
    }

    async fn request(&self, model: &str, body: Value) -> Result<String, LlmError> {
        let pool_size = self.pool.lock().expect("pool lock poisoned").len();
        let backend = model.to_string();

        rotate_on_quota(
            pool_size,
            &backend,
            |attempt| {
                let key = {
                    let pool = self.pool.lock().expect("pool lock poisoned");
                    pool.active().expose_secret().to_string()
                };
                let client = self.client.clone();
                let base_url = self.base_url.clone();
                let body = body.clone();
                let backend = backend.clone();
                async move {
                    tracing::debug!(backend = %backend, attempt, "Cloud request");
                    send_once(client, base_url, backend, key, body).await
                }
            },
            || self.pool.lock().expect("pool lock poisoned").rotate(),
        )
        .await
    }

    fn to_contents(messages: &[ChatMessage]) -> (Option<String>, Value) {
        let mut system = Vec::new();
        let mut contents = Vec::new();
        for message in messages {
            match message.role {
                Role::System => system.push(message.content.clone()),
                Role::User => contents.push(json!({
                    "role": "user",
                    "parts": [{ "text": message.content }],
                })),
                Role::Assistant => contents.push(json!({
                    "role": "model",
                    "parts": [{ "text": message.content }],
                })),
            }
        }
        let system = if system.is_empty() {
            None
        } else {
            Some(system.join("\n"))
        };
        (system, Value::Array(contents))
    }
}

#[async_trait]
impl LlmProvider for CloudProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let (system, contents) = Self::to_contents(messages);
        let mut body = json!({ "contents": contents });
        if let Some(system) = system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        let model = self.model.clone();
        self.request(&model, body).await
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let model = self.model.clone();
        self.generate_with_model(&model, prompt).await
    }
}

/// Perform one `generateContent` call with a single credential.
async fn send_once(
    client: reqwest::Client,
    base_url: String,
    model: String,
    key: String,
    body: Value,
) -> Result<String, LlmError> {
    let url = format!("{base_url}/models/{model}:generateContent?key={key}");
    let response = client.post(&url).json(&body).send().await?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited { backend: model });
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(LlmError::AuthFailed { backend: model });
    }
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        // Some deployments report quota exhaustion as a 400 with a
        // RESOURCE_EXHAUSTED status in the body.
        if text.contains("RESOURCE_EXHAUSTED") || text.to_lowercase().contains("quota") {
            return Err(LlmError::RateLimited { backend: model });
        }
        return Err(LlmError::RequestFailed {
            backend: model,
            reason: format!("HTTP {status}: {text}"),
        });
    }

    let parsed: Value = response.json().await.map_err(|e| LlmError::InvalidResponse {
        backend: model.clone(),
        reason: e.to_string(),
    })?;
    parsed["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| LlmError::InvalidResponse {
            backend: model,
            reason: "no candidate text in response".to_string(),
        })
}

/// Drive an attempt/rotate cycle against a credential pool of size
/// `pool_size`.
///
/// Rate-limit failures rotate and retry; when rotation reports that no
/// rotation occurred (single-credential pool) or every credential has been
/// tried, the caller observes `CredentialsExhausted`. Any non-quota error
/// propagates immediately, rotation cannot fix it.
async fn rotate_on_quota<T, F, Fut, R>(
    pool_size: usize,
    backend: &str,
    mut attempt: F,
    mut rotate: R,
) -> Result<T, LlmError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
    R: FnMut() -> bool,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt(attempts).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() => {
                tracing::warn!(backend = %backend, attempts, "Rate limited");
                let rotated = rotate();
                if !rotated || attempts >= pool_size {
                    return Err(LlmError::CredentialsExhausted {
                        backend: backend.to_string(),
                        attempts,
                    });
                }
            }
            Err(err) => return Err(err),
        }
    }
}
