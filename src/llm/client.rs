//! Issues one chat-completion request at a time, returning the response body
//! and headers verbatim. No retry policy lives here — that is the router's
//! job.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::llm::types::{effective_reasoning_effort, effective_service_tier, ChatMessage, LlmParams};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(30);

/// A single chat-completion response: the generated text and the response's
/// headers, lowercased by key.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub headers: HashMap<String, String>,
}

/// The only two operations the router needs from a chat-completion backend.
/// Implementations never retry; every retry/backoff/fallback decision is the
/// router's.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>>;
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &LlmParams,
    ) -> Result<ChatResponse>;
}

/// An OpenAI-compatible (Groq-style) backend client built directly on
/// `reqwest`, rather than a provider SDK, so response headers stay readable.
pub struct HttpBackendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpBackendClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(Error::Transport)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn headers_map(resp: &reqwest::Response) -> HashMap<String, String> {
        resp.headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Deserialize, Default)]
struct ErrorDetail {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

async fn classify_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
    let headers = HttpBackendClient::headers_map(&resp);
    let body_text = resp.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body_text).unwrap_or_default();
    let message = parsed
        .error
        .message
        .unwrap_or_else(|| body_text.chars().take(500).collect());

    Error::Backend {
        status: status.as_u16(),
        message,
        error_type: parsed.error.error_type,
        headers,
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        let resp = tokio::time::timeout(
            LIST_MODELS_TIMEOUT,
            self.http
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send(),
        )
        .await
        .map_err(|_| Error::Other("list_models timed out".to_string()))?
        .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_error(status, resp).await);
        }

        let parsed: ModelsResponse = resp.json().await.map_err(Error::Transport)?;
        Ok(parsed.data.into_iter().filter_map(|m| m.id).collect())
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &LlmParams,
    ) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut body = json!({
            "model": model,
            "messages": messages,
            "temperature": params.temperature,
            "top_p": params.top_p,
            "max_completion_tokens": params.max_completion_tokens,
            "stream": false,
        });

        if let Some(tier) = effective_service_tier(params.service_tier.as_deref()) {
            body["service_tier"] = json!(tier);
        }
        if let Some(effort) = effective_reasoning_effort(model, params.reasoning_effort.as_deref()) {
            body["reasoning_effort"] = json!(effort);
        }

        let resp = tokio::time::timeout(
            REQUEST_TIMEOUT,
            self.http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| Error::Other("chat completion request timed out".to_string()))?
        .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_error(status, resp).await);
        }

        let headers = Self::headers_map(&resp);
        let parsed: ChatCompletionResponse = resp.json().await.map_err(Error::Transport)?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(ChatResponse { text, headers })
    }
}
