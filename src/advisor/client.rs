//! HTTP client for the OpenAI-compatible completion endpoint.

use serde::Deserialize;
use serde_json::json;

use super::AdvisorError;
use crate::config::AdvisorConfig;

/// Client for a chat-completions endpoint. One request per recommendation,
/// non-streaming.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_tokens: usize,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl CompletionClient {
    /// Build a client from advisor config, resolving the API key reference.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self, AdvisorError> {
        let api_key = config
            .api_key
            .resolve()
            .map_err(|e| AdvisorError::Request(e.to_string()))?;
        Ok(Self {
            base_url: normalize_base_url(&config.api_url),
            model: config.api_model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            http: reqwest::Client::new(),
        })
    }

    /// Override the endpoint base URL. Used by tests to point at a mock
    /// server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    /// Send a single-turn user prompt and return the raw completion text.
    pub async fn complete(&self, prompt: &str) -> Result<String, AdvisorError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AdvisorError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdvisorError::Provider(format!(
                "completion endpoint returned {status}: {detail}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Provider(format!("invalid completion body: {e}")))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AdvisorError::Provider("completion has no choices".to_owned()))?;
        Ok(choice.message.content)
    }
}

/// Strip a trailing slash and a trailing `/v1` so configured URLs like
/// `https://api.openai.com/v1/` and `https://api.openai.com` behave the same.
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    trimmed.strip_suffix("/v1").unwrap_or(trimmed).to_owned()
}
