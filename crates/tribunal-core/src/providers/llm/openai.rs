use super::LlmClient;
use crate::errors::RequestError;
use crate::model::{ChatRequest, LlmResponse, TokenUsage};
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const PROVIDER: &str = "openai";

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIClient {
    pub base_url: String,
    pub api_key: String,
    pub client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), api_key)
    }

    pub fn with_base_url(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Key from `TRIBUNAL_API_KEY` (falling back to `OPENAI_API_KEY`), endpoint
    /// from `TRIBUNAL_BASE_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("TRIBUNAL_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| anyhow::anyhow!("neither TRIBUNAL_API_KEY nor OPENAI_API_KEY is set"))?;
        let base_url =
            std::env::var("TRIBUNAL_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::with_base_url(base_url, api_key))
    }

    fn body(request: &ChatRequest) -> serde_json::Value {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
        });
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        for (key, value) in &request.extra {
            body[key.as_str()] = value.clone();
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, RequestError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::body(request);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RequestError::transport(PROVIDER, e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RequestError::transport(PROVIDER, e))?;

        if !status.is_success() {
            return Err(RequestError::status(PROVIDER, status.as_u16(), &text));
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| RequestError::malformed_body(PROVIDER, e))?;

        // choices[0].message.content
        let content = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RequestError::missing_content(PROVIDER))?
            .to_string();

        let usage = json.get("usage").map(|u| TokenUsage {
            prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()),
            completion_tokens: u.get("completion_tokens").and_then(|v| v.as_u64()),
        });
        let cost = json.pointer("/usage/cost").and_then(|v| v.as_f64());

        Ok(LlmResponse {
            text: content,
            provider: PROVIDER.to_string(),
            model: json
                .get("model")
                .and_then(|v| v.as_str())
                .unwrap_or(request.model.as_str())
                .to_string(),
            usage,
            cost,
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
