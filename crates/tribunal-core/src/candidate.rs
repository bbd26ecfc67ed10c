use crate::errors::RequestError;
use crate::model::{Candidate, ChatMessage, ChatRequest, TokenUsage};
use crate::providers::llm::LlmClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// What a candidate is asked for one combination.
#[derive(Debug, Clone, Copy)]
pub struct Generation<'a> {
    pub prompt: &'a str,
    pub system_prompt: Option<&'a str>,
    /// Nominal value; normalized into the candidate's range before sending.
    pub temperature: Option<f64>,
    pub history: &'a [ChatMessage],
}

impl<'a> Generation<'a> {
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            system_prompt: None,
            temperature: None,
            history: &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub content: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Temperature actually sent, after normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Clone)]
pub struct CandidateClient {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl CandidateClient {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn request_for(candidate: &Candidate, generation: &Generation<'_>) -> ChatRequest {
        let mut messages = Vec::with_capacity(generation.history.len() + 2);
        if let Some(system) = generation.system_prompt {
            messages.push(ChatMessage::system(system));
        }
        messages.extend(generation.history.iter().cloned());
        messages.push(ChatMessage::user(generation.prompt));

        ChatRequest {
            model: candidate.model.clone(),
            messages,
            temperature: candidate.normalize_temperature(generation.temperature),
            max_tokens: candidate.options.max_tokens,
            json_mode: false,
            extra: candidate.options.extra.clone(),
        }
    }

    pub async fn generate(
        &self,
        candidate: &Candidate,
        generation: &Generation<'_>,
    ) -> Result<CandidateResponse, RequestError> {
        let request = Self::request_for(candidate, generation);
        let started = Instant::now();
        let resp = timeout(self.timeout, self.client.complete(&request))
            .await
            .map_err(|_| {
                RequestError::timeout(self.client.provider_name(), self.timeout.as_secs())
            })??;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(CandidateResponse {
            content: resp.text,
            duration_ms,
            cost: resp.cost,
            usage: resp.usage,
            temperature: request.temperature,
        })
    }
}
