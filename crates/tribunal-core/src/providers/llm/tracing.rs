use crate::errors::RequestError;
use crate::model::{ChatRequest, LlmResponse};
use crate::providers::llm::LlmClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// Wraps a client in a `gen_ai.client.request` span. Prompt text is never
/// recorded; only sizes, usage and the error message.
pub struct TracingLlmClient {
    inner: Arc<dyn LlmClient>,
}

impl TracingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LlmClient for TracingLlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, RequestError> {
        let span = info_span!(
            "gen_ai.client.request",
            "gen_ai.system" = self.inner.provider_name(),
            "gen_ai.request.model" = request.model.as_str(),
            "gen_ai.request.temperature" = tracing::field::Empty,
            "tribunal.json_mode" = request.json_mode,
            "tribunal.messages" = request.messages.len(),
            "gen_ai.response.model" = tracing::field::Empty,
            "gen_ai.usage.input_tokens" = tracing::field::Empty,
            "gen_ai.usage.output_tokens" = tracing::field::Empty,
            "tribunal.cost" = tracing::field::Empty,
            "error" = tracing::field::Empty,
            "error.message" = tracing::field::Empty
        );
        if let Some(t) = request.temperature {
            span.record("gen_ai.request.temperature", t);
        }

        let result = self
            .inner
            .complete(request)
            .instrument(span.clone())
            .await;

        match &result {
            Ok(resp) => {
                span.record("gen_ai.response.model", resp.model.as_str());
                if let Some(usage) = resp.usage {
                    if let Some(n) = usage.prompt_tokens {
                        span.record("gen_ai.usage.input_tokens", n);
                    }
                    if let Some(n) = usage.completion_tokens {
                        span.record("gen_ai.usage.output_tokens", n);
                    }
                }
                if let Some(cost) = resp.cost {
                    span.record("tribunal.cost", cost);
                }
                tracing::debug!(parent: &span, chars = resp.text.len(), "completion received");
            }
            Err(e) => {
                span.record("error", true);
                span.record("error.message", e.message.as_str());
            }
        }

        result
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}
