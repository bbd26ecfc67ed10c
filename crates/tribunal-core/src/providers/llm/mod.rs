pub mod fake;
pub mod openai;
pub mod tracing;

use crate::errors::RequestError;
use crate::model::{ChatRequest, LlmResponse};
use async_trait::async_trait;

/// A chat-completion endpoint. Implementations fail only for transport or
/// protocol reasons; judging what came back is the caller's business.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, RequestError>;

    fn provider_name(&self) -> &'static str;
}
