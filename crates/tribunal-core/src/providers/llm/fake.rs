use super::LlmClient;
use crate::errors::{RequestError, RequestErrorKind};
use crate::judge::WINNER_KEY;
use crate::model::{ChatRequest, LlmResponse};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum FakeReply {
    Text(String),
    Fail(String),
}

/// Offline client. Per-model scripts are consumed first, then a sticky reply
/// for the model, then a generic default.
#[derive(Debug, Default)]
pub struct FakeClient {
    scripts: Mutex<HashMap<String, VecDeque<FakeReply>>>,
    sticky: HashMap<String, FakeReply>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, model: impl Into<String>, text: impl Into<String>) -> Self {
        self.sticky
            .insert(model.into(), FakeReply::Text(text.into()));
        self
    }

    pub fn with_failure(mut self, model: impl Into<String>, message: impl Into<String>) -> Self {
        self.sticky
            .insert(model.into(), FakeReply::Fail(message.into()));
        self
    }

    pub fn with_script<I>(self, model: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = FakeReply>,
    {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts
                .entry(model.into())
                .or_default()
                .extend(replies);
        }
        self
    }

    /// Every request seen so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, request: &ChatRequest) -> FakeReply {
        if let Ok(mut scripts) = self.scripts.lock() {
            if let Some(reply) = scripts
                .get_mut(&request.model)
                .and_then(VecDeque::pop_front)
            {
                return reply;
            }
        }
        if let Some(reply) = self.sticky.get(&request.model) {
            return reply.clone();
        }
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");
        if request.json_mode {
            return FakeReply::Text(judge_reply(last_user));
        }
        FakeReply::Text(format!("[{}] {}", request.model, last_user))
    }
}

/// Default judge output. Comparative prompts get one entry per compared
/// candidate and name the first as winner.
fn judge_reply(prompt: &str) -> String {
    let names = compared_names(prompt);
    if names.is_empty() {
        return r#"{"score": 7, "reasoning": "fake judge"}"#.to_string();
    }
    let mut reply = serde_json::Map::new();
    for name in &names {
        reply.insert(
            name.clone(),
            serde_json::json!({"score": 7, "reasoning": "fake judge"}),
        );
    }
    reply.insert(WINNER_KEY.to_string(), serde_json::Value::String(names[0].clone()));
    serde_json::Value::Object(reply).to_string()
}

fn compared_names(prompt: &str) -> Vec<String> {
    prompt
        .lines()
        .filter_map(|line| line.strip_prefix("### Response from "))
        .filter_map(|rest| rest.strip_suffix(':'))
        .filter_map(|quoted| serde_json::from_str::<String>(quoted).ok())
        .collect()
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, RequestError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        match self.next_reply(request) {
            FakeReply::Text(text) => Ok(LlmResponse {
                text,
                provider: "fake".to_string(),
                model: request.model.clone(),
                usage: None,
                cost: None,
            }),
            FakeReply::Fail(message) => Err(RequestError::new(RequestErrorKind::Transport, message)
                .with_provider("fake")),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
