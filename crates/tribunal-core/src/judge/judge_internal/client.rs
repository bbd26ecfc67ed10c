use crate::errors::RequestError;
use crate::judge::JudgeService;
use crate::model::{ChatMessage, ChatRequest};

/// Characters of raw judge output kept in parse-failure diagnostics.
pub(crate) const RAW_EXCERPT_CHARS: usize = 200;

pub(crate) async fn call_judge_impl(svc: &JudgeService, prompt: &str) -> Result<String, RequestError> {
    let request = ChatRequest {
        model: svc.config.model.clone(),
        messages: vec![
            ChatMessage::system(super::prompt::system_prompt(svc.config.hijack_defense)),
            ChatMessage::user(prompt),
        ],
        temperature: svc.config.temperature,
        max_tokens: svc.config.max_tokens,
        json_mode: true,
        extra: Default::default(),
    };

    let resp = tokio::time::timeout(svc.timeout, svc.client.complete(&request))
        .await
        .map_err(|_| RequestError::timeout(svc.client.provider_name(), svc.timeout.as_secs()))??;
    Ok(resp.text)
}

/// First JSON value starting at the first `{`; tolerates prose or code fences around it.
pub(crate) fn extract_json_impl(text: &str) -> Result<serde_json::Value, String> {
    let text = text.trim();
    let start = text
        .find('{')
        .ok_or_else(|| "no JSON object found in judge output".to_string())?;
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<serde_json::Value>()
        .next()
        .ok_or_else(|| "no JSON object found in judge output".to_string())?
        .map_err(|e| format!("invalid JSON: {}", e))
}

/// `{"score": number, "reasoning": string?}` -> raw score and reasoning.
pub(crate) fn parse_scored_impl(value: &serde_json::Value) -> Result<(f64, Option<String>), String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;
    let score = obj
        .get("score")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| "judge JSON missing numeric 'score' field".to_string())?;
    let reasoning = obj
        .get("reasoning")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Ok((score, reasoning))
}

pub(crate) fn excerpt_impl(raw: &str) -> String {
    let mut out: String = raw.chars().take(RAW_EXCERPT_CHARS).collect();
    if raw.chars().count() > RAW_EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}

pub(crate) fn parse_failure_message(detail: &str, raw: &str) -> String {
    format!(
        "Failed to parse judge response: {}. Raw: {}",
        detail,
        excerpt_impl(raw)
    )
}
