use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowest and highest temperature any provider accepts.
pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Providers in the Anthropic family reject temperatures above 1.0.
const CAPPED_TEMPERATURE: f64 = 1.0;

pub const DEFAULT_THRESHOLD: f64 = 7.0;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// One chat-completion call as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// `None` leaves the provider default in place.
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Ask the endpoint to constrain output to a single JSON object.
    pub json_mode: bool,
    /// Provider-specific fields merged into the request body.
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    /// Upper temperature bound; inferred from the model id when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Passed through verbatim into the request body.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A configured target model under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub options: ProviderOptions,
}

impl Candidate {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            system_prompt: None,
            options: ProviderOptions::default(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    /// Explicit cap if it is a number, otherwise inferred from the model id.
    pub fn max_temperature(&self) -> f64 {
        if let Some(max) = self.options.max_temperature.filter(|m| !m.is_nan()) {
            return max.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
        }
        let model = self.model.to_ascii_lowercase();
        if model.starts_with("anthropic/") || model.contains("claude") {
            CAPPED_TEMPERATURE
        } else {
            MAX_TEMPERATURE
        }
    }

    /// Clamp into this candidate's valid range. `None` stays `None`.
    pub fn normalize_temperature(&self, temperature: Option<f64>) -> Option<f64> {
        temperature.map(|t| t.clamp(MIN_TEMPERATURE, self.max_temperature()))
    }
}

/// A prompt every candidate answers, plus the criteria the judge applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Fully resolved: inline criteria followed by rubric criteria.
    pub criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl Scenario {
    /// Criteria as the single composite string recorded on evaluations.
    pub fn criterion_text(&self) -> String {
        join_criteria(&self.criteria)
    }
}

pub fn join_criteria(criteria: &[String]) -> String {
    criteria.join("; ")
}

/// Three-state winner marker. Absence (`None` on [`Evaluation::winner`]) means
/// "not marked", which is distinct from losing a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerMark {
    Won,
    Tie,
}

impl Serialize for WinnerMark {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            WinnerMark::Won => s.serialize_bool(true),
            WinnerMark::Tie => s.serialize_str("tie"),
        }
    }
}

impl<'de> Deserialize<'de> for WinnerMark {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(d)? {
            serde_json::Value::Bool(true) => Ok(WinnerMark::Won),
            serde_json::Value::String(s) if s == "tie" => Ok(WinnerMark::Tie),
            other => Err(serde::de::Error::custom(format!(
                "winner must be true or \"tie\", got: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub criterion: String,
    /// Always within [0, 10].
    pub score: f64,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<WinnerMark>,
}

impl Evaluation {
    pub fn scored(
        criterion: impl Into<String>,
        raw_score: f64,
        reasoning: Option<String>,
        threshold: f64,
    ) -> Self {
        let score = clamp_score(raw_score);
        Self {
            criterion: criterion.into(),
            score,
            passed: score >= threshold,
            reasoning,
            error: None,
            winner: None,
        }
    }

    /// Zero-score, failing record carrying a diagnostic.
    pub fn failed(criterion: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            criterion: criterion.into(),
            score: MIN_SCORE,
            passed: false,
            reasoning: None,
            error: Some(error.into()),
            winner: None,
        }
    }

    pub fn with_winner(mut self, winner: WinnerMark) -> Self {
        self.winner = Some(winner);
        self
    }
}

pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return MIN_SCORE;
    }
    raw.clamp(MIN_SCORE, MAX_SCORE)
}

/// Grouping label for a nominal temperature; the unset sentinel is its own group.
pub fn temperature_label(temperature: Option<f64>) -> String {
    match temperature {
        Some(t) => format!("{}", t),
        None => "default".to_string(),
    }
}
