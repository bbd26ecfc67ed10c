//! Judge: scores one response, or ranks several against each other.
//!
//! Every failure degrades into zero-score evaluations; nothing here returns
//! a transport error to the caller.

mod judge_internal;

use crate::candidate::DEFAULT_REQUEST_TIMEOUT;
use crate::errors::ConfigError;
use crate::model::{join_criteria, Evaluation, DEFAULT_THRESHOLD};
use crate::providers::llm::LlmClient;
use crate::rubric::RubricRegistry;
use crate::suite::{validate_temperature, validate_threshold};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Literal the judge returns when no response is clearly better.
pub const TIE: &str = "tie";

/// Key of the comparative reply that names the winner.
pub const WINNER_KEY: &str = "winner";

/// Candidate names that would collide with the comparative reply shape.
pub fn is_reserved_name(name: &str) -> bool {
    name == WINNER_KEY || name.trim().eq_ignore_ascii_case(TIE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Pass mark when a call does not override it.
    pub threshold: f64,
    /// Instruct the judge to treat candidate text as data, not instructions.
    pub hijack_defense: bool,
}

impl JudgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.temperature {
            validate_temperature(t)?;
        }
        validate_threshold(self.threshold)
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: Some(0.0),
            max_tokens: None,
            threshold: DEFAULT_THRESHOLD,
            hijack_defense: true,
        }
    }
}

#[derive(Clone)]
pub struct JudgeService {
    config: JudgeConfig,
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl JudgeService {
    pub fn new(config: JudgeConfig, client: Arc<dyn LlmClient>) -> Self {
        Self {
            config,
            client,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    fn effective_threshold(&self, threshold: Option<f64>) -> f64 {
        threshold.unwrap_or(self.config.threshold)
    }

    /// Score a single response against one (possibly composite) criterion.
    pub async fn evaluate(
        &self,
        response: &str,
        criterion: &str,
        context: Option<&str>,
        threshold: Option<f64>,
    ) -> Evaluation {
        judge_internal::run::evaluate_impl(
            self,
            response,
            criterion,
            context,
            self.effective_threshold(threshold),
        )
        .await
    }

    /// Score and rank several responses in one call. The result always holds
    /// exactly one evaluation per name in `responses`.
    pub async fn evaluate_comparison(
        &self,
        responses: &[(String, String)],
        criteria: &[String],
        context: Option<&str>,
        threshold: Option<f64>,
    ) -> BTreeMap<String, Evaluation> {
        judge_internal::run::evaluate_comparison_impl(
            self,
            responses,
            criteria,
            context,
            self.effective_threshold(threshold),
        )
        .await
    }

    /// Joins the rubric's criteria and delegates to [`JudgeService::evaluate`].
    pub async fn evaluate_rubric(
        &self,
        response: &str,
        registry: &RubricRegistry,
        rubric: &str,
        context: Option<&str>,
        threshold: Option<f64>,
    ) -> Result<Evaluation, ConfigError> {
        let criteria = registry.resolve(rubric)?;
        let criterion = join_criteria(criteria);
        Ok(self.evaluate(response, &criterion, context, threshold).await)
    }
}
