//! Append-only record of one run: the evaluation log, the nested response
//! table, and per-candidate timing. Aggregation views live in [`aggregate`].

pub mod aggregate;

use crate::candidate::CandidateResponse;
use crate::model::{temperature_label, Evaluation, TokenUsage};
use crate::variants::Variant;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One evaluation plus the combination it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub candidate: String,
    pub scenario: String,
    pub variant: String,
    /// Nominal temperature of the combination; `None` is the provider default.
    pub temperature: Option<f64>,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub content: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Temperature actually sent after provider normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_temperature: Option<f64>,
    pub variant: Variant,
}

/// candidate -> scenario -> variant -> temperature label -> response.
pub type ResponseTable =
    BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, ResponseRecord>>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingBucket {
    pub total_ms: u64,
    pub responses: u64,
}

impl TimingBucket {
    pub fn average_ms(&self) -> f64 {
        if self.responses == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.responses as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateTiming {
    /// Keyed by `"{scenario}/{variant}"`.
    pub by_key: BTreeMap<String, TimingBucket>,
    pub total_ms: u64,
    pub responses: u64,
    /// Sum of positive costs only.
    pub total_cost: f64,
}

pub fn timing_key(scenario: &str, variant: &str) -> String {
    format!("{}/{}", scenario, variant)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultStore {
    evaluations: Vec<EvaluationRecord>,
    responses: ResponseTable,
    timings: BTreeMap<String, CandidateTiming>,
    finished: bool,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_response(
        &mut self,
        candidate: &str,
        scenario: &str,
        variant: &Variant,
        temperature: Option<f64>,
        response: &CandidateResponse,
    ) {
        let record = ResponseRecord {
            content: response.content.clone(),
            duration_ms: response.duration_ms,
            cost: response.cost,
            usage: response.usage,
            sent_temperature: response.temperature,
            variant: variant.clone(),
        };
        self.responses
            .entry(candidate.to_string())
            .or_default()
            .entry(scenario.to_string())
            .or_default()
            .entry(variant.name.clone())
            .or_default()
            .insert(temperature_label(temperature), record);

        let timing = self.timings.entry(candidate.to_string()).or_default();
        let bucket = timing
            .by_key
            .entry(timing_key(scenario, &variant.name))
            .or_default();
        bucket.total_ms += response.duration_ms;
        bucket.responses += 1;
        timing.total_ms += response.duration_ms;
        timing.responses += 1;
        if let Some(cost) = response.cost.filter(|c| *c > 0.0) {
            timing.total_cost += cost;
        }
    }

    pub fn record_evaluation(
        &mut self,
        candidate: &str,
        scenario: &str,
        variant: &str,
        temperature: Option<f64>,
        evaluation: Evaluation,
    ) {
        self.evaluations.push(EvaluationRecord {
            candidate: candidate.to_string(),
            scenario: scenario.to_string(),
            variant: variant.to_string(),
            temperature,
            evaluation,
        });
    }

    /// Marks the store as complete; readers treat it as frozen from here on.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn evaluations(&self) -> &[EvaluationRecord] {
        &self.evaluations
    }

    pub fn responses(&self) -> &ResponseTable {
        &self.responses
    }

    pub fn response(
        &self,
        candidate: &str,
        scenario: &str,
        variant: &str,
        temperature: Option<f64>,
    ) -> Option<&ResponseRecord> {
        self.responses
            .get(candidate)?
            .get(scenario)?
            .get(variant)?
            .get(&temperature_label(temperature))
    }

    pub fn response_count(&self) -> usize {
        self.responses
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    pub fn timings(&self) -> &BTreeMap<String, CandidateTiming> {
        &self.timings
    }
}
