//! Read-side projections over the evaluation log. Groups appear in the order
//! their key was first seen in the log.

use super::{timing_key, EvaluationRecord, ResultStore};
use crate::model::{temperature_label, WinnerMark};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub count: usize,
    pub passed: usize,
    /// Percent, one decimal.
    pub pass_rate: f64,
    /// Two decimals.
    pub mean_score: f64,
    pub wins: usize,
    pub ties: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureSummary {
    /// `"default"` for the provider-default group.
    pub temperature: String,
    pub count: usize,
    pub mean_score: f64,
    pub pass_rate: f64,
}

/// Raw facts for one candidate in one combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationResult {
    pub candidate: String,
    pub variant: String,
    pub temperature: Option<f64>,
    pub score: f64,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<WinnerMark>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioBreakdown {
    pub scenario: String,
    pub results: Vec<CombinationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioVariantCell {
    pub scenario: String,
    pub variant: String,
    pub results: Vec<CombinationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingSummary {
    pub candidate: String,
    pub responses: u64,
    pub average_ms: f64,
    pub total_cost: f64,
    /// Average milliseconds per `"{scenario}/{variant}"` key.
    pub by_key: BTreeMap<String, f64>,
}

/// Every view at once, for machine-readable output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub by_candidate: Vec<GroupSummary>,
    pub by_variant: Vec<GroupSummary>,
    pub by_temperature: Vec<TemperatureSummary>,
    pub by_scenario: Vec<ScenarioBreakdown>,
    pub scenario_variant: Vec<ScenarioVariantCell>,
    pub timing: Vec<TimingSummary>,
}

#[derive(Default)]
struct Tally {
    count: usize,
    passed: usize,
    score_sum: f64,
    wins: usize,
    ties: usize,
}

impl Tally {
    fn add(&mut self, record: &EvaluationRecord) {
        let eval = &record.evaluation;
        self.count += 1;
        self.score_sum += eval.score;
        if eval.passed {
            self.passed += 1;
        }
        match eval.winner {
            Some(WinnerMark::Won) => self.wins += 1,
            Some(WinnerMark::Tie) => self.ties += 1,
            None => {}
        }
    }

    fn pass_rate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        round_to(self.passed as f64 * 100.0 / self.count as f64, 1)
    }

    fn mean_score(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        round_to(self.score_sum / self.count as f64, 2)
    }

    fn into_summary(self, name: String) -> GroupSummary {
        GroupSummary {
            pass_rate: self.pass_rate(),
            mean_score: self.mean_score(),
            name,
            count: self.count,
            passed: self.passed,
            wins: self.wins,
            ties: self.ties,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Group records by `key`, keeping first-seen key order.
fn group_ordered<'a, K, T, F, A>(records: &'a [EvaluationRecord], key: F, mut add: A) -> Vec<(K, T)>
where
    K: Eq + std::hash::Hash + Clone,
    T: Default,
    F: Fn(&'a EvaluationRecord) -> K,
    A: FnMut(&mut T, &'a EvaluationRecord),
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, T)> = Vec::new();
    for record in records {
        let k = key(record);
        let slot = *index.entry(k.clone()).or_insert_with(|| {
            groups.push((k, T::default()));
            groups.len() - 1
        });
        add(&mut groups[slot].1, record);
    }
    groups
}

fn combination_result(record: &EvaluationRecord) -> CombinationResult {
    let eval = &record.evaluation;
    CombinationResult {
        candidate: record.candidate.clone(),
        variant: record.variant.clone(),
        temperature: record.temperature,
        score: eval.score,
        passed: eval.passed,
        reasoning: eval.reasoning.clone(),
        error: eval.error.clone(),
        winner: eval.winner,
    }
}

impl ResultStore {
    pub fn by_candidate(&self) -> Vec<GroupSummary> {
        group_ordered(self.evaluations(), |r| r.candidate.as_str(), Tally::add)
            .into_iter()
            .map(|(name, tally)| tally.into_summary(name.to_string()))
            .collect()
    }

    pub fn by_variant(&self) -> Vec<GroupSummary> {
        group_ordered(self.evaluations(), |r| r.variant.as_str(), Tally::add)
            .into_iter()
            .map(|(name, tally)| tally.into_summary(name.to_string()))
            .collect()
    }

    pub fn by_temperature(&self) -> Vec<TemperatureSummary> {
        group_ordered(
            self.evaluations(),
            |r| temperature_label(r.temperature),
            Tally::add,
        )
        .into_iter()
        .map(|(label, tally)| TemperatureSummary {
            temperature: label,
            count: tally.count,
            mean_score: tally.mean_score(),
            pass_rate: tally.pass_rate(),
        })
        .collect()
    }

    pub fn by_scenario(&self) -> Vec<ScenarioBreakdown> {
        group_ordered(
            self.evaluations(),
            |r| r.scenario.as_str(),
            |acc: &mut Vec<CombinationResult>, r| acc.push(combination_result(r)),
        )
        .into_iter()
        .map(|(scenario, results)| ScenarioBreakdown {
            scenario: scenario.to_string(),
            results,
        })
        .collect()
    }

    pub fn scenario_variant(&self) -> Vec<ScenarioVariantCell> {
        group_ordered(
            self.evaluations(),
            |r| (r.scenario.as_str(), r.variant.as_str()),
            |acc: &mut Vec<CombinationResult>, r| acc.push(combination_result(r)),
        )
        .into_iter()
        .map(|((scenario, variant), results)| ScenarioVariantCell {
            scenario: scenario.to_string(),
            variant: variant.to_string(),
            results,
        })
        .collect()
    }

    pub fn timing(&self) -> Vec<TimingSummary> {
        self.timings()
            .iter()
            .map(|(candidate, t)| TimingSummary {
                candidate: candidate.clone(),
                responses: t.responses,
                average_ms: if t.responses == 0 {
                    0.0
                } else {
                    round_to(t.total_ms as f64 / t.responses as f64, 2)
                },
                total_cost: t.total_cost,
                by_key: t
                    .by_key
                    .iter()
                    .map(|(k, b)| (k.clone(), round_to(b.average_ms(), 2)))
                    .collect(),
            })
            .collect()
    }

    /// Average response time for one candidate on one (scenario, variant).
    pub fn average_ms(&self, candidate: &str, scenario: &str, variant: &str) -> Option<f64> {
        self.timings()
            .get(candidate)?
            .by_key
            .get(&timing_key(scenario, variant))
            .map(|b| b.average_ms())
    }

    pub fn report(&self) -> AggregateReport {
        AggregateReport {
            by_candidate: self.by_candidate(),
            by_variant: self.by_variant(),
            by_temperature: self.by_temperature(),
            by_scenario: self.by_scenario(),
            scenario_variant: self.scenario_variant(),
            timing: self.timing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Evaluation;

    fn eval(score: f64, winner: Option<WinnerMark>) -> Evaluation {
        let e = Evaluation::scored("c", score, None, 7.0);
        match winner {
            Some(w) => e.with_winner(w),
            None => e,
        }
    }

    fn store() -> ResultStore {
        let mut s = ResultStore::new();
        s.record_evaluation("b", "s1", "default", None, eval(9.0, Some(WinnerMark::Won)));
        s.record_evaluation("a", "s1", "default", None, eval(5.0, None));
        s.record_evaluation("b", "s1", "terse", Some(0.2), eval(7.0, Some(WinnerMark::Tie)));
        s.record_evaluation("a", "s1", "terse", Some(0.2), eval(7.0, Some(WinnerMark::Tie)));
        s.record_evaluation("a", "s2", "default", None, Evaluation::failed("c", "boom"));
        s
    }

    #[test]
    fn by_candidate_counts_wins_and_ties_in_first_seen_order() {
        let view = store().by_candidate();
        assert_eq!(view[0].name, "b");
        assert_eq!(view[0].count, 2);
        assert_eq!(view[0].passed, 2);
        assert_eq!(view[0].pass_rate, 100.0);
        assert_eq!(view[0].mean_score, 8.0);
        assert_eq!((view[0].wins, view[0].ties), (1, 1));

        assert_eq!(view[1].name, "a");
        assert_eq!(view[1].count, 3);
        assert_eq!(view[1].passed, 1);
        assert_eq!(view[1].pass_rate, 33.3);
        assert_eq!(view[1].mean_score, 4.0);
        assert_eq!((view[1].wins, view[1].ties), (0, 1));
    }

    #[test]
    fn by_variant_and_temperature_include_default_group() {
        let s = store();
        let variants = s.by_variant();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].name, "default");
        assert_eq!(variants[0].count, 3);

        let temps = s.by_temperature();
        assert_eq!(temps[0].temperature, "default");
        assert_eq!(temps[0].count, 3);
        assert_eq!(temps[1].temperature, "0.2");
        assert_eq!(temps[1].mean_score, 7.0);
        assert_eq!(temps[1].pass_rate, 100.0);
    }

    #[test]
    fn scenario_views_keep_raw_facts() {
        let s = store();
        let scenarios = s.by_scenario();
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].results.len(), 4);
        assert_eq!(scenarios[1].results[0].error.as_deref(), Some("boom"));

        let cells = s.scenario_variant();
        assert_eq!(cells.len(), 3);
        assert_eq!((cells[1].scenario.as_str(), cells[1].variant.as_str()), ("s1", "terse"));
        assert!(cells[1]
            .results
            .iter()
            .all(|r| r.winner == Some(WinnerMark::Tie)));
    }

    #[test]
    fn empty_store_has_empty_views() {
        let report = ResultStore::new().report();
        assert!(report.by_candidate.is_empty());
        assert!(report.timing.is_empty());
    }
}
