use crate::candidate::{CandidateClient, CandidateResponse, Generation, DEFAULT_REQUEST_TIMEOUT};
use crate::errors::{ConfigError, RequestError};
use crate::judge::JudgeService;
use crate::model::{Candidate, Evaluation, Scenario, WinnerMark};
use crate::report::progress::{RunEvent, RunObserver};
use crate::results::ResultStore;
use crate::suite::SuiteDefinition;
use crate::variants::{Variant, VariantGenerator};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RunPolicy {
    /// Contact every candidate of a combination concurrently before judging.
    pub parallel_generation: bool,
    /// Per request, for candidates and the judge alike.
    pub timeout: Duration,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            parallel_generation: false,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Iterating,
    Finished,
}

/// Expanded matrix, computed without any network activity.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub variants: Vec<Variant>,
    pub combinations: usize,
}

impl RunPlan {
    pub fn build(generator: &VariantGenerator, suite: &SuiteDefinition) -> Result<Self, ConfigError> {
        let variants = generator.build_variants(suite.variants())?;
        let combinations = suite.scenarios().len() * variants.len() * suite.temperatures().len();
        Ok(Self {
            variants,
            combinations,
        })
    }
}

/// One (scenario, variant, temperature) triple.
struct Combination<'a> {
    index: usize,
    total: usize,
    scenario: &'a Scenario,
    variant: &'a Variant,
    prompt: &'a str,
    temperature: Option<f64>,
}

pub struct Runner {
    pub candidates: CandidateClient,
    pub judge: JudgeService,
    pub variants: VariantGenerator,
    pub policy: RunPolicy,
    observer: Option<RunObserver>,
    state: Mutex<RunState>,
}

impl Runner {
    pub fn new(candidates: CandidateClient, judge: JudgeService) -> Self {
        Self {
            candidates,
            judge,
            variants: VariantGenerator::new(),
            policy: RunPolicy::default(),
            observer: None,
            state: Mutex::new(RunState::NotStarted),
        }
    }

    pub fn with_variants(mut self, variants: VariantGenerator) -> Self {
        self.variants = variants;
        self
    }

    /// Also applies the policy timeout to the candidate and judge clients.
    pub fn with_policy(mut self, policy: RunPolicy) -> Self {
        self.candidates = self.candidates.with_timeout(policy.timeout);
        self.judge = self.judge.with_timeout(policy.timeout);
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: RunObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// State of the most recent run.
    pub fn state(&self) -> RunState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(RunState::NotStarted)
    }

    fn set_state(&self, next: RunState) {
        if let Ok(mut state) = self.state.lock() {
            let from = *state;
            tracing::debug!(?from, to = ?next, "run state");
            *state = next;
        }
    }

    fn emit(&self, event: RunEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    pub fn plan(&self, suite: &SuiteDefinition) -> Result<RunPlan, ConfigError> {
        RunPlan::build(&self.variants, suite)
    }

    /// Drive the full matrix. Only configuration problems are returned as
    /// errors, and they surface before the first request; every request or
    /// judging failure is recorded in the store instead.
    pub async fn run(&self, suite: &SuiteDefinition) -> Result<ResultStore, ConfigError> {
        let plan = self.plan(suite)?;
        let total = plan.combinations;

        self.set_state(RunState::Iterating);
        tracing::info!(
            combinations = total,
            candidates = suite.candidates().len(),
            variants = plan.variants.len(),
            parallel = self.policy.parallel_generation,
            "run started"
        );
        self.emit(RunEvent::Started {
            combinations: total,
            candidates: suite.candidates().len(),
        });

        let mut store = ResultStore::new();
        let mut index = 0;
        for scenario in suite.scenarios() {
            for base in &plan.variants {
                let variant = self.variants.for_scenario(base, scenario);
                let prompt = variant.final_prompt(scenario);
                for &temperature in suite.temperatures() {
                    index += 1;
                    let combo = Combination {
                        index,
                        total,
                        scenario,
                        variant: &variant,
                        prompt: &prompt,
                        temperature,
                    };
                    self.run_combination(suite, &combo, &mut store).await;
                }
            }
        }

        store.finish();
        self.set_state(RunState::Finished);
        tracing::info!(
            evaluations = store.evaluations().len(),
            responses = store.response_count(),
            "run finished"
        );
        self.emit(RunEvent::Finished {
            evaluations: store.evaluations().len(),
            responses: store.response_count(),
        });
        Ok(store)
    }

    async fn run_combination(
        &self,
        suite: &SuiteDefinition,
        combo: &Combination<'_>,
        store: &mut ResultStore,
    ) {
        let scenario = combo.scenario;
        let variant = combo.variant;
        tracing::info!(
            index = combo.index,
            total = combo.total,
            scenario = %scenario.name,
            variant = %variant.name,
            temperature = ?combo.temperature,
            "combination"
        );
        self.emit(RunEvent::CombinationStarted {
            index: combo.index,
            total: combo.total,
            scenario: scenario.name.clone(),
            variant: variant.name.clone(),
            temperature: combo.temperature,
        });

        let outcomes = self.generate_all(suite.candidates(), combo).await;

        let mut responses: Vec<(String, String)> = Vec::new();
        for (candidate, outcome) in &outcomes {
            match outcome {
                Ok(resp) => {
                    store.record_response(
                        &candidate.name,
                        &scenario.name,
                        variant,
                        combo.temperature,
                        resp,
                    );
                    responses.push((candidate.name.clone(), resp.content.clone()));
                }
                Err(e) => {
                    tracing::warn!(
                        candidate = %candidate.name,
                        scenario = %scenario.name,
                        variant = %variant.name,
                        kind = e.kind.as_str(),
                        error = %e,
                        "candidate generation failed"
                    );
                    self.emit(RunEvent::CandidateFailed {
                        candidate: candidate.name.clone(),
                        scenario: scenario.name.clone(),
                        variant: variant.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let criterion = scenario.criterion_text();
        let mut judged = self
            .judge_responses(&responses, scenario, suite.threshold_for(scenario))
            .await;

        for (candidate, outcome) in &outcomes {
            let evaluation = match outcome {
                Err(e) => Evaluation::failed(&criterion, e.to_string()),
                Ok(_) => judged.remove(&candidate.name).unwrap_or_else(|| {
                    Evaluation::failed(
                        &criterion,
                        format!("No result for candidate '{}' in judge response", candidate.name),
                    )
                }),
            };
            store.record_evaluation(
                &candidate.name,
                &scenario.name,
                &variant.name,
                combo.temperature,
                evaluation,
            );
        }

        if !responses.is_empty() {
            let recent = &store.evaluations()[store.evaluations().len() - outcomes.len()..];
            let winner = recent
                .iter()
                .find(|r| r.evaluation.winner == Some(WinnerMark::Won))
                .map(|r| r.candidate.clone());
            let tie = recent
                .iter()
                .any(|r| r.evaluation.winner == Some(WinnerMark::Tie));
            self.emit(RunEvent::CombinationJudged {
                index: combo.index,
                total: combo.total,
                responded: responses.len(),
                winner,
                tie,
            });
        }
    }

    /// Outcomes in candidate definition order, whichever way they were produced.
    async fn generate_all<'c>(
        &self,
        candidates: &'c [Candidate],
        combo: &Combination<'_>,
    ) -> Vec<(&'c Candidate, Result<CandidateResponse, RequestError>)> {
        if self.policy.parallel_generation {
            join_all(candidates.iter().map(|candidate| async move {
                let outcome = self.generate_one(candidate, combo).await;
                (candidate, outcome)
            }))
            .await
        } else {
            let mut outcomes = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                outcomes.push((candidate, self.generate_one(candidate, combo).await));
            }
            outcomes
        }
    }

    async fn generate_one(
        &self,
        candidate: &Candidate,
        combo: &Combination<'_>,
    ) -> Result<CandidateResponse, RequestError> {
        let attributes = &combo.variant.attributes;
        let system_prompt = attributes
            .system_prompt
            .as_deref()
            .or(combo.scenario.system_prompt.as_deref())
            .or(candidate.system_prompt.as_deref());
        let generation = Generation {
            prompt: combo.prompt,
            system_prompt,
            temperature: combo.temperature.or(attributes.temperature),
            history: &attributes.history,
        };
        self.candidates.generate(candidate, &generation).await
    }

    async fn judge_responses(
        &self,
        responses: &[(String, String)],
        scenario: &Scenario,
        threshold: Option<f64>,
    ) -> BTreeMap<String, Evaluation> {
        let context = scenario.context.as_deref();
        match responses {
            [] => BTreeMap::new(),
            [(name, content)] => {
                let evaluation = self
                    .judge
                    .evaluate(content, &scenario.criterion_text(), context, threshold)
                    .await
                    .with_winner(WinnerMark::Won);
                BTreeMap::from([(name.clone(), evaluation)])
            }
            _ => {
                self.judge
                    .evaluate_comparison(responses, &scenario.criteria, context, threshold)
                    .await
            }
        }
    }
}
