use std::sync::{Arc, Mutex};
use tribunal_core::candidate::CandidateClient;
use tribunal_core::engine::runner::{RunPolicy, RunState, Runner};
use tribunal_core::errors::ConfigError;
use tribunal_core::judge::{JudgeConfig, JudgeService};
use tribunal_core::model::{Candidate, WinnerMark};
use tribunal_core::providers::llm::fake::{FakeClient, FakeReply};
use tribunal_core::report::progress::RunEvent;
use tribunal_core::suite::{ScenarioBuilder, SuiteBuilder};
use tribunal_core::variants::{
    ExplicitVariant, TraitComposer, TraitMatrix, Variant, VariantAttributes, VariantConfig,
    VariantGenerator,
};

const JUDGE: &str = "judge-model";

fn runner(fake: &Arc<FakeClient>) -> Runner {
    let judge = JudgeService::new(
        JudgeConfig {
            model: JUDGE.to_string(),
            ..Default::default()
        },
        fake.clone(),
    );
    Runner::new(CandidateClient::new(fake.clone()), judge)
}

fn judge_calls(fake: &FakeClient) -> usize {
    fake.requests().iter().filter(|r| r.model == JUDGE).count()
}

fn two_candidates() -> SuiteBuilder {
    SuiteBuilder::new()
        .candidate(Candidate::new("a", "model-a"))
        .candidate(Candidate::new("b", "model-b"))
        .scenario(ScenarioBuilder::new("greet", "Say hello.").criterion("is friendly"))
}

#[tokio::test]
async fn two_candidates_one_comparative_call() {
    let fake = Arc::new(FakeClient::new().with_script(
        JUDGE,
        [FakeReply::Text(
            r#"{"a": {"score": 9, "reasoning": "warm"}, "b": {"score": 6, "reasoning": "flat"}, "winner": "a"}"#
                .to_string(),
        )],
    ));
    let runner = runner(&fake);
    assert_eq!(runner.state(), RunState::NotStarted);

    let suite = two_candidates().build().unwrap();
    let store = runner.run(&suite).await.unwrap();

    assert_eq!(runner.state(), RunState::Finished);
    assert!(store.is_finished());
    assert_eq!(store.response_count(), 2);
    assert_eq!(judge_calls(&fake), 1);

    let evals = store.evaluations();
    assert_eq!(evals.len(), 2);
    assert_eq!(evals[0].candidate, "a");
    assert_eq!(evals[0].evaluation.winner, Some(WinnerMark::Won));
    assert_eq!(evals[1].evaluation.winner, None);
    assert_eq!(evals[0].variant, "default");
    assert_eq!(evals[0].temperature, None);
}

#[tokio::test]
async fn failed_candidate_is_recorded_and_survivor_wins() {
    let fake = Arc::new(FakeClient::new().with_failure("model-a", "connection refused"));
    let suite = two_candidates().build().unwrap();
    let store = runner(&fake).run(&suite).await.unwrap();

    assert_eq!(store.response_count(), 1);
    assert!(store.response("b", "greet", "default", None).is_some());
    assert!(store.response("a", "greet", "default", None).is_none());

    let evals = store.evaluations();
    assert_eq!(evals.len(), 2);
    let a = &evals[0].evaluation;
    assert_eq!(a.score, 0.0);
    assert!(!a.passed);
    assert_eq!(a.error.as_deref(), Some("connection refused"));
    assert_eq!(a.winner, None);

    let b = &evals[1].evaluation;
    assert_eq!(b.winner, Some(WinnerMark::Won));
    assert_eq!(b.score, 7.0);

    let judge_request = fake
        .requests()
        .into_iter()
        .find(|r| r.model == JUDGE)
        .unwrap();
    assert!(!judge_request.messages[1].content.contains("Compare"));
}

#[tokio::test]
async fn all_candidates_failing_skips_the_judge() {
    let fake = Arc::new(
        FakeClient::new()
            .with_failure("model-a", "down")
            .with_failure("model-b", "down"),
    );
    let store = runner(&fake)
        .run(&two_candidates().build().unwrap())
        .await
        .unwrap();
    assert_eq!(judge_calls(&fake), 0);
    assert_eq!(store.evaluations().len(), 2);
    assert!(store.evaluations().iter().all(|r| r.evaluation.error.is_some()));
}

#[tokio::test]
async fn trait_matrix_expands_across_temperatures() {
    let fake = Arc::new(FakeClient::new());
    let suite = SuiteBuilder::new()
        .candidate(Candidate::new("solo", "model-a"))
        .scenario(ScenarioBuilder::new("s", "Explain DNS.").criterion("accurate"))
        .variants(
            VariantConfig::new().with_matrix(TraitMatrix::new(vec![vec!["x", "y"], vec!["p", "q"]])),
        )
        .temperatures([None, Some(0.5)])
        .build()
        .unwrap();

    let runner = runner(&fake);
    let plan = runner.plan(&suite).unwrap();
    let names: Vec<&str> = plan.variants.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["x_p", "x_q", "y_p", "y_q"]);
    assert_eq!(plan.combinations, 8);
    assert!(fake.requests().is_empty());

    let store = runner.run(&suite).await.unwrap();
    let order: Vec<(String, Option<f64>)> = store
        .evaluations()
        .iter()
        .map(|r| (r.variant.clone(), r.temperature))
        .collect();
    assert_eq!(order.len(), 8);
    assert_eq!(order[0], ("x_p".to_string(), None));
    assert_eq!(order[1], ("x_p".to_string(), Some(0.5)));
    assert_eq!(order[7], ("y_q".to_string(), Some(0.5)));
    assert!(store
        .evaluations()
        .iter()
        .all(|r| r.evaluation.winner == Some(WinnerMark::Won)));
}

#[tokio::test]
async fn malformed_judge_output_fails_all_three() {
    let fake = Arc::new(FakeClient::new().with_script(
        JUDGE,
        [FakeReply::Text("The first one is best, clearly.".to_string())],
    ));
    let suite = SuiteBuilder::new()
        .candidate(Candidate::new("a", "model-a"))
        .candidate(Candidate::new("b", "model-b"))
        .candidate(Candidate::new("c", "model-c"))
        .scenario(ScenarioBuilder::new("s", "p").criterion("c1"))
        .build()
        .unwrap();
    let store = runner(&fake).run(&suite).await.unwrap();

    let evals = store.evaluations();
    assert_eq!(evals.len(), 3);
    let first_error = evals[0].evaluation.error.clone().unwrap();
    assert!(first_error.contains("Raw: The first one is best, clearly."));
    for r in evals {
        assert_eq!(r.evaluation.score, 0.0);
        assert_eq!(r.evaluation.error.as_deref(), Some(first_error.as_str()));
        assert_eq!(r.evaluation.winner, None);
    }
    assert_eq!(store.response_count(), 3);
}

#[tokio::test]
async fn tie_marks_every_candidate() {
    let fake = Arc::new(FakeClient::new().with_response(
        JUDGE,
        r#"{"a": {"score": 8}, "b": {"score": 8}, "winner": "tie"}"#,
    ));
    let store = runner(&fake)
        .run(&two_candidates().build().unwrap())
        .await
        .unwrap();
    assert!(store
        .evaluations()
        .iter()
        .all(|r| r.evaluation.winner == Some(WinnerMark::Tie)));
    let by_candidate = store.by_candidate();
    assert_eq!(by_candidate[0].ties, 1);
    assert_eq!(by_candidate[0].wins, 0);
}

#[tokio::test]
async fn prompt_precedence_and_temperature_override() {
    let fake = Arc::new(FakeClient::new());
    let persona = ExplicitVariant::new("persona").with_attributes(VariantAttributes {
        credential: Some("As a pilot:".into()),
        system_prompt: Some("variant system".into()),
        temperature: Some(0.3),
        ..Default::default()
    });
    let suite = SuiteBuilder::new()
        .candidate(Candidate::new("a", "model-a").with_system_prompt("candidate system"))
        .scenario(
            ScenarioBuilder::new("s", "Describe a landing.")
                .system_prompt("scenario system")
                .criterion("vivid"),
        )
        .variants(
            VariantConfig::new()
                .with_variant(persona)
                .with_variant(ExplicitVariant::new("plain")),
        )
        .temperatures([None, Some(0.9)])
        .build()
        .unwrap();
    runner(&fake).run(&suite).await.unwrap();

    let sent: Vec<_> = fake
        .requests()
        .into_iter()
        .filter(|r| r.model == "model-a")
        .collect();
    assert_eq!(sent.len(), 4);

    assert_eq!(sent[0].messages[0].content, "variant system");
    assert_eq!(sent[0].messages[1].content, "As a pilot:\n\nDescribe a landing.");
    assert_eq!(sent[0].temperature, Some(0.3));
    assert_eq!(sent[1].temperature, Some(0.9));

    assert_eq!(sent[2].messages[0].content, "scenario system");
    assert_eq!(sent[2].messages[1].content, "Describe a landing.");
    assert_eq!(sent[2].temperature, None);
}

struct RejectingComposer;

impl TraitComposer for RejectingComposer {
    fn compose(
        &self,
        name: &str,
        _traits: &[String],
        _overrides: &VariantAttributes,
    ) -> anyhow::Result<Variant> {
        anyhow::bail!("no trait named {}", name)
    }
}

#[tokio::test]
async fn configuration_errors_surface_before_any_request() {
    let fake = Arc::new(FakeClient::new());
    let suite = two_candidates()
        .variants(VariantConfig::new().with_variant(ExplicitVariant::new("ghost")))
        .build()
        .unwrap();
    let runner = runner(&fake).with_variants(VariantGenerator::with_composer(Arc::new(RejectingComposer)));

    let err = runner.run(&suite).await.unwrap_err();
    assert!(matches!(err, ConfigError::Composer { variant, .. } if variant == "ghost"));
    assert!(fake.requests().is_empty());
    assert_eq!(runner.state(), RunState::NotStarted);

    let err = two_candidates().temperatures([Some(2.1)]).build().unwrap_err();
    assert!(matches!(err, ConfigError::TemperatureOutOfRange { .. }));
}

#[tokio::test]
async fn observer_sees_events_in_combination_order() {
    let fake = Arc::new(FakeClient::new().with_failure("model-b", "boom"));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let runner = runner(&fake)
        .with_policy(RunPolicy {
            parallel_generation: true,
            ..Default::default()
        })
        .with_observer(Arc::new(move |e: &RunEvent| {
            sink.lock().unwrap().push(e.clone());
        }));

    let suite = two_candidates().temperatures([Some(0.1), Some(0.2)]).build().unwrap();
    runner.run(&suite).await.unwrap();

    let events = events.lock().unwrap();
    assert!(matches!(events[0], RunEvent::Started { combinations: 2, candidates: 2 }));
    let started: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::CombinationStarted { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(started, [1, 2]);
    let failures = events
        .iter()
        .filter(|e| matches!(e, RunEvent::CandidateFailed { candidate, .. } if candidate == "b"))
        .count();
    assert_eq!(failures, 2);
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::CombinationJudged { winner: Some(w), responded: 1, .. } if w == "a"
    )));
    assert!(matches!(
        events.last(),
        Some(RunEvent::Finished { evaluations: 4, responses: 2 })
    ));
}
