use super::client::{
    call_judge_impl, extract_json_impl, parse_failure_message, parse_scored_impl,
};
use super::prompt::{build_comparison_prompt, build_single_prompt};
use crate::judge::{JudgeService, TIE, WINNER_KEY};
use crate::model::{join_criteria, Evaluation, WinnerMark};
use std::collections::BTreeMap;

pub(crate) async fn evaluate_impl(
    svc: &JudgeService,
    response: &str,
    criterion: &str,
    context: Option<&str>,
    threshold: f64,
) -> Evaluation {
    let prompt = build_single_prompt(response, criterion, context);
    let raw = match call_judge_impl(svc, &prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "judge request failed");
            return Evaluation::failed(criterion, format!("Judge request failed: {}", e));
        }
    };

    match extract_json_impl(&raw).and_then(|v| parse_scored_impl(&v)) {
        Ok((score, reasoning)) => Evaluation::scored(criterion, score, reasoning, threshold),
        Err(detail) => {
            tracing::warn!(%detail, "unparseable judge output");
            Evaluation::failed(criterion, parse_failure_message(&detail, &raw))
        }
    }
}

pub(crate) async fn evaluate_comparison_impl(
    svc: &JudgeService,
    responses: &[(String, String)],
    criteria: &[String],
    context: Option<&str>,
    threshold: f64,
) -> BTreeMap<String, Evaluation> {
    let criterion = join_criteria(criteria);
    if responses.is_empty() {
        return BTreeMap::new();
    }

    let prompt = build_comparison_prompt(responses, criteria, context);
    let raw = match call_judge_impl(svc, &prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, candidates = responses.len(), "comparative judge request failed");
            let failure = Evaluation::failed(&criterion, format!("Judge request failed: {}", e));
            return fill_all(responses, &failure);
        }
    };

    let parsed = match extract_json_impl(&raw).and_then(|v| {
        if v.is_object() {
            Ok(v)
        } else {
            Err("expected a JSON object".to_string())
        }
    }) {
        Ok(v) => v,
        Err(detail) => {
            tracing::warn!(%detail, "unparseable comparative judge output");
            let failure = Evaluation::failed(&criterion, parse_failure_message(&detail, &raw));
            return fill_all(responses, &failure);
        }
    };

    let mut results = BTreeMap::new();
    for (name, _) in responses {
        let eval = match parsed.get(name.as_str()) {
            Some(entry) => match parse_scored_impl(entry) {
                Ok((score, reasoning)) => {
                    Evaluation::scored(&criterion, score, reasoning, threshold)
                }
                Err(detail) => Evaluation::failed(
                    &criterion,
                    format!("Invalid result for candidate '{}': {}", name, detail),
                ),
            },
            None => Evaluation::failed(
                &criterion,
                format!("No result for candidate '{}' in judge response", name),
            ),
        };
        results.insert(name.clone(), eval);
    }

    apply_winner(&mut results, parsed.get(WINNER_KEY));
    results
}

fn fill_all(responses: &[(String, String)], failure: &Evaluation) -> BTreeMap<String, Evaluation> {
    responses
        .iter()
        .map(|(name, _)| (name.clone(), failure.clone()))
        .collect()
}

fn apply_winner(results: &mut BTreeMap<String, Evaluation>, winner: Option<&serde_json::Value>) {
    let Some(winner) = winner.and_then(|w| w.as_str()).map(str::trim) else {
        tracing::debug!("judge named no winner");
        return;
    };

    if winner.eq_ignore_ascii_case(TIE) {
        for eval in results.values_mut() {
            eval.winner = Some(WinnerMark::Tie);
        }
        return;
    }

    match results.get_mut(winner) {
        Some(eval) => eval.winner = Some(WinnerMark::Won),
        None => tracing::warn!(%winner, "judge named a winner that was not compared"),
    }
}
