use crate::model::{temperature_label, WinnerMark};
use crate::report::progress::{RunEvent, RunObserver};
use crate::results::aggregate::GroupSummary;
use crate::results::ResultStore;
use std::fmt::Write;
use std::sync::Arc;

/// One progress line per event worth showing. Deterministic, unit-testable.
#[must_use]
pub fn format_progress_line(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::Started {
            combinations,
            candidates,
        } => Some(format!(
            "Running {} combinations across {} candidates",
            combinations, candidates
        )),
        RunEvent::CombinationStarted {
            index,
            total,
            scenario,
            variant,
            temperature,
        } => Some(format!(
            "[{}/{}] {} / {} / temp {}",
            index,
            total,
            scenario,
            variant,
            temperature_label(*temperature)
        )),
        RunEvent::CandidateFailed {
            candidate, error, ..
        } => Some(format!("  {} failed: {}", candidate, error)),
        RunEvent::CombinationJudged {
            winner: Some(name),
            ..
        } => Some(format!("  winner: {}", name)),
        RunEvent::CombinationJudged { tie: true, .. } => Some("  tie".to_string()),
        RunEvent::CombinationJudged { .. } => None,
        RunEvent::Finished {
            evaluations,
            responses,
        } => Some(format!(
            "Done: {} evaluations, {} responses",
            evaluations, responses
        )),
    }
}

/// Observer that writes progress lines to stderr.
pub fn stderr_observer() -> RunObserver {
    Arc::new(|event: &RunEvent| {
        if let Some(line) = format_progress_line(event) {
            eprintln!("{}", line);
        }
    })
}

fn group_table(out: &mut String, title: &str, rows: &[GroupSummary]) {
    if rows.is_empty() {
        return;
    }
    let width = rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(title.len());
    let _ = writeln!(
        out,
        "{:<width$}  {:>5}  {:>6}  {:>7}  {:>5}  {:>4}  {:>4}",
        title, "runs", "passed", "pass%", "mean", "wins", "ties"
    );
    for r in rows {
        let _ = writeln!(
            out,
            "{:<width$}  {:>5}  {:>6}  {:>6.1}%  {:>5.2}  {:>4}  {:>4}",
            r.name, r.count, r.passed, r.pass_rate, r.mean_score, r.wins, r.ties
        );
    }
    out.push('\n');
}

/// Plain-text summary of every aggregation view.
pub fn render_summary(store: &ResultStore) -> String {
    let mut out = String::new();
    group_table(&mut out, "candidate", &store.by_candidate());
    group_table(&mut out, "variant", &store.by_variant());

    let temps = store.by_temperature();
    if !temps.is_empty() {
        let _ = writeln!(out, "{:<11}  {:>5}  {:>5}  {:>7}", "temperature", "runs", "mean", "pass%");
        for t in &temps {
            let _ = writeln!(
                out,
                "{:<11}  {:>5}  {:>5.2}  {:>6.1}%",
                t.temperature, t.count, t.mean_score, t.pass_rate
            );
        }
        out.push('\n');
    }

    for scenario in store.by_scenario() {
        let _ = writeln!(out, "scenario {}", scenario.scenario);
        for r in &scenario.results {
            let marker = match r.winner {
                Some(WinnerMark::Won) => " *",
                Some(WinnerMark::Tie) => " =",
                None => "",
            };
            let _ = write!(
                out,
                "  {} [{} @ {}] {:.1} {}{}",
                r.candidate,
                r.variant,
                temperature_label(r.temperature),
                r.score,
                if r.passed { "PASS" } else { "FAIL" },
                marker
            );
            if let Some(err) = &r.error {
                let _ = write!(out, " ({})", err);
            }
            out.push('\n');
        }
    }

    let timing = store.timing();
    if !timing.is_empty() {
        out.push('\n');
        for t in &timing {
            let _ = writeln!(
                out,
                "{}: {} responses, avg {:.0} ms, cost ${:.4}",
                t.candidate, t.responses, t.average_ms, t.total_cost
            );
        }
    }
    out
}
