//! Structured run events. The runner emits these in combination order; a
//! reporter subscribes through a [`RunObserver`] instead of printing inline.

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        combinations: usize,
        candidates: usize,
    },
    CombinationStarted {
        /// 1-based.
        index: usize,
        total: usize,
        scenario: String,
        variant: String,
        temperature: Option<f64>,
    },
    CandidateFailed {
        candidate: String,
        scenario: String,
        variant: String,
        error: String,
    },
    CombinationJudged {
        index: usize,
        total: usize,
        /// Candidates that produced a response.
        responded: usize,
        /// Name of the marked winner; `None` on a tie or when nobody responded.
        winner: Option<String>,
        tie: bool,
    },
    Finished {
        evaluations: usize,
        responses: usize,
    },
}

pub type RunObserver = Arc<dyn Fn(&RunEvent) + Send + Sync>;
