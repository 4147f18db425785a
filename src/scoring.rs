//! Composite scoring of an evaluated rule.
//!
//! Only called once a rule was extracted; abstentions and extraction failures
//! get fixed scores from the caller.

use serde::Serialize;

use crate::evaluators::Evaluation;
use crate::types::Challenge;

/// Weights applied to each sub-score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    pub syntax: f64,
    pub strings: f64,
    pub keywords: f64,
    pub matches: f64,
    pub judge: f64,
}

pub const JUDGED_WEIGHTS: Weights = Weights {
    syntax: 0.20,
    strings: 0.15,
    keywords: 0.10,
    matches: 0.35,
    judge: 0.20,
};

pub const UNJUDGED_WEIGHTS: Weights = Weights {
    syntax: 0.30,
    strings: 0.20,
    keywords: 0.10,
    matches: 0.40,
    judge: 0.0,
};

/// Individual sub-scores, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub syntax: f64,
    pub strings: f64,
    pub keywords: f64,
    pub matches: f64,
    pub judge: Option<f64>,
}

impl ScoreBreakdown {
    pub fn compute(challenge: &Challenge, evaluation: &Evaluation) -> Self {
        let syntax = if evaluation.valid_syntax() { 1.0 } else { 0.0 };
        let strings = coverage(evaluation.strings_found().len(), challenge.expected_strings.len());
        let keywords = coverage(evaluation.keywords_found().len(), challenge.expected_keywords.len());

        // no execution results scores 0, unlike the vacuous 1.0 above
        let matches = match &evaluation.execution_results {
            Some(results) if !results.is_empty() && !challenge.test_files.is_empty() => {
                let correct = challenge
                    .test_files
                    .iter()
                    .filter(|f| results.get(&f.name).copied().unwrap_or(false) == f.should_match)
                    .count();
                correct as f64 / challenge.test_files.len() as f64
            }
            _ => 0.0,
        };

        Self {
            syntax,
            strings,
            keywords,
            matches,
            judge: evaluation.judge_score().map(|j| j.clamp(0.0, 1.0)),
        }
    }

    pub fn weights(&self) -> Weights {
        if self.judge.is_some() {
            JUDGED_WEIGHTS
        } else {
            UNJUDGED_WEIGHTS
        }
    }

    /// Weighted sum, in [0, 1]
    pub fn total(&self) -> f64 {
        let w = self.weights();
        let total = w.syntax * self.syntax
            + w.strings * self.strings
            + w.keywords * self.keywords
            + w.matches * self.matches
            + w.judge * self.judge.unwrap_or(0.0);
        total.clamp(0.0, 1.0)
    }
}

/// found / expected, vacuously 1.0 when nothing is expected
fn coverage(found: usize, expected: usize) -> f64 {
    if expected == 0 {
        1.0
    } else {
        (found as f64 / expected as f64).min(1.0)
    }
}

/// Composite score of an evaluated rule
pub fn composite_score(challenge: &Challenge, evaluation: &Evaluation) -> f64 {
    ScoreBreakdown::compute(challenge, evaluation).total()
}
