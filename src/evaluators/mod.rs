//! Rule evaluators.
//!
//! Each evaluator looks at one (challenge, rule) pair and reports a partial
//! [`Evaluation`]. The benchmark runs them in a fixed order and folds the
//! partial results together with [`Evaluation::merge`]: a field set by a later
//! evaluator replaces the earlier value, and diagnostics accumulate.

pub mod execution;
pub mod judge;
pub mod structure;
pub mod syntax;

pub use execution::ExecutionEvaluator;
pub use judge::{JudgeEvaluator, JudgeVerdict};
pub use structure::{validate_structure, StructureError};
pub use syntax::SyntaxFeatureEvaluator;

use crate::types::Challenge;
use std::collections::BTreeMap;
use tracing::trace;

/// One step of rule evaluation
pub trait Evaluator: Send + Sync {
    /// Short display name
    fn name(&self) -> &str;

    /// Evaluate `rule` against `challenge`. Never fails; problems are
    /// reported as diagnostics.
    fn evaluate(&self, challenge: &Challenge, rule: &str) -> Evaluation;
}

/// Partial evaluation result. `None` means the evaluator did not look at that field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub valid_syntax: Option<bool>,
    pub expected_strings_found: Option<Vec<String>>,
    pub expected_keywords_found: Option<Vec<String>>,
    pub execution_results: Option<BTreeMap<String, bool>>,
    pub judge: Option<JudgeVerdict>,
    pub diagnostics: Vec<String>,
}

impl Evaluation {
    /// Fold a later evaluator's result into this one
    pub fn merge(&mut self, later: Evaluation) {
        if later.valid_syntax.is_some() {
            self.valid_syntax = later.valid_syntax;
        }
        if later.expected_strings_found.is_some() {
            self.expected_strings_found = later.expected_strings_found;
        }
        if later.expected_keywords_found.is_some() {
            self.expected_keywords_found = later.expected_keywords_found;
        }
        if later.execution_results.is_some() {
            self.execution_results = later.execution_results;
        }
        if later.judge.is_some() {
            self.judge = later.judge;
        }
        for diagnostic in later.diagnostics {
            self.push_diagnostic(diagnostic);
        }
    }

    /// Record a diagnostic, skipping exact repeats (the structural gate
    /// runs in more than one evaluator)
    pub fn push_diagnostic(&mut self, diagnostic: impl Into<String>) {
        let diagnostic = diagnostic.into();
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }

    /// All diagnostics joined for `RuleResult.error`
    pub fn error(&self) -> Option<String> {
        if self.diagnostics.is_empty() {
            None
        } else {
            Some(self.diagnostics.join("; "))
        }
    }

    pub fn valid_syntax(&self) -> bool {
        self.valid_syntax.unwrap_or(false)
    }

    pub fn strings_found(&self) -> &[String] {
        self.expected_strings_found.as_deref().unwrap_or_default()
    }

    pub fn keywords_found(&self) -> &[String] {
        self.expected_keywords_found.as_deref().unwrap_or_default()
    }

    pub fn judge_score(&self) -> Option<f64> {
        self.judge.as_ref().map(|j| j.score)
    }
}

/// Run every evaluator in order and merge their results
pub fn evaluate_all(evaluators: &[Box<dyn Evaluator>], challenge: &Challenge, rule: &str) -> Evaluation {
    let mut merged = Evaluation::default();
    for evaluator in evaluators {
        trace!("running evaluator '{}' on {}", evaluator.name(), challenge.id);
        merged.merge(evaluator.evaluate(challenge, rule));
    }
    merged
}
