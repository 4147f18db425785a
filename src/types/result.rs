//! Evaluation outcomes for one (model, challenge) pair and per-model summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::challenge::ChallengeLevel;

/// Outcome of evaluating one generated response against one challenge.
/// Built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub challenge_id: String,
    pub model: String,
    /// The extracted rule, absent when nothing could be recovered
    pub generated_rule: Option<String>,
    /// Full raw model response
    pub generated_response: String,
    pub valid_syntax: bool,
    /// Test file name -> observed match
    #[serde(default)]
    pub execution_results: BTreeMap<String, bool>,
    #[serde(default)]
    pub expected_strings_found: Vec<String>,
    #[serde(default)]
    pub expected_keywords_found: Vec<String>,
    /// Composite score in [0, 1]
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_judge_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_judge_feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_judge_details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl RuleResult {
    pub(crate) fn bare(challenge_id: &str, model: &str, response: String, latency_ms: f64) -> Self {
        Self {
            challenge_id: challenge_id.to_string(),
            model: model.to_string(),
            generated_rule: None,
            generated_response: response,
            valid_syntax: false,
            execution_results: BTreeMap::new(),
            expected_strings_found: Vec::new(),
            expected_keywords_found: Vec::new(),
            score: 0.0,
            error: None,
            latency_ms,
            llm_judge_score: None,
            llm_judge_feedback: None,
            llm_judge_details: None,
            timestamp: Utc::now(),
        }
    }

    /// Correct abstention on a non-actionable challenge
    pub fn abstained(challenge_id: &str, model: &str, response: String, latency_ms: f64) -> Self {
        Self {
            valid_syntax: true,
            score: 1.0,
            ..Self::bare(challenge_id, model, response, latency_ms)
        }
    }

    /// Actionable challenge but no rule could be recovered from the response
    pub fn no_rule(challenge_id: &str, model: &str, response: String, latency_ms: f64) -> Self {
        Self {
            error: Some("No valid YARA rule extracted".to_string()),
            ..Self::bare(challenge_id, model, response, latency_ms)
        }
    }

    /// Unexpected failure while evaluating a single challenge
    pub fn failed(challenge_id: &str, model: &str, error: String, latency_ms: f64) -> Self {
        Self {
            error: Some(error),
            ..Self::bare(challenge_id, model, String::new(), latency_ms)
        }
    }
}

/// Aggregate of all results for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub model: String,
    pub levels: Vec<ChallengeLevel>,
    pub total_challenges: usize,
    /// Challenges whose result has `valid_syntax == true`
    pub successful_challenges: usize,
    pub average_score: f64,
    pub results: Vec<RuleResult>,
    pub total_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    /// Summarize a model's results. Reads the results, never alters them.
    pub fn from_results(
        model: &str,
        levels: Vec<ChallengeLevel>,
        results: Vec<RuleResult>,
        total_time_ms: f64,
    ) -> Self {
        let total_challenges = results.len();
        let successful_challenges = results.iter().filter(|r| r.valid_syntax).count();
        let average_score = if total_challenges > 0 {
            results.iter().map(|r| r.score).sum::<f64>() / total_challenges as f64
        } else {
            0.0
        };

        Self {
            model: model.to_string(),
            levels,
            total_challenges,
            successful_challenges,
            average_score,
            results,
            total_time_ms,
            timestamp: Utc::now(),
        }
    }
}
