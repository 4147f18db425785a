//! Secondary-model quality judgment.
//!
//! A judge model rates the rule on five weighted criteria (0-10 each) and
//! returns JSON. Unparseable output is treated as uninformative and scores
//! every criterion at the midpoint; a failed request scores 0.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Evaluation, Evaluator};
use crate::llm::TextGenerator;
use crate::types::Challenge;

/// (key, display name, weight)
pub const CRITERIA: [(&str, &str, f64); 5] = [
    ("correctness", "Correctness", 0.35),
    ("completeness", "Completeness", 0.25),
    ("efficiency", "Efficiency", 0.15),
    ("best_practices", "Best Practices", 0.15),
    ("false_positive_risk", "False Positive Risk", 0.10),
];

const DEFAULT_CRITERION_SCORE: f64 = 5.0;
const ASSESSMENT_PREVIEW_CHARS: usize = 200;

pub const JUDGE_SYSTEM_PROMPT: &str = "You are a YARA rule expert evaluator. Your role is to:
1. Analyze YARA rules for correctness, efficiency, and best practices
2. Provide constructive feedback
3. Score rules fairly on multiple criteria
4. Return structured JSON responses
5. Prefer string-based detection over module usage when possible

Be thorough but concise in your evaluations. Encourage simple, effective rules that use string matching rather than complex module-based analysis.";

/// Outcome of one judge call
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    /// Weighted score in [0, 1]
    pub score: f64,
    pub feedback: String,
    /// Normalized criteria as returned by the judge, or `{"error": ...}`
    pub details: Value,
}

/// Asks a judge model to rate the rule
pub struct JudgeEvaluator {
    judge: Arc<dyn TextGenerator>,
}

impl JudgeEvaluator {
    pub fn new(judge: Arc<dyn TextGenerator>) -> Self {
        Self { judge }
    }

    pub fn judge(&self, challenge: &Challenge, rule: &str) -> JudgeVerdict {
        let prompt = evaluation_prompt(challenge, rule);
        match self.judge.generate(&prompt, Some(JUDGE_SYSTEM_PROMPT)) {
            Ok(response) => {
                let details = parse_judge_response(&response);
                let score = overall_score(&details);
                debug!("{}: judge score {:.2}", challenge.id, score);
                JudgeVerdict {
                    score,
                    feedback: format_feedback(&details),
                    details,
                }
            }
            Err(e) => {
                warn!("{}: judge '{}' failed: {}", challenge.id, self.judge.model_name(), e);
                JudgeVerdict {
                    score: 0.0,
                    feedback: format!("LLM judge error: {}", e),
                    details: json!({ "error": e.to_string() }),
                }
            }
        }
    }
}

impl Evaluator for JudgeEvaluator {
    fn name(&self) -> &str {
        "LLM Judge"
    }

    fn evaluate(&self, challenge: &Challenge, rule: &str) -> Evaluation {
        Evaluation {
            judge: Some(self.judge(challenge, rule)),
            ..Default::default()
        }
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None specified".to_string()
    } else {
        items.join(", ")
    }
}

/// Prompt asking the judge for a JSON verdict on `rule`
pub fn evaluation_prompt(challenge: &Challenge, rule: &str) -> String {
    format!(
        r#"You are an expert YARA rule evaluator. Evaluate the following YARA rule against the given challenge.

CHALLENGE:
{description}

Expected Requirements:
- Strings to detect: {strings}
- Keywords to use: {keywords}
- Actionable: {actionable}

SUBMITTED YARA RULE:
{rule}

Evaluate the rule on these criteria and respond with JSON only:
{{
  "correctness": {{
    "score": 0-10,
    "feedback": "Does the rule correctly implement the challenge requirements?"
  }},
  "completeness": {{
    "score": 0-10,
    "feedback": "Are all required strings and features included?"
  }},
  "efficiency": {{
    "score": 0-10,
    "feedback": "Is the rule optimized and efficient?"
  }},
  "best_practices": {{
    "score": 0-10,
    "feedback": "Does it follow YARA best practices and conventions?"
  }},
  "false_positive_risk": {{
    "score": 0-10,
    "feedback": "How well does it avoid false positives? (10=very low risk)"
  }},
  "overall_assessment": "Brief overall assessment of the rule quality"
}}

Be strict but fair. Consider:
- Syntax correctness
- Logic accuracy
- String matching appropriateness
- Condition complexity
- Preference for string-based detection over module usage
- Potential for false positives/negatives"#,
        description = challenge.description,
        strings = list_or_none(&challenge.expected_strings),
        keywords = list_or_none(&challenge.expected_keywords),
        actionable = if challenge.actionable { "Yes" } else { "No" },
        rule = rule,
    )
}

/// JSON payload of a judge response, unwrapping a ```json (or bare ```) fence
fn json_payload(response: &str) -> &str {
    let response = response.trim();
    let inner = if let Some((_, rest)) = response.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = response.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        response
    };
    inner.trim()
}

/// Parse and normalize a judge response.
///
/// Every criterion ends up as an object with a `score`; missing criteria get
/// the midpoint. Text that is not a JSON object yields midpoint scores and
/// the start of the text as the overall assessment.
pub fn parse_judge_response(response: &str) -> Value {
    let mut data = match serde_json::from_str::<Value>(json_payload(response)) {
        Ok(Value::Object(map)) => map,
        _ => return unparseable(response),
    };

    for (key, _, _) in CRITERIA {
        match data.get_mut(key) {
            None => {
                data.insert(
                    key.to_string(),
                    json!({ "score": DEFAULT_CRITERION_SCORE as i64, "feedback": "Not evaluated" }),
                );
            }
            Some(Value::Object(criterion)) => {
                if !criterion.contains_key("score") {
                    criterion.insert("score".to_string(), json!(DEFAULT_CRITERION_SCORE as i64));
                }
            }
            Some(other) => {
                let feedback = display_value(other);
                *other = json!({ "score": DEFAULT_CRITERION_SCORE as i64, "feedback": feedback });
            }
        }
    }
    Value::Object(data)
}

fn unparseable(response: &str) -> Value {
    let mut data = Map::new();
    for (key, _, _) in CRITERIA {
        data.insert(
            key.to_string(),
            json!({ "score": DEFAULT_CRITERION_SCORE as i64, "feedback": "Unable to parse evaluation" }),
        );
    }
    let assessment = if response.chars().count() > ASSESSMENT_PREVIEW_CHARS {
        format!("{}...", response.chars().take(ASSESSMENT_PREVIEW_CHARS).collect::<String>())
    } else {
        response.to_string()
    };
    data.insert("overall_assessment".to_string(), Value::String(assessment));
    Value::Object(data)
}

/// A criterion score on the 0-10 scale; numeric strings are accepted
fn criterion_score(criterion: &Value) -> f64 {
    match criterion.get("score") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_CRITERION_SCORE),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_CRITERION_SCORE),
        _ => DEFAULT_CRITERION_SCORE,
    }
}

/// Weighted average of the criteria, normalized to [0, 1]
pub fn overall_score(details: &Value) -> f64 {
    let mut total = 0.0;
    let mut total_weight = 0.0;
    for (key, _, weight) in CRITERIA {
        if let Some(criterion) = details.get(key).filter(|c| c.is_object()) {
            total += criterion_score(criterion) / 10.0 * weight;
            total_weight += weight;
        }
    }
    if total_weight > 0.0 {
        (total / total_weight).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `Overall: ... | Correctness (8/10): ... | ...`
pub fn format_feedback(details: &Value) -> String {
    let mut parts = Vec::new();
    if let Some(assessment) = details.get("overall_assessment") {
        parts.push(format!("Overall: {}", display_value(assessment)));
    }
    for (key, display, _) in CRITERIA {
        if let Some(criterion) = details.get(key).filter(|c| c.is_object()) {
            let score = criterion.get("score").map_or("?".to_string(), display_value);
            let feedback = criterion
                .get("feedback")
                .map_or("No feedback".to_string(), display_value);
            parts.push(format!("{} ({}/10): {}", display, score, feedback));
        }
    }
    parts.join(" | ")
}
