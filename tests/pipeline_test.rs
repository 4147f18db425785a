//! End-to-end evaluation with the YARA-X engine

use std::path::{Path, PathBuf};
use std::sync::Arc;

use yarabench::challenges::load_challenge_file;
use yarabench::decoders::{decode_payload, normalize_base64};
use yarabench::evaluators::{Evaluator, SyntaxFeatureEvaluator};
use yarabench::extractor::clean_rule;
use yarabench::llm::{FnGenerator, LlmError};
use yarabench::{
    extract_rules, score_response, Challenge, ChallengeLevel, Pipeline, TestFile, YaraXEngine,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn beacon_challenge() -> Challenge {
    load_challenge_file(&fixture("data/level1/beacon.json")).unwrap()
}

fn good_response() -> String {
    std::fs::read_to_string(fixture("good_response.txt")).unwrap()
}

fn judged_pipeline(criterion_score: u32) -> Pipeline {
    let judge = FnGenerator::new("judge", move |_: &str, _: Option<&str>| {
        Ok(format!(
            r#"```json
{{
  "correctness": {{"score": {s}, "feedback": "ok"}},
  "completeness": {{"score": {s}, "feedback": "ok"}},
  "efficiency": {{"score": {s}, "feedback": "ok"}},
  "best_practices": {{"score": {s}, "feedback": "ok"}},
  "false_positive_risk": {{"score": {s}, "feedback": "ok"}},
  "overall_assessment": "fine"
}}
```"#,
            s = criterion_score
        ))
    });
    Pipeline::new(Arc::new(YaraXEngine::new()), Some(Arc::new(judge)))
}

#[test]
fn test_fixture_response_scores_perfectly() {
    let result = score_response(&beacon_challenge(), &good_response());
    assert!(result.valid_syntax, "error: {:?}", result.error);
    assert_eq!(result.expected_strings_found, vec!["evil.com".to_string()]);
    assert_eq!(result.expected_keywords_found, vec!["filesize".to_string()]);
    assert_eq!(result.execution_results.get("beacon_sample"), Some(&true));
    assert_eq!(result.execution_results.get("benign_text"), Some(&false));
    assert!(approx(result.score, 1.0));
    assert_eq!(result.error, None);
}

#[test]
fn test_minimal_rule_round_trip() {
    let challenge = Challenge::new("minimal", ChallengeLevel::Level1, "anything");
    let result = score_response(&challenge, "rule R { condition: true }");
    assert!(result.valid_syntax);
    assert_eq!(result.generated_rule.as_deref(), Some("rule R { condition: true }"));
    // strings and keywords are vacuously covered, no test files means no match credit
    assert!(approx(result.score, 0.30 + 0.20 + 0.10));
}

#[test]
fn test_abstention_on_non_actionable() {
    let challenge = load_challenge_file(&fixture("data/level1/vague.json")).unwrap();
    let response = std::fs::read_to_string(fixture("abstain_response.txt")).unwrap();
    assert!(extract_rules(&response).is_empty());

    let result = score_response(&challenge, &response);
    assert_eq!(result.score, 1.0);
    assert!(result.generated_rule.is_none());
}

#[test]
fn test_no_rule_on_actionable() {
    let result = score_response(&beacon_challenge(), "Sure, I would look for network traffic.");
    assert_eq!(result.score, 0.0);
    assert!(!result.valid_syntax);
    assert_eq!(result.error.as_deref(), Some("No valid YARA rule extracted"));
}

#[test]
fn test_two_fenced_blocks() {
    let distinct = "```yara\nrule A { condition: true }\n```\ntext\n```yara\nrule B { condition: false }\n```";
    let rules = extract_rules(distinct);
    assert_eq!(rules.len(), 2);
    assert!(rules[0].starts_with("rule A"));
    assert!(rules[1].starts_with("rule B"));

    let repeated = "```yara\nrule A { condition: true }\n```\nagain:\n```yara\nrule A { condition: true }\n```";
    assert_eq!(extract_rules(repeated).len(), 1);
}

#[test]
fn test_engine_rejects_bad_syntax() {
    let result = score_response(&beacon_challenge(), "rule Broken { strings: $a = \"evil.com\" condition: $a and }");
    assert!(!result.valid_syntax);
    let error = result.error.unwrap();
    assert!(error.starts_with("YARA "), "{}", error);
    assert!(result.execution_results.is_empty());
}

#[test]
fn test_engine_rejects_unknown_identifier() {
    let challenge = Challenge::new("unknown", ChallengeLevel::Level1, "anything");
    let result = score_response(&challenge, "rule U { condition: no_such_identifier }");
    assert!(!result.valid_syntax);
    assert!(result.error.is_some());
}

#[test]
fn test_structural_failure_skips_engine() {
    let challenge = Challenge::new("shape", ChallengeLevel::Level1, "anything");
    let evaluator = SyntaxFeatureEvaluator::new(Arc::new(YaraXEngine::new()));
    let evaluation = evaluator.evaluate(&challenge, "rule R { condition: true");
    assert_eq!(evaluation.valid_syntax, Some(false));
    assert_eq!(
        evaluation.error().as_deref(),
        Some("Incomplete rule structure - missing closing brace")
    );
}

#[test]
fn test_braces_inside_literals() {
    let mut challenge = Challenge::new("braces", ChallengeLevel::Level1, "curly");
    challenge.test_files = vec![
        TestFile::new("hit", "e2V2aWx9", true),                 // "{evil}"
        TestFile::new("miss", "bm8gYnJhY2VzIGV2aWw=", false), // "no braces evil"
    ];
    let rule = "rule Brace {\n    strings:\n        $a = \"{evil}\"\n    condition:\n        $a\n}";

    let result = score_response(&challenge, rule);
    assert!(result.generated_rule.as_deref().unwrap().contains("\"{evil}\""));
    assert_eq!(result.execution_results.get("hit"), Some(&true));
    assert_eq!(result.execution_results.get("miss"), Some(&false));
    assert_eq!(clean_rule(rule), clean_rule(&clean_rule(rule)));
}

#[test]
fn test_unpadded_and_wrapped_payloads() {
    let original = decode_payload("ZXZpbC5jb20gYmVhY29u").unwrap();
    // one, two and three padding characters short
    for unpadded in ["ZXZpbC4", "ZXZpbA", "ZXZpbC5jb"] {
        assert!(decode_payload(unpadded).is_ok(), "{}", unpadded);
    }
    let wrapped = "```\n\"ZXZpbC5jb20gYmVhY29u\"\n```";
    assert_eq!(decode_payload(&normalize_base64(wrapped)).unwrap(), original);

    let mut challenge = beacon_challenge();
    // "evil.com beaco", last quantum cut short
    challenge.test_files[0].content_b64 = "ZXZpbC5jb20gYmVhY29".to_string();
    let result = score_response(&challenge, &good_response());
    assert_eq!(result.execution_results.get("beacon_sample"), Some(&true));
}

#[test]
fn test_undecodable_file_does_not_stop_the_batch() {
    let mut challenge = beacon_challenge();
    challenge.test_files.insert(0, TestFile::new("garbage", "aG=Vsb", true));
    let result = score_response(&challenge, &good_response());

    assert_eq!(result.execution_results.get("garbage"), Some(&false));
    assert_eq!(result.execution_results.get("beacon_sample"), Some(&true));
    assert!(result.error.unwrap().starts_with("Failed to decode garbage"));
    // two of three files come out as expected
    assert!(approx(result.score, 0.30 + 0.20 + 0.10 + 0.40 * 2.0 / 3.0));
}

#[test]
fn test_judge_weights() {
    let challenge = beacon_challenge();
    let perfect = judged_pipeline(10).score_response(&challenge, "m", good_response(), 0.0);
    assert_eq!(perfect.llm_judge_score, Some(1.0));
    assert!(approx(perfect.score, 1.0));
    assert!(perfect.llm_judge_feedback.unwrap().starts_with("Overall: fine"));

    let zero = judged_pipeline(0).score_response(&challenge, "m", good_response(), 0.0);
    assert_eq!(zero.llm_judge_score, Some(0.0));
    assert!(approx(zero.score, 0.80));
}

#[test]
fn test_judge_failure_scores_zero() {
    let judge = FnGenerator::new("judge", |_: &str, _: Option<&str>| {
        Err(LlmError::Transport("connection refused".into()))
    });
    let pipeline = Pipeline::new(Arc::new(YaraXEngine::new()), Some(Arc::new(judge)));
    let result = pipeline.score_response(&beacon_challenge(), "m", good_response(), 0.0);
    assert_eq!(result.llm_judge_score, Some(0.0));
    assert!(result.llm_judge_feedback.unwrap().starts_with("LLM judge error"));
    assert!(approx(result.score, 0.80));
}
