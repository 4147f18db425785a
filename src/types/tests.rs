use super::*;

#[test]
fn test_challenge_from_json_defaults() {
    let json = r#"{
        "id": "l1_001",
        "level": "level1",
        "actionable": true,
        "description": "Detect the string evil.com"
    }"#;
    let challenge: Challenge = serde_json::from_str(json).unwrap();

    assert_eq!(challenge.id, "l1_001");
    assert_eq!(challenge.level, ChallengeLevel::Level1);
    assert!(challenge.expected_strings.is_empty());
    assert!(challenge.expected_keywords.is_empty());
    assert!(challenge.test_files.is_empty());
    assert!(challenge.metadata.is_empty());
}

#[test]
fn test_challenge_with_test_files() {
    let json = r#"{
        "id": "l1_002",
        "level": "level1",
        "actionable": false,
        "description": "Detect malware by its network behaviour only",
        "expected_strings": ["evil.com", "evil.com"],
        "test_files": [
            {"name": "bad.bin", "content_b64": "ZXZpbC5jb20=", "should_match": true},
            {"name": "good.bin", "content_b64": "aGVsbG8", "should_match": false}
        ],
        "metadata": {"author": "bench"}
    }"#;
    let challenge: Challenge = serde_json::from_str(json).unwrap();

    assert!(!challenge.actionable);
    // Duplicates in expected lists are kept as-is
    assert_eq!(challenge.expected_strings.len(), 2);
    assert_eq!(challenge.test_files.len(), 2);
    assert!(challenge.test_files[0].should_match);
    assert_eq!(challenge.metadata.get("author").map(String::as_str), Some("bench"));
}

#[test]
fn test_unknown_level_rejected() {
    let json = r#"{"id": "x", "level": "level9", "actionable": true, "description": "d"}"#;
    assert!(serde_json::from_str::<Challenge>(json).is_err());
}

#[test]
fn test_level_from_str() {
    assert_eq!("LEVEL3".parse::<ChallengeLevel>().unwrap(), ChallengeLevel::Level3);
    assert!("level4".parse::<ChallengeLevel>().is_err());
    assert_eq!(ChallengeLevel::Level2.to_string(), "level2");
}

#[test]
fn test_duplicate_test_file_names() {
    let mut challenge = Challenge::new("dup", ChallengeLevel::Level1, "d");
    challenge.test_files = vec![
        TestFile::new("a", "", true),
        TestFile::new("b", "", false),
        TestFile::new("a", "", false),
        TestFile::new("a", "", false),
    ];
    assert_eq!(challenge.duplicate_test_file_names(), vec!["a"]);
}

#[test]
fn test_rule_result_constructors() {
    let abstained = RuleResult::abstained("c1", "m", "not actionable".into(), 12.0);
    assert!(abstained.valid_syntax);
    assert_eq!(abstained.score, 1.0);
    assert!(abstained.generated_rule.is_none());
    assert!(abstained.error.is_none());

    let no_rule = RuleResult::no_rule("c1", "m", "hello".into(), 12.0);
    assert!(!no_rule.valid_syntax);
    assert_eq!(no_rule.score, 0.0);
    assert_eq!(no_rule.error.as_deref(), Some("No valid YARA rule extracted"));

    let failed = RuleResult::failed("c1", "m", "boom".into(), 1.0);
    assert_eq!(failed.score, 0.0);
    assert_eq!(failed.generated_response, "");
}

#[test]
fn test_benchmark_result_aggregation() {
    let results = vec![
        RuleResult::abstained("a", "m", String::new(), 0.0),
        RuleResult::no_rule("b", "m", String::new(), 0.0),
        RuleResult::no_rule("c", "m", String::new(), 0.0),
        RuleResult::abstained("d", "m", String::new(), 0.0),
    ];
    let summary = BenchmarkResult::from_results("m", vec![ChallengeLevel::Level1], results, 50.0);

    assert_eq!(summary.total_challenges, 4);
    assert_eq!(summary.successful_challenges, 2);
    assert!((summary.average_score - 0.5).abs() < 1e-9);
}

#[test]
fn test_benchmark_result_empty() {
    let summary = BenchmarkResult::from_results("m", Vec::new(), Vec::new(), 0.0);
    assert_eq!(summary.total_challenges, 0);
    assert_eq!(summary.average_score, 0.0);
}

#[test]
fn test_rule_result_json_skips_absent_judge() {
    let result = RuleResult::abstained("c1", "m", String::new(), 0.0);
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("llm_judge_score").is_none());
    assert!(json.get("error").is_none());
    assert_eq!(json["score"], 1.0);
}
