//! Run the rule against every labeled test file of a challenge

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::structure::validate_structure;
use super::{Evaluation, Evaluator};
use crate::decoders::decode_payload;
use crate::types::Challenge;
use crate::yara_engine::{EngineError, RuleEngine};

/// Compiles the rule once and matches it against each decoded test file.
///
/// A file that fails to decode or match records `false` and the batch goes
/// on; every such failure is kept as a diagnostic.
pub struct ExecutionEvaluator {
    engine: Arc<dyn RuleEngine>,
}

impl ExecutionEvaluator {
    pub fn new(engine: Arc<dyn RuleEngine>) -> Self {
        Self { engine }
    }
}

impl Evaluator for ExecutionEvaluator {
    fn name(&self) -> &str {
        "File Matcher"
    }

    fn evaluate(&self, challenge: &Challenge, rule: &str) -> Evaluation {
        let mut evaluation = Evaluation {
            execution_results: Some(BTreeMap::new()),
            ..Default::default()
        };
        if challenge.test_files.is_empty() {
            return evaluation;
        }

        // never hand the engine a rule that fails the shape checks
        if let Err(e) = validate_structure(rule) {
            evaluation.push_diagnostic(e.to_string());
            return evaluation;
        }

        let compiled = match self.engine.compile(rule) {
            Ok(compiled) => compiled,
            Err(EngineError::Syntax(msg)) => {
                evaluation.push_diagnostic(format!("YARA syntax error: {}", msg));
                return evaluation;
            }
            Err(e) => {
                evaluation.push_diagnostic(format!("Execution error: {}", e));
                return evaluation;
            }
        };

        let mut results = BTreeMap::new();
        for test_file in &challenge.test_files {
            let content = match decode_payload(&test_file.content_b64) {
                Ok(content) => content,
                Err(e) => {
                    warn!("{}: failed to decode {}: {}", challenge.id, test_file.name, e);
                    results.insert(test_file.name.clone(), false);
                    evaluation.push_diagnostic(format!("Failed to decode {}: {}", test_file.name, e));
                    continue;
                }
            };

            match compiled.is_match(&content) {
                Ok(matched) => {
                    debug!("{}: {} matched={}", challenge.id, test_file.name, matched);
                    results.insert(test_file.name.clone(), matched);
                }
                Err(e) => {
                    warn!("{}: failed to match {}: {}", challenge.id, test_file.name, e);
                    results.insert(test_file.name.clone(), false);
                    evaluation.push_diagnostic(format!("Failed to match {}: {}", test_file.name, e));
                }
            }
        }

        evaluation.execution_results = Some(results);
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChallengeLevel, TestFile};
    use crate::yara_engine::CompiledRules;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Matches when the data contains the needle; "boom" makes scanning fail
    struct ContainsRules {
        needle: Vec<u8>,
    }

    impl CompiledRules for ContainsRules {
        fn is_match(&self, data: &[u8]) -> Result<bool, EngineError> {
            if data.windows(4).any(|w| w == b"boom") {
                return Err(EngineError::Scan("scan aborted".into()));
            }
            Ok(data.windows(self.needle.len()).any(|w| w == self.needle.as_slice()))
        }
    }

    #[derive(Default)]
    struct ContainsEngine {
        compiles: AtomicUsize,
    }

    impl RuleEngine for ContainsEngine {
        fn name(&self) -> &str {
            "contains"
        }

        fn compile(&self, source: &str) -> Result<Box<dyn CompiledRules>, EngineError> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            if source.contains("SYNTAX") {
                return Err(EngineError::Syntax("bad token".into()));
            }
            Ok(Box::new(ContainsRules { needle: b"evil".to_vec() }))
        }
    }

    const RULE: &str = "rule a { condition: true }";

    fn challenge(files: Vec<TestFile>) -> Challenge {
        let mut c = Challenge::new("exec", ChallengeLevel::Level1, "detect evil");
        c.test_files = files;
        c
    }

    fn b64(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    #[test]
    fn test_no_test_files_is_empty_not_error() {
        let engine = Arc::new(ContainsEngine::default());
        let eval = ExecutionEvaluator::new(engine.clone()).evaluate(&challenge(vec![]), RULE);
        assert_eq!(eval.execution_results, Some(BTreeMap::new()));
        assert!(eval.diagnostics.is_empty());
        assert_eq!(engine.compiles.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_matches_per_file_and_compiles_once() {
        let engine = Arc::new(ContainsEngine::default());
        let c = challenge(vec![
            TestFile::new("bad.bin", &b64(b"has evil inside"), true),
            TestFile::new("good.bin", &b64(b"benign"), false),
        ]);
        let eval = ExecutionEvaluator::new(engine.clone()).evaluate(&c, RULE);
        let results = eval.execution_results.unwrap();
        assert_eq!(results.get("bad.bin"), Some(&true));
        assert_eq!(results.get("good.bin"), Some(&false));
        assert_eq!(engine.compiles.load(Ordering::SeqCst), 1);
        assert!(eval.diagnostics.is_empty());
    }

    #[test]
    fn test_unpadded_payload_decodes() {
        let padded = b64(b"evil!");
        let c = challenge(vec![TestFile::new("f", padded.trim_end_matches('='), true)]);
        let eval = ExecutionEvaluator::new(Arc::new(ContainsEngine::default())).evaluate(&c, RULE);
        assert_eq!(eval.execution_results.unwrap().get("f"), Some(&true));
    }

    #[test]
    fn test_failures_recorded_and_batch_continues() {
        let c = challenge(vec![
            TestFile::new("garbage", "aG=Vsb", true),
            TestFile::new("explodes", &b64(b"boom"), false),
            TestFile::new("hit", &b64(b"evil"), true),
        ]);
        let eval = ExecutionEvaluator::new(Arc::new(ContainsEngine::default())).evaluate(&c, RULE);
        let results = eval.execution_results.clone().unwrap();
        assert_eq!(results.get("garbage"), Some(&false));
        assert_eq!(results.get("explodes"), Some(&false));
        assert_eq!(results.get("hit"), Some(&true));

        // every failure is kept, in file order
        assert_eq!(eval.diagnostics.len(), 2);
        assert!(eval.diagnostics[0].starts_with("Failed to decode garbage: "));
        assert_eq!(eval.diagnostics[1], "Failed to match explodes: scan aborted");
    }

    #[test]
    fn test_syntax_error_aborts_with_empty_results() {
        let c = challenge(vec![TestFile::new("f", &b64(b"evil"), true)]);
        let eval = ExecutionEvaluator::new(Arc::new(ContainsEngine::default()))
            .evaluate(&c, "rule a { condition: SYNTAX }");
        assert_eq!(eval.execution_results, Some(BTreeMap::new()));
        assert_eq!(eval.error().as_deref(), Some("YARA syntax error: bad token"));
    }

    #[test]
    fn test_structural_gate_runs_before_compile() {
        let engine = Arc::new(ContainsEngine::default());
        let c = challenge(vec![TestFile::new("f", &b64(b"evil"), true)]);
        let eval = ExecutionEvaluator::new(engine.clone()).evaluate(&c, "rule a { condition: true");
        assert_eq!(engine.compiles.load(Ordering::SeqCst), 0);
        assert_eq!(
            eval.error().as_deref(),
            Some("Incomplete rule structure - missing closing brace")
        );
    }
}
