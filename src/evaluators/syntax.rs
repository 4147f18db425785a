//! Compile check plus coverage of the challenge's expected strings and keywords

use std::sync::Arc;
use tracing::debug;

use super::structure::validate_structure;
use super::{Evaluation, Evaluator};
use crate::types::Challenge;
use crate::yara_engine::{EngineError, RuleEngine};

/// Keywords that only count when used as a module (`pe.` or `import "pe"`)
const MODULE_KEYWORDS: [&str; 2] = ["pe", "elf"];

/// Validates syntax by compiling, then looks for expected features
pub struct SyntaxFeatureEvaluator {
    engine: Arc<dyn RuleEngine>,
}

impl SyntaxFeatureEvaluator {
    pub fn new(engine: Arc<dyn RuleEngine>) -> Self {
        Self { engine }
    }

    fn failed(diagnostic: String) -> Evaluation {
        Evaluation {
            valid_syntax: Some(false),
            expected_strings_found: Some(Vec::new()),
            expected_keywords_found: Some(Vec::new()),
            diagnostics: vec![diagnostic],
            ..Default::default()
        }
    }
}

impl Evaluator for SyntaxFeatureEvaluator {
    fn name(&self) -> &str {
        "YARA Syntax Validator"
    }

    fn evaluate(&self, challenge: &Challenge, rule: &str) -> Evaluation {
        if let Err(e) = validate_structure(rule) {
            return Self::failed(e.to_string());
        }

        match self.engine.compile(rule) {
            Ok(_) => {}
            Err(EngineError::Syntax(msg)) => {
                debug!("{}: syntax error", challenge.id);
                return Self::failed(format!("YARA syntax error: {}", msg));
            }
            Err(e) => {
                debug!("{}: compilation error", challenge.id);
                return Self::failed(format!("YARA compilation error: {}", e));
            }
        }

        Evaluation {
            valid_syntax: Some(true),
            expected_strings_found: Some(find_expected_strings(rule, &challenge.expected_strings)),
            expected_keywords_found: Some(find_expected_keywords(rule, &challenge.expected_keywords)),
            ..Default::default()
        }
    }
}

/// `s` as it would be written inside a double-quoted rule string
fn quoted_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u8)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Expected strings the rule mentions, verbatim or in an encoded form
pub fn find_expected_strings(rule: &str, expected: &[String]) -> Vec<String> {
    expected
        .iter()
        .filter(|s| {
            rule.contains(s.as_str())
                || rule.contains(&quoted_literal(s))
                || rule.contains(&hex::encode(s.as_bytes()))
                || rule.contains(&s.replace('\\', "\\\\"))
        })
        .cloned()
        .collect()
}

/// Expected keywords the rule uses, case-insensitively
pub fn find_expected_keywords(rule: &str, expected: &[String]) -> Vec<String> {
    let rule_lower = rule.to_lowercase();
    expected
        .iter()
        .filter(|keyword| {
            let keyword = keyword.to_lowercase();
            if MODULE_KEYWORDS.contains(&keyword.as_str()) {
                rule_lower.contains(&format!("{}.", keyword))
                    || rule_lower.contains(&format!("import \"{}\"", keyword))
            } else {
                rule_lower.contains(&keyword)
            }
        })
        .cloned()
        .collect()
}
