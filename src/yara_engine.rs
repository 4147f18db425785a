//! Rule compiler/engine boundary.
//!
//! The benchmark only needs two capabilities from a rule engine: compile a
//! source string (telling syntax errors apart from other compile failures)
//! and report whether compiled rules match a byte buffer. `YaraXEngine` backs
//! both with YARA-X.

use std::fmt;
use thiserror::Error;
use tracing::trace;

/// Failure modes of the rule engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The source is not valid rule-language syntax
    #[error("{0}")]
    Syntax(String),

    /// The source parsed but could not be compiled (unknown module, type error, ...)
    #[error("{0}")]
    Compile(String),

    /// Compiled rules failed while scanning data
    #[error("{0}")]
    Scan(String),
}

/// Rules compiled by a `RuleEngine`, ready to run against data
pub trait CompiledRules {
    /// Returns true if at least one rule matches `data`
    fn is_match(&self, data: &[u8]) -> Result<bool, EngineError>;
}

/// A rule compiler. Compiled rules are never shared across evaluations.
pub trait RuleEngine: Send + Sync {
    fn name(&self) -> &str;

    fn compile(&self, source: &str) -> Result<Box<dyn CompiledRules>, EngineError>;
}

/// YARA-X engine
#[derive(Debug, Default, Clone, Copy)]
pub struct YaraXEngine;

impl YaraXEngine {
    pub fn new() -> Self {
        Self
    }
}

struct YaraXRules {
    rules: yara_x::Rules,
}

impl fmt::Debug for YaraXRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YaraXRules").finish_non_exhaustive()
    }
}

impl CompiledRules for YaraXRules {
    fn is_match(&self, data: &[u8]) -> Result<bool, EngineError> {
        let mut scanner = yara_x::Scanner::new(&self.rules);
        let results = scanner
            .scan(data)
            .map_err(|e| EngineError::Scan(e.to_string()))?;
        let matched = results.matching_rules().next().is_some();
        trace!("scanned {} bytes, matched={}", data.len(), matched);
        Ok(matched)
    }
}

/// YARA-X reports syntax errors with this label
fn is_syntax_error(message: &str) -> bool {
    message.to_lowercase().contains("syntax error")
}

impl RuleEngine for YaraXEngine {
    fn name(&self) -> &str {
        "yara-x"
    }

    fn compile(&self, source: &str) -> Result<Box<dyn CompiledRules>, EngineError> {
        let mut compiler = yara_x::Compiler::new();
        compiler.new_namespace("benchmark");
        if let Err(e) = compiler.add_source(source.as_bytes()) {
            let message = e.to_string();
            return Err(if is_syntax_error(&message) {
                EngineError::Syntax(message)
            } else {
                EngineError::Compile(message)
            });
        }
        Ok(Box::new(YaraXRules { rules: compiler.build() }))
    }
}
