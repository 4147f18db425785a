//! Cheap shape checks that gate every engine compile

use thiserror::Error;

/// Why a rule failed the structural gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("Empty rule")]
    Empty,

    #[error("Incomplete rule structure - missing 'rule' keyword")]
    MissingRuleKeyword,

    #[error("Incomplete rule structure - missing opening brace")]
    MissingOpeningBrace,

    #[error("Incomplete rule structure - missing closing brace")]
    MissingClosingBrace,

    #[error("Incomplete rule structure - missing condition")]
    MissingCondition,

    #[error("Incomplete rule structure - unbalanced braces")]
    UnbalancedBraces,
}

/// Check the minimum shape of a rule before handing it to the engine.
///
/// Braces are counted raw, literals included. Passing does not mean the
/// engine will accept the rule.
pub fn validate_structure(rule: &str) -> Result<(), StructureError> {
    if rule.trim().is_empty() {
        return Err(StructureError::Empty);
    }
    if !rule.contains("rule ") {
        return Err(StructureError::MissingRuleKeyword);
    }
    if !rule.contains('{') {
        return Err(StructureError::MissingOpeningBrace);
    }
    if !rule.contains('}') {
        return Err(StructureError::MissingClosingBrace);
    }
    if !rule.contains("condition:") {
        return Err(StructureError::MissingCondition);
    }
    if rule.matches('{').count() != rule.matches('}').count() {
        return Err(StructureError::UnbalancedBraces);
    }
    Ok(())
}
