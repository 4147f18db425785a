//! Benchmark challenge definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Provenance tag for a challenge. Does not change how a challenge is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeLevel {
    /// Hand-written static JSON challenges
    Level1,
    /// LLM-synthesized challenges
    Level2,
    /// Threat intelligence report challenges
    Level3,
}

impl ChallengeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeLevel::Level1 => "level1",
            ChallengeLevel::Level2 => "level2",
            ChallengeLevel::Level3 => "level3",
        }
    }
}

impl fmt::Display for ChallengeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "level1" => Ok(ChallengeLevel::Level1),
            "level2" => Ok(ChallengeLevel::Level2),
            "level3" => Ok(ChallengeLevel::Level3),
            other => Err(format!("unknown challenge level: {}", other)),
        }
    }
}

/// One labeled content sample a generated rule is executed against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestFile {
    /// Display name, also the key in `RuleResult::execution_results`
    pub name: String,
    /// Base64 payload, possibly with broken padding or markdown noise
    pub content_b64: String,
    /// Ground truth: whether a correct rule matches this content
    pub should_match: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl TestFile {
    pub fn new(name: impl Into<String>, content_b64: impl Into<String>, should_match: bool) -> Self {
        Self {
            name: name.into(),
            content_b64: content_b64.into(),
            should_match,
            metadata: BTreeMap::new(),
        }
    }
}

/// A single benchmark item. Loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub level: ChallengeLevel,
    /// Whether a rule should be produced at all. When false, abstaining is correct.
    pub actionable: bool,
    pub description: String,
    /// Literal substrings the generated rule should reference
    #[serde(default)]
    pub expected_strings: Vec<String>,
    /// Rule-language features (e.g. `pe.imports`, `filesize`) the rule should use
    #[serde(default)]
    pub expected_keywords: Vec<String>,
    #[serde(default)]
    pub test_files: Vec<TestFile>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Challenge {
    /// Create an actionable challenge with no expectations or test files
    pub fn new(id: impl Into<String>, level: ChallengeLevel, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            level,
            actionable: true,
            description: description.into(),
            expected_strings: Vec::new(),
            expected_keywords: Vec::new(),
            test_files: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Returns the names of test files that appear more than once.
    /// Duplicate names collide in `execution_results` and skew the match score.
    pub fn duplicate_test_file_names(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for test_file in &self.test_files {
            if !seen.insert(test_file.name.as_str()) && !duplicates.contains(&test_file.name.as_str()) {
                duplicates.push(test_file.name.as_str());
            }
        }
        duplicates
    }
}
