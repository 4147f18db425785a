//! yarabench - benchmark for LLM-generated YARA rules.
//!
//! This library recovers YARA rules from free-form model responses, checks
//! their structure, compiles and runs them against labeled test content, and
//! folds the results into a composite score per challenge.
//!
//! # Example
//!
//! ```no_run
//! use yarabench::{score_response, Challenge, ChallengeLevel, TestFile};
//!
//! let mut challenge = Challenge::new("demo", ChallengeLevel::Level1, "Detect the evil.com beacon");
//! challenge.expected_strings = vec!["evil.com".into()];
//! challenge.test_files = vec![TestFile::new("beacon", "ZXZpbC5jb20=", true)];
//!
//! let response = r#"rule Beacon { strings: $a = "evil.com" condition: $a }"#;
//! let result = score_response(&challenge, response);
//! println!("{}: {:.2}", result.challenge_id, result.score);
//! ```

pub mod benchmark;
pub mod challenges;
pub mod cli;
pub mod config;
pub mod decoders;
pub mod error;
pub mod evaluators;
pub mod extractor;
pub mod llm;
pub mod output;
pub mod scoring;
pub mod types;
pub mod yara_engine;

// Re-export commonly used types at crate root
pub use benchmark::{Benchmark, Pipeline};
pub use config::{BenchConfig, ModelConfig};
pub use error::{BenchError, Result};
pub use extractor::{extract_rules, extract_single_rule};
pub use scoring::composite_score;
pub use types::{BenchmarkResult, Challenge, ChallengeLevel, RuleResult, TestFile};
pub use yara_engine::{RuleEngine, YaraXEngine};

use std::sync::Arc;

/// Model name recorded by [`score_response`]
pub const OFFLINE_MODEL: &str = "offline";

/// Evaluate a saved response with the YARA-X engine and no judge
pub fn score_response(challenge: &Challenge, response: &str) -> RuleResult {
    Pipeline::new(Arc::new(YaraXEngine::new()), None).score_response(
        challenge,
        OFFLINE_MODEL,
        response.to_string(),
        0.0,
    )
}
