//! Type definitions for challenges and evaluation results
//!
//! Challenges are read-only inputs loaded once per run. `RuleResult` is created
//! fresh per (model, challenge) evaluation and aggregated into a `BenchmarkResult`.

mod challenge;
mod result;

pub use challenge::{Challenge, ChallengeLevel, TestFile};
pub use result::{BenchmarkResult, RuleResult};

#[cfg(test)]
mod tests;
