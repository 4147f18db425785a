//! Challenge sources, one per level.
//!
//! Level 1 reads hand-written JSON challenges from `<data_dir>/level1`.
//! Level 3 (CTI reports) is a placeholder that yields nothing. Synthetic
//! level 2 generation is not provided.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{BenchError, Result};
use crate::types::{Challenge, ChallengeLevel};

/// Outcome of checking a level's challenge files
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LevelReport {
    pub valid: usize,
    /// (file, reason) for every file that failed to load
    pub invalid: Vec<(PathBuf, String)>,
}

impl LevelReport {
    /// A level is usable when at least one challenge loads
    pub fn is_usable(&self) -> bool {
        self.valid > 0
    }
}

/// A finite, ordered collection of challenges
pub trait ChallengeSource: Send + Sync {
    fn level(&self) -> ChallengeLevel;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Up to `count` challenges (all when `None`), in a stable order
    fn challenges(&self, count: Option<usize>) -> Result<Vec<Challenge>>;

    /// Check that the level is properly set up
    fn validate(&self) -> Result<LevelReport>;
}

/// Parse one challenge JSON file
pub fn load_challenge_file(path: &Path) -> Result<Challenge> {
    let text = std::fs::read_to_string(path).map_err(|e| BenchError::challenge_load(path, e.to_string()))?;
    let challenge: Challenge =
        serde_json::from_str(&text).map_err(|e| BenchError::challenge_load(path, e.to_string()))?;

    let duplicates = challenge.duplicate_test_file_names();
    if !duplicates.is_empty() {
        warn!(
            "{}: duplicate test file names {:?}, match results will collide",
            challenge.id, duplicates
        );
    }
    Ok(challenge)
}

/// Static JSON challenges
#[derive(Debug, Clone)]
pub struct StaticChallenges {
    dir: PathBuf,
}

impl StaticChallenges {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join(ChallengeLevel::Level1.as_str()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `*.json` files directly inside the level directory, sorted by name
    fn json_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| BenchError::challenge_load(&self.dir, e.to_string()))?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }
}

impl ChallengeSource for StaticChallenges {
    fn level(&self) -> ChallengeLevel {
        ChallengeLevel::Level1
    }

    fn name(&self) -> &str {
        "Level 1: Static Challenges"
    }

    fn description(&self) -> &str {
        "Pre-defined JSON challenges testing specific YARA rule capabilities"
    }

    fn challenges(&self, count: Option<usize>) -> Result<Vec<Challenge>> {
        if !self.dir.is_dir() {
            warn!("challenge directory {} does not exist", self.dir.display());
            return Ok(Vec::new());
        }

        let mut challenges = Vec::new();
        for path in self.json_files()? {
            match load_challenge_file(&path) {
                Ok(challenge) => challenges.push(challenge),
                Err(e) => warn!("skipping {}", e),
            }
        }
        debug!("loaded {} challenges from {}", challenges.len(), self.dir.display());

        if let Some(count) = count {
            challenges.truncate(count);
        }
        Ok(challenges)
    }

    fn validate(&self) -> Result<LevelReport> {
        if !self.dir.is_dir() {
            return Err(BenchError::challenge_dir_missing(&self.dir));
        }

        let mut report = LevelReport::default();
        for path in self.json_files()? {
            match load_challenge_file(&path) {
                Ok(_) => report.valid += 1,
                Err(e) => report.invalid.push((path, e.to_string())),
            }
        }
        Ok(report)
    }
}

/// CTI report challenges. Not populated yet; always empty and always valid.
#[derive(Debug, Default, Clone, Copy)]
pub struct CtiReportChallenges;

impl ChallengeSource for CtiReportChallenges {
    fn level(&self) -> ChallengeLevel {
        ChallengeLevel::Level3
    }

    fn name(&self) -> &str {
        "Level 3: CTI Report Challenges"
    }

    fn description(&self) -> &str {
        "Full threat intelligence reports with malware samples (mocked)"
    }

    fn challenges(&self, _count: Option<usize>) -> Result<Vec<Challenge>> {
        Ok(Vec::new())
    }

    fn validate(&self) -> Result<LevelReport> {
        Ok(LevelReport::default())
    }
}

/// Challenge source for one configured level
pub fn source_for(level: ChallengeLevel, data_dir: &Path) -> Result<Box<dyn ChallengeSource>> {
    match level {
        ChallengeLevel::Level1 => Ok(Box::new(StaticChallenges::new(data_dir))),
        ChallengeLevel::Level3 => Ok(Box::new(CtiReportChallenges)),
        ChallengeLevel::Level2 => Err(BenchError::unsupported_level(level.as_str())),
    }
}
