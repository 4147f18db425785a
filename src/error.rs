use std::path::PathBuf;
use thiserror::Error;

/// Error types for configuration, challenge loading and result output.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to load challenge {path}: {message}")]
    ChallengeLoad { path: PathBuf, message: String },

    #[error("Challenge directory not found: {path}")]
    ChallengeDirMissing { path: PathBuf },

    #[error("Unsupported challenge level: {level}")]
    UnsupportedLevel { level: String },

    #[error("Rule generation failed: {0}")]
    Generation(#[from] crate::llm::LlmError),
}

pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn challenge_load<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::ChallengeLoad { path: path.into(), message: message.into() }
    }

    pub fn challenge_dir_missing<P: Into<PathBuf>>(path: P) -> Self {
        Self::ChallengeDirMissing { path: path.into() }
    }

    pub fn unsupported_level<S: Into<String>>(level: S) -> Self {
        Self::UnsupportedLevel { level: level.into() }
    }
}
