use crate::error::{BenchError, Result};
use crate::output::OutputFormat;
use crate::types::ChallengeLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Upper bound on the base retry delay
pub const MAX_RETRY_DELAY_SECS: f64 = 3600.0;

/// One model endpoint to benchmark (or to judge with)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Falls back to `OPENAI_API_KEY` when absent
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_max_tokens() -> u32 {
    2000
}

const fn default_timeout_secs() -> u64 {
    30
}

impl ModelConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: default_base_url(),
            api_key: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Configured key, else the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BenchError::configuration("model name must not be empty"));
        }
        if self.base_url.trim().is_empty() {
            return Err(BenchError::configuration(format!("model {}: base_url must not be empty", self.name)));
        }
        if self.timeout_secs == 0 {
            return Err(BenchError::configuration(format!(
                "model {}: timeout_secs must be greater than 0",
                self.name
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(BenchError::configuration(format!(
                "model {}: temperature must be within [0, 2]",
                self.name
            )));
        }
        if self.max_tokens == 0 {
            return Err(BenchError::configuration(format!(
                "model {}: max_tokens must be greater than 0",
                self.name
            )));
        }
        Ok(())
    }
}

/// Benchmark run configuration, loaded from YAML or JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    pub models: Vec<ModelConfig>,
    #[serde(default = "default_levels")]
    pub levels: Vec<ChallengeLevel>,
    #[serde(default)]
    pub judge_model: Option<ModelConfig>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,
    /// Evaluate one model's challenges concurrently
    #[serde(default)]
    pub parallel: bool,
    /// Cap on challenges taken from each level
    #[serde(default)]
    pub max_challenges: Option<usize>,
}

fn default_levels() -> Vec<ChallengeLevel> {
    vec![ChallengeLevel::Level1]
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_secs() -> f64 {
    1.0
}

impl BenchConfig {
    /// A config benchmarking `models` with every other setting at its default
    #[must_use]
    pub fn for_models(models: Vec<ModelConfig>) -> Self {
        Self {
            models,
            levels: default_levels(),
            judge_model: None,
            data_dir: default_data_dir(),
            output_format: OutputFormat::default(),
            output_file: None,
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            parallel: false,
            max_challenges: None,
        }
    }

    /// Load from a `.yaml`/`.yml` or `.json` file and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) {
            Some(ext) if ext == "json" => serde_json::from_str(&text)?,
            Some(ext) if ext == "yaml" || ext == "yml" => serde_yaml::from_str(&text)?,
            _ => {
                return Err(BenchError::configuration(format!(
                    "unsupported config format: {} (expected .yaml, .yml or .json)",
                    path.display()
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Base retry delay, clamped to `[0, MAX_RETRY_DELAY_SECS]`
    pub fn retry_delay(&self) -> Duration {
        let secs = self.retry_delay_secs.clamp(0.0, MAX_RETRY_DELAY_SECS);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    /// Validate the configuration and return errors for invalid settings
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(BenchError::configuration("at least one model must be configured"));
        }
        for model in &self.models {
            model.validate()?;
        }
        if let Some(judge) = &self.judge_model {
            judge.validate()?;
        }

        if self.levels.is_empty() {
            return Err(BenchError::configuration("at least one level must be configured"));
        }
        if self.levels.contains(&ChallengeLevel::Level2) {
            return Err(BenchError::unsupported_level(ChallengeLevel::Level2.as_str()));
        }

        if !(0.0..=MAX_RETRY_DELAY_SECS).contains(&self.retry_delay_secs) {
            return Err(BenchError::configuration(format!(
                "retry_delay_secs must be within [0, {}]",
                MAX_RETRY_DELAY_SECS
            )));
        }
        if self.max_challenges == Some(0) {
            return Err(BenchError::configuration("max_challenges must be greater than 0"));
        }

        Ok(())
    }
}
