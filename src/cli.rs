use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "yarabench")]
#[command(about = "Benchmark LLM-generated YARA rules: extraction, validation, execution and scoring")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output format (json, terminal); overrides the config file for `run`
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Write output to file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Args {
    /// Format for commands without a config file
    pub fn format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the benchmark described by a config file
    Run {
        /// YAML or JSON benchmark config
        #[arg(short, long)]
        config: PathBuf,

        /// Challenge data directory (overrides the config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Print the rules recovered from a saved model response
    Extract {
        /// File holding the raw response text
        response: PathBuf,
    },

    /// Evaluate a saved response against a challenge, offline and without a judge
    Score {
        /// Challenge JSON file
        #[arg(short, long)]
        challenge: PathBuf,

        /// File holding the raw response text
        #[arg(short, long)]
        response: PathBuf,

        /// Model name recorded in the result
        #[arg(long, default_value = crate::OFFLINE_MODEL)]
        model: String,
    },

    /// Check that challenge files load
    Check {
        /// Challenge data directory
        #[arg(long, default_value = crate::config::DEFAULT_DATA_DIR)]
        data_dir: PathBuf,
    },
}
