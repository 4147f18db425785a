//! Output formatting and reporting.
//!
//! Results go to an explicit [`OutputSink`] value rather than a global printer:
//! - `JsonSink`: the full `BenchmarkResult` list as pretty JSON
//! - `TerminalSink`: colored summary table plus per-challenge details

use crate::types::{BenchmarkResult, RuleResult};
use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

const ERROR_PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output for machine consumption
    Json,
    /// Human-readable terminal output
    #[default]
    Terminal,
}

/// Where formatted results end up
pub trait OutputSink {
    fn write(&self, results: &[BenchmarkResult]) -> Result<()>;
}

/// Write `text` to `path`, or stdout when there is none
fn emit(path: Option<&PathBuf>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing results to {}", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

/// Pretty JSON, to a file or stdout
#[derive(Debug, Clone, Default)]
pub struct JsonSink {
    pub path: Option<PathBuf>,
}

impl JsonSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl OutputSink for JsonSink {
    fn write(&self, results: &[BenchmarkResult]) -> Result<()> {
        emit(self.path.as_ref(), &format_json(results)?)
    }
}

/// Colored tables, to stdout (or plain text to a file)
#[derive(Debug, Clone, Default)]
pub struct TerminalSink {
    pub path: Option<PathBuf>,
}

impl TerminalSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl OutputSink for TerminalSink {
    fn write(&self, results: &[BenchmarkResult]) -> Result<()> {
        if self.path.is_some() {
            colored::control::set_override(false);
        }
        let text = format_terminal(results);
        if self.path.is_some() {
            colored::control::unset_override();
        }
        emit(self.path.as_ref(), &text)
    }
}

/// Sink for a format and optional output file
pub fn sink_for(format: OutputFormat, path: Option<PathBuf>) -> Box<dyn OutputSink> {
    match format {
        OutputFormat::Json => Box::new(JsonSink::new(path)),
        OutputFormat::Terminal => Box::new(TerminalSink::new(path)),
    }
}

/// Format benchmark results as JSON
pub fn format_json(results: &[BenchmarkResult]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

/// Format a single rule result as JSON
pub fn format_rule_result_json(result: &RuleResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

fn truncate(text: &str, max: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > max || first_line.len() < text.len() {
        format!("{}...", first_line.chars().take(max).collect::<String>())
    } else {
        first_line.to_string()
    }
}

/// Format benchmark results for a terminal
pub fn format_terminal(results: &[BenchmarkResult]) -> String {
    let mut output = String::new();
    if results.is_empty() {
        output.push_str(&format!("{}\n", "No results to display".yellow()));
        return output;
    }

    output.push_str(&format!("\n{}\n", "Benchmark Summary".bright_white().bold()));
    output.push_str(&format!(
        "{:<28} {:>7} {:>7} {:>7} {:>10}\n",
        "Model", "Total", "Valid", "Score", "Time (s)"
    ));
    for result in results {
        output.push_str(&format!(
            "{} {:>7} {} {:>7.2} {:>10.1}\n",
            format!("{:<28}", result.model).cyan(),
            result.total_challenges,
            format!("{:>7}", result.successful_challenges).green(),
            result.average_score,
            result.total_time_ms / 1000.0
        ));
    }

    for result in results {
        output.push_str(&format_model_details(result));
    }
    output
}

fn format_model_details(result: &BenchmarkResult) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "\n{}\n",
        format!("Detailed Results for {}", result.model).cyan().bold()
    ));
    output.push_str(&format!(
        "{:<32} {:^5} {:>6} {:>12}  {}\n",
        "Challenge ID", "Valid", "Score", "Latency (ms)", "Error"
    ));

    for r in &result.results {
        let valid = if r.valid_syntax { "✅" } else { "❌" };
        let error = r.error.as_deref().map(|e| truncate(e, ERROR_PREVIEW_CHARS)).unwrap_or_default();
        output.push_str(&format!(
            "{} {:^5} {:>6.2} {:>12.1}  {}\n",
            format!("{:<32}", r.challenge_id).dimmed(),
            valid,
            r.score,
            r.latency_ms,
            error.red()
        ));
    }

    let success_rate = if result.total_challenges > 0 {
        format!(
            "{:.1}%",
            result.successful_challenges as f64 / result.total_challenges as f64 * 100.0
        )
    } else {
        "N/A".to_string()
    };
    output.push_str(&format!("  Total Challenges: {}\n", result.total_challenges));
    output.push_str(&format!("  {}\n", format!("Successful: {}", result.successful_challenges).green()));
    output.push_str(&format!("  {}\n", format!("Success Rate: {}", success_rate).blue()));
    output.push_str(&format!("  {}\n", format!("Average Score: {:.2}", result.average_score).yellow()));
    output.push_str(&format!(
        "  {}\n",
        format!("Total Time: {:.1}s", result.total_time_ms / 1000.0).magenta()
    ));
    output
}
