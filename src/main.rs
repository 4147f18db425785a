use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use yarabench::challenges::{ChallengeSource, StaticChallenges};
use yarabench::cli::{self, Command};
use yarabench::output::{self, OutputFormat};
use yarabench::{extract_rules, BenchConfig, Benchmark, Pipeline, YaraXEngine};

fn main() -> Result<()> {
    let args = cli::Args::parse();

    // Use RUST_LOG env var if set, otherwise use verbose flag
    // Examples: RUST_LOG=debug, RUST_LOG=yarabench::extractor=trace
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if args.verbose {
        EnvFilter::new("yarabench=debug")
    } else {
        EnvFilter::new("yarabench=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    debug!("Logging initialized (verbose={})", args.verbose);

    let format = args.format();
    let result = match &args.command {
        Command::Run { config, data_dir } => {
            return run_benchmark(config, data_dir.as_deref(), &args);
        }
        Command::Extract { response } => extract(response, format)?,
        Command::Score {
            challenge,
            response,
            model,
        } => score(challenge, response, model, format)?,
        Command::Check { data_dir } => check(data_dir, format)?,
    };

    // Status goes to stderr, results to stdout or the output file
    if let Some(output_path) = &args.output {
        fs::write(output_path, &result)
            .with_context(|| format!("Failed to write output to {}", output_path.display()))?;
        eprintln!("Results written to: {}", output_path.display());
    } else {
        print!("{}", result);
    }

    Ok(())
}

fn run_benchmark(config_path: &Path, data_dir: Option<&Path>, args: &cli::Args) -> Result<()> {
    let mut config = BenchConfig::load(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    if let Some(format) = args.format {
        config.output_format = format;
    }
    if let Some(output) = &args.output {
        config.output_file = Some(output.clone());
    }
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir.to_path_buf();
    }

    eprintln!("yarabench v{}", env!("CARGO_PKG_VERSION"));
    let sink = output::sink_for(config.output_format, config.output_file.clone());
    let benchmark = Benchmark::new(config, Arc::new(YaraXEngine::new()));
    let results = benchmark.run().context("Benchmark run failed")?;
    sink.write(&results)?;

    if let Some(path) = &benchmark.config().output_file {
        eprintln!("Results written to: {}", path.display());
    }
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn extract(response_path: &Path, format: OutputFormat) -> Result<String> {
    let rules = extract_rules(&read_text(response_path)?);
    debug!("extracted {} rules from {}", rules.len(), response_path.display());

    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(&rules)?)),
        OutputFormat::Terminal if rules.is_empty() => Ok("No YARA rules found\n".to_string()),
        OutputFormat::Terminal => Ok(format!("{}\n", rules.join("\n\n"))),
    }
}

fn score(challenge_path: &Path, response_path: &Path, model: &str, format: OutputFormat) -> Result<String> {
    let challenge = yarabench::challenges::load_challenge_file(challenge_path)?;
    let response = read_text(response_path)?;
    let pipeline = Pipeline::new(Arc::new(YaraXEngine::new()), None);
    let result = pipeline.score_response(&challenge, model, response, 0.0);

    match format {
        OutputFormat::Json => Ok(format!("{}\n", output::format_rule_result_json(&result)?)),
        OutputFormat::Terminal => {
            let mut text = format!(
                "Challenge: {}\nValid syntax: {}\nScore: {:.3}\n",
                result.challenge_id, result.valid_syntax, result.score
            );
            for (file, matched) in &result.execution_results {
                text.push_str(&format!("  {}: matched={}\n", file, matched));
            }
            if let Some(error) = &result.error {
                text.push_str(&format!("Error: {}\n", error));
            }
            Ok(text)
        }
    }
}

fn check(data_dir: &Path, format: OutputFormat) -> Result<String> {
    let source = StaticChallenges::new(data_dir);
    let report = source
        .validate()
        .with_context(|| format!("Failed to check {}", source.dir().display()))?;

    let text = match format {
        OutputFormat::Json => {
            let invalid: Vec<_> = report
                .invalid
                .iter()
                .map(|(path, reason)| json!({ "file": path.display().to_string(), "error": reason }))
                .collect();
            format!(
                "{}\n",
                serde_json::to_string_pretty(&json!({
                    "level": source.level(),
                    "valid": report.valid,
                    "invalid": invalid,
                }))?
            )
        }
        OutputFormat::Terminal => {
            let mut text = format!("{}: {} valid challenges\n", source.name(), report.valid);
            for (path, reason) in &report.invalid {
                text.push_str(&format!("  invalid {}: {}\n", path.display(), reason));
            }
            text
        }
    };

    if !report.is_usable() {
        eprint!("{}", text);
        anyhow::bail!("No valid challenges in {}", source.dir().display());
    }
    Ok(text)
}
