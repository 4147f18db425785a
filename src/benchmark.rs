//! Benchmark orchestration.
//!
//! A [`Pipeline`] turns one model response into a [`RuleResult`]: extract a
//! rule, run the evaluators in order, score. A [`Benchmark`] drives the
//! pipeline over every configured model and level.
//!
//! Nothing that goes wrong inside a single challenge stops the run; it ends
//! up as that challenge's `error` with a fixed score.

use rayon::prelude::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, debug_span, info, info_span, warn};

use crate::challenges::source_for;
use crate::config::{BenchConfig, ModelConfig};
use crate::error::{BenchError, Result};
use crate::evaluators::{
    evaluate_all, Evaluation, Evaluator, ExecutionEvaluator, JudgeEvaluator, SyntaxFeatureEvaluator,
};
use crate::extractor::extract_single_rule;
use crate::llm::{format_challenge_prompt, OpenAiClient, RetryingGenerator, TextGenerator, SYSTEM_PROMPT};
use crate::scoring::composite_score;
use crate::types::{BenchmarkResult, Challenge, RuleResult};
use crate::yara_engine::RuleEngine;

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Ordered evaluators plus the extraction and scoring around them
pub struct Pipeline {
    evaluators: Vec<Box<dyn Evaluator>>,
    judged: bool,
}

impl Pipeline {
    /// Syntax/feature, then execution, then the judge when there is one
    pub fn new(engine: Arc<dyn RuleEngine>, judge: Option<Arc<dyn TextGenerator>>) -> Self {
        let mut evaluators: Vec<Box<dyn Evaluator>> = vec![
            Box::new(SyntaxFeatureEvaluator::new(engine.clone())),
            Box::new(ExecutionEvaluator::new(engine)),
        ];
        let judged = judge.is_some();
        if let Some(judge) = judge {
            evaluators.push(Box::new(JudgeEvaluator::new(judge)));
        }
        Self { evaluators, judged }
    }

    /// Custom evaluator list, treated as unjudged
    pub fn from_evaluators(evaluators: Vec<Box<dyn Evaluator>>) -> Self {
        Self {
            evaluators,
            judged: false,
        }
    }

    pub fn has_judge(&self) -> bool {
        self.judged
    }

    /// Evaluate an already generated response
    pub fn score_response(&self, challenge: &Challenge, model: &str, response: String, latency_ms: f64) -> RuleResult {
        let Some(rule) = extract_single_rule(&response) else {
            return if challenge.actionable {
                debug!("{}: no rule extracted", challenge.id);
                RuleResult::no_rule(&challenge.id, model, response, latency_ms)
            } else {
                debug!("{}: correct abstention", challenge.id);
                RuleResult::abstained(&challenge.id, model, response, latency_ms)
            };
        };

        let evaluation = evaluate_all(&self.evaluators, challenge, &rule);
        let score = composite_score(challenge, &evaluation);
        debug!("{}: score {:.3}", challenge.id, score);
        build_result(challenge, model, rule, response, evaluation, score, latency_ms)
    }

    /// Generate a response for `challenge` and evaluate it. Never fails:
    /// generation errors and panics become a zero-score result.
    pub fn evaluate_challenge(&self, generator: &dyn TextGenerator, challenge: &Challenge) -> RuleResult {
        let model = generator.model_name();
        let _span = debug_span!("challenge", id = %challenge.id).entered();
        let start = Instant::now();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let prompt = format_challenge_prompt(challenge);
            let response = generator.generate(&prompt, Some(SYSTEM_PROMPT));
            let latency_ms = elapsed_ms(start);
            match response {
                Ok(response) => self.score_response(challenge, model, response, latency_ms),
                Err(e) => {
                    let err = BenchError::from(e);
                    warn!("{}: {}", challenge.id, err);
                    RuleResult::failed(&challenge.id, model, err.to_string(), latency_ms)
                }
            }
        }));

        outcome.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!("{}: evaluation panicked: {}", challenge.id, message);
            RuleResult::failed(
                &challenge.id,
                model,
                format!("Evaluation failed: {}", message),
                elapsed_ms(start),
            )
        })
    }
}

fn build_result(
    challenge: &Challenge,
    model: &str,
    rule: String,
    response: String,
    evaluation: Evaluation,
    score: f64,
    latency_ms: f64,
) -> RuleResult {
    let error = evaluation.error();
    let valid_syntax = evaluation.valid_syntax();
    let (llm_judge_score, llm_judge_feedback, llm_judge_details) = match evaluation.judge {
        Some(verdict) => (Some(verdict.score), Some(verdict.feedback), Some(verdict.details)),
        None => (None, None, None),
    };

    RuleResult {
        generated_rule: Some(rule),
        valid_syntax,
        execution_results: evaluation.execution_results.unwrap_or_default(),
        expected_strings_found: evaluation.expected_strings_found.unwrap_or_default(),
        expected_keywords_found: evaluation.expected_keywords_found.unwrap_or_default(),
        score,
        error,
        llm_judge_score,
        llm_judge_feedback,
        llm_judge_details,
        ..RuleResult::bare(&challenge.id, model, response, latency_ms)
    }
}

/// Network-backed generator for one configured model
pub fn generator_for(model: &ModelConfig, config: &BenchConfig) -> Box<dyn TextGenerator> {
    Box::new(RetryingGenerator::new(
        OpenAiClient::new(model),
        config.max_retries,
        config.retry_delay(),
    ))
}

/// Runs every configured model over every configured level
pub struct Benchmark {
    config: BenchConfig,
    pipeline: Pipeline,
}

impl Benchmark {
    /// Pipeline with the configured judge model, if any
    pub fn new(config: BenchConfig, engine: Arc<dyn RuleEngine>) -> Self {
        let judge: Option<Arc<dyn TextGenerator>> = config
            .judge_model
            .as_ref()
            .map(|judge| Arc::from(generator_for(judge, &config)));
        let pipeline = Pipeline::new(engine, judge);
        Self { config, pipeline }
    }

    pub fn with_pipeline(config: BenchConfig, pipeline: Pipeline) -> Self {
        Self { config, pipeline }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Challenges of every configured level, in level order
    pub fn load_challenges(&self) -> Result<Vec<Challenge>> {
        let mut challenges = Vec::new();
        for &level in &self.config.levels {
            let source = source_for(level, &self.config.data_dir)?;
            let loaded = source.challenges(self.config.max_challenges)?;
            info!("{}: {} challenges", source.name(), loaded.len());
            challenges.extend(loaded);
        }
        Ok(challenges)
    }

    /// Evaluate one model over `challenges`. Results keep challenge order.
    pub fn run_model(&self, generator: &dyn TextGenerator, challenges: &[Challenge]) -> BenchmarkResult {
        let model = generator.model_name();
        let _span = info_span!("model", name = %model).entered();
        info!(
            "benchmarking {} on {} challenges (judge: {})",
            model,
            challenges.len(),
            self.pipeline.has_judge()
        );
        let start = Instant::now();

        let results: Vec<RuleResult> = if self.config.parallel {
            challenges
                .par_iter()
                .map(|challenge| self.pipeline.evaluate_challenge(generator, challenge))
                .collect()
        } else {
            challenges
                .iter()
                .map(|challenge| self.pipeline.evaluate_challenge(generator, challenge))
                .collect()
        };

        let summary = BenchmarkResult::from_results(model, self.config.levels.clone(), results, elapsed_ms(start));
        info!(
            "{}: {}/{} valid, average score {:.3}",
            model, summary.successful_challenges, summary.total_challenges, summary.average_score
        );
        summary
    }

    /// Run the given generators, one model after another
    pub fn run_with(&self, generators: &[Box<dyn TextGenerator>]) -> Result<Vec<BenchmarkResult>> {
        let challenges = self.load_challenges()?;
        if challenges.is_empty() {
            warn!("no challenges loaded from {}", self.config.data_dir.display());
        }
        Ok(generators
            .iter()
            .map(|generator| self.run_model(generator.as_ref(), &challenges))
            .collect())
    }

    /// Run every configured model
    pub fn run(&self) -> Result<Vec<BenchmarkResult>> {
        let generators: Vec<Box<dyn TextGenerator>> = self
            .config
            .models
            .iter()
            .map(|model| generator_for(model, &self.config))
            .collect();
        self.run_with(&generators)
    }
}
