//! Text generation: the `TextGenerator` seam, an OpenAI-compatible chat
//! client and a retry wrapper with exponential backoff.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::types::Challenge;

pub const SYSTEM_PROMPT: &str = "You are a cybersecurity expert specialized in writing YARA rules for malware detection.

When given a description of malware behavior or characteristics, you should:
1. Generate a valid YARA rule that accurately detects the described patterns
2. Use basic YARA features (strings, conditions, meta, etc.) - avoid using modules when possible
3. Focus on string-based detection rather than complex module-based analysis
4. Make the rule as specific as possible to avoid false positives
5. Include relevant metadata in the rule

IMPORTANT: Prefer string-based detection over module usage. Only use modules when absolutely necessary and when the challenge explicitly requires it. Most detection can be accomplished with basic string matching and conditions.

If the description is not actionable or cannot be effectively detected with a YARA rule, respond with an explanation of why a YARA rule is not suitable for this case.

Always provide just the YARA rule without additional explanation unless the task is not suitable for YARA detection.";

/// Errors from a text generation backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("failed to generate after {retries} retries: {last}")]
    Exhausted { retries: u32, last: Box<LlmError> },
}

impl LlmError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport(_) => true,
            LlmError::Status { code, .. } => *code == 408 || *code == 429 || *code >= 500,
            LlmError::InvalidResponse(_) | LlmError::Exhausted { .. } => false,
        }
    }
}

/// Anything that turns a prompt into text
pub trait TextGenerator: Send + Sync {
    /// Model identifier, used for reporting
    fn model_name(&self) -> &str;

    fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, LlmError>;
}

/// Generator backed by a closure
pub struct FnGenerator<F> {
    name: String,
    f: F,
}

impl<F> FnGenerator<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str, Option<&str>) -> Result<String, LlmError> + Send + Sync,
    {
        Self { name: name.into(), f }
    }
}

impl<F> TextGenerator for FnGenerator<F>
where
    F: Fn(&str, Option<&str>) -> Result<String, LlmError> + Send + Sync,
{
    fn model_name(&self) -> &str {
        &self.name
    }

    fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, LlmError> {
        (self.f)(prompt, system_prompt)
    }
}

/// User prompt for one challenge
pub fn format_challenge_prompt(challenge: &Challenge) -> String {
    let mut prompt = format!(
        "Create a YARA rule based on the following description:\n\n{}",
        challenge.description
    );
    if !challenge.expected_strings.is_empty() {
        let quoted: Vec<String> = challenge.expected_strings.iter().map(|s| format!("{:?}", s)).collect();
        prompt.push_str(&format!(
            "\n\nHint: The rule should detect these strings: {}",
            quoted.join(", ")
        ));
    }
    if !challenge.expected_keywords.is_empty() {
        prompt.push_str(&format!(
            "\n\nHint: Consider using these YARA features: {}",
            challenge.expected_keywords.join(", ")
        ));
    }
    prompt
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for OpenAI-compatible `/chat/completions` endpoints
pub struct OpenAiClient {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &ModelConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self {
            agent,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.name.clone(),
            api_key: config.resolved_api_key(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn llm_error_from_ureq(err: ureq::Error) -> LlmError {
    match err {
        ureq::Error::Status(code, response) => LlmError::Status {
            code,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => LlmError::Transport(transport.to_string()),
    }
}

impl TextGenerator for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut call = self.agent.post(&self.endpoint).set("content-type", "application/json");
        if let Some(key) = self.api_key.as_deref() {
            call = call.set("authorization", &format!("Bearer {}", key));
        }

        debug!("POST {} (model={})", self.endpoint, self.model);
        let response = call.send_json(&request).map_err(llm_error_from_ureq)?;
        let body: ChatResponse = response
            .into_json()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

/// Retries retryable failures with exponential backoff: the n-th retry
/// waits `base_delay * 2^n`.
pub struct RetryingGenerator<G> {
    inner: G,
    max_retries: u32,
    base_delay: Duration,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, LlmError> {
        let mut retry = 0;
        loop {
            match self.inner.generate(prompt, system_prompt) {
                Ok(text) => return Ok(text),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if retry >= self.max_retries => {
                    return Err(LlmError::Exhausted {
                        retries: self.max_retries,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.backoff(retry);
                    warn!(
                        "{}: {} (retry {}/{} in {:?})",
                        self.inner.model_name(),
                        e,
                        retry + 1,
                        self.max_retries,
                        delay
                    );
                    thread::sleep(delay);
                    retry += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChallengeLevel;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails `failures` times with `error`, then succeeds
    fn flaky(failures: u32, error: LlmError) -> (impl TextGenerator, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let generator = FnGenerator::new("flaky", move |_: &str, _: Option<&str>| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                Err(error.clone())
            } else {
                Ok("rule R { condition: true }".to_string())
            }
        });
        (generator, calls)
    }

    #[test]
    fn test_retry_until_success() {
        let (inner, calls) = flaky(2, LlmError::Transport("reset".into()));
        let generator = RetryingGenerator::new(inner, 3, Duration::ZERO);
        assert_eq!(generator.generate("p", None).unwrap(), "rule R { condition: true }");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retries_exhausted() {
        let (inner, calls) = flaky(10, LlmError::Status { code: 503, body: "busy".into() });
        let generator = RetryingGenerator::new(inner, 2, Duration::ZERO);
        let err = generator.generate("p", None).unwrap_err();
        assert!(matches!(err, LlmError::Exhausted { retries: 2, .. }));
        assert!(err.to_string().contains("HTTP 503: busy"));
        // first attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_non_retryable_fails_fast() {
        let (inner, calls) = flaky(10, LlmError::Status { code: 401, body: "bad key".into() });
        let generator = RetryingGenerator::new(inner, 3, Duration::ZERO);
        assert!(matches!(generator.generate("p", None), Err(LlmError::Status { code: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exponential_backoff() {
        let (inner, _) = flaky(0, LlmError::Transport(String::new()));
        let generator = RetryingGenerator::new(inner, 3, Duration::from_millis(500));
        assert_eq!(generator.backoff(0), Duration::from_millis(500));
        assert_eq!(generator.backoff(1), Duration::from_secs(1));
        assert_eq!(generator.backoff(2), Duration::from_secs(2));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Transport("timeout".into()).is_retryable());
        assert!(LlmError::Status { code: 429, body: String::new() }.is_retryable());
        assert!(LlmError::Status { code: 500, body: String::new() }.is_retryable());
        assert!(!LlmError::Status { code: 400, body: String::new() }.is_retryable());
        assert!(!LlmError::InvalidResponse("{}".into()).is_retryable());
    }

    #[test]
    fn test_challenge_prompt_hints() {
        let mut c = Challenge::new("p", ChallengeLevel::Level1, "Detect the loader.");
        assert_eq!(
            format_challenge_prompt(&c),
            "Create a YARA rule based on the following description:\n\nDetect the loader."
        );

        c.expected_strings = vec!["evil.com".into(), "cmd.exe".into()];
        c.expected_keywords = vec!["filesize".into()];
        let prompt = format_challenge_prompt(&c);
        assert!(prompt.contains("\n\nHint: The rule should detect these strings: \"evil.com\", \"cmd.exe\""));
        assert!(prompt.ends_with("\n\nHint: Consider using these YARA features: filesize"));
    }

    #[test]
    fn test_fn_generator_passes_system_prompt() {
        let generator = FnGenerator::new("echo", |prompt: &str, system: Option<&str>| {
            Ok(format!("{}|{}", system.unwrap_or("-"), prompt))
        });
        assert_eq!(generator.generate("hi", Some("sys")).unwrap(), "sys|hi");
        assert_eq!(generator.model_name(), "echo");
    }
}
