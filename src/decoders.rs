//! Decoders for test file payloads embedded in challenges.
//!
//! Challenge authors (and LLM-synthesized challenges) frequently ship base64
//! with broken padding, markdown fences or quotes around it. `normalize_base64`
//! cleans the text without ever failing; `decode_payload` turns it into bytes.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use regex::Regex;
use std::sync::LazyLock;

static NON_BASE64: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9+/=]").expect("static regex"));

/// Lenient engine: padding optional, trailing bits ignored
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Remove markdown code fences and surrounding backticks from model-produced text.
/// Lines are trimmed and blank lines dropped.
pub fn clean_text_output(text: &str) -> String {
    let mut text = if text.contains("```") {
        text.lines()
            // a fence line is only backticks plus a short language tag
            .filter(|line| {
                let trimmed = line.trim();
                !(trimmed.starts_with("```") && trimmed.len() <= 10)
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text.to_string()
    };

    let trimmed = text.trim();
    text = if trimmed.len() >= 2 && trimmed.starts_with('`') && trimmed.ends_with('`') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    };

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Best-effort repair of a base64 string. Never fails.
///
/// Strips fences, quotes and line breaks, drops everything outside the base64
/// alphabet and pads the result to a multiple of four characters.
pub fn normalize_base64(input: &str) -> String {
    let cleaned = clean_text_output(input);
    let cleaned: String = cleaned
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '"' | '\''))
        .collect();

    let mut normalized = NON_BASE64.replace_all(&cleaned, "").into_owned();

    let missing = normalized.len() % 4;
    if missing != 0 {
        normalized.push_str(&"=".repeat(4 - missing));
    }
    normalized
}

/// Normalize and decode a base64 payload.
///
/// A single dangling character (data length of 1 mod 4) carries no complete
/// byte and is dropped rather than rejected.
pub fn decode_payload(content_b64: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let normalized = normalize_base64(content_b64);
    let mut data = normalized.trim_end_matches('=');
    if data.len() % 4 == 1 {
        data = &data[..data.len() - 1];
    }
    LENIENT.decode(data)
}
