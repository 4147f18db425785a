//! Recover YARA rules from free-form LLM responses.
//!
//! Extraction runs in two phases per candidate span: a manual brace-depth
//! scanner first (see [`scan`]), then a short list of increasingly permissive
//! regex patterns when the scanner produced nothing usable. Every candidate is
//! cleaned (see [`clean`]), checked for a plausible rule shape and deduplicated.
//! Results keep first-found order.

mod clean;
mod scan;

pub use clean::clean_rule;

use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Phrases a model uses when it decides no rule should be written
pub const NO_RULE_INDICATORS: &[&str] = &[
    "not actionable",
    "cannot be detected",
    "no yara rule",
    "not possible",
    "cannot create",
    "not suitable",
    "beyond yara",
    "beyond the capabilities",
];

/// Fenced code blocks, including common mislabelings
static CODE_BLOCK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)```yara\s*\n(.*?)```",
        r"(?is)```yar\s*\n(.*?)```",
        r"(?is)```\s*\n(.*?)```",
        r"(?is)```yaml\s*\n(.*?)```",
        r"(?is)```rule\s*\n(.*?)```",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

/// Regex fallbacks, most specific first
static FALLBACK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // balanced body with one level of nesting
        r"(?is)rule\s+\w+(?:\s*:[\w \t]*)?\s*\{(?:[^{}]*\{[^{}]*\})*[^{}]*\}",
        // any of the section markers
        r"(?ism)rule\s+\w+(?:\s*:[\w \t]*)?\s*\{.*?(?:meta:|strings:|condition:).*?\}\s*$",
        // anything with a condition
        r"(?ism)rule\s+\w+[^{]*\{.*?condition:.*?\}\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

/// Minimum shape of a usable rule: `rule <name> [: tags] { ... condition: ... }`
static VALID_RULE_STRUCTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)(?:(?:import\s+"[^"]+"\s*\n)*\s*)?rule\s+\w+(?:\s*:[\w \t]*)?\s*\{.*?condition:\s*.*?\}"#,
    )
    .expect("static regex")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Returns true if the response says the task should not be answered with a rule
pub fn indicates_no_rule(response: &str) -> bool {
    let lower = response.to_lowercase();
    NO_RULE_INDICATORS.iter().any(|indicator| lower.contains(indicator))
}

/// Returns true if `text` has the minimum shape of a rule
pub fn is_valid_rule_structure(text: &str) -> bool {
    !text.trim().is_empty() && VALID_RULE_STRUCTURE.is_match(text)
}

/// Extract every distinct rule from an LLM response, in the order found.
///
/// Returns an empty list for abstentions and for responses without a
/// recoverable rule. Never fails.
pub fn extract_rules(response: &str) -> Vec<String> {
    if response.trim().is_empty() {
        return Vec::new();
    }
    if indicates_no_rule(response) {
        debug!("response indicates no rule is needed");
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for block in fenced_blocks(response) {
        candidates.extend(extract_from_text(block));
    }
    if candidates.is_empty() {
        candidates = extract_from_text(response);
    }
    trace!("{} raw candidates", candidates.len());

    dedup_rules(candidates.iter().map(|c| clean_rule(c)))
}

/// Extract the first rule from a response, if any
pub fn extract_single_rule(response: &str) -> Option<String> {
    extract_rules(response).into_iter().next()
}

/// Contents of every fenced code block, in source order
fn fenced_blocks(response: &str) -> Vec<&str> {
    let mut blocks: Vec<(usize, &str)> = Vec::new();
    for pattern in CODE_BLOCK_PATTERNS.iter() {
        for caps in pattern.captures_iter(response) {
            if let Some(block) = caps.get(1) {
                if !blocks.iter().any(|&(start, _)| start == block.start()) {
                    blocks.push((block.start(), block.as_str()));
                }
            }
        }
    }
    blocks.sort_by_key(|&(start, _)| start);
    blocks.into_iter().map(|(_, block)| block).collect()
}

/// Plain-text extraction over unfenced text (or the inside of one fence)
fn extract_from_text(text: &str) -> Vec<String> {
    let keywords = scan::keyword_positions(text);
    let declarations = scan::declaration_positions(text);
    let mut rules = Vec::new();

    for &start in &keywords {
        let span_end = declarations
            .iter()
            .copied()
            .find(|&d| d > start)
            .unwrap_or(text.len());

        if let Some(rule) = scan::extract_rule_at(text, start, span_end) {
            if is_valid_rule_structure(&rule) {
                rules.push(rule);
                continue;
            }
        }

        if let Some(rule) = fallback_extract(text, start, span_end) {
            debug!("regex fallback recovered a rule at offset {}", start);
            rules.push(rule);
        }
    }

    rules
}

/// Try the regex fallbacks on one span; the first pattern that yields a
/// structurally valid rule wins.
fn fallback_extract(text: &str, start: usize, end: usize) -> Option<String> {
    let span = &text[start..end];
    for pattern in FALLBACK_PATTERNS.iter() {
        if let Some(m) = pattern.find(span) {
            if is_valid_rule_structure(m.as_str()) {
                let prefix_start = scan::import_prefix_start(text, start + m.start());
                return Some(text[prefix_start..start + m.end()].to_string());
            }
        }
    }
    None
}

/// The first balanced `rule <name> { ... }` of a cleaned rule, import lines
/// excluded, whitespace-collapsed. Used to spot the same rule with or without
/// imports.
fn rule_body(rule: &str) -> String {
    let body = scan::keyword_positions(rule)
        .first()
        .and_then(|&pos| scan::balanced_block_end(rule, pos).map(|end| &rule[pos..end]))
        .unwrap_or(rule);
    normalize_whitespace(body)
}

fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

fn import_lines(rule: &str) -> BTreeSet<String> {
    rule.lines()
        .filter(|line| scan::is_import_line(line))
        .map(|line| line.trim().to_string())
        .collect()
}

/// Drop invalid and repeated rules. A rule whose body was already seen is
/// kept only if it carries an import no earlier copy had.
fn dedup_rules(cleaned: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen_normalized: HashSet<String> = HashSet::new();
    let mut seen_imports: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut rules = Vec::new();

    for rule in cleaned {
        if rule.is_empty() || !is_valid_rule_structure(&rule) {
            continue;
        }

        let imports = import_lines(&rule);
        let body = rule_body(&rule);
        match seen_imports.get_mut(&body) {
            Some(earlier) if imports.is_subset(earlier) => {
                trace!("skipping duplicate rule body");
                continue;
            }
            Some(earlier) => earlier.extend(imports),
            None => {
                seen_imports.insert(body, imports);
            }
        }

        if seen_normalized.insert(normalize_whitespace(&rule)) {
            rules.push(rule);
        }
    }

    rules
}
