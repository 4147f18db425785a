//! Cleaning and syntax repair applied to every extracted candidate.
//!
//! All steps are idempotent: cleaning an already-clean rule returns it unchanged.

use regex::Regex;
use std::sync::LazyLock;

static RULE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rule\s+(\w+)\s*\{").expect("static regex"));

static STRING_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\s*)\$(\w*)=").expect("static regex"));

/// A string or regex literal that itself contains a brace
static LITERAL_WITH_BRACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"/[^/\n]*[{}][^/\n]*/|"[^"\n]*[{}][^"\n]*""#).expect("static regex")
});

const SECTION_NAMES: [&str; 3] = ["strings", "condition", "meta"];

/// Clean and normalize a candidate rule
pub fn clean_rule(rule: &str) -> String {
    let rule = strip_fence_markers(rule.trim());
    let rule = remove_common_indent(&rule);
    fix_common_syntax_issues(&rule).trim().to_string()
}

/// Drop residual markdown fence lines
fn strip_fence_markers(rule: &str) -> String {
    let kept: Vec<&str> = rule.lines().filter(|line| !line.starts_with("```")).collect();
    kept.join("\n").trim().to_string()
}

/// Remove the smallest common indentation of non-empty, non-comment lines.
/// The first line is left alone since it usually lost its indent to `trim`.
fn remove_common_indent(rule: &str) -> String {
    let lines: Vec<&str> = rule.lines().collect();
    if lines.len() < 2 {
        return rule.to_string();
    }

    let min_indent = lines[1..]
        .iter()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with("//")
        })
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    if min_indent == 0 {
        return rule.to_string();
    }

    let mut cleaned = Vec::with_capacity(lines.len());
    cleaned.push(lines[0].to_string());
    for line in &lines[1..] {
        if line.trim().is_empty() {
            cleaned.push(String::new());
        } else {
            let skip: usize = line
                .chars()
                .take(min_indent)
                .take_while(|c| c.is_whitespace())
                .map(char::len_utf8)
                .sum();
            cleaned.push(line[skip..].to_string());
        }
    }
    cleaned.join("\n")
}

/// Repair mistakes LLMs commonly make in otherwise usable rules
pub(crate) fn fix_common_syntax_issues(rule: &str) -> String {
    let rule = RULE_HEADER.replace_all(rule, "rule $1 {");
    let rule = fix_section_colons(&rule);
    let rule = STRING_ASSIGNMENT.replace_all(&rule, "$1$$$2 =");
    normalize_section_order(&rule)
}

/// `strings` -> `strings:`, `condition $a` -> `condition: $a`
fn fix_section_colons(rule: &str) -> String {
    rule.lines()
        .map(|line| {
            let body = line.trim_start();
            let indent = &line[..line.len() - body.len()];
            for name in SECTION_NAMES {
                let Some(rest) = body.strip_prefix(name) else {
                    continue;
                };
                if rest.trim().is_empty() {
                    return format!("{}{}:", indent, name);
                }
                let after = rest.trim_start();
                if after.len() < rest.len() && !after.starts_with(':') {
                    return format!("{}{}: {}", indent, name, after);
                }
            }
            line.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Count `{` and `}` on a line outside string literals and comments.
/// `in_block_comment` carries an open `/* ... */` over to the next line.
fn code_braces(line: &str, in_block_comment: &mut bool) -> (i64, i64) {
    let bytes = line.as_bytes();
    let (mut opens, mut closes) = (0, 0);
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        if *in_block_comment {
            match line[i..].find("*/") {
                Some(n) => {
                    *in_block_comment = false;
                    i += n + 2;
                    continue;
                }
                None => break,
            }
        }

        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'"' => in_string = !in_string,
            b'/' if !in_string && bytes.get(i + 1) == Some(&b'/') => break,
            b'/' if !in_string && bytes.get(i + 1) == Some(&b'*') => {
                *in_block_comment = true;
                i += 2;
                continue;
            }
            b'{' if !in_string => opens += 1,
            b'}' if !in_string => closes += 1,
            _ => {}
        }
        i += 1;
    }

    (opens, closes)
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Meta,
    Strings,
    Condition,
}

/// Reorder top-level sections into meta, strings, condition.
///
/// Braces in comments do not count. Skipped entirely when a string or regex
/// literal contains a brace, since line-based brace counting would misplace
/// the end of the rule.
pub(crate) fn normalize_section_order(rule: &str) -> String {
    if LITERAL_WITH_BRACE.is_match(rule) {
        return rule.to_string();
    }

    let mut header: Vec<&str> = Vec::new();
    let mut meta: Vec<&str> = Vec::new();
    let mut strings: Vec<&str> = Vec::new();
    let mut condition: Vec<&str> = Vec::new();
    let mut current: Option<Section> = None;
    let mut depth: i64 = 0;
    let mut in_block_comment = false;

    for line in rule.lines() {
        let stripped = line.trim();

        let (opens, closes) = code_braces(line, &mut in_block_comment);

        if stripped.starts_with("rule ") && opens > 0 {
            header.push(line);
            depth += opens - closes;
            continue;
        } else if header.is_empty() {
            if !stripped.is_empty() {
                header.push(line);
            }
            continue;
        }

        depth += opens - closes;
        if depth <= 0 && closes > 0 {
            condition.push(line);
            break;
        }

        if stripped.starts_with("meta:") {
            current = Some(Section::Meta);
        } else if stripped.starts_with("strings:") {
            current = Some(Section::Strings);
        } else if stripped.starts_with("condition:") {
            current = Some(Section::Condition);
        }

        match current {
            Some(Section::Meta) => meta.push(line),
            Some(Section::Strings) => strings.push(line),
            Some(Section::Condition) => condition.push(line),
            None => header.push(line),
        }
    }

    header
        .into_iter()
        .chain(meta)
        .chain(strings)
        .chain(condition)
        .collect::<Vec<_>>()
        .join("\n")
}
