//! Brace-depth scanning over candidate rule text.
//!
//! Braces inside `"..."` string literals, `/.../` regex literals and comments
//! do not count toward depth. Finite patterns cannot express this, which is
//! why the scanner runs before any regex fallback.

use regex::Regex;
use std::sync::LazyLock;

/// `rule` followed by whitespace, as a whole word
static RULE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brule\s").expect("static regex"));

/// `rule <identifier>` followed by a body or a tag list
static RULE_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brule\s+\w+\s*[{:]").expect("static regex"));

static RULE_MODIFIERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:\b(?:private|global)\s+)+$").expect("static regex"));

static IMPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*import\s+"[^"]+"\s*$"#).expect("static regex"));

/// Byte offsets of every rule keyword occurrence
pub(crate) fn keyword_positions(text: &str) -> Vec<usize> {
    RULE_KEYWORD.find_iter(text).map(|m| m.start()).collect()
}

/// Byte offsets of keyword occurrences that look like an actual declaration
pub(crate) fn declaration_positions(text: &str) -> Vec<usize> {
    RULE_DECLARATION.find_iter(text).map(|m| m.start()).collect()
}

/// Returns true if `line` is a single `import "<module>"` statement
pub(crate) fn is_import_line(line: &str) -> bool {
    IMPORT_LINE.is_match(line)
}

/// Find the exclusive end of the first balanced `{ ... }` block at or after `from`.
///
/// Returns `None` when no opening brace is found or the block never closes.
pub(crate) fn balanced_block_end(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth: i32 = 0;
    let mut opened = false;
    let mut in_string = false;
    let mut in_regex = false;
    let mut escape_next = false;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];

        if escape_next {
            escape_next = false;
            i += 1;
            continue;
        }
        if b == b'\\' {
            escape_next = true;
            i += 1;
            continue;
        }

        if !in_string && !in_regex && b == b'/' {
            match bytes.get(i + 1) {
                Some(b'/') => {
                    i = text[i..].find('\n').map_or(bytes.len(), |n| i + n);
                    continue;
                }
                Some(b'*') => {
                    i = text[i + 2..].find("*/").map_or(bytes.len(), |n| i + 2 + n + 2);
                    continue;
                }
                _ => {}
            }
        }

        match b {
            b'"' if !in_regex => in_string = !in_string,
            b'/' if !in_string => in_regex = !in_regex,
            b'{' if !in_string && !in_regex => {
                depth += 1;
                opened = true;
            }
            b'}' if !in_string && !in_regex => {
                depth -= 1;
                if opened && depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Start of the declaration that owns the keyword at `keyword_pos`:
/// pulls in `private`/`global` modifiers written on the same line.
pub(crate) fn declaration_start(text: &str, keyword_pos: usize) -> usize {
    let line_start = text[..keyword_pos].rfind('\n').map_or(0, |n| n + 1);
    let before = &text[line_start..keyword_pos];

    match RULE_MODIFIERS.find(before) {
        Some(m) if before[..m.start()].trim().is_empty() => line_start + m.start(),
        _ => keyword_pos,
    }
}

/// Walk backward from `decl_start` over blank lines and `import "..."` lines.
/// Returns the offset of the earliest import line directly above the rule,
/// or `decl_start` if there is none.
pub(crate) fn import_prefix_start(text: &str, decl_start: usize) -> usize {
    let line_start = text[..decl_start].rfind('\n').map_or(0, |n| n + 1);
    if !text[line_start..decl_start].trim().is_empty() {
        return decl_start;
    }

    let mut start = decl_start;
    let mut cursor = line_start;
    while cursor > 0 {
        // cursor sits just after a '\n'; examine the line that ends there
        let prev_end = cursor - 1;
        let prev_start = text[..prev_end].rfind('\n').map_or(0, |n| n + 1);
        let line = &text[prev_start..prev_end];

        if is_import_line(line) {
            start = prev_start;
        } else if !line.trim().is_empty() {
            break;
        }
        cursor = prev_start;
    }
    start
}

/// Run brace-depth parsing for the keyword at `keyword_pos`, scanning no
/// further than `span_end`. Returns the rule text including its import prefix.
pub(crate) fn extract_rule_at(text: &str, keyword_pos: usize, span_end: usize) -> Option<String> {
    let span = &text[..span_end];
    let end = balanced_block_end(span, keyword_pos)?;
    let decl_start = declaration_start(text, keyword_pos);
    let start = import_prefix_start(text, decl_start);
    Some(text[start..end].to_string())
}
