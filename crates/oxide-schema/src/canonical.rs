//! Canonical forms used when comparing expected and live definitions.
//!
//! Live catalogs rarely hand back SQL exactly as it was written: Postgres adds
//! casts (`'x'::character varying`), SQL Server wraps defaults in parentheses
//! (`((0))`) and every backend reflows whitespace. These helpers reduce both
//! sides to a form where only meaningful differences remain.

use once_cell::sync::Lazy;
use regex::Regex;

static OR_MODIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bcreate\s+or\s+(alter|replace)\b").expect("valid OR modifier regex")
});

static CAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"::\s*[a-z_][a-z0-9_]*(\s+(varying|precision|with\s+time\s+zone|without\s+time\s+zone))?(\(\d+(\s*,\s*\d+)?\))?(\[\])?",
    )
    .expect("valid cast regex")
});

static COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").expect("valid comma regex"));
static OPEN_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\s*").expect("valid paren regex"));
static CLOSE_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\)").expect("valid paren regex"));

static OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(<>|!=|<=|>=|\|\||->>|->|=|<|>|\+|-|\*|/)\s*").expect("valid operator regex")
});

// A parenthesized literal or name that is not a function call argument list.
static WRAPPED_ATOM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^a-z0-9_])\(([a-z0-9_.]+|'[^']*')\)").expect("valid atom regex")
});

/// Collapses every run of whitespace into a single space and trims the ends.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of a definitional SQL body (view query, routine text).
///
/// Case-insensitive and whitespace-insensitive; a trailing semicolon is
/// ignored.
#[must_use]
pub fn definition(sql: &str) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    normalize_whitespace(trimmed).to_lowercase()
}

/// Canonical form of a routine body: [`definition`] with any
/// `CREATE OR ALTER` / `CREATE OR REPLACE` modifier reduced to `CREATE`.
#[must_use]
pub fn routine(body: &str) -> String {
    definition(&OR_MODIFIER.replace_all(body, "create"))
}

/// Canonical form of a column type name.
#[must_use]
pub fn type_name(text: &str) -> String {
    let lowered = normalize_whitespace(text).to_lowercase();
    let spaced = COMMA.replace_all(&lowered, ",");
    let opened = OPEN_PAREN.replace_all(&spaced, "(");
    CLOSE_PAREN.replace_all(&opened, ")").into_owned()
}

/// Canonical form of a scalar expression (column default, index column,
/// index predicate).
#[must_use]
pub fn expression(text: &str) -> String {
    let lowered = normalize_whitespace(text).to_lowercase();
    let uncast = CAST.replace_all(&lowered, "");
    let unquoted: String = uncast
        .chars()
        .filter(|c| !matches!(c, '"' | '[' | ']' | '`'))
        .collect();
    let spaced = COMMA.replace_all(&unquoted, ",");
    let opened = OPEN_PAREN.replace_all(&spaced, "(");
    let closed = CLOSE_PAREN.replace_all(&opened, ")");
    let mut text = OPERATOR.replace_all(&closed, "$1").into_owned();
    loop {
        let unwrapped = WRAPPED_ATOM.replace_all(&text, "${1}${2}").into_owned();
        if unwrapped == text {
            break;
        }
        text = unwrapped;
    }
    let text = strip_redundant_groups(&text);
    strip_outer_parens(text.trim()).to_string()
}

/// Drops parentheses that do not change meaning: those wrapping a whole
/// call argument, and those around the left operand of a `||` chain.
///
/// Postgres deparses `a || ' ' || b` as `((a || ' ') || b)`.
fn strip_redundant_groups(text: &str) -> String {
    let mut current = text.to_string();
    while let Some((open, close)) = redundant_group(&current) {
        current.replace_range(close..=close, "");
        current.replace_range(open..=open, "");
    }
    current
}

/// Byte positions of the first redundant parenthesis pair.
fn redundant_group(text: &str) -> Option<(usize, usize)> {
    let mut opened = Vec::new();
    let mut in_literal = false;
    for (index, byte) in text.bytes().enumerate() {
        if in_literal {
            in_literal = byte != b'\'';
            continue;
        }
        match byte {
            b'\'' => in_literal = true,
            b'(' => opened.push(index),
            b')' => {
                let open = opened.pop()?;
                if is_redundant_group(text, open, index) {
                    return Some((open, index));
                }
            }
            _ => {}
        }
    }
    None
}

fn is_redundant_group(text: &str, open: usize, close: usize) -> bool {
    if !matches!(text[..open].chars().next_back(), None | Some('(' | ',')) {
        return false;
    }
    let top_level = top_level_text(&text[open + 1..close]);
    if top_level.contains(',') {
        return false;
    }
    let after = &text[close + 1..];
    if after.is_empty() || after.starts_with([')', ',']) {
        return true;
    }
    after.starts_with("||")
        && top_level.contains("||")
        && !top_level
            .replace("||", "")
            .chars()
            .any(|c| c.is_whitespace() || "<>=!+-*/|&%^~".contains(c))
}

/// The characters of `inner` outside nested parentheses and literals.
fn top_level_text(inner: &str) -> String {
    let mut depth = 0_usize;
    let mut in_literal = false;
    let mut top = String::new();
    for c in inner.chars() {
        if in_literal {
            in_literal = c != '\'';
            continue;
        }
        match c {
            '\'' => in_literal = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 => top.push(c),
            _ => {}
        }
    }
    top
}

/// Removes parentheses that wrap the whole expression, repeatedly.
#[must_use]
pub fn strip_outer_parens(text: &str) -> &str {
    let mut current = text.trim();
    while current.starts_with('(') && current.ends_with(')') && wraps_whole(current) {
        current = current[1..current.len() - 1].trim();
    }
    current
}

/// True when the opening parenthesis at position 0 closes at the last byte.
fn wraps_whole(text: &str) -> bool {
    let mut depth = 0_usize;
    for (index, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return index == text.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}
