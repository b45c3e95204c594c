//! Record normalization: decoding variant-typed cells into stable shapes.
//!
//! Category cells arrive as JSON arrays, literal lists (`['A', 'B']`), or
//! plain delimited strings depending on which tool last wrote the table.
//! Everything downstream of this module sees a plain `Vec<String>`.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde_json::Value;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Outer shell of a literal list or tuple: "[...]" or "(...)"
pub static LITERAL_SHELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*(?:\[(.*)\]|\((.*)\))\s*$").unwrap());

/// Unquoted literal allowed inside a literal list: numbers, True, False, None
pub static BARE_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?|True|False|None)$").unwrap()
});

/// Spelling of a null item inside a decoded category list
const NULL_ITEM: &str = "None";

// ============================================================================
// CELL SHAPES
// ============================================================================

/// A categories cell before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryCell<'a> {
    Missing,
    List(Vec<String>),
    Text(&'a str),
}

impl<'a> CategoryCell<'a> {
    pub fn from_cell(cell: Option<&'a str>) -> Self {
        match cell {
            Some(text) if !is_missing(text) => CategoryCell::Text(text),
            _ => CategoryCell::Missing,
        }
    }
}

/// Result of trying one decoding strategy on a text cell.
#[derive(Debug, PartialEq)]
enum Decoded {
    /// Parsed to a list; None entries are null/None items
    List(Vec<Option<String>>),
    /// Parsed, but to something other than a list
    Scalar,
    Invalid,
}

// ============================================================================
// SCALAR COERCION
// ============================================================================

/// Blank cells and the literal "nan" left behind by spreadsheet exports
/// count as absent.
pub fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan")
}

/// Trimmed cell text, or None if the cell is absent.
pub fn non_blank(cell: Option<&str>) -> Option<&str> {
    cell.map(str::trim).filter(|c| !is_missing(c))
}

/// Parse a numeric cell. NaN and infinities are rejected.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Parse a rank position. Accepts integers and float renderings such as "3.0";
/// fractional values truncate toward zero.
pub fn parse_position(cell: &str) -> Option<i64> {
    let trimmed = cell.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    let value = parse_number(trimmed)?.trunc();
    if value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

// ============================================================================
// LIST DECODING
// ============================================================================

fn json_item(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        other => Some(other.to_string()),
    }
}

fn decode_json(text: &str) -> Decoded {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => Decoded::List(items.into_iter().map(json_item).collect()),
        Ok(_) => Decoded::Scalar,
        Err(_) => Decoded::Invalid,
    }
}

/// Read a quoted literal starting at `chars[*i]` (the opening quote).
fn read_quoted(chars: &[char], i: &mut usize) -> Option<String> {
    let quote = chars[*i];
    *i += 1;
    let mut out = String::new();
    while *i < chars.len() {
        let c = chars[*i];
        *i += 1;
        if c == quote {
            return Some(out);
        }
        if c == '\\' && *i < chars.len() {
            let escaped = chars[*i];
            *i += 1;
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                '\\' | '\'' | '"' => out.push(escaped),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        } else {
            out.push(c);
        }
    }
    None // unterminated
}

fn bare_item(token: &str) -> Option<Option<String>> {
    if !BARE_LITERAL.is_match(token) {
        return None;
    }
    Some(if token == "None" {
        None
    } else {
        Some(token.to_string())
    })
}

/// Split the body of a literal list into items. Returns the items and
/// whether any separating comma was seen.
fn scan_literal_items(body: &str) -> Option<(Vec<Option<String>>, bool)> {
    let chars: Vec<char> = body.chars().collect();
    let mut items = Vec::new();
    let mut saw_comma = false;
    let mut i = 0;

    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i == chars.len() {
            break;
        }

        if chars[i] == '\'' || chars[i] == '"' {
            items.push(Some(read_quoted(&chars, &mut i)?));
        } else {
            let start = i;
            while i < chars.len() && chars[i] != ',' {
                i += 1;
            }
            let token: String = chars[start..i].iter().collect();
            items.push(bare_item(token.trim())?);
        }

        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i == chars.len() {
            break;
        }
        if chars[i] != ',' {
            return None;
        }
        saw_comma = true;
        i += 1;
    }

    Some((items, saw_comma))
}

fn decode_literal(text: &str) -> Decoded {
    if let Some(caps) = LITERAL_SHELL.captures(text) {
        if let Some(body) = caps.get(1) {
            return match scan_literal_items(body.as_str()) {
                Some((items, _)) => Decoded::List(items),
                None => Decoded::Invalid,
            };
        }
        if let Some(body) = caps.get(2) {
            // "('A')" is a parenthesized string, not a tuple
            return match scan_literal_items(body.as_str()) {
                Some((items, true)) => Decoded::List(items),
                Some((items, false)) if items.is_empty() => Decoded::List(items),
                Some((_, false)) => Decoded::Scalar,
                None => Decoded::Invalid,
            };
        }
    }

    // Unbracketed "'A', 'B'" is a tuple; a lone literal is valid but not a list
    match scan_literal_items(text) {
        Some((items, true)) => Decoded::List(items),
        Some((items, false)) if items.len() == 1 => Decoded::Scalar,
        _ => Decoded::Invalid,
    }
}

fn split_delimited(text: &str) -> Vec<Option<String>> {
    let separator = if text.contains('|') { '|' } else { ',' };
    text.split(separator)
        .map(|piece| Some(piece.trim().to_string()))
        .collect()
}

fn decode_text(text: &str) -> Vec<Option<String>> {
    match decode_json(text) {
        Decoded::List(items) => items,
        Decoded::Scalar => vec![Some(text.to_string())],
        Decoded::Invalid => match decode_literal(text) {
            Decoded::List(items) => items,
            Decoded::Scalar => vec![Some(text.to_string())],
            Decoded::Invalid => split_delimited(text),
        },
    }
}

/// Decode a list-shaped cell (JSON, literal list, or raw scalar) without
/// deduplicating. Null entries are preserved as None so index alignment with
/// sibling list columns survives a round trip.
pub fn parse_list_cell(cell: &str) -> Vec<Option<String>> {
    let trimmed = cell.trim();
    if is_missing(trimmed) {
        return Vec::new();
    }
    decode_text(trimmed)
}

/// Trim, drop empties, and deduplicate case-insensitively keeping the first
/// occurrence in its original case.
pub fn dedup_case_insensitive<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut out = Vec::new();
    for item in items {
        let text = item.trim();
        if text.is_empty() {
            continue;
        }
        if seen.insert(text.to_lowercase()) {
            out.push(text.to_string());
        }
    }
    out
}

/// Normalize a categories cell into an ordered, deduplicated list.
pub fn normalize_categories(cell: CategoryCell<'_>) -> Vec<String> {
    match cell {
        CategoryCell::Missing => Vec::new(),
        CategoryCell::List(items) => dedup_case_insensitive(items),
        CategoryCell::Text(text) => {
            if is_missing(text) {
                return Vec::new();
            }
            // Null items keep their literal spelling, like any other scalar item
            let items = decode_text(text.trim())
                .into_iter()
                .map(|item| item.unwrap_or_else(|| NULL_ITEM.to_string()));
            dedup_case_insensitive(items)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
