//! Turns free-form provider text into a candidate JSON object or array.
//!
//! Providers are asked for bare JSON but routinely wrap it in prose or
//! markdown fences, or emit near-JSON with single quotes, bare keys and
//! trailing commas. [`extract`] tries progressively more aggressive
//! strategies and, when all of them fail, returns an explicitly marked
//! placeholder instead of an error.
//!
//! Known fragility: the single-quote repair works on surface patterns and can
//! mangle apostrophes or `key:` lookalikes inside string values.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::NormalizeError;
use crate::models::Shape;

pub const PLACEHOLDER_TICKER: &str = "PLACEHOLDER";

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"```[A-Za-z0-9_+.\-]*[ \t]*\r?\n?([\s\S]*?)\r?\n?```").unwrap();
    static ref SINGLE_QUOTED_KEY: Regex = Regex::new(r#"([{,]\s*)'([^'"\n]*)'\s*:"#).unwrap();
    static ref BARE_KEY: Regex = Regex::new(r"([{,]\s*)([A-Za-z_$][A-Za-z0-9_$]*)\s*:").unwrap();
    static ref SINGLE_QUOTE_OPEN: Regex = Regex::new(r"([:\[,]\s*)'").unwrap();
    static ref SINGLE_QUOTE_CLOSE: Regex = Regex::new(r#"'(\s*[,}\]])"#).unwrap();
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([}\]])").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Fenced,
    BracketScan,
    SanitizedBracketScan,
    SpanScan,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub value: Value,
    pub strategy: Strategy,
}

// Only objects and arrays count as structured output
fn parse_structured(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

fn parse_lenient(candidate: &str) -> Option<Value> {
    parse_structured(candidate).or_else(|| parse_structured(&sanitize(candidate)))
}

/// Repairs the usual near-JSON mistakes: single-quoted keys and values, bare
/// keys, trailing commas before a closer.
pub fn sanitize(candidate: &str) -> String {
    let s = SINGLE_QUOTED_KEY.replace_all(candidate, "${1}\"${2}\":");
    let s = BARE_KEY.replace_all(&s, "${1}\"${2}\":");
    let s = SINGLE_QUOTE_OPEN.replace_all(&s, "${1}\"");
    let s = SINGLE_QUOTE_CLOSE.replace_all(&s, "\"${1}");
    let s = TRAILING_COMMA.replace_all(&s, "${1}");
    s.into_owned()
}

fn closer_for(open: u8) -> u8 {
    if open == b'{' { b'}' } else { b']' }
}

// Index of the bracket that structurally closes the one at `open`, searching
// no further than `end`. Quotes are tracked so brackets inside strings do not
// count; a single quote only opens a string where a value or key could start.
fn matching_close(bytes: &[u8], open: usize, end: usize) -> Option<usize> {
    let mut stack = vec![closer_for(bytes[open])];
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut prev_significant = bytes[open];

    for (i, &b) in bytes.iter().enumerate().take(end).skip(open + 1) {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
                prev_significant = b;
            }
            continue;
        }
        match b {
            b'"' => quote = Some(b'"'),
            b'\'' if matches!(prev_significant, b'{' | b'[' | b',' | b':') => quote = Some(b'\''),
            b'{' | b'[' => stack.push(closer_for(b)),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
        if !b.is_ascii_whitespace() {
            prev_significant = b;
        }
    }
    None
}

// First span opened by `{` or `[`; falls back to the last matching closer
// when the structure never balances
fn first_span(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let open = bytes.iter().position(|&b| b == b'{' || b == b'[')?;
    if let Some(close) = matching_close(bytes, open, bytes.len()) {
        return Some(&text[open..=close]);
    }
    let closer = closer_for(bytes[open]);
    let close = bytes.iter().rposition(|&b| b == closer)?;
    (close > open).then(|| &text[open..=close])
}

// Left-to-right scan over non-overlapping spans; a span that fails to parse
// is searched for inner spans before moving past it
fn scan_spans(text: &str, start: usize, end: usize) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut i = start;
    while i < end {
        if matches!(bytes[i], b'{' | b'[') {
            if let Some(close) = matching_close(bytes, i, end) {
                if let Some(value) = parse_lenient(&text[i..=close]) {
                    return Some(value);
                }
                if let Some(value) = scan_spans(text, i + 1, close) {
                    return Some(value);
                }
                i = close + 1;
                continue;
            }
        }
        i += 1;
    }
    None
}

/// Explicitly marked soft-failure value for the given shape.
pub fn placeholder(shape: Shape) -> Value {
    match shape {
        Shape::Object => json!({
            "error": "Failed to extract JSON",
            "message": "The AI response could not be parsed correctly. Please try again."
        }),
        Shape::Array => json!([{
            "ticker": PLACEHOLDER_TICKER,
            "name": "Extraction Failed - Please Try Again",
            "type": "error",
            "reason": "The AI response could not be parsed correctly. Please try refreshing.",
            "riskLevel": "moderate",
            "potentialReturn": "unknown",
            "suggestedAllocation": 0
        }]),
    }
}

pub fn is_placeholder(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key("error"),
        Value::Array(items) => items.iter().any(|item| {
            item.get("type").and_then(Value::as_str) == Some("error")
                || item.get("ticker").and_then(Value::as_str) == Some(PLACEHOLDER_TICKER)
        }),
        _ => false,
    }
}

/// Runs the strategies in order and reports which one produced the value.
/// Only empty input is an error.
pub fn extract(text: &str, shape: Shape) -> Result<Extraction, NormalizeError> {
    if text.trim().is_empty() {
        return Err(NormalizeError::EmptyInput);
    }

    let found = |value: Value, strategy: Strategy| -> Result<Extraction, NormalizeError> {
        Ok(Extraction { value, strategy })
    };

    if let Some(value) = parse_structured(text) {
        return found(value, Strategy::Direct);
    }

    for caps in FENCED_BLOCK.captures_iter(text) {
        if let Some(value) = caps.get(1).and_then(|m| parse_structured(m.as_str())) {
            return found(value, Strategy::Fenced);
        }
    }

    if let Some(span) = first_span(text) {
        if let Some(value) = parse_structured(span) {
            return found(value, Strategy::BracketScan);
        }
        if let Some(value) = parse_structured(&sanitize(span)) {
            return found(value, Strategy::SanitizedBracketScan);
        }
    }

    if let Some(value) = scan_spans(text, 0, text.len()) {
        return found(value, Strategy::SpanScan);
    }

    warn!(len = text.len(), "no JSON found in provider response, using placeholder");
    debug!(response = %text, "unparseable provider response");
    found(placeholder(shape), Strategy::Placeholder)
}

pub fn normalize(text: &str, shape: Shape) -> Result<Value, NormalizeError> {
    extract(text, shape).map(|e| e.value)
}
