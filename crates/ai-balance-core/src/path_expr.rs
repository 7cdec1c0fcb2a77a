//! Minimal path expressions for pulling values out of arbitrary JSON.
//!
//! A path is a sequence of identifier and index tokens:
//!
//! | Expression | Tokens |
//! |------------|--------|
//! | `a.b[0].c` | `a`, `b`, `[0]`, `c` |
//! | `$.data.balance` | `data`, `balance` |
//! | `[0].name` | `[0]`, `name` |
//!
//! A leading `$.` or `$` root marker is accepted and ignored. Lookups that walk
//! off the document return `None`, which is distinct from a JSON `null` that is
//! actually present.
//!
//! ```rust
//! use ai_balance_core::path_expr::extract;
//! use serde_json::json;
//!
//! let doc = json!({ "balance_infos": [{ "total_balance": "12.34" }] });
//! assert_eq!(extract(&doc, "balance_infos[0].total_balance"), Some(json!(12.34)));
//! assert_eq!(extract(&doc, "balance_infos[3].total_balance"), None);
//! ```

use std::fmt::{Display, Formatter};

use serde_json::{Number, Value};

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// Mapping key (`.key`, leading `key`, or a non-numeric `[key]`).
    Key(String),
    /// Positional index into a sequence (`[n]`).
    Index(usize),
}

impl Display for PathToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A tokenized path expression, reusable across documents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathExpr {
    tokens: Vec<PathToken>,
}

impl PathExpr {
    pub fn parse(input: &str) -> Self {
        Self {
            tokens: tokenize(input),
        }
    }

    pub fn tokens(&self) -> &[PathToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Walk `root` and return a borrow of the addressed value.
    pub fn evaluate<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        evaluate(root, &self.tokens)
    }
}

/// Split a path string into tokens, scanning left to right.
///
/// Runs of characters other than `.`, `[` and `]` become keys; a bracketed run
/// of ASCII digits becomes an index. Empty segments produced by consecutive
/// dots are dropped.
pub fn tokenize(input: &str) -> Vec<PathToken> {
    let trimmed = input.trim();
    let cleaned = trimmed
        .strip_prefix("$.")
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed);

    let mut tokens = Vec::new();
    let mut chars = cleaned.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            '.' | ']' => {
                chars.next();
            }
            '[' => {
                chars.next();
                let digits_start = start + 1;
                let mut digits_end = digits_start;
                while let Some(&(pos, next)) = chars.peek() {
                    if !next.is_ascii_digit() {
                        break;
                    }
                    digits_end = pos + next.len_utf8();
                    chars.next();
                }

                let closed = matches!(chars.peek(), Some(&(_, ']')));
                if closed && digits_end > digits_start {
                    chars.next();
                    match cleaned[digits_start..digits_end].parse::<usize>() {
                        Ok(index) => tokens.push(PathToken::Index(index)),
                        Err(_) => tokens.push(PathToken::Key(
                            cleaned[digits_start..digits_end].to_owned(),
                        )),
                    }
                } else if digits_end > digits_start {
                    // Digits not followed by `]` belong to the key that continues after them.
                    let mut key_end = digits_end;
                    while let Some(&(pos, next)) = chars.peek() {
                        if matches!(next, '.' | '[' | ']') {
                            break;
                        }
                        key_end = pos + next.len_utf8();
                        chars.next();
                    }
                    tokens.push(PathToken::Key(cleaned[digits_start..key_end].to_owned()));
                }
            }
            _ => {
                let mut end = start;
                while let Some(&(pos, next)) = chars.peek() {
                    if matches!(next, '.' | '[' | ']') {
                        break;
                    }
                    end = pos + next.len_utf8();
                    chars.next();
                }
                tokens.push(PathToken::Key(cleaned[start..end].to_owned()));
            }
        }
    }

    tokens
}

/// Apply `tokens` to `root`. An empty token list addresses nothing.
pub fn evaluate<'a>(root: &'a Value, tokens: &[PathToken]) -> Option<&'a Value> {
    if tokens.is_empty() {
        return None;
    }

    let mut current = root;
    for token in tokens {
        if current.is_null() {
            return None;
        }

        current = match (token, current) {
            (PathToken::Key(key), Value::Object(map)) => map.get(key)?,
            // Numeric keys on sequences behave like `[n]`, so `items.0.id` works too.
            (PathToken::Key(key), Value::Array(items)) => items.get(key.parse::<usize>().ok()?)?,
            (PathToken::Key(_), _) => return None,
            (PathToken::Index(index), Value::Array(items)) => items.get(*index)?,
            (PathToken::Index(_), _) => return None,
        };
    }

    Some(current)
}

/// Turn numeric strings such as `"12.34"` into JSON numbers.
///
/// Anything else (including booleans, objects, arrays and `null`) is returned
/// unchanged, as are strings that do not hold a finite decimal number.
pub fn coerce_number(value: Value) -> Value {
    match value {
        Value::String(text) => parse_decimal(&text).map_or(Value::String(text), Value::Number),
        other => other,
    }
}

fn parse_decimal(text: &str) -> Option<Number> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(integer) = trimmed.parse::<i64>() {
        return Some(Number::from(integer));
    }
    if let Ok(integer) = trimmed.parse::<u64>() {
        return Some(Number::from(integer));
    }

    let looks_decimal = trimmed
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'));
    if !looks_decimal {
        return None;
    }

    trimmed
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .and_then(Number::from_f64)
}

/// Evaluate `path` against `root` and coerce numeric strings.
///
/// Returns `None` when the path is empty or does not resolve.
pub fn extract(root: &Value, path: &str) -> Option<Value> {
    let expr = PathExpr::parse(path);
    expr.evaluate(root).cloned().map(coerce_number)
}
