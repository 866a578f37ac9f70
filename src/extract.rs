//! Literal value extraction.
//!
//! Precedence: the `NONE`/`NULL`/`TRUE`/`FALSE` keywords, then integer and
//! float parses, then date-time, then string. Quoting a literal suppresses the
//! keyword and numeric readings but not the date-time one.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::ast::Value;
use crate::token::Node;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Extract the value of a literal token.
pub fn extract(node: &Node) -> Value {
    extract_value(&node.text)
}

/// Extract a value from raw literal text.
pub fn extract_value(text: &str) -> Value {
    let (body, quoted) = strip_quotes(text);

    if !quoted {
        match body.to_ascii_uppercase().as_str() {
            "NONE" | "NULL" => return Value::Null,
            "TRUE" => return Value::Bool(true),
            "FALSE" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(n) = body.parse::<i64>() {
            return Value::Int(n);
        }
        if let Some(f) = parse_float(body) {
            return Value::Float(f);
        }
    }

    if let Some(dt) = parse_datetime(body) {
        return Value::DateTime(dt);
    }

    Value::String(body.to_string())
}

/// Strip exactly one outer pair of single quotes.
fn strip_quotes(text: &str) -> (&str, bool) {
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        (&text[1..text.len() - 1], true)
    } else {
        (text, false)
    }
}

fn parse_float(s: &str) -> Option<f64> {
    // f64::from_str also takes "inf" and "NaN"
    let numeric = s.chars().any(|c| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'));
    if !numeric {
        return None;
    }
    s.parse::<f64>().ok()
}

/// ISO-8601 or the default `YYYY-MM-DD HH:MM:SS[.ffffff][+HH:MM]` rendering.
/// Naive values are taken as UTC.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
