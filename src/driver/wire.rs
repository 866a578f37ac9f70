//! Response decoding.
//!
//! The store answers `{"resource": ...}` on success and
//! `{"errors": [{"code", "description"}]}` on failure. Special values are
//! tagged objects: `@ref`, `@ts`, `@date`, `@obj`, `@set`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value as Json;

use crate::ast::Value;
use crate::error::{FaunaError, FaunaResult};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    errors: Vec<RemoteError>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

/// Extract the resource of a response body, or its first error.
pub fn parse_response(status: u16, body: &str) -> FaunaResult<Json> {
    let json: Json = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) if (200..300).contains(&status) => {
            return Err(FaunaError::Decode(format!("invalid response body: {}", e)));
        }
        Err(_) => {
            return Err(FaunaError::Remote {
                status,
                code: "http error".to_string(),
                message: body.trim().to_string(),
            });
        }
    };
    from_json(status, json)
}

/// As [`parse_response`], for an already parsed body.
pub fn from_json(status: u16, mut json: Json) -> FaunaResult<Json> {
    if json.get("errors").is_some() {
        let body: ErrorBody = serde_json::from_value(json)
            .map_err(|e| FaunaError::Decode(format!("malformed error response: {}", e)))?;
        let first = body.errors.into_iter().next();
        return Err(FaunaError::Remote {
            status,
            code: first.as_ref().map(|e| e.code.clone()).unwrap_or_default(),
            message: first.map(|e| e.description).unwrap_or_default(),
        });
    }
    if !(200..300).contains(&status) {
        return Err(FaunaError::Remote {
            status,
            code: "http error".to_string(),
            message: json.to_string(),
        });
    }
    match json.get_mut("resource") {
        Some(resource) => Ok(resource.take()),
        None => Err(FaunaError::Decode("response has no resource".to_string())),
    }
}

/// Decode a scalar cell. Refs become their id, timestamps and dates UTC
/// date-times; arrays and plain objects are kept as JSON text.
pub fn decode_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(_) => Value::String(json.to_string()),
        Json::Object(map) => {
            if let Some(id) = ref_id(json) {
                return Value::String(id);
            }
            if let Some(ts) = map.get("@ts").and_then(Json::as_str) {
                return DateTime::parse_from_rfc3339(ts)
                    .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                    .unwrap_or_else(|_| Value::String(ts.to_string()));
            }
            if let Some(date) = map.get("@date").and_then(Json::as_str) {
                return NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| Value::DateTime(dt.and_utc()))
                    .unwrap_or_else(|| Value::String(date.to_string()));
            }
            match map.get("@obj") {
                Some(inner) => Value::String(inner.to_string()),
                None => Value::String(json.to_string()),
            }
        }
    }
}

/// Decode an object cell (a `*` projection) field by field.
pub fn decode_object(json: &Json) -> Option<BTreeMap<String, Value>> {
    let map = match json {
        Json::Object(map) => map.get("@obj").and_then(Json::as_object).unwrap_or(map),
        _ => return None,
    };
    Some(map.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect())
}

/// Id of a `@ref`, or of the `ref` field of a document.
pub fn ref_id(json: &Json) -> Option<String> {
    let map = json.as_object()?;
    if let Some(inner) = map.get("@ref") {
        return inner.get("id").and_then(Json::as_str).map(str::to_string);
    }
    map.get("ref").and_then(ref_id)
}
