//! Parameter binding.
//!
//! Placeholders are substituted into the token tree before the query model
//! is built, so the builder and the extractor only ever see literal tokens.

use std::collections::BTreeMap;

use chrono::SecondsFormat;

use crate::ast::Value;
use crate::error::{FaunaError, FaunaResult};
use crate::lexer::tokenize;
use crate::token::{Node, TokenCategory};

/// Statement parameters: `%(name)s` or `%s` style.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Named(BTreeMap<String, Value>),
    Positional(Vec<Value>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    /// No parameters.
    pub fn none() -> Self {
        Self::default()
    }

    /// Named parameters from `(name, value)` pairs.
    pub fn named<K: Into<String>, V: Into<Value>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Params::Named(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn positional<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    fn is_empty(&self) -> bool {
        match self {
            Params::Named(map) => map.is_empty(),
            Params::Positional(values) => values.is_empty(),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<BTreeMap<String, Value>> for Params {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Params::Named(map)
    }
}

/// Render a value as the text of a literal token.
///
/// Strings are quoted as they are. The extractor strips exactly one outer
/// pair of quotes, so quotes inside the value come back unchanged.
pub fn render_literal(value: &Value) -> FaunaResult<String> {
    Ok(match value {
        Value::Null => "NONE".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) if n.is_finite() => format!("{:?}", n),
        Value::Float(n) => {
            return Err(FaunaError::syntax(format!("cannot bind non-finite float {}", n)));
        }
        Value::String(s) => format!("'{}'", s),
        Value::DateTime(dt) => format!("'{}'", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    })
}

/// Tokenize `sql` and substitute `params` into its placeholders.
///
/// Each placeholder token becomes a literal token, so the value never passes
/// back through the lexer.
pub fn bind(sql: &str, params: &Params) -> FaunaResult<Vec<Node>> {
    let mut nodes = tokenize(sql)?;
    let count = count_placeholders(&nodes);

    if count == 0 {
        if !params.is_empty() {
            return Err(FaunaError::syntax("parameters given but the statement has no placeholders"));
        }
        return Ok(nodes);
    }
    if let Params::Positional(values) = params {
        if values.len() != count {
            return Err(FaunaError::syntax(format!(
                "statement has {} placeholders but {} parameters were given",
                count,
                values.len()
            )));
        }
    }

    let mut next = 0;
    substitute(&mut nodes, params, &mut next)?;
    Ok(nodes)
}

fn count_placeholders(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| {
            usize::from(node.category == TokenCategory::Placeholder) + count_placeholders(&node.children)
        })
        .sum()
}

/// Replace placeholders depth-first, which is source order.
fn substitute(nodes: &mut [Node], params: &Params, next: &mut usize) -> FaunaResult<()> {
    for node in nodes {
        if node.category == TokenCategory::Placeholder {
            let value = lookup(&node.text, params, next)?;
            node.text = render_literal(value)?;
            node.category = TokenCategory::Literal;
        }
        substitute(&mut node.children, params, next)?;
    }
    Ok(())
}

fn lookup<'p>(placeholder: &str, params: &'p Params, next: &mut usize) -> FaunaResult<&'p Value> {
    match params {
        Params::Positional(values) => {
            if placeholder != "%s" {
                return Err(FaunaError::syntax(format!(
                    "named placeholder '{}' with positional parameters",
                    placeholder
                )));
            }
            let value = values
                .get(*next)
                .ok_or_else(|| FaunaError::syntax("too few positional parameters"))?;
            *next += 1;
            Ok(value)
        }
        Params::Named(map) => {
            let name = placeholder
                .strip_prefix("%(")
                .and_then(|rest| rest.strip_suffix(")s"))
                .ok_or_else(|| FaunaError::syntax("positional placeholder '%s' with named parameters"))?;
            map.get(name)
                .ok_or_else(|| FaunaError::syntax(format!("missing value for parameter '{}'", name)))
        }
    }
}
