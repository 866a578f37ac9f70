//! Statement execution and result sets.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value as Json;

use crate::ast::{SortOrder, StatementKind, Value};
use crate::driver::params::{bind, Params};
use crate::driver::wire::{decode_object, decode_value, ref_id};
use crate::driver::Connection;
use crate::error::{FaunaError, FaunaResult};
use crate::fmt::format_sql_query;
use crate::parser;
use crate::transpiler::{ResultShape, Translation};

/// One result row, in output column order.
pub type Row = Vec<Value>;

static NULL: Value = Value::Null;

/// A projected cell before `*` expansion.
#[derive(Debug, Clone)]
enum Cell {
    Value(Value),
    Object(BTreeMap<String, Value>),
}

impl Cell {
    fn value(&self) -> &Value {
        match self {
            Cell::Value(v) => v,
            Cell::Object(_) => &NULL,
        }
    }
}

/// A forward-only cursor over the result of the last executed statement.
///
/// Borrows its [`Connection`], so it cannot outlive it.
pub struct Cursor<'c> {
    connection: &'c Connection,
    rows: Vec<Row>,
    position: usize,
    description: Option<Vec<String>>,
    row_count: i64,
    last_row_id: Option<String>,
    executed: bool,
    closed: bool,
}

impl<'c> Cursor<'c> {
    pub(crate) fn new(connection: &'c Connection) -> Self {
        Self {
            connection,
            rows: Vec::new(),
            position: 0,
            description: None,
            row_count: -1,
            last_row_id: None,
            executed: false,
            closed: false,
        }
    }

    /// Bind, parse, translate and run one statement.
    ///
    /// Makes exactly one request to the store. A SELECT leaves its rows on
    /// the cursor; writes record the affected row count.
    pub async fn execute(&mut self, sql: &str, params: &Params) -> FaunaResult<()> {
        self.check_open()?;
        self.reset();

        tracing::debug!(statement = %format_sql_query(sql), "executing");
        let model = parser::build(&bind(sql, params)?)?;
        let translation = self.connection.translator().translate(&model)?;
        tracing::debug!(
            kind = %translation.kind,
            table = model.base_table(),
            fql = %translation.expr,
            "translated"
        );

        let resource = match self.connection.transport().query(&translation.expr).await {
            Ok(resource) => resource,
            Err(e) => {
                if e.is_remote() {
                    tracing::warn!(error = %e, "statement rejected by the store");
                }
                return Err(e);
            }
        };
        self.store(&translation, resource)?;
        self.executed = true;
        tracing::debug!(kind = %translation.kind, row_count = self.row_count, "executed");
        Ok(())
    }

    /// Run `sql` once per parameter set. `row_count` is the total.
    pub async fn execute_many(&mut self, sql: &str, params: &[Params]) -> FaunaResult<()> {
        self.check_open()?;
        let mut total = 0;
        let mut last_row_id = None;
        for set in params {
            self.execute(sql, set).await?;
            total += self.row_count.max(0);
            if self.last_row_id.is_some() {
                last_row_id = self.last_row_id.clone();
            }
        }
        self.row_count = if params.is_empty() { -1 } else { total };
        self.last_row_id = last_row_id;
        Ok(())
    }

    /// Next row, or `None` when the result set is exhausted.
    pub fn fetch_one(&mut self) -> FaunaResult<Option<Row>> {
        self.check_result_set()?;
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    /// Up to `n` of the remaining rows.
    pub fn fetch_many(&mut self, n: usize) -> FaunaResult<Vec<Row>> {
        self.check_result_set()?;
        let end = self.position.saturating_add(n).min(self.rows.len());
        let rows = self.rows[self.position..end].to_vec();
        self.position = end;
        Ok(rows)
    }

    /// Every remaining row.
    pub fn fetch_all(&mut self) -> FaunaResult<Vec<Row>> {
        self.check_result_set()?;
        let rows = self.rows[self.position..].to_vec();
        self.position = self.rows.len();
        Ok(rows)
    }

    /// Rows returned or affected by the last statement; `-1` before any
    /// execute and after DROP.
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// Id of the last document created by an INSERT.
    pub fn last_row_id(&self) -> Option<&str> {
        self.last_row_id.as_deref()
    }

    /// Output column names of the last SELECT.
    pub fn description(&self) -> Option<&[String]> {
        self.description.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drop the result set. Further use is an interface error.
    pub fn close(&mut self) {
        self.reset();
        self.closed = true;
    }

    fn reset(&mut self) {
        self.rows.clear();
        self.position = 0;
        self.description = None;
        self.row_count = -1;
        self.last_row_id = None;
        self.executed = false;
    }

    fn check_open(&self) -> FaunaResult<()> {
        if self.closed {
            return Err(FaunaError::Interface("cursor is closed".to_string()));
        }
        Ok(())
    }

    fn check_result_set(&self) -> FaunaResult<()> {
        self.check_open()?;
        if !self.executed {
            return Err(FaunaError::Interface("no statement has been executed".to_string()));
        }
        if self.description.is_none() {
            return Err(FaunaError::Interface("last statement produced no result set".to_string()));
        }
        Ok(())
    }

    fn store(&mut self, translation: &Translation, resource: Json) -> FaunaResult<()> {
        match translation.kind {
            StatementKind::Select => {
                let (columns, rows) = shape_rows(&translation.shape, resource)?;
                self.row_count = rows.len() as i64;
                self.description = Some(columns);
                self.rows = rows;
            }
            StatementKind::Insert => {
                let created = match resource {
                    Json::Array(docs) => docs,
                    doc => vec![doc],
                };
                self.row_count = created.len() as i64;
                self.last_row_id = created.last().and_then(ref_id);
            }
            StatementKind::Update | StatementKind::Delete => {
                self.row_count = affected(&resource) as i64;
            }
            StatementKind::Drop => self.row_count = -1,
        }
        Ok(())
    }
}

/// Number of elements in an array or page.
fn affected(resource: &Json) -> usize {
    match resource {
        Json::Array(items) => items.len(),
        Json::Object(map) => map.get("data").and_then(Json::as_array).map_or(0, Vec::len),
        _ => 0,
    }
}

/// Apply the client-side part of a SELECT: sort, offset/limit, hidden sort
/// columns and `*` expansion.
fn shape_rows(shape: &ResultShape, resource: Json) -> FaunaResult<(Vec<String>, Vec<Row>)> {
    let raw = match resource {
        Json::Array(raw) => raw,
        other => {
            return Err(FaunaError::Decode(format!("expected an array of rows, got {}", other)));
        }
    };

    let mut rows = Vec::with_capacity(raw.len());
    for raw_row in raw {
        let cells = match raw_row {
            Json::Array(cells) => cells,
            other => return Err(FaunaError::Decode(format!("expected a row array, got {}", other))),
        };
        let row: Vec<Cell> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if shape.stars.contains(&i) {
                    Cell::Object(decode_object(cell).unwrap_or_default())
                } else {
                    Cell::Value(decode_value(cell))
                }
            })
            .collect();
        rows.push(row);
    }

    if !shape.sort.is_empty() {
        rows.sort_by(|a, b| {
            shape
                .sort
                .iter()
                .map(|key| {
                    let ordering = cell_at(a, key.index).sql_cmp(cell_at(b, key.index));
                    match key.order {
                        SortOrder::Asc => ordering,
                        SortOrder::Desc => ordering.reverse(),
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        let offset = shape.offset.unwrap_or(0);
        let limit = shape.limit.unwrap_or(usize::MAX);
        rows = rows.into_iter().skip(offset).take(limit).collect();
    }

    for row in &mut rows {
        let visible = row.len().saturating_sub(shape.hidden);
        row.truncate(visible);
    }

    // Each `*` cell expands to `id` followed by the sorted union of keys
    // seen at that position.
    let mut expansions: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for &star in &shape.stars {
        let mut keys = BTreeSet::new();
        for row in &rows {
            if let Some(Cell::Object(map)) = row.get(star) {
                keys.extend(map.keys().filter(|k| *k != "id").cloned());
            }
        }
        let mut names = vec!["id".to_string()];
        names.extend(keys);
        expansions.insert(star, names);
    }

    let mut columns = Vec::new();
    for (i, name) in shape.columns.iter().enumerate() {
        match expansions.get(&i) {
            Some(names) => columns.extend(names.iter().cloned()),
            None => columns.push(name.clone()),
        }
    }

    let out = rows
        .into_iter()
        .map(|row| {
            let mut values = Vec::with_capacity(columns.len());
            for (i, cell) in row.into_iter().enumerate() {
                match (cell, expansions.get(&i)) {
                    (Cell::Object(mut map), Some(names)) => {
                        values.extend(names.iter().map(|n| map.remove(n).unwrap_or(Value::Null)));
                    }
                    (Cell::Object(_), None) => values.push(Value::Null),
                    (Cell::Value(v), _) => values.push(v),
                }
            }
            values
        })
        .collect();
    Ok((columns, out))
}

fn cell_at(row: &[Cell], index: usize) -> &Value {
    row.get(index).map_or(&NULL, Cell::value)
}
