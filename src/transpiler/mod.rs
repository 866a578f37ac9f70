//! Statement translators.
//!
//! Compiles a [`QueryModel`] into an FQL [`Expr`]. Each statement kind has
//! its own module; SELECT delegates joins to [`join`].

pub mod delete;
pub mod drop;
pub mod expr;
pub mod filter;
pub mod insert;
pub mod join;
pub mod select;
pub mod update;

pub use expr::{Cmp, Expr, StrTest};

use chrono::SecondsFormat;

use crate::ast::*;
use crate::error::FaunaResult;

/// Largest page the store serves in one request.
pub const DEFAULT_PAGE_SIZE: usize = 100_000;

/// Lambda variable bound to one row inside the select pipeline.
pub(crate) const ROW: &str = "row";

/// Trait for converting model nodes to FQL.
pub trait ToFql {
    fn to_fql(&self) -> Expr;
}

impl ToFql for Value {
    fn to_fql(&self) -> Expr {
        match self {
            Value::Null => Expr::Null,
            Value::Bool(b) => Expr::Bool(*b),
            Value::Int(n) => Expr::Int(*n),
            Value::Float(n) => Expr::Float(*n),
            Value::String(s) => Expr::String(s.clone()),
            Value::DateTime(dt) => Expr::Time(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

/// A column read from the current row, `null` when absent.
impl ToFql for ColumnRef {
    fn to_fql(&self) -> Expr {
        column_path(self, Expr::var(ROW))
    }
}

/// Read `column` out of a row shaped `{table: document}`.
pub(crate) fn column_path(column: &ColumnRef, row: Expr) -> Expr {
    if column.is_ref_id() {
        Expr::select_or_null(&[&column.table, "ref", "id"], row)
    } else {
        Expr::select_or_null(&[&column.table, "data", &column.name], row)
    }
}

/// Name of the single-term index over `column` of `collection`.
pub fn index_name(collection: &str, column: &str) -> String {
    format!("{}_by_{}", collection, column)
}

/// One client-side sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    /// Position in the projected row
    pub index: usize,
    pub order: SortOrder,
}

/// Result shaping the store cannot express, applied by the driver.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultShape {
    /// Visible output column names
    pub columns: Vec<String>,
    /// Positions of `*` items, whose cell is an object to be expanded
    pub stars: Vec<usize>,
    pub sort: Vec<SortKey>,
    /// Applied after sorting; only set when `sort` is non-empty
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    /// Trailing sort-only columns to strip after sorting
    pub hidden: usize,
}

/// Output of a translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub kind: StatementKind,
    pub expr: Expr,
    pub shape: ResultShape,
}

/// Translator settings.
#[derive(Debug, Clone, Copy)]
pub struct Translator {
    pub page_size: usize,
}

impl Default for Translator {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Translator {
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    /// Compile a query model into an FQL expression.
    pub fn translate(&self, model: &QueryModel) -> FaunaResult<Translation> {
        let (expr, shape) = match model.kind {
            StatementKind::Select => select::translate(model, self.page_size)?,
            StatementKind::Insert => (insert::translate(model)?, ResultShape::default()),
            StatementKind::Update => (update::translate(model, self.page_size)?, ResultShape::default()),
            StatementKind::Delete => (delete::translate(model, self.page_size)?, ResultShape::default()),
            StatementKind::Drop => (drop::translate(model, self.page_size), ResultShape::default()),
        };
        Ok(Translation {
            kind: model.kind,
            expr,
            shape,
        })
    }
}

/// Translate with the default page size.
pub fn translate(model: &QueryModel) -> FaunaResult<Translation> {
    Translator::default().translate(model)
}

/// Rows of `table` as `[{table: document}, ...]`, filtered by `predicate`.
///
/// Used by UPDATE and DELETE, which never join.
pub(crate) fn filtered_rows(
    table: &str,
    predicate: Option<&Predicate>,
    page_size: usize,
) -> FaunaResult<Expr> {
    let mut rows = filter::base_rows(table, predicate, page_size);
    if let Some(predicate) = predicate {
        rows = Expr::filter(rows, Expr::lambda(ROW, filter::predicate(predicate)?));
    }
    Ok(rows)
}
