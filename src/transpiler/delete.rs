//! DELETE translation.

use crate::ast::*;
use crate::error::FaunaResult;
use crate::transpiler::{filtered_rows, Expr, ROW};

/// `Foreach(rows, Lambda(row, Delete(ref)))`
pub fn translate(model: &QueryModel, page_size: usize) -> FaunaResult<Expr> {
    let table = model.base_table();
    let rows = filtered_rows(table, model.predicate.as_ref(), page_size)?;
    Ok(Expr::foreach(
        rows,
        Expr::lambda(
            ROW,
            Expr::Delete(Box::new(Expr::select(&[table, "ref"], Expr::var(ROW)))),
        ),
    ))
}
