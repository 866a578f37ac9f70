//! INSERT translation: one `Create` per VALUES tuple.

use crate::ast::*;
use crate::error::{FaunaError, FaunaResult};
use crate::transpiler::{Expr, ToFql};

/// A single row yields one `Create`; several rows an array of them, each
/// an independent `Create` with no `Do` around it.
///
/// The array still goes out as one query, since `execute` makes exactly one
/// request, and the store commits a query as a whole. So the rows of one
/// INSERT land together or not at all; the driver adds no atomicity of its
/// own and no per-row partial success.
pub fn translate(model: &QueryModel) -> FaunaResult<Expr> {
    let table = model.base_table();
    if model.rows.is_empty() {
        return Err(FaunaError::syntax(format!("INSERT INTO {} without rows", table)));
    }
    let mut creates = model
        .rows
        .iter()
        .map(|row| create(table, row))
        .collect::<FaunaResult<Vec<_>>>()?;
    Ok(if creates.len() == 1 {
        creates.remove(0)
    } else {
        Expr::Array(creates)
    })
}

fn create(table: &str, row: &[Assignment]) -> FaunaResult<Expr> {
    let mut target = Expr::collection(table);
    let mut data = Vec::with_capacity(row.len());
    for assignment in row {
        if assignment.column.is_ref_id() {
            target = match &assignment.value {
                Value::Null => continue,
                Value::Int(n) => Expr::Ref(
                    Box::new(Expr::collection(table)),
                    Box::new(Expr::String(n.to_string())),
                ),
                Value::String(s) => Expr::Ref(
                    Box::new(Expr::collection(table)),
                    Box::new(Expr::String(s.clone())),
                ),
                other => {
                    return Err(FaunaError::unsupported(format!(
                        "document id {} (must be an integer or string)",
                        other
                    )))
                }
            };
            continue;
        }
        data.push((assignment.column.name.clone(), assignment.value.to_fql()));
    }
    Ok(Expr::Create(
        Box::new(target),
        Box::new(Expr::object([("data", Expr::Object(data))])),
    ))
}
