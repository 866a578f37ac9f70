//! UPDATE translation.

use crate::ast::*;
use crate::error::{FaunaError, FaunaResult};
use crate::transpiler::{filtered_rows, Expr, ToFql, ROW};

/// `Foreach(rows, Lambda(row, Update(ref, {data: {...}})))`. Without a
/// WHERE clause every document of the table is updated.
pub fn translate(model: &QueryModel, page_size: usize) -> FaunaResult<Expr> {
    let table = model.base_table();
    let assignments = model
        .rows
        .first()
        .filter(|row| !row.is_empty())
        .ok_or_else(|| FaunaError::syntax(format!("UPDATE {} without SET", table)))?;
    if let Some(a) = assignments.iter().find(|a| a.column.is_ref_id()) {
        return Err(FaunaError::unsupported(format!("updating document id {}", a.column)));
    }

    let data = Expr::object(
        assignments
            .iter()
            .map(|a| (a.column.name.clone(), a.value.to_fql())),
    );
    let rows = filtered_rows(table, model.predicate.as_ref(), page_size)?;
    Ok(Expr::foreach(
        rows,
        Expr::lambda(
            ROW,
            Expr::Update(
                Box::new(Expr::select(&[table, "ref"], Expr::var(ROW))),
                Box::new(Expr::object([("data", data)])),
            ),
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_update_all_rows() {
        let model = parse("UPDATE users SET name = 'Al'").unwrap();
        let Expr::Foreach(rows, _) = translate(&model, 10).unwrap() else {
            panic!("expected Foreach");
        };
        assert!(matches!(*rows, Expr::Select { .. }));
    }

    #[test]
    fn test_update_with_where() {
        let model = parse("UPDATE users SET name = 'Al' WHERE users.age > 3").unwrap();
        let Expr::Foreach(rows, body) = translate(&model, 10).unwrap() else {
            panic!("expected Foreach");
        };
        assert!(matches!(*rows, Expr::Filter(..)));
        let wire = body.to_wire().to_string();
        assert!(wire.contains(r#""update""#), "{}", wire);
        assert!(wire.contains(r#""name":"Al""#), "{}", wire);
    }

    #[test]
    fn test_setting_id_is_unsupported() {
        let model = parse("UPDATE users SET id = 4").unwrap();
        assert!(translate(&model, 10).unwrap_err().is_unsupported());
    }
}
