//! SELECT translation.
//!
//! Pipeline: base set -> page of `{table: document}` rows -> filter (before
//! the joins when it only touches the base table) -> joins -> filter ->
//! projection into positional arrays -> distinct -> offset/limit.
//! ORDER BY is left to the driver through [`ResultShape`].

use crate::ast::*;
use crate::error::{FaunaError, FaunaResult};
use crate::transpiler::{column_path, filter, join, Expr, ResultShape, SortKey, ToFql, ROW};

pub fn translate(model: &QueryModel, page_size: usize) -> FaunaResult<(Expr, ResultShape)> {
    if !model.group_by.is_empty() {
        return Err(FaunaError::unsupported("GROUP BY"));
    }
    let base = model.base_table();
    let predicate = model.predicate.as_ref();
    let pushdown = predicate.is_some_and(|p| p.tables().iter().all(|t| *t == base));

    let mut rows = filter::base_rows(base, predicate, page_size);
    if let (true, Some(p)) = (pushdown, predicate) {
        rows = Expr::filter(rows, Expr::lambda(ROW, filter::predicate(p)?));
    }
    for spec in &model.joins {
        rows = join::apply(rows, spec, page_size)?;
    }
    if let (false, Some(p)) = (pushdown, predicate) {
        rows = Expr::filter(rows, Expr::lambda(ROW, filter::predicate(p)?));
    }

    if model
        .columns
        .iter()
        .any(|c| matches!(c, SelectItem::Aggregate { .. }))
    {
        return aggregate(model, rows);
    }

    let mut shape = ResultShape::default();
    let mut cells = Vec::new();
    for item in &model.columns {
        match item {
            SelectItem::Column { column, alias } => {
                shape
                    .columns
                    .push(alias.clone().unwrap_or_else(|| column.name.clone()));
                cells.push(column.to_fql());
            }
            SelectItem::Star { table } => {
                let tables: Vec<&str> = match table {
                    Some(t) => vec![t.as_str()],
                    None => model.tables.iter().map(String::as_str).collect(),
                };
                for t in tables {
                    shape.stars.push(cells.len());
                    shape.columns.push("*".to_string());
                    cells.push(star(t));
                }
            }
            SelectItem::Literal { value, alias } => {
                shape
                    .columns
                    .push(alias.clone().unwrap_or_else(|| value.to_string()));
                cells.push(value.to_fql());
            }
            SelectItem::Aggregate { function, .. } => {
                return Err(FaunaError::unsupported(format!("aggregate {}", function)));
            }
        }
    }

    for order in &model.order_by {
        let existing = model.columns.iter().position(|item| {
            matches!(item, SelectItem::Column { column, .. } if *column == order.column)
        });
        let index = match existing {
            Some(pos) => cell_index(model, pos),
            None => {
                cells.push(order.column.to_fql());
                shape.hidden += 1;
                cells.len() - 1
            }
        };
        shape.sort.push(SortKey {
            index,
            order: order.order,
        });
    }

    let mut out = Expr::map(rows, Expr::lambda(ROW, Expr::Array(cells)));
    if model.distinct {
        out = Expr::Distinct(Box::new(out));
    }
    if shape.sort.is_empty() {
        if let Some(offset) = model.offset {
            out = Expr::Drop(offset, Box::new(out));
        }
        if let Some(limit) = model.limit {
            out = Expr::Take(limit, Box::new(out));
        }
    } else {
        shape.offset = model.offset;
        shape.limit = model.limit;
    }
    Ok((out, shape))
}

/// Position of select item `pos` in the projected row; a bare `*` spans
/// one cell per table.
fn cell_index(model: &QueryModel, pos: usize) -> usize {
    model.columns[..pos]
        .iter()
        .map(|item| match item {
            SelectItem::Star { table: None } => model.tables.len(),
            _ => 1,
        })
        .sum()
}

/// Document data merged with its id; empty when the table was not matched
/// by a LEFT JOIN.
fn star(table: &str) -> Expr {
    Expr::merge(
        Expr::Select {
            path: vec![table.to_string(), "data".to_string()],
            from: Box::new(Expr::var(ROW)),
            default: Some(Box::new(Expr::Object(Vec::new()))),
        },
        Expr::object([(
            "id",
            column_path(&ColumnRef::new(table, "id"), Expr::var(ROW)),
        )]),
    )
}

/// `COUNT(*)` and `COUNT(col)` without GROUP BY produce a single row.
fn aggregate(model: &QueryModel, rows: Expr) -> FaunaResult<(Expr, ResultShape)> {
    let mut shape = ResultShape::default();
    let mut cells = Vec::new();
    for item in &model.columns {
        let SelectItem::Aggregate {
            function,
            argument,
            alias,
        } = item
        else {
            return Err(FaunaError::unsupported(
                "aggregate mixed with plain columns without GROUP BY",
            ));
        };
        if function != "COUNT" {
            return Err(FaunaError::unsupported(format!("aggregate {}", function)));
        }
        let counted = match argument {
            None => rows.clone(),
            Some(column) => Expr::filter(
                rows.clone(),
                Expr::lambda(
                    ROW,
                    Expr::not(Expr::equals(column.to_fql(), Expr::Null)),
                ),
            ),
        };
        shape
            .columns
            .push(alias.clone().unwrap_or_else(|| "count".to_string()));
        cells.push(Expr::Count(Box::new(counted)));
    }
    Ok((Expr::Array(vec![Expr::Array(cells)]), shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::transpiler::translate;
    use pretty_assertions::assert_eq;

    fn shape_of(sql: &str) -> ResultShape {
        translate(&parse(sql).unwrap()).unwrap().shape
    }

    fn wire_of(sql: &str) -> String {
        translate(&parse(sql).unwrap()).unwrap().expr.to_wire().to_string()
    }

    #[test]
    fn test_projection_names() {
        let shape = shape_of("SELECT users.id, users.name AS n FROM users");
        assert_eq!(shape.columns, vec!["id".to_string(), "n".to_string()]);
        assert_eq!(shape.hidden, 0);
    }

    #[test]
    fn test_limit_without_order_is_remote() {
        let wire = wire_of("SELECT users.name FROM users LIMIT 2 OFFSET 1");
        assert!(wire.contains(r#""take":2"#), "{}", wire);
        assert!(wire.contains(r#""drop":1"#), "{}", wire);
        let shape = shape_of("SELECT users.name FROM users LIMIT 2 OFFSET 1");
        assert_eq!(shape.limit, None);
    }

    #[test]
    fn test_order_by_is_client_side() {
        let shape = shape_of("SELECT users.name FROM users ORDER BY users.age DESC, users.name LIMIT 3");
        assert_eq!(shape.columns, vec!["name".to_string()]);
        assert_eq!(shape.hidden, 1);
        assert_eq!(
            shape.sort,
            vec![
                SortKey { index: 1, order: SortOrder::Desc },
                SortKey { index: 0, order: SortOrder::Asc },
            ]
        );
        assert_eq!(shape.limit, Some(3));
        let wire = wire_of("SELECT users.name FROM users ORDER BY users.age DESC LIMIT 3");
        assert!(!wire.contains(r#""take""#), "{}", wire);
    }

    #[test]
    fn test_filter_pushed_before_join() {
        let sql = "SELECT users.name, orders.total FROM users JOIN orders ON users.id = orders.user_id WHERE users.age > 3";
        let translated = translate(&parse(sql).unwrap()).unwrap();
        // Outermost is the projection Map over the Reduce of the join.
        let Expr::Map(rows, _) = translated.expr else {
            panic!("expected projection");
        };
        let Expr::Reduce { collection, .. } = *rows else {
            panic!("expected join reduce");
        };
        assert!(matches!(*collection, Expr::Filter(..)));
    }

    #[test]
    fn test_filter_after_join_when_joined_table_referenced() {
        let sql = "SELECT users.name FROM users JOIN orders ON users.id = orders.user_id WHERE orders.total > 3";
        let translated = translate(&parse(sql).unwrap()).unwrap();
        let Expr::Map(rows, _) = translated.expr else {
            panic!("expected projection");
        };
        let Expr::Filter(inner, _) = *rows else {
            panic!("expected filter after join");
        };
        assert!(matches!(*inner, Expr::Reduce { .. }));
    }

    #[test]
    fn test_count_star() {
        let translated = translate(&parse("SELECT COUNT(*) AS c FROM users WHERE age > 1").unwrap()).unwrap();
        assert_eq!(translated.shape.columns, vec!["c".to_string()]);
        let Expr::Array(rows) = translated.expr else {
            panic!("expected single row");
        };
        assert!(matches!(&rows[0], Expr::Array(cells) if matches!(cells[0], Expr::Count(_))));
    }

    #[test]
    fn test_star_projection() {
        let shape = shape_of("SELECT * FROM users JOIN orders ON users.id = orders.user_id ORDER BY orders.total");
        assert_eq!(shape.stars, vec![0, 1]);
        assert_eq!(shape.sort, vec![SortKey { index: 2, order: SortOrder::Asc }]);
    }

    #[test]
    fn test_unsupported_select_constructs() {
        for sql in [
            "SELECT users.name FROM users GROUP BY users.name",
            "SELECT SUM(age) FROM users",
            "SELECT name, COUNT(*) FROM users",
        ] {
            let err = translate(&parse(sql).unwrap()).unwrap_err();
            assert!(err.is_unsupported(), "{}: {}", sql, err);
        }
    }
}
