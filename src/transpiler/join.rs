//! Join emulation.
//!
//! The store has no joins. Each equi-join becomes, per current row, a lookup
//! of the matching documents on the right-hand table, followed by a flatten:
//!
//! ```text
//! Reduce(Lambda([acc, row], Append(<rows for row>, acc)), [], rows)
//! ```
//!
//! A data column on the right is looked up through its `<table>_by_<column>`
//! index; the `id` column is a direct `Ref` fetch guarded by `Exists`.
//!
//! Document ids are strings while foreign keys are usually written as
//! integers, so an id on either side matches both forms.

use crate::ast::*;
use crate::error::{FaunaError, FaunaResult};
use crate::transpiler::{column_path, index_name, Expr, ROW};

/// Wrap `rows` so that every row is extended with its matches in the
/// joined table.
pub fn apply(rows: Expr, join: &JoinSpec, page_size: usize) -> FaunaResult<Expr> {
    match join.kind {
        JoinKind::Inner | JoinKind::Left => {}
        JoinKind::Right => return Err(FaunaError::unsupported("RIGHT JOIN")),
        JoinKind::Full => return Err(FaunaError::unsupported("FULL JOIN")),
    }

    let table = join.right.table.as_str();
    let docs = lookup(&join.left, &join.right, page_size);

    let matched = Expr::map(
        Expr::var("docs"),
        Expr::lambda(
            "doc",
            Expr::merge(Expr::var(ROW), Expr::object([(table, Expr::var("doc"))])),
        ),
    );
    let per_row = match join.kind {
        JoinKind::Left => Expr::if_(
            Expr::IsEmpty(Box::new(Expr::var("docs"))),
            Expr::Array(vec![Expr::merge(
                Expr::var(ROW),
                Expr::object([(table, Expr::Null)]),
            )]),
            matched,
        ),
        _ => matched,
    };

    Ok(Expr::Reduce {
        lambda: Box::new(Expr::lambda2(
            "acc",
            ROW,
            Expr::Append(
                Box::new(Expr::Let(vec![("docs".into(), docs)], Box::new(per_row))),
                Box::new(Expr::var("acc")),
            ),
        )),
        initial: Box::new(Expr::Array(Vec::new())),
        collection: Box::new(rows),
    })
}

/// Documents of `right.table` whose `right` column equals `left` in the
/// current row.
fn lookup(left: &ColumnRef, right: &ColumnRef, page_size: usize) -> Expr {
    let key = column_path(left, Expr::var(ROW));
    if right.is_ref_id() {
        let reference = Expr::Ref(
            Box::new(Expr::collection(&right.table)),
            Box::new(Expr::ToString(Box::new(key.clone()))),
        );
        Expr::if_(
            Expr::Or(vec![
                Expr::equals(key, Expr::Null),
                Expr::not(Expr::Exists(Box::new(reference.clone()))),
            ]),
            Expr::Array(Vec::new()),
            Expr::Array(vec![Expr::get(reference)]),
        )
    } else {
        let index = || Box::new(Expr::index(index_name(&right.table, &right.name)));
        let set = if left.is_ref_id() {
            Expr::Union(vec![
                Expr::Match(index(), Box::new(key.clone())),
                Expr::Match(index(), Box::new(Expr::ToInteger(Box::new(key.clone())))),
            ])
        } else {
            Expr::Match(index(), Box::new(key.clone()))
        };
        let docs = Expr::select(
            &["data"],
            Expr::map(
                Expr::Paginate {
                    set: Box::new(set),
                    size: page_size,
                },
                Expr::lambda("ref", Expr::get(Expr::var("ref"))),
            ),
        );
        if left.is_ref_id() {
            // a row missing on the left of an earlier LEFT JOIN has no id
            Expr::if_(Expr::equals(key, Expr::Null), Expr::Array(Vec::new()), docs)
        } else {
            docs
        }
    }
}
