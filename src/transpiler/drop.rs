//! DROP TABLE translation.

use crate::ast::*;
use crate::transpiler::Expr;

/// Delete every index sourced from the collection, then the collection.
pub fn translate(model: &QueryModel, page_size: usize) -> Expr {
    let collection = Expr::collection(model.base_table());
    let indexes = Expr::select(
        &["data"],
        Expr::Paginate {
            set: Box::new(Expr::Indexes),
            size: page_size,
        },
    );
    let owned = Expr::filter(
        indexes,
        Expr::lambda(
            "index",
            Expr::equals(
                Expr::select(&["source"], Expr::get(Expr::var("index"))),
                collection.clone(),
            ),
        ),
    );
    let body = Expr::Do(vec![
        Expr::foreach(
            owned,
            Expr::lambda("index", Expr::Delete(Box::new(Expr::var("index")))),
        ),
        Expr::Delete(Box::new(collection.clone())),
    ]);
    if model.if_exists {
        Expr::if_(Expr::Exists(Box::new(collection)), body, Expr::Null)
    } else {
        body
    }
}
