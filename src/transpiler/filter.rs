//! Predicate translation and base-set selection.

use crate::ast::*;
use crate::error::{FaunaError, FaunaResult};
use crate::transpiler::{Cmp, Expr, StrTest, ToFql, index_name};

/// The set the select pipeline starts from.
///
/// A top-level equality on a data column of `table` is answered by that
/// column's index; otherwise every document of the collection is scanned.
pub fn base_set(table: &str, predicate: Option<&Predicate>) -> Expr {
    match predicate.and_then(|p| indexed_equality(p, table)) {
        Some((column, value)) => Expr::Match(
            Box::new(Expr::index(index_name(table, &column.name))),
            Box::new(value.to_fql()),
        ),
        None => Expr::Documents(Box::new(Expr::collection(table))),
    }
}

/// `[{table: document}, ...]` for every document of the base set.
pub fn base_rows(table: &str, predicate: Option<&Predicate>, page_size: usize) -> Expr {
    let page = Expr::Paginate {
        set: Box::new(base_set(table, predicate)),
        size: page_size,
    };
    Expr::select(
        &["data"],
        Expr::map(
            page,
            Expr::lambda("ref", Expr::object([(table, Expr::get(Expr::var("ref")))])),
        ),
    )
}

fn indexed_equality<'a>(predicate: &'a Predicate, table: &str) -> Option<(&'a ColumnRef, &'a Value)> {
    predicate.conjuncts().into_iter().find_map(|p| match p {
        Predicate::Compare {
            column,
            op: CompareOp::Eq,
            operand: Operand::Value(value),
        } if column.table == table && !column.is_ref_id() && !value.is_null() => Some((column, value)),
        _ => None,
    })
}

/// Translate a predicate into a boolean expression over `Var("row")`.
///
/// The expression is true only where the SQL predicate is TRUE. A comparison
/// that reads a NULL is UNKNOWN, so it matches neither itself nor its `NOT`.
pub fn predicate(predicate: &Predicate) -> FaunaResult<Expr> {
    match predicate {
        Predicate::Compare {
            column,
            op,
            operand,
        } => {
            let test = compare(column, *op, operand)?;
            Ok(match op {
                CompareOp::Ne if !is_null_test(operand) => guarded(column, operand, test),
                _ => test,
            })
        }
        Predicate::And(items) => Ok(Expr::And(
            items.iter().map(self::predicate).collect::<FaunaResult<_>>()?,
        )),
        Predicate::Or(items) => Ok(Expr::Or(
            items.iter().map(self::predicate).collect::<FaunaResult<_>>()?,
        )),
        Predicate::Not(inner) => negate(inner),
    }
}

/// True where `predicate` is FALSE.
fn negate(predicate: &Predicate) -> FaunaResult<Expr> {
    match predicate {
        Predicate::Compare {
            column,
            op,
            operand,
        } => {
            let test = Expr::not(compare(column, *op, operand)?);
            Ok(match op {
                CompareOp::Eq | CompareOp::Ne if is_null_test(operand) => test,
                _ => guarded(column, operand, test),
            })
        }
        // De Morgan, so each leaf carries its own NULL guard
        Predicate::And(items) => Ok(Expr::Or(items.iter().map(negate).collect::<FaunaResult<_>>()?)),
        Predicate::Or(items) => Ok(Expr::And(items.iter().map(negate).collect::<FaunaResult<_>>()?)),
        Predicate::Not(inner) => self::predicate(inner),
    }
}

/// `IS NULL` / `IS NOT NULL` are never UNKNOWN.
fn is_null_test(operand: &Operand) -> bool {
    matches!(operand, Operand::Value(Value::Null))
}

/// `test`, required to read only non-null columns.
fn guarded(column: &ColumnRef, operand: &Operand, test: Expr) -> Expr {
    let mut terms = vec![Expr::not(Expr::equals(column.to_fql(), Expr::Null))];
    if let Operand::Column(other) = operand {
        terms.push(Expr::not(Expr::equals(other.to_fql(), Expr::Null)));
    }
    terms.push(test);
    Expr::And(terms)
}

/// The bare comparison, without NULL handling.
fn compare(column: &ColumnRef, op: CompareOp, operand: &Operand) -> FaunaResult<Expr> {
    let lhs = column.to_fql();
    let rhs = match operand {
        Operand::Value(value) => operand_value(column, value),
        Operand::Column(other) => other.to_fql(),
        Operand::Subquery(sql) => {
            return Err(FaunaError::unsupported(format!("subquery ({})", sql)));
        }
    };
    Ok(match op {
        CompareOp::Eq => Expr::equals(lhs, rhs),
        CompareOp::Ne => Expr::not(Expr::equals(lhs, rhs)),
        CompareOp::Lt => Expr::Compare(Cmp::Lt, Box::new(lhs), Box::new(rhs)),
        CompareOp::Lte => Expr::Compare(Cmp::Lte, Box::new(lhs), Box::new(rhs)),
        CompareOp::Gt => Expr::Compare(Cmp::Gt, Box::new(lhs), Box::new(rhs)),
        CompareOp::Gte => Expr::Compare(Cmp::Gte, Box::new(lhs), Box::new(rhs)),
        CompareOp::Like => match operand {
            Operand::Value(Value::String(pattern)) => like(lhs, pattern)?,
            other => {
                return Err(FaunaError::unsupported(format!(
                    "LIKE with non-string pattern on {}: {:?}",
                    column, other
                )))
            }
        },
    })
}

/// Document ids are strings; integer literals compared with `id` are
/// converted.
fn operand_value(column: &ColumnRef, value: &Value) -> Expr {
    match value {
        Value::Int(n) if column.is_ref_id() => Expr::String(n.to_string()),
        other => other.to_fql(),
    }
}

/// `x`, `x%`, `%x` and `%x%` patterns. A backslash escapes the next char.
fn like(lhs: Expr, pattern: &str) -> FaunaResult<Expr> {
    let (leading, rest) = match pattern.strip_prefix('%') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let (trailing, core) = match rest.strip_suffix('%') {
        Some(core) if !core.ends_with('\\') => (true, core),
        _ => (false, rest),
    };

    let mut literal = String::with_capacity(core.len());
    let mut chars = core.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => literal.push(escaped),
                None => literal.push('\\'),
            },
            '%' | '_' => {
                return Err(FaunaError::unsupported(format!(
                    "LIKE pattern '{}' (wildcard inside the pattern)",
                    pattern
                )));
            }
            c => literal.push(c),
        }
    }

    let search = Box::new(Expr::String(literal));
    let test = match (leading, trailing) {
        (false, false) => return Ok(Expr::equals(lhs, *search)),
        (false, true) => Expr::Str(StrTest::StartsWith, Box::new(lhs.clone()), search),
        (true, false) => Expr::Str(StrTest::EndsWith, Box::new(lhs.clone()), search),
        (true, true) => Expr::Str(StrTest::Contains, Box::new(lhs.clone()), search),
    };
    Ok(Expr::And(vec![Expr::not(Expr::equals(lhs, Expr::Null)), test]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn where_expr(sql: &str) -> FaunaResult<Expr> {
        let model = parse(sql).unwrap();
        predicate(model.predicate.as_ref().unwrap())
    }

    fn age() -> Expr {
        Expr::select_or_null(&["users", "data", "age"], Expr::var("row"))
    }

    #[test]
    fn test_equality_uses_index() {
        let model = parse("SELECT name FROM users WHERE age > 3 AND name = 'Bob'").unwrap();
        assert_eq!(
            base_set("users", model.predicate.as_ref()),
            Expr::Match(
                Box::new(Expr::index("users_by_name")),
                Box::new(Expr::string("Bob"))
            )
        );
    }

    #[test]
    fn test_scan_without_equality() {
        let model = parse("SELECT name FROM users WHERE age > 3 OR name = 'Bob'").unwrap();
        assert_eq!(
            base_set("users", model.predicate.as_ref()),
            Expr::Documents(Box::new(Expr::collection("users")))
        );
        let model = parse("SELECT name FROM users WHERE id = 4").unwrap();
        assert_eq!(
            base_set("users", model.predicate.as_ref()),
            Expr::Documents(Box::new(Expr::collection("users")))
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            where_expr("SELECT id FROM users WHERE age <= 30").unwrap(),
            Expr::Compare(Cmp::Lte, Box::new(age()), Box::new(Expr::Int(30)))
        );
        assert_eq!(
            where_expr("SELECT id FROM users WHERE age <> 30").unwrap(),
            Expr::And(vec![
                Expr::not(Expr::equals(age(), Expr::Null)),
                Expr::not(Expr::equals(age(), Expr::Int(30))),
            ])
        );
        assert_eq!(
            where_expr("SELECT id FROM users WHERE age IS NOT NULL").unwrap(),
            Expr::not(Expr::equals(age(), Expr::Null))
        );
    }

    #[test]
    fn test_negation_excludes_nulls() {
        let not_null = || Expr::not(Expr::equals(age(), Expr::Null));
        assert_eq!(
            where_expr("SELECT id FROM users WHERE NOT age > 35").unwrap(),
            Expr::And(vec![
                not_null(),
                Expr::not(Expr::Compare(Cmp::Gt, Box::new(age()), Box::new(Expr::Int(35)))),
            ])
        );
        assert_eq!(
            where_expr("SELECT id FROM users WHERE age NOT IN (30, 40)").unwrap(),
            Expr::And(vec![
                Expr::And(vec![not_null(), Expr::not(Expr::equals(age(), Expr::Int(30)))]),
                Expr::And(vec![not_null(), Expr::not(Expr::equals(age(), Expr::Int(40)))]),
            ])
        );
        // NOT (age IS NULL) needs no guard
        assert_eq!(
            where_expr("SELECT id FROM users WHERE NOT age IS NULL").unwrap(),
            Expr::not(Expr::equals(age(), Expr::Null))
        );
    }

    #[test]
    fn test_id_literal_becomes_string() {
        assert_eq!(
            where_expr("SELECT name FROM users WHERE id = 42").unwrap(),
            Expr::equals(
                Expr::select_or_null(&["users", "ref", "id"], Expr::var("row")),
                Expr::string("42")
            )
        );
    }

    #[test]
    fn test_like_patterns() {
        let name = || Expr::select_or_null(&["users", "data", "name"], Expr::var("row"));
        let guarded = |test: StrTest, s: &str| {
            Expr::And(vec![
                Expr::not(Expr::equals(name(), Expr::Null)),
                Expr::Str(test, Box::new(name()), Box::new(Expr::string(s))),
            ])
        };
        assert_eq!(
            where_expr("SELECT id FROM users WHERE name LIKE 'Bo%'").unwrap(),
            guarded(StrTest::StartsWith, "Bo")
        );
        assert_eq!(
            where_expr("SELECT id FROM users WHERE name LIKE '%ob'").unwrap(),
            guarded(StrTest::EndsWith, "ob")
        );
        assert_eq!(
            where_expr("SELECT id FROM users WHERE name LIKE '%o%'").unwrap(),
            guarded(StrTest::Contains, "o")
        );
        assert_eq!(
            where_expr("SELECT id FROM users WHERE name LIKE 'Bob'").unwrap(),
            Expr::equals(name(), Expr::string("Bob"))
        );
        assert_eq!(
            where_expr(r"SELECT id FROM users WHERE name LIKE '%a\_b%'").unwrap(),
            guarded(StrTest::Contains, "a_b")
        );
    }

    #[test]
    fn test_unsupported_like_and_subquery() {
        assert!(where_expr("SELECT id FROM users WHERE name LIKE 'B_b'")
            .unwrap_err()
            .is_unsupported());
        assert!(where_expr("SELECT id FROM users WHERE name LIKE 'a%b'")
            .unwrap_err()
            .is_unsupported());
        assert!(where_expr("SELECT id FROM users WHERE id IN (SELECT user_id FROM orders)")
            .unwrap_err()
            .is_unsupported());
    }
}
