use pretty_assertions::assert_eq;
use serde_json::json;
use sqlfauna::extract::extract_value;
use sqlfauna::prelude::*;
use sqlfauna::transpiler::ResultShape;

fn fql(sql: &str) -> Translation {
    translate(&parse(sql).expect("parse")).expect("translate")
}

#[test]
fn test_every_statement_kind_yields_an_expression() {
    for sql in [
        "SELECT users.id, users.name FROM users",
        "SELECT * FROM users WHERE users.age >= 18 ORDER BY users.name DESC LIMIT 5",
        "SELECT COUNT(*) FROM users",
        "INSERT INTO users (name, age, finger_count) VALUES ('Bob', 30, 10)",
        "UPDATE users SET users.name = 'Bob'",
        "UPDATE users SET users.name = 'Bob' WHERE users.id = 3",
        "DELETE FROM users",
        "DELETE FROM users WHERE users.name = 'Bob'",
        "DROP TABLE users",
    ] {
        let t = fql(sql);
        assert!(!t.expr.to_wire().is_null(), "{}", sql);
    }
}

#[test]
fn test_insert_payload_types() {
    let t = fql("INSERT INTO users (name, age, finger_count) VALUES ('Bob', 30, 10)");
    assert_eq!(
        t.expr.to_wire(),
        json!({
            "create": { "collection": "users" },
            "params": { "object": { "data": { "object": {
                "name": "Bob",
                "age": 30,
                "finger_count": 10
            } } } }
        })
    );
}

#[test]
fn test_insert_quoted_number_stays_string() {
    let t = fql("INSERT INTO users (zip) VALUES ('0123')");
    let wire = t.expr.to_wire();
    assert_eq!(wire["params"]["object"]["data"]["object"]["zip"], json!("0123"));
}

#[test]
fn test_delete_filtered_references_predicate() {
    let all = fql("DELETE FROM users").expr.to_wire().to_string();
    let some = fql("DELETE FROM users WHERE users.name = 'Bob'").expr.to_wire().to_string();
    assert!(all.contains(r#"{"documents":{"collection":"users"}}"#));
    assert!(!all.contains("Bob"));
    assert!(some.contains(r#""index":"users_by_name""#));
    assert!(some.contains("Bob"));
}

#[test]
fn test_drop_deletes_collection() {
    let t = fql("DROP TABLE users");
    let Expr::Do(steps) = &t.expr else {
        panic!("expected Do, got {}", t.expr);
    };
    assert_eq!(
        steps.last().map(Expr::to_wire),
        Some(json!({ "delete": { "collection": "users" } }))
    );
}

#[test]
fn test_order_by_is_client_side() {
    let t = fql("SELECT users.name FROM users ORDER BY users.age DESC LIMIT 2 OFFSET 1");
    assert_eq!(
        t.shape,
        ResultShape {
            columns: vec!["name".into()],
            stars: vec![],
            sort: vec![sqlfauna::transpiler::SortKey {
                index: 1,
                order: SortOrder::Desc,
            }],
            offset: Some(1),
            limit: Some(2),
            hidden: 1,
        }
    );
    let wire = t.expr.to_wire().to_string();
    assert!(!wire.contains("\"take\""));
}

#[test]
fn test_limit_without_order_is_pushed_down() {
    let wire = fql("SELECT users.name FROM users LIMIT 3").expr.to_wire();
    assert_eq!(wire["take"], json!(3));
}

#[test]
fn test_unsupported_constructs() {
    for sql in [
        "SELECT users.name FROM users RIGHT JOIN orders ON users.id = orders.user_id",
        "SELECT users.name FROM users WHERE users.name LIKE 'a%b'",
        "SELECT users.name FROM users WHERE users.id IN (SELECT orders.user_id FROM orders)",
        "SELECT users.age FROM users GROUP BY users.age",
        "SELECT SUM(users.age) FROM users",
        "UPDATE users SET id = 4",
    ] {
        let err = translate(&parse(sql).expect(sql)).unwrap_err();
        assert!(err.is_unsupported(), "{}: {}", sql, err);
    }
}

#[test]
fn test_extraction_properties() {
    assert_eq!(extract_value("none"), Value::Null);
    assert_eq!(extract_value("True"), Value::Bool(true));
    assert_eq!(extract_value("FALSE"), Value::Bool(false));
    assert_eq!(extract_value("'123'"), Value::String("123".into()));
    assert_eq!(extract_value("123"), Value::Int(123));
    assert_eq!(
        extract_value("'2020-05-17T10:30:00'"),
        extract_value("'2020-05-17T10:30:00+00:00'")
    );
}

#[test]
fn test_format_sql_query() {
    assert_eq!(
        format_sql_query("SELECT users.id, users.name FROM users"),
        "SELECT\n       users.id,\n       users.name\nFROM users"
    );
}
