use std::sync::Arc;

use pretty_assertions::assert_eq;
use sqlfauna::prelude::*;

async fn seeded() -> Connection {
    let conn = Connection::with_transport(Arc::new(MemoryTransport::new()));
    let mut cursor = conn.cursor();
    cursor
        .execute(
            "INSERT INTO users (name, age) VALUES ('Bob', 30), ('Al', 20), ('Cy', 40)",
            &Params::none(),
        )
        .await
        .unwrap();
    cursor
        .execute_many(
            "INSERT INTO orders (user_id, total) VALUES (%(user)s, %(total)s)",
            &[
                Params::named([("user", Value::from("1")), ("total", Value::Int(10))]),
                Params::named([("user", Value::from("1")), ("total", Value::Int(20))]),
                Params::named([("user", Value::from("2")), ("total", Value::Int(30))]),
                Params::named([("user", Value::from("9")), ("total", Value::Int(40))]),
            ],
        )
        .await
        .unwrap();
    assert_eq!(cursor.row_count(), 4);
    assert_eq!(cursor.last_row_id(), Some("4"));
    drop(cursor);
    conn
}

fn row(name: &str, total: i64) -> Row {
    vec![Value::from(name), Value::Int(total)]
}

#[tokio::test]
async fn test_inner_join_yields_matching_pairs_only() {
    let conn = seeded().await;
    let mut cursor = conn.cursor();
    cursor
        .execute(
            "SELECT users.name, orders.total FROM users INNER JOIN orders ON users.id = orders.user_id ORDER BY orders.total",
            &Params::none(),
        )
        .await
        .unwrap();
    assert_eq!(cursor.row_count(), 3);
    assert_eq!(
        cursor.description(),
        Some(&["name".to_string(), "total".to_string()][..])
    );
    assert_eq!(
        cursor.fetch_all().unwrap(),
        vec![row("Bob", 10), row("Bob", 20), row("Al", 30)]
    );
}

#[tokio::test]
async fn test_join_on_id_from_the_other_side() {
    let conn = seeded().await;
    let mut cursor = conn.cursor();
    cursor
        .execute(
            "SELECT u.name, o.total FROM orders o JOIN users u ON o.user_id = u.id ORDER BY o.total DESC",
            &Params::none(),
        )
        .await
        .unwrap();
    assert_eq!(
        cursor.fetch_all().unwrap(),
        vec![row("Al", 30), row("Bob", 20), row("Bob", 10)]
    );
}

#[tokio::test]
async fn test_comma_join_with_filter_after_join() {
    let conn = seeded().await;
    let mut cursor = conn.cursor();
    cursor
        .execute(
            "SELECT users.name, orders.total FROM users, orders WHERE orders.user_id = users.id AND orders.total > 15",
            &Params::none(),
        )
        .await
        .unwrap();
    assert_eq!(cursor.fetch_all().unwrap(), vec![row("Bob", 20), row("Al", 30)]);
}

#[tokio::test]
async fn test_left_join_keeps_unmatched_rows() {
    let conn = seeded().await;
    let mut cursor = conn.cursor();
    cursor
        .execute(
            "SELECT users.name, orders.total FROM users LEFT JOIN orders ON users.id = orders.user_id WHERE users.name = 'Cy'",
            &Params::none(),
        )
        .await
        .unwrap();
    assert_eq!(
        cursor.fetch_all().unwrap(),
        vec![vec![Value::from("Cy"), Value::Null]]
    );
}

#[tokio::test]
async fn test_star_expands_to_columns() {
    let conn = seeded().await;
    let mut cursor = conn.cursor();
    cursor
        .execute("SELECT * FROM users WHERE users.id = 2", &Params::none())
        .await
        .unwrap();
    assert_eq!(
        cursor.description(),
        Some(&["id".to_string(), "age".to_string(), "name".to_string()][..])
    );
    assert_eq!(
        cursor.fetch_one().unwrap(),
        Some(vec![Value::from("2"), Value::Int(20), Value::from("Al")])
    );
}

#[tokio::test]
async fn test_count_like_and_in() {
    let conn = seeded().await;
    let mut cursor = conn.cursor();

    cursor
        .execute("SELECT COUNT(*) FROM orders WHERE orders.total >= 20", &Params::none())
        .await
        .unwrap();
    assert_eq!(cursor.fetch_all().unwrap(), vec![vec![Value::Int(3)]]);

    cursor
        .execute("SELECT users.name FROM users WHERE users.name LIKE 'B%'", &Params::none())
        .await
        .unwrap();
    assert_eq!(cursor.fetch_all().unwrap(), vec![vec![Value::from("Bob")]]);

    cursor
        .execute(
            "SELECT users.name FROM users WHERE users.age IN (20, 40) ORDER BY users.name",
            &Params::none(),
        )
        .await
        .unwrap();
    assert_eq!(
        cursor.fetch_many(1).unwrap(),
        vec![vec![Value::from("Al")]]
    );
    assert_eq!(cursor.fetch_many(5).unwrap(), vec![vec![Value::from("Cy")]]);
}

#[tokio::test]
async fn test_update_delete_and_drop() {
    let conn = seeded().await;
    let mut cursor = conn.cursor();

    cursor
        .execute(
            "UPDATE users SET users.age = %(age)s WHERE users.name = %(name)s",
            &Params::named([("age", Value::Int(31)), ("name", Value::from("Bob"))]),
        )
        .await
        .unwrap();
    assert_eq!(cursor.row_count(), 1);

    cursor
        .execute("DELETE FROM orders WHERE orders.total < 25", &Params::none())
        .await
        .unwrap();
    assert_eq!(cursor.row_count(), 2);

    cursor.execute("DROP TABLE orders", &Params::none()).await.unwrap();
    assert_eq!(cursor.row_count(), -1);

    let err = cursor
        .execute("SELECT orders.total FROM orders", &Params::none())
        .await
        .unwrap_err();
    assert!(err.is_remote(), "{}", err);

    cursor
        .execute("SELECT users.age FROM users WHERE users.name = 'Bob'", &Params::none())
        .await
        .unwrap();
    assert_eq!(cursor.fetch_all().unwrap(), vec![vec![Value::Int(31)]]);
}

#[tokio::test]
async fn test_errors_keep_their_class() {
    let conn = seeded().await;
    let mut cursor = conn.cursor();

    let err = cursor.execute("SELEKT 1", &Params::none()).await.unwrap_err();
    assert!(err.is_syntax());

    let err = cursor
        .execute(
            "SELECT users.name FROM users FULL OUTER JOIN orders ON users.id = orders.user_id",
            &Params::none(),
        )
        .await
        .unwrap_err();
    assert!(err.is_unsupported());

    let err = cursor
        .execute("INSERT INTO users (id, name) VALUES (1, 'again')", &Params::none())
        .await
        .unwrap_err();
    assert!(err.is_remote());
}

fn memory() -> Connection {
    Connection::with_transport(Arc::new(MemoryTransport::new()))
}

#[tokio::test]
async fn test_integer_foreign_keys_join_in_both_directions() {
    let conn = memory();
    let mut cursor = conn.cursor();
    cursor
        .execute("INSERT INTO users (name) VALUES ('Bob'), ('Al')", &Params::none())
        .await
        .unwrap();
    cursor
        .execute(
            "INSERT INTO orders (user_id, total) VALUES (1, 10), (2, 20), (7, 70)",
            &Params::none(),
        )
        .await
        .unwrap();

    for sql in [
        "SELECT users.name, orders.total FROM users JOIN orders ON users.id = orders.user_id ORDER BY orders.total",
        "SELECT users.name, orders.total FROM orders JOIN users ON orders.user_id = users.id ORDER BY orders.total",
    ] {
        cursor.execute(sql, &Params::none()).await.unwrap();
        assert_eq!(
            cursor.fetch_all().unwrap(),
            vec![row("Bob", 10), row("Al", 20)],
            "{}",
            sql
        );
    }
}

#[tokio::test]
async fn test_negated_comparisons_skip_nulls() {
    let conn = memory();
    let mut cursor = conn.cursor();
    cursor
        .execute(
            "INSERT INTO users (name, age) VALUES ('Bob', 30), ('Al', NULL), ('Cy', 40)",
            &Params::none(),
        )
        .await
        .unwrap();

    for (sql, expected) in [
        ("SELECT users.name FROM users WHERE users.age <> 30", vec!["Cy"]),
        ("SELECT users.name FROM users WHERE NOT users.age > 35", vec!["Bob"]),
        ("SELECT users.name FROM users WHERE users.age NOT IN (30)", vec!["Cy"]),
        ("SELECT users.name FROM users WHERE NOT (users.age = 30 OR users.age > 35)", vec![]),
        (
            "SELECT users.name FROM users WHERE NOT (users.age = 30 AND users.age > 35) ORDER BY users.name",
            vec!["Bob", "Cy"],
        ),
    ] {
        cursor.execute(sql, &Params::none()).await.unwrap();
        let expected: Vec<Row> = expected.into_iter().map(|n| vec![Value::from(n)]).collect();
        assert_eq!(cursor.fetch_all().unwrap(), expected, "{}", sql);
    }

    cursor
        .execute(
            "SELECT users.name FROM users WHERE users.age IS NOT NULL ORDER BY users.name",
            &Params::none(),
        )
        .await
        .unwrap();
    assert_eq!(
        cursor.fetch_all().unwrap(),
        vec![vec![Value::from("Bob")], vec![Value::from("Cy")]]
    );
}

#[tokio::test]
async fn test_bound_string_with_quote_round_trips() {
    let conn = memory();
    let mut cursor = conn.cursor();
    let params = Params::named([("name", "O'Brien")]);
    cursor
        .execute("INSERT INTO users (name) VALUES (%(name)s)", &params)
        .await
        .unwrap();
    cursor
        .execute("SELECT users.name FROM users WHERE users.name = %(name)s", &params)
        .await
        .unwrap();
    assert_eq!(cursor.fetch_all().unwrap(), vec![vec![Value::from("O'Brien")]]);
}
