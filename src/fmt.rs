//! SQL pretty-printing for diagnostics.

use crate::lexer::tokenize;

/// Width of the `SELECT ` prefix columns are aligned under.
const INDENT: &str = "       ";

/// Re-render a SELECT with one column per line under `SELECT`, followed by
/// the `FROM` clause on its own line.
///
/// ```
/// use sqlfauna::format_sql_query;
///
/// assert_eq!(
///     format_sql_query("SELECT users.id, users.name FROM users"),
///     "SELECT\n       users.id,\n       users.name\nFROM users"
/// );
/// ```
///
/// Anything that is not a SELECT with a FROM clause, or does not tokenize,
/// is returned trimmed.
pub fn format_sql_query(sql: &str) -> String {
    let sql = sql.trim();
    let Ok(nodes) = tokenize(sql) else {
        return sql.to_string();
    };
    if !nodes.first().is_some_and(|n| n.is_keyword("SELECT")) {
        return sql.to_string();
    }
    let Some(from) = nodes.iter().position(|n| n.is_keyword("FROM")) else {
        return sql.to_string();
    };

    let mut head = String::from("SELECT");
    let mut list = &nodes[1..from];
    if let Some(first) = list.first().filter(|n| n.is_keyword("DISTINCT")) {
        head.push(' ');
        head.push_str(&first.text);
        list = &list[1..];
    }
    if list.is_empty() {
        return sql.to_string();
    }

    // Column text is sliced from the source so quoting and spacing survive.
    let mut columns = Vec::new();
    let mut start = list[0].span.start;
    for (i, node) in list.iter().enumerate() {
        if node.is_punct(",") {
            columns.push(sql[start..node.span.start].trim());
            if let Some(next) = list.get(i + 1) {
                start = next.span.start;
            }
        }
    }
    let end = list[list.len() - 1].span.end;
    if start < end {
        columns.push(sql[start..end].trim());
    }

    let body: Vec<String> = columns.iter().map(|c| format!("{}{}", INDENT, c)).collect();
    format!(
        "{}\n{}\n{}",
        head,
        body.join(",\n"),
        sql[nodes[from].span.start..].trim()
    )
}
