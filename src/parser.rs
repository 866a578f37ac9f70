//! Query model builder.
//!
//! Classifies a tokenized statement by its leading keyword and walks the
//! [`Node`] tree into a [`QueryModel`].
//!
//! # Supported shapes
//!
//! ```text
//! SELECT [DISTINCT] items FROM t [[INNER|LEFT [OUTER]] JOIN u ON t.a = u.b | , u]...
//!        [WHERE pred] [GROUP BY cols] [ORDER BY col [ASC|DESC], ...] [LIMIT n] [OFFSET m]
//! INSERT INTO t (cols) VALUES (lits), ...
//! UPDATE t SET col = lit, ... [WHERE pred]
//! DELETE FROM t [WHERE pred]
//! DROP TABLE [IF EXISTS] t [CASCADE]
//! ```

use crate::ast::*;
use crate::error::{FaunaError, FaunaResult};
use crate::extract::extract;
use crate::lexer::tokenize;
use crate::token::{Node, TokenCategory};

/// Parse a SQL statement into a query model.
pub fn parse(sql: &str) -> FaunaResult<QueryModel> {
    let nodes = tokenize(sql)?;
    build(&nodes)
}

/// Build a query model from a token tree.
pub fn build(nodes: &[Node]) -> FaunaResult<QueryModel> {
    let nodes = match nodes.split_last() {
        Some((last, rest)) if last.is_punct(";") => rest,
        _ => nodes,
    };
    let first = nodes
        .first()
        .ok_or_else(|| FaunaError::syntax("empty statement"))?;

    if let Some(p) = find_placeholder(nodes) {
        return Err(FaunaError::syntax(format!(
            "unbound parameter placeholder '{}'",
            p.text
        )));
    }
    if nodes.iter().any(|n| n.is_keyword("UNION")) {
        return Err(FaunaError::unsupported("UNION"));
    }
    if nodes.iter().any(|n| n.is_punct(";")) {
        return Err(FaunaError::syntax("multiple statements in one execute call"));
    }

    if first.category != TokenCategory::Keyword {
        return Err(FaunaError::syntax(format!(
            "unrecognized statement kind '{}'",
            first.text
        )));
    }
    match first.text.as_str() {
        "SELECT" => build_select(&nodes[1..]),
        "INSERT" => build_insert(&nodes[1..]),
        "UPDATE" => build_update(&nodes[1..]),
        "DELETE" => build_delete(&nodes[1..]),
        "DROP" => build_drop(&nodes[1..]),
        other => Err(FaunaError::syntax(format!(
            "unrecognized statement kind '{}'",
            other
        ))),
    }
}

fn find_placeholder(nodes: &[Node]) -> Option<&Node> {
    for node in nodes {
        if node.category == TokenCategory::Placeholder {
            return Some(node);
        }
        if let Some(found) = find_placeholder(&node.children) {
            return Some(found);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

fn build_select(nodes: &[Node]) -> FaunaResult<QueryModel> {
    let sections = sections(
        nodes,
        &["FROM", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET"],
    )?;
    if sections.get("HAVING").is_some() {
        return Err(FaunaError::unsupported("HAVING"));
    }
    let from = sections
        .get("FROM")
        .ok_or_else(|| FaunaError::syntax("SELECT without FROM"))?;

    let (scope, explicit_joins, comma_tables) = parse_from(from)?;
    let mut model = QueryModel::new(StatementKind::Select, scope.tables[0].clone());
    model.tables = scope.tables.clone();
    model.joins = explicit_joins;

    let mut items = sections.head;
    if items.first().is_some_and(|n| n.is_keyword("DISTINCT")) {
        model.distinct = true;
        items = &items[1..];
    }
    model.columns = parse_select_list(items, &scope)?;

    if let Some(where_nodes) = sections.get("WHERE") {
        let predicate = parse_predicate(where_nodes, &scope)?;
        model.predicate = lift_comma_joins(predicate, &mut model.joins, &comma_tables, &scope)?;
    } else if !comma_tables.is_empty() {
        return Err(FaunaError::syntax(format!(
            "table '{}' is not joined by any equality (cross product)",
            comma_tables[0]
        )));
    }

    if let Some(group) = sections.get("GROUP") {
        for item in split_commas(group)? {
            model.group_by.push(single_column(item, &scope)?);
        }
    }
    if let Some(order) = sections.get("ORDER") {
        model.order_by = parse_order_by(order, &scope)?;
    }
    if let Some(limit) = sections.get("LIMIT") {
        model.limit = Some(parse_count(limit, "LIMIT")?);
    }
    if let Some(offset) = sections.get("OFFSET") {
        model.offset = Some(parse_count(offset, "OFFSET")?);
    }
    Ok(model)
}

fn build_insert(nodes: &[Node]) -> FaunaResult<QueryModel> {
    let mut rest = nodes;
    match rest.first() {
        Some(n) if n.is_keyword("INTO") => rest = &rest[1..],
        _ => return Err(FaunaError::syntax("expected INTO after INSERT")),
    }
    let table = match rest.first() {
        Some(n) if n.category == TokenCategory::Identifier => table_name(&n.text),
        _ => return Err(FaunaError::syntax("expected table name after INSERT INTO")),
    };
    let scope = Scope::single(&table);
    rest = &rest[1..];

    let column_group = match rest.first() {
        Some(n) if n.is_group() => n,
        _ => return Err(FaunaError::syntax("INSERT requires a column list")),
    };
    let mut columns = Vec::new();
    for item in split_commas(&column_group.children)? {
        columns.push(single_column(item, &scope)?);
    }
    rest = &rest[1..];

    match rest.first() {
        Some(n) if n.is_keyword("VALUES") => rest = &rest[1..],
        _ => return Err(FaunaError::syntax("expected VALUES in INSERT")),
    }

    let mut model = QueryModel::new(StatementKind::Insert, table);
    for tuple in split_commas(rest)? {
        let group = match tuple {
            [g] if g.is_group() => g,
            _ => return Err(FaunaError::syntax("expected parenthesised VALUES tuple")),
        };
        let values = split_commas(&group.children)?
            .into_iter()
            .map(literal)
            .collect::<FaunaResult<Vec<Value>>>()?;
        if values.len() != columns.len() {
            return Err(FaunaError::syntax(format!(
                "INSERT has {} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        let row = columns
            .iter()
            .cloned()
            .zip(values)
            .map(|(column, value)| Assignment { column, value })
            .collect();
        model.rows.push(row);
    }
    Ok(model)
}

fn build_update(nodes: &[Node]) -> FaunaResult<QueryModel> {
    let sections = sections(nodes, &["SET", "WHERE"])?;
    let table = match sections.head {
        [n] if n.category == TokenCategory::Identifier => table_name(&n.text),
        _ => return Err(FaunaError::syntax("expected table name after UPDATE")),
    };
    let scope = Scope::single(&table);
    let set = sections
        .get("SET")
        .ok_or_else(|| FaunaError::syntax("UPDATE without SET"))?;

    let mut row = Vec::new();
    for item in split_commas(set)? {
        match item {
            [col, eq, value] if eq.is_operator("=") => row.push(Assignment {
                column: resolve_column(col, &scope)?,
                value: literal(std::slice::from_ref(value))?,
            }),
            _ => {
                return Err(FaunaError::syntax(format!(
                    "malformed SET assignment '{}'",
                    render(item)
                )))
            }
        }
    }

    let mut model = QueryModel::new(StatementKind::Update, table);
    model.rows.push(row);
    if let Some(where_nodes) = sections.get("WHERE") {
        model.predicate = Some(parse_predicate(where_nodes, &scope)?);
    }
    Ok(model)
}

fn build_delete(nodes: &[Node]) -> FaunaResult<QueryModel> {
    let sections = sections(nodes, &["FROM", "WHERE"])?;
    if !sections.head.is_empty() {
        return Err(FaunaError::syntax("expected FROM after DELETE"));
    }
    let table = match sections.get("FROM") {
        Some([n]) if n.category == TokenCategory::Identifier => table_name(&n.text),
        _ => return Err(FaunaError::syntax("expected a single table after DELETE FROM")),
    };
    let scope = Scope::single(&table);

    let mut model = QueryModel::new(StatementKind::Delete, table);
    if let Some(where_nodes) = sections.get("WHERE") {
        model.predicate = Some(parse_predicate(where_nodes, &scope)?);
    }
    Ok(model)
}

fn build_drop(nodes: &[Node]) -> FaunaResult<QueryModel> {
    let mut rest = match nodes.first() {
        Some(n) if n.is_keyword("TABLE") => &nodes[1..],
        _ => return Err(FaunaError::syntax("only DROP TABLE is supported")),
    };
    let mut if_exists = false;
    if rest.len() >= 2 && rest[0].is_keyword("IF") && rest[1].is_keyword("EXISTS") {
        if_exists = true;
        rest = &rest[2..];
    }
    let table = match rest {
        [n] | [n, _] if n.category == TokenCategory::Identifier => table_name(&n.text),
        _ => return Err(FaunaError::syntax("expected table name after DROP TABLE")),
    };
    if rest.len() == 2 && !rest[1].is_keyword("CASCADE") {
        return Err(FaunaError::syntax(format!(
            "unexpected '{}' after DROP TABLE {}",
            rest[1], table
        )));
    }
    let mut model = QueryModel::new(StatementKind::Drop, table);
    model.if_exists = if_exists;
    Ok(model)
}

// ---------------------------------------------------------------------------
// Clause sections
// ---------------------------------------------------------------------------

struct Sections<'a> {
    /// Tokens before the first clause keyword
    head: &'a [Node],
    named: Vec<(&'static str, &'a [Node])>,
}

impl<'a> Sections<'a> {
    fn get(&self, name: &str) -> Option<&'a [Node]> {
        self.named
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, nodes)| *nodes)
    }
}

/// Split top-level nodes at clause keywords. `GROUP` and `ORDER` must be
/// followed by `BY`, which is consumed.
fn sections<'a>(nodes: &'a [Node], markers: &[&'static str]) -> FaunaResult<Sections<'a>> {
    let mut head_end = nodes.len();
    let mut starts: Vec<(&'static str, usize, usize)> = Vec::new();

    let mut i = 0;
    while i < nodes.len() {
        let marker = markers.iter().find(|m| nodes[i].is_keyword(m));
        if let Some(marker) = marker {
            let mut body = i + 1;
            if matches!(*marker, "GROUP" | "ORDER") {
                if !nodes.get(body).is_some_and(|n| n.is_keyword("BY")) {
                    return Err(FaunaError::syntax(format!("expected BY after {}", marker)));
                }
                body += 1;
            }
            if starts.iter().any(|(m, _, _)| m == marker) {
                return Err(FaunaError::syntax(format!("duplicate {} clause", marker)));
            }
            if starts.is_empty() {
                head_end = i;
            }
            starts.push((*marker, i, body));
            i = body;
        } else {
            i += 1;
        }
    }

    let mut named = Vec::new();
    for (idx, (marker, _, body)) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).map(|(_, s, _)| *s).unwrap_or(nodes.len());
        let section = &nodes[*body..end];
        if section.is_empty() {
            return Err(FaunaError::syntax(format!("empty {} clause", marker)));
        }
        named.push((*marker, section));
    }
    Ok(Sections {
        head: &nodes[..head_end],
        named,
    })
}

fn split_top<'a>(nodes: &'a [Node], is_sep: impl Fn(&Node) -> bool) -> Vec<&'a [Node]> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, node) in nodes.iter().enumerate() {
        if is_sep(node) {
            parts.push(&nodes[start..i]);
            start = i + 1;
        }
    }
    parts.push(&nodes[start..]);
    parts
}

fn split_commas(nodes: &[Node]) -> FaunaResult<Vec<&[Node]>> {
    let parts = split_top(nodes, |n| n.is_punct(","));
    if parts.iter().any(|p| p.is_empty()) {
        return Err(FaunaError::syntax(format!("empty list item in '{}'", render(nodes))));
    }
    Ok(parts)
}

fn render(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tables and columns
// ---------------------------------------------------------------------------

/// Tables in scope plus their aliases.
#[derive(Debug, Clone)]
struct Scope {
    tables: Vec<String>,
    aliases: Vec<(String, String)>,
}

impl Scope {
    fn single(table: &str) -> Self {
        Self {
            tables: vec![table.to_string()],
            aliases: Vec::new(),
        }
    }

    fn add(&mut self, table: String, alias: Option<String>) -> FaunaResult<()> {
        if self.tables.contains(&table) {
            return Err(FaunaError::unsupported(format!(
                "table '{}' appears more than once (self-join)",
                table
            )));
        }
        if let Some(alias) = alias {
            self.aliases.push((alias, table.clone()));
        }
        self.tables.push(table);
        Ok(())
    }

    fn table(&self, qualifier: &str) -> FaunaResult<&str> {
        if let Some((_, table)) = self.aliases.iter().find(|(a, _)| a == qualifier) {
            return Ok(table);
        }
        self.tables
            .iter()
            .find(|t| *t == qualifier)
            .map(String::as_str)
            .ok_or_else(|| FaunaError::syntax(format!("unknown table '{}'", qualifier)))
    }

    fn resolve(&self, ident: &str) -> FaunaResult<ColumnRef> {
        let parts: Vec<&str> = ident.split('.').collect();
        match parts.as_slice() {
            [name] => {
                if self.tables.len() != 1 {
                    return Err(FaunaError::syntax(format!(
                        "ambiguous column '{}' in multi-table query",
                        name
                    )));
                }
                Ok(ColumnRef::new(self.tables[0].clone(), *name))
            }
            [.., qualifier, name] => Ok(ColumnRef::new(self.table(qualifier)?, *name)),
            [] => Err(FaunaError::syntax("empty column reference")),
        }
    }
}

/// `schema.table` keeps the last part.
fn table_name(ident: &str) -> String {
    ident.rsplit('.').next().unwrap_or(ident).to_string()
}

fn resolve_column(node: &Node, scope: &Scope) -> FaunaResult<ColumnRef> {
    if node.category != TokenCategory::Identifier {
        return Err(FaunaError::syntax(format!("expected column, found '{}'", node)));
    }
    scope.resolve(&node.text)
}

fn single_column(nodes: &[Node], scope: &Scope) -> FaunaResult<ColumnRef> {
    match nodes {
        [n] => resolve_column(n, scope),
        _ => Err(FaunaError::syntax(format!("expected column, found '{}'", render(nodes)))),
    }
}

/// `name [AS] [alias]`
fn table_ref(nodes: &[Node]) -> FaunaResult<(String, Option<String>)> {
    match nodes {
        [t] if t.category == TokenCategory::Identifier => Ok((table_name(&t.text), None)),
        [t, a] | [t, _, a]
            if t.category == TokenCategory::Identifier
                && a.category == TokenCategory::Identifier
                && (nodes.len() == 2 || nodes[1].is_keyword("AS")) =>
        {
            Ok((table_name(&t.text), Some(a.text.clone())))
        }
        [g, ..] if g.is_group() => Err(FaunaError::unsupported("subquery in FROM")),
        _ => Err(FaunaError::syntax(format!("malformed table reference '{}'", render(nodes)))),
    }
}

/// Parse the FROM clause. Returns the scope, explicit JOIN specs and the
/// comma-joined tables still waiting for a WHERE equality.
fn parse_from(nodes: &[Node]) -> FaunaResult<(Scope, Vec<JoinSpec>, Vec<String>)> {
    let mut scope = Scope {
        tables: Vec::new(),
        aliases: Vec::new(),
    };
    let mut joins = Vec::new();
    let mut comma_tables = Vec::new();

    // Locate JOIN keywords and commas at top level; each marks a new item.
    let mut i = 0;
    let mut item_start = 0;
    let mut pending: Option<JoinKind> = None;
    let mut first = true;

    let mut flush = |slice: &[Node],
                     kind: Option<JoinKind>,
                     first: &mut bool,
                     scope: &mut Scope|
     -> FaunaResult<()> {
        if slice.is_empty() {
            return Err(FaunaError::syntax("missing table in FROM clause"));
        }
        match kind {
            None => {
                let (table, alias) = table_ref(slice)?;
                if !*first {
                    comma_tables.push(table.clone());
                }
                scope.add(table, alias)?;
            }
            Some(kind) => {
                let on = slice.iter().position(|n| n.is_keyword("ON")).ok_or_else(|| {
                    FaunaError::syntax(format!("JOIN without ON in '{}'", render(slice)))
                })?;
                let (table, alias) = table_ref(&slice[..on])?;
                scope.add(table.clone(), alias)?;
                let condition = parse_predicate(&slice[on + 1..], scope)?;
                joins.push(join_from_condition(kind, &table, condition)?);
            }
        }
        *first = false;
        Ok(())
    };

    while i < nodes.len() {
        let node = &nodes[i];
        if node.is_punct(",") {
            flush(&nodes[item_start..i], pending.take(), &mut first, &mut scope)?;
            i += 1;
            item_start = i;
            continue;
        }
        if let Some((kind, width)) = join_keyword(&nodes[i..])? {
            flush(&nodes[item_start..i], pending.take(), &mut first, &mut scope)?;
            pending = Some(kind);
            i += width;
            item_start = i;
            continue;
        }
        i += 1;
    }
    flush(&nodes[item_start..], pending.take(), &mut first, &mut scope)?;

    Ok((scope, joins, comma_tables))
}

/// Recognize `[INNER] JOIN`, `LEFT|RIGHT|FULL [OUTER] JOIN`, `CROSS JOIN`.
fn join_keyword(nodes: &[Node]) -> FaunaResult<Option<(JoinKind, usize)>> {
    let kw = |i: usize, k: &str| nodes.get(i).is_some_and(|n| n.is_keyword(k));
    if kw(0, "JOIN") {
        return Ok(Some((JoinKind::Inner, 1)));
    }
    if kw(0, "INNER") && kw(1, "JOIN") {
        return Ok(Some((JoinKind::Inner, 2)));
    }
    if kw(0, "CROSS") && kw(1, "JOIN") {
        return Err(FaunaError::unsupported("CROSS JOIN"));
    }
    for (word, kind) in [
        ("LEFT", JoinKind::Left),
        ("RIGHT", JoinKind::Right),
        ("FULL", JoinKind::Full),
    ] {
        if kw(0, word) {
            if kw(1, "JOIN") {
                return Ok(Some((kind, 2)));
            }
            if kw(1, "OUTER") && kw(2, "JOIN") {
                return Ok(Some((kind, 3)));
            }
            return Err(FaunaError::syntax(format!("expected JOIN after {}", word)));
        }
    }
    Ok(None)
}

/// An ON condition must be exactly one column equality, one side on `table`.
fn join_from_condition(kind: JoinKind, table: &str, condition: Predicate) -> FaunaResult<JoinSpec> {
    match condition {
        Predicate::Compare {
            column,
            op: CompareOp::Eq,
            operand: Operand::Column(other),
        } if column.table != other.table => {
            if other.table == table {
                Ok(JoinSpec {
                    kind,
                    left: column,
                    right: other,
                })
            } else if column.table == table {
                Ok(JoinSpec {
                    kind,
                    left: other,
                    right: column,
                })
            } else {
                Err(FaunaError::syntax(format!(
                    "join condition does not reference joined table '{}'",
                    table
                )))
            }
        }
        other => Err(FaunaError::syntax(format!(
            "join condition must be a single column equality, found '{}'",
            other
        ))),
    }
}

/// Move cross-table column equalities out of a WHERE predicate into join
/// specs, connecting every comma-joined table.
fn lift_comma_joins(
    predicate: Predicate,
    joins: &mut Vec<JoinSpec>,
    comma_tables: &[String],
    scope: &Scope,
) -> FaunaResult<Option<Predicate>> {
    let mut remaining = Vec::new();
    let mut equalities = Vec::new();

    let conjuncts = match predicate {
        Predicate::And(items) => items,
        other => vec![other],
    };
    for conjunct in conjuncts {
        match conjunct {
            Predicate::Compare {
                column,
                op,
                operand: Operand::Column(other),
            } if column.table != other.table => {
                if op != CompareOp::Eq {
                    return Err(FaunaError::syntax(format!(
                        "cross-table condition '{} {} {}' is not an equality",
                        column, op, other
                    )));
                }
                equalities.push((column, other));
            }
            nested => {
                if has_cross_table_compare(&nested) {
                    return Err(FaunaError::syntax(format!(
                        "cross-table condition nested under OR/NOT: '{}'",
                        nested
                    )));
                }
                remaining.push(nested);
            }
        }
    }

    let mut in_scope: Vec<String> = scope
        .tables
        .iter()
        .filter(|t| !comma_tables.contains(t))
        .cloned()
        .collect();

    while !equalities.is_empty() {
        let pos = equalities.iter().position(|(a, b)| {
            in_scope.contains(&a.table) != in_scope.contains(&b.table)
        });
        match pos {
            Some(pos) => {
                let (a, b) = equalities.remove(pos);
                let (left, right) = if in_scope.contains(&a.table) { (a, b) } else { (b, a) };
                in_scope.push(right.table.clone());
                joins.push(JoinSpec {
                    kind: JoinKind::Inner,
                    left,
                    right,
                });
            }
            None => break,
        }
    }
    // Equalities between tables already joined stay as filters.
    for (a, b) in equalities {
        if !in_scope.contains(&a.table) || !in_scope.contains(&b.table) {
            return Err(FaunaError::syntax(format!(
                "join condition '{} = {}' is not connected to the base table",
                a, b
            )));
        }
        remaining.push(Predicate::Compare {
            column: a,
            op: CompareOp::Eq,
            operand: Operand::Column(b),
        });
    }
    if let Some(missing) = comma_tables.iter().find(|t| !in_scope.contains(t)) {
        return Err(FaunaError::syntax(format!(
            "table '{}' is not joined by any equality (cross product)",
            missing
        )));
    }

    Ok(match remaining.len() {
        0 => None,
        1 => remaining.pop(),
        _ => Some(Predicate::And(remaining)),
    })
}

fn has_cross_table_compare(predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Compare {
            column,
            operand: Operand::Column(other),
            ..
        } => column.table != other.table,
        Predicate::Compare { .. } => false,
        Predicate::And(items) | Predicate::Or(items) => items.iter().any(has_cross_table_compare),
        Predicate::Not(inner) => has_cross_table_compare(inner),
    }
}

// ---------------------------------------------------------------------------
// SELECT list, ORDER BY, LIMIT
// ---------------------------------------------------------------------------

fn parse_select_list(nodes: &[Node], scope: &Scope) -> FaunaResult<Vec<SelectItem>> {
    if nodes.is_empty() {
        return Err(FaunaError::syntax("empty SELECT list"));
    }
    split_commas(nodes)?
        .into_iter()
        .map(|item| parse_select_item(item, scope))
        .collect()
}

fn parse_select_item(nodes: &[Node], scope: &Scope) -> FaunaResult<SelectItem> {
    let (expr, alias) = split_alias(nodes)?;
    match expr {
        [star] if star.is_operator("*") => Ok(SelectItem::Star { table: None }),
        [ident] if ident.category == TokenCategory::Identifier && ident.text.ends_with(".*") => {
            let qualifier = ident.text.trim_end_matches(".*");
            Ok(SelectItem::Star {
                table: Some(scope.table(table_name(qualifier).as_str())?.to_string()),
            })
        }
        [ident] if ident.category == TokenCategory::Identifier => Ok(SelectItem::Column {
            column: scope.resolve(&ident.text)?,
            alias,
        }),
        [lit] if lit.category == TokenCategory::Literal || lit.is_value_keyword() => {
            Ok(SelectItem::Literal {
                value: extract(lit),
                alias,
            })
        }
        [func, args] if func.category == TokenCategory::Identifier && args.is_group() => {
            let function = func.text.to_ascii_uppercase();
            let argument = match args.children.as_slice() {
                [star] if star.is_operator("*") => None,
                [col] => Some(resolve_column(col, scope)?),
                [distinct, _] if distinct.is_keyword("DISTINCT") => {
                    return Err(FaunaError::unsupported(format!("{}(DISTINCT ...)", function)));
                }
                _ => {
                    return Err(FaunaError::unsupported(format!(
                        "expression argument to {}",
                        function
                    )))
                }
            };
            Ok(SelectItem::Aggregate {
                function,
                argument,
                alias,
            })
        }
        [g] if g.is_group() && g.children.first().is_some_and(|n| n.is_keyword("SELECT")) => {
            Err(FaunaError::unsupported("subquery in SELECT list"))
        }
        _ => Err(FaunaError::unsupported(format!(
            "select expression '{}'",
            render(expr)
        ))),
    }
}

/// Split `expr [AS] alias` into the expression and alias.
fn split_alias(nodes: &[Node]) -> FaunaResult<(&[Node], Option<String>)> {
    let n = nodes.len();
    if n >= 3 && nodes[n - 2].is_keyword("AS") {
        let alias = &nodes[n - 1];
        if alias.category != TokenCategory::Identifier {
            return Err(FaunaError::syntax(format!("invalid alias '{}'", alias)));
        }
        return Ok((&nodes[..n - 2], Some(alias.text.clone())));
    }
    if n == 2
        && nodes[1].category == TokenCategory::Identifier
        && !nodes[1].text.contains('.')
        && !nodes[1].is_group()
        && (nodes[0].category == TokenCategory::Identifier
            || nodes[0].category == TokenCategory::Literal)
    {
        return Ok((&nodes[..1], Some(nodes[1].text.clone())));
    }
    Ok((nodes, None))
}

fn parse_order_by(nodes: &[Node], scope: &Scope) -> FaunaResult<Vec<OrderBy>> {
    let mut out = Vec::new();
    for item in split_commas(nodes)? {
        let (col, order) = match item {
            [col] => (col, SortOrder::Asc),
            [col, dir] if dir.is_keyword("ASC") => (col, SortOrder::Asc),
            [col, dir] if dir.is_keyword("DESC") => (col, SortOrder::Desc),
            _ => {
                return Err(FaunaError::syntax(format!(
                    "malformed ORDER BY item '{}'",
                    render(item)
                )))
            }
        };
        out.push(OrderBy {
            column: resolve_column(col, scope)?,
            order,
        });
    }
    Ok(out)
}

fn parse_count(nodes: &[Node], clause: &str) -> FaunaResult<usize> {
    match nodes {
        [n] if n.category == TokenCategory::Literal => match extract(n) {
            Value::Int(v) if v >= 0 => Ok(v as usize),
            _ => Err(FaunaError::syntax(format!(
                "{} requires a non-negative integer, found '{}'",
                clause, n
            ))),
        },
        _ => Err(FaunaError::syntax(format!(
            "{} requires a non-negative integer, found '{}'",
            clause,
            render(nodes)
        ))),
    }
}

/// A single literal token (or value keyword) extracted to a value.
fn literal(nodes: &[Node]) -> FaunaResult<Value> {
    match nodes {
        [n] if n.category == TokenCategory::Literal || n.is_value_keyword() => Ok(extract(n)),
        _ => Err(FaunaError::syntax(format!(
            "expected literal value, found '{}'",
            render(nodes)
        ))),
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Build a predicate tree bottom-up.
///
/// Splits at the loosest top-level connective (OR, then AND), recursing into
/// each part; a leading NOT or a lone parenthesised group recurses into its
/// operand; anything else is a leaf comparison.
fn parse_predicate(nodes: &[Node], scope: &Scope) -> FaunaResult<Predicate> {
    if nodes.is_empty() {
        return Err(FaunaError::syntax("empty condition"));
    }

    for (connective, is_or) in [("OR", true), ("AND", false)] {
        let parts = split_top(nodes, |n| n.is_keyword(connective));
        if parts.len() > 1 {
            let mut acc = Vec::with_capacity(parts.len());
            for part in parts {
                acc.push(parse_predicate(part, scope)?);
            }
            return Ok(if is_or {
                Predicate::Or(acc)
            } else {
                Predicate::And(acc)
            });
        }
    }

    match nodes {
        [not, rest @ ..] if not.is_keyword("NOT") => {
            Ok(Predicate::Not(Box::new(parse_predicate(rest, scope)?)))
        }
        [exists, ..] if exists.is_keyword("EXISTS") => Err(FaunaError::unsupported("EXISTS subquery")),
        [group] if group.is_group() => {
            if group.children.first().is_some_and(|n| n.is_keyword("SELECT")) {
                return Err(FaunaError::unsupported("subquery used as a condition"));
            }
            parse_predicate(&group.children, scope)
        }
        _ => parse_comparison(nodes, scope),
    }
}

fn parse_comparison(nodes: &[Node], scope: &Scope) -> FaunaResult<Predicate> {
    let (col_node, rest) = match nodes {
        [col, rest @ ..] => (col, rest),
        [] => return Err(FaunaError::syntax("empty condition")),
    };
    if col_node.category == TokenCategory::Identifier && rest.first().is_some_and(|n| n.is_group()) {
        return Err(FaunaError::unsupported(format!(
            "function call '{}' in condition",
            col_node.text
        )));
    }
    let column = resolve_column(col_node, scope)?;

    match rest {
        [is, null] if is.is_keyword("IS") && null.is_value_keyword() => {
            Ok(Predicate::compare(column, CompareOp::Eq, literal(std::slice::from_ref(null))?))
        }
        [is, not, null] if is.is_keyword("IS") && not.is_keyword("NOT") && null.is_value_keyword() => {
            Ok(Predicate::compare(column, CompareOp::Ne, literal(std::slice::from_ref(null))?))
        }
        [in_kw, list] if in_kw.is_keyword("IN") && list.is_group() => in_list(column, list),
        [not, in_kw, list] if not.is_keyword("NOT") && in_kw.is_keyword("IN") && list.is_group() => {
            Ok(Predicate::Not(Box::new(in_list(column, list)?)))
        }
        [like, pattern] if like.is_keyword("LIKE") => Ok(Predicate::compare(
            column,
            CompareOp::Like,
            literal(std::slice::from_ref(pattern))?,
        )),
        [not, like, pattern] if not.is_keyword("NOT") && like.is_keyword("LIKE") => {
            Ok(Predicate::Not(Box::new(Predicate::compare(
                column,
                CompareOp::Like,
                literal(std::slice::from_ref(pattern))?,
            ))))
        }
        [op, rhs] if op.category == TokenCategory::Operator => {
            let op = CompareOp::from_symbol(&op.text).ok_or_else(|| {
                FaunaError::syntax(format!("unknown comparison operator '{}'", op.text))
            })?;
            let operand = match rhs {
                n if n.category == TokenCategory::Identifier => Operand::Column(scope.resolve(&n.text)?),
                n if n.is_group() && n.children.first().is_some_and(|c| c.is_keyword("SELECT")) => {
                    Operand::Subquery(render(&n.children))
                }
                n => Operand::Value(literal(std::slice::from_ref(n))?),
            };
            Ok(Predicate::Compare {
                column,
                op,
                operand,
            })
        }
        _ => Err(FaunaError::syntax(format!(
            "malformed condition '{}'",
            render(nodes)
        ))),
    }
}

/// `col IN (a, b, c)` becomes a disjunction of equalities.
fn in_list(column: ColumnRef, list: &Node) -> FaunaResult<Predicate> {
    if list.children.first().is_some_and(|n| n.is_keyword("SELECT")) {
        return Ok(Predicate::Compare {
            column,
            op: CompareOp::Eq,
            operand: Operand::Subquery(render(&list.children)),
        });
    }
    if list.children.is_empty() {
        return Err(FaunaError::syntax(format!("empty IN list for {}", column)));
    }
    let mut items: Vec<Predicate> = split_commas(&list.children)?
        .into_iter()
        .map(|item| Ok(Predicate::compare(column.clone(), CompareOp::Eq, literal(item)?)))
        .collect::<FaunaResult<_>>()?;
    Ok(if items.len() == 1 {
        items.remove(0)
    } else {
        Predicate::Or(items)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn col(t: &str, c: &str) -> ColumnRef {
        ColumnRef::new(t, c)
    }

    #[test]
    fn test_simple_select() {
        let model = parse("SELECT users.id, users.name FROM users").unwrap();
        assert_eq!(model.kind, StatementKind::Select);
        assert_eq!(model.tables, vec!["users".to_string()]);
        assert_eq!(
            model.columns,
            vec![
                SelectItem::Column { column: col("users", "id"), alias: None },
                SelectItem::Column { column: col("users", "name"), alias: None },
            ]
        );
        assert!(model.predicate.is_none());
    }

    #[test]
    fn test_django_style_quoting() {
        let model = parse(
            r#"SELECT "users"."id", "users"."name" FROM "users" WHERE "users"."age" >= 21 ORDER BY "users"."name" DESC LIMIT 5"#,
        )
        .unwrap();
        assert_eq!(
            model.predicate,
            Some(Predicate::compare(col("users", "age"), CompareOp::Gte, Value::Int(21)))
        );
        assert_eq!(
            model.order_by,
            vec![OrderBy { column: col("users", "name"), order: SortOrder::Desc }]
        );
        assert_eq!(model.limit, Some(5));
    }

    #[test]
    fn test_unqualified_columns_resolve_to_single_table() {
        let model = parse("SELECT name FROM users WHERE age < 3").unwrap();
        assert_eq!(
            model.columns,
            vec![SelectItem::Column { column: col("users", "name"), alias: None }]
        );
    }

    #[test]
    fn test_where_and_or_tree() {
        let model =
            parse("SELECT id FROM users WHERE name = 'Bob' AND (age > 30 OR age IS NULL)").unwrap();
        assert_eq!(
            model.predicate,
            Some(Predicate::And(vec![
                Predicate::compare(col("users", "name"), CompareOp::Eq, Value::String("Bob".into())),
                Predicate::Or(vec![
                    Predicate::compare(col("users", "age"), CompareOp::Gt, Value::Int(30)),
                    Predicate::compare(col("users", "age"), CompareOp::Eq, Value::Null),
                ]),
            ]))
        );
    }

    #[test]
    fn test_not_and_in() {
        let model = parse("SELECT id FROM users WHERE NOT id IN (1, 2) AND name <> 'x'").unwrap();
        assert_eq!(
            model.predicate,
            Some(Predicate::And(vec![
                Predicate::Not(Box::new(Predicate::Or(vec![
                    Predicate::compare(col("users", "id"), CompareOp::Eq, Value::Int(1)),
                    Predicate::compare(col("users", "id"), CompareOp::Eq, Value::Int(2)),
                ]))),
                Predicate::compare(col("users", "name"), CompareOp::Ne, Value::String("x".into())),
            ]))
        );
    }

    #[test]
    fn test_explicit_join() {
        let model = parse(
            "SELECT users.name, orders.total FROM users INNER JOIN orders ON (users.id = orders.user_id)",
        )
        .unwrap();
        assert_eq!(model.tables, vec!["users".to_string(), "orders".to_string()]);
        assert_eq!(
            model.joins,
            vec![JoinSpec {
                kind: JoinKind::Inner,
                left: col("users", "id"),
                right: col("orders", "user_id"),
            }]
        );
    }

    #[test]
    fn test_left_outer_join_orientation() {
        let model = parse(
            "SELECT a.x FROM a LEFT OUTER JOIN b ON b.a_id = a.id",
        )
        .unwrap();
        assert_eq!(model.joins[0].kind, JoinKind::Left);
        assert_eq!(model.joins[0].left, col("a", "id"));
        assert_eq!(model.joins[0].right, col("b", "a_id"));
    }

    #[test]
    fn test_comma_join_lifted_from_where() {
        let model = parse(
            "SELECT users.name, orders.total FROM users, orders WHERE orders.user_id = users.id AND orders.total > 5",
        )
        .unwrap();
        assert_eq!(
            model.joins,
            vec![JoinSpec {
                kind: JoinKind::Inner,
                left: col("users", "id"),
                right: col("orders", "user_id"),
            }]
        );
        assert_eq!(
            model.predicate,
            Some(Predicate::compare(col("orders", "total"), CompareOp::Gt, Value::Int(5)))
        );
    }

    #[test]
    fn test_non_equality_join_rejected() {
        let err = parse("SELECT a.x FROM a JOIN b ON a.id < b.a_id").unwrap_err();
        assert!(err.is_syntax());
        let err = parse("SELECT a.x FROM a, b WHERE a.id > b.a_id").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_cross_product_rejected() {
        let err = parse("SELECT a.x FROM a, b").unwrap_err();
        assert!(err.is_syntax());
        let err = parse("SELECT a.x FROM a, b WHERE a.x = 1").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_ambiguous_column_rejected() {
        let err = parse("SELECT name FROM a JOIN b ON a.id = b.a_id").unwrap_err();
        assert!(err.is_syntax());
        let err = parse("SELECT c.name FROM a").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_aliases() {
        let model = parse("SELECT u.name AS n FROM users u WHERE u.id = 3").unwrap();
        assert_eq!(
            model.columns,
            vec![SelectItem::Column { column: col("users", "name"), alias: Some("n".into()) }]
        );
    }

    #[test]
    fn test_count_star() {
        let model = parse(r#"SELECT COUNT(*) AS "__count" FROM "users""#).unwrap();
        assert_eq!(
            model.columns,
            vec![SelectItem::Aggregate {
                function: "COUNT".into(),
                argument: None,
                alias: Some("__count".into()),
            }]
        );
    }

    #[test]
    fn test_insert() {
        let model =
            parse("INSERT INTO users (name, age, finger_count) VALUES ('Bob', 30, 10)").unwrap();
        assert_eq!(model.kind, StatementKind::Insert);
        assert_eq!(
            model.rows,
            vec![vec![
                Assignment { column: col("users", "name"), value: Value::String("Bob".into()) },
                Assignment { column: col("users", "age"), value: Value::Int(30) },
                Assignment { column: col("users", "finger_count"), value: Value::Int(10) },
            ]]
        );
    }

    #[test]
    fn test_insert_multiple_rows() {
        let model = parse("INSERT INTO t (a) VALUES (1), (2), (NONE)").unwrap();
        assert_eq!(model.rows.len(), 3);
        assert_eq!(model.rows[2][0].value, Value::Null);
    }

    #[test]
    fn test_insert_arity_mismatch() {
        let err = parse("INSERT INTO users (name, age) VALUES ('Bob')").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_update() {
        let model = parse("UPDATE users SET users.name = 'Bob', age = 4 WHERE users.id = 7").unwrap();
        assert_eq!(model.kind, StatementKind::Update);
        assert_eq!(model.rows[0].len(), 2);
        assert_eq!(model.rows[0][1].column, col("users", "age"));
        assert!(model.predicate.is_some());
    }

    #[test]
    fn test_delete_with_and_without_where() {
        let all = parse("DELETE FROM users").unwrap();
        assert_eq!(all.kind, StatementKind::Delete);
        assert!(all.predicate.is_none());

        let some = parse("DELETE FROM users WHERE users.name = 'Bob'").unwrap();
        assert!(some.predicate.is_some());
    }

    #[test]
    fn test_drop() {
        let model = parse("DROP TABLE users").unwrap();
        assert_eq!(model.kind, StatementKind::Drop);
        assert_eq!(model.base_table(), "users");

        let model = parse("DROP TABLE IF EXISTS \"users\" CASCADE;").unwrap();
        assert!(model.if_exists);
    }

    #[test]
    fn test_unrecognized_statement() {
        assert!(parse("MERGE INTO users").unwrap_err().is_syntax());
        assert!(parse("CREATE TABLE users (id int)").unwrap_err().is_syntax());
        assert!(parse("").unwrap_err().is_syntax());
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(parse("SELECT a FROM t WHERE a IN (SELECT b FROM u)").is_ok());
        assert!(parse("SELECT a FROM t WHERE EXISTS (SELECT 1 FROM u)").unwrap_err().is_unsupported());
        assert!(parse("SELECT a FROM t UNION SELECT a FROM u").unwrap_err().is_unsupported());
        assert!(parse("SELECT a FROM t WHERE UPPER(a) = 'X'").unwrap_err().is_unsupported());
    }

    #[test]
    fn test_unbound_placeholder() {
        assert!(parse("SELECT a FROM t WHERE a = %s").unwrap_err().is_syntax());
    }
}
