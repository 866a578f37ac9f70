use serde::{Deserialize, Serialize};

use crate::ast::{CompareOp, JoinKind, SortOrder, StatementKind, Value};

/// A column qualified by its table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub name: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
        }
    }

    /// `id` is the document reference id rather than a data field.
    pub fn is_ref_id(&self) -> bool {
        self.name == "id"
    }

    /// `table.name`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}

/// One entry of a SELECT list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    /// `*` or `table.*`
    Star { table: Option<String> },
    /// `FUNC(arg)`; the argument is `None` for `*`.
    Aggregate {
        function: String,
        argument: Option<ColumnRef>,
        alias: Option<String>,
    },
    /// A constant, e.g. `SELECT 1 AS a` for existence checks
    Literal { value: Value, alias: Option<String> },
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Value(Value),
    /// Another column
    Column(ColumnRef),
    /// Nested SELECT, kept as text
    Subquery(String),
}

/// Recursive AND/OR structure of column comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Compare {
        column: ColumnRef,
        op: CompareOp,
        operand: Operand,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(column: ColumnRef, op: CompareOp, value: Value) -> Self {
        Predicate::Compare {
            column,
            op,
            operand: Operand::Value(value),
        }
    }

    /// Tables referenced anywhere in the tree, in first-seen order.
    pub fn tables(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.collect_tables(&mut out);
        out
    }

    fn collect_tables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare {
                column, operand, ..
            } => {
                if !out.contains(&column.table.as_str()) {
                    out.push(&column.table);
                }
                if let Operand::Column(other) = operand {
                    if !out.contains(&other.table.as_str()) {
                        out.push(&other.table);
                    }
                }
            }
            Predicate::And(items) | Predicate::Or(items) => {
                for item in items {
                    item.collect_tables(out);
                }
            }
            Predicate::Not(inner) => inner.collect_tables(out),
        }
    }

    /// Conjunct leaves at the top level (the whole tree if it is not an AND).
    pub fn conjuncts(&self) -> Vec<&Predicate> {
        match self {
            Predicate::And(items) => items.iter().flat_map(|p| p.conjuncts()).collect(),
            other => vec![other],
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Compare {
                column,
                op,
                operand,
            } => match operand {
                Operand::Value(v) => write!(f, "{} {} {}", column, op, v),
                Operand::Column(c) => write!(f, "{} {} {}", column, op, c),
                Operand::Subquery(sql) => write!(f, "{} {} ({})", column, op, sql),
            },
            Predicate::And(items) | Predicate::Or(items) => {
                let joiner = if matches!(self, Predicate::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                let parts: Vec<String> = items.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", parts.join(joiner))
            }
            Predicate::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}

/// An equi-join between two tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub kind: JoinKind,
    /// Column on a table already in scope
    pub left: ColumnRef,
    /// Column on the table being joined in
    pub right: ColumnRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub order: SortOrder,
}

/// A column/value pair of an INSERT row or UPDATE SET list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Value,
}

/// Normalized form of one SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryModel {
    pub kind: StatementKind,
    /// Target tables; the first is the base table
    pub tables: Vec<String>,
    /// SELECT list
    #[serde(default)]
    pub columns: Vec<SelectItem>,
    #[serde(default)]
    pub predicate: Option<Predicate>,
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub distinct: bool,
    /// GROUP BY columns; recorded so translation can reject them
    #[serde(default)]
    pub group_by: Vec<ColumnRef>,
    /// INSERT rows, or the single SET list of an UPDATE
    #[serde(default)]
    pub rows: Vec<Vec<Assignment>>,
    /// DROP TABLE IF EXISTS
    #[serde(default)]
    pub if_exists: bool,
}

impl QueryModel {
    pub fn new(kind: StatementKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            tables: vec![table.into()],
            columns: Vec::new(),
            predicate: None,
            joins: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            group_by: Vec::new(),
            rows: Vec::new(),
            if_exists: false,
        }
    }

    /// The driving table.
    pub fn base_table(&self) -> &str {
        self.tables.first().map(String::as_str).unwrap_or_default()
    }
}
