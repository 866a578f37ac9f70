//! FQL expression tree.
//!
//! [`Expr`] mirrors the functional query language of the store. It renders to
//! the JSON wire format with [`Expr::to_wire`] and to readable FQL with
//! `Display`.

use serde_json::{json, Map, Value as Json};

/// Ordering comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Cmp {
    fn wire_name(self) -> &'static str {
        match self {
            Cmp::Lt => "lt",
            Cmp::Lte => "lte",
            Cmp::Gt => "gt",
            Cmp::Gte => "gte",
        }
    }

    fn fql_name(self) -> &'static str {
        match self {
            Cmp::Lt => "LT",
            Cmp::Lte => "LTE",
            Cmp::Gt => "GT",
            Cmp::Gte => "GTE",
        }
    }
}

/// String predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrTest {
    Contains,
    StartsWith,
    EndsWith,
}

impl StrTest {
    fn wire_name(self) -> &'static str {
        match self {
            StrTest::Contains => "containsstr",
            StrTest::StartsWith => "startswith",
            StrTest::EndsWith => "endswith",
        }
    }

    fn fql_name(self) -> &'static str {
        match self {
            StrTest::Contains => "ContainsStr",
            StrTest::StartsWith => "StartsWith",
            StrTest::EndsWith => "EndsWith",
        }
    }
}

/// A query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// RFC 3339 timestamp
    Time(String),
    Array(Vec<Expr>),
    /// Object literal; key order is kept
    Object(Vec<(String, Expr)>),

    Collection(String),
    Index(String),
    /// Set of all index refs
    Indexes,
    /// Set of every document ref in a collection
    Documents(Box<Expr>),
    /// `Ref(collection, id)`
    Ref(Box<Expr>, Box<Expr>),
    /// `Match(index, terms)`
    Match(Box<Expr>, Box<Expr>),
    /// Refs present in any of the sets
    Union(Vec<Expr>),
    Paginate {
        set: Box<Expr>,
        size: usize,
    },

    Lambda(Vec<String>, Box<Expr>),
    Var(String),
    Let(Vec<(String, Expr)>, Box<Expr>),
    /// `Map(collection, lambda)`
    Map(Box<Expr>, Box<Expr>),
    Filter(Box<Expr>, Box<Expr>),
    Foreach(Box<Expr>, Box<Expr>),
    Reduce {
        lambda: Box<Expr>,
        initial: Box<Expr>,
        collection: Box<Expr>,
    },

    Get(Box<Expr>),
    Select {
        path: Vec<String>,
        from: Box<Expr>,
        default: Option<Box<Expr>>,
    },
    /// `Create(collection_or_ref, params)`
    Create(Box<Expr>, Box<Expr>),
    Update(Box<Expr>, Box<Expr>),
    Delete(Box<Expr>),
    Do(Vec<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Exists(Box<Expr>),
    IsEmpty(Box<Expr>),

    Equals(Box<Expr>, Box<Expr>),
    Compare(Cmp, Box<Expr>, Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Str(StrTest, Box<Expr>, Box<Expr>),
    ToString(Box<Expr>),
    ToInteger(Box<Expr>),

    /// `Merge(object, with)`; null values in `with` remove keys
    Merge(Box<Expr>, Box<Expr>),
    /// `Append(elements, base)`, i.e. `base ++ elements`
    Append(Box<Expr>, Box<Expr>),
    Take(usize, Box<Expr>),
    Drop(usize, Box<Expr>),
    Count(Box<Expr>),
    Distinct(Box<Expr>),
}

impl Expr {
    pub fn string(s: impl Into<String>) -> Expr {
        Expr::String(s.into())
    }

    pub fn collection(name: impl Into<String>) -> Expr {
        Expr::Collection(name.into())
    }

    pub fn index(name: impl Into<String>) -> Expr {
        Expr::Index(name.into())
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn lambda(param: &str, body: Expr) -> Expr {
        Expr::Lambda(vec![param.to_string()], Box::new(body))
    }

    pub fn lambda2(a: &str, b: &str, body: Expr) -> Expr {
        Expr::Lambda(vec![a.to_string(), b.to_string()], Box::new(body))
    }

    pub fn get(e: Expr) -> Expr {
        Expr::Get(Box::new(e))
    }

    /// `Select(path, from)` failing when the path is missing.
    pub fn select(path: &[&str], from: Expr) -> Expr {
        Expr::Select {
            path: path.iter().map(|s| s.to_string()).collect(),
            from: Box::new(from),
            default: None,
        }
    }

    /// `Select(path, from, null)`
    pub fn select_or_null(path: &[&str], from: Expr) -> Expr {
        Expr::Select {
            path: path.iter().map(|s| s.to_string()).collect(),
            from: Box::new(from),
            default: Some(Box::new(Expr::Null)),
        }
    }

    pub fn map(collection: Expr, lambda: Expr) -> Expr {
        Expr::Map(Box::new(collection), Box::new(lambda))
    }

    pub fn filter(collection: Expr, lambda: Expr) -> Expr {
        Expr::Filter(Box::new(collection), Box::new(lambda))
    }

    pub fn foreach(collection: Expr, lambda: Expr) -> Expr {
        Expr::Foreach(Box::new(collection), Box::new(lambda))
    }

    pub fn equals(a: Expr, b: Expr) -> Expr {
        Expr::Equals(Box::new(a), Box::new(b))
    }

    pub fn not(e: Expr) -> Expr {
        Expr::Not(Box::new(e))
    }

    pub fn merge(a: Expr, b: Expr) -> Expr {
        Expr::Merge(Box::new(a), Box::new(b))
    }

    pub fn if_(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
        Expr::If(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Expr)>) -> Expr {
        Expr::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Render to the JSON wire format.
    pub fn to_wire(&self) -> Json {
        match self {
            Expr::Null => Json::Null,
            Expr::Bool(b) => json!(b),
            Expr::Int(n) => json!(n),
            Expr::Float(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Expr::String(s) => json!(s),
            Expr::Time(t) => json!({ "time": t }),
            Expr::Array(items) => Json::Array(items.iter().map(Expr::to_wire).collect()),
            Expr::Object(fields) => {
                let mut map = Map::new();
                for (k, v) in fields {
                    map.insert(k.clone(), v.to_wire());
                }
                json!({ "object": map })
            }

            Expr::Collection(name) => json!({ "collection": name }),
            Expr::Index(name) => json!({ "index": name }),
            Expr::Indexes => json!({ "indexes": null }),
            Expr::Documents(c) => json!({ "documents": c.to_wire() }),
            Expr::Ref(c, id) => json!({ "ref": c.to_wire(), "id": id.to_wire() }),
            Expr::Match(index, terms) => json!({ "match": index.to_wire(), "terms": terms.to_wire() }),
            Expr::Union(sets) => json!({ "union": sets.iter().map(Expr::to_wire).collect::<Vec<_>>() }),
            Expr::Paginate { set, size } => json!({ "paginate": set.to_wire(), "size": size }),

            Expr::Lambda(params, body) => {
                let params = if params.len() == 1 {
                    json!(params[0])
                } else {
                    json!(params)
                };
                json!({ "lambda": params, "expr": body.to_wire() })
            }
            Expr::Var(name) => json!({ "var": name }),
            Expr::Let(bindings, body) => {
                let bindings: Vec<Json> = bindings
                    .iter()
                    .map(|(name, value)| {
                        let mut m = Map::new();
                        m.insert(name.clone(), value.to_wire());
                        Json::Object(m)
                    })
                    .collect();
                json!({ "let": bindings, "in": body.to_wire() })
            }
            Expr::Map(c, f) => json!({ "map": f.to_wire(), "collection": c.to_wire() }),
            Expr::Filter(c, f) => json!({ "filter": f.to_wire(), "collection": c.to_wire() }),
            Expr::Foreach(c, f) => json!({ "foreach": f.to_wire(), "collection": c.to_wire() }),
            Expr::Reduce {
                lambda,
                initial,
                collection,
            } => json!({
                "reduce": lambda.to_wire(),
                "initial": initial.to_wire(),
                "collection": collection.to_wire(),
            }),

            Expr::Get(e) => json!({ "get": e.to_wire() }),
            Expr::Select {
                path,
                from,
                default,
            } => {
                let mut m = Map::new();
                m.insert("select".into(), json!(path));
                m.insert("from".into(), from.to_wire());
                if let Some(d) = default {
                    m.insert("default".into(), d.to_wire());
                }
                Json::Object(m)
            }
            Expr::Create(target, params) => {
                json!({ "create": target.to_wire(), "params": params.to_wire() })
            }
            Expr::Update(target, params) => {
                json!({ "update": target.to_wire(), "params": params.to_wire() })
            }
            Expr::Delete(e) => json!({ "delete": e.to_wire() }),
            Expr::Do(items) => json!({ "do": items.iter().map(Expr::to_wire).collect::<Vec<_>>() }),
            Expr::If(c, t, e) => json!({ "if": c.to_wire(), "then": t.to_wire(), "else": e.to_wire() }),
            Expr::Exists(e) => json!({ "exists": e.to_wire() }),
            Expr::IsEmpty(e) => json!({ "is_empty": e.to_wire() }),

            Expr::Equals(a, b) => json!({ "equals": [a.to_wire(), b.to_wire()] }),
            Expr::Compare(op, a, b) => {
                let mut m = Map::new();
                m.insert(op.wire_name().into(), json!([a.to_wire(), b.to_wire()]));
                Json::Object(m)
            }
            Expr::And(items) => json!({ "and": items.iter().map(Expr::to_wire).collect::<Vec<_>>() }),
            Expr::Or(items) => json!({ "or": items.iter().map(Expr::to_wire).collect::<Vec<_>>() }),
            Expr::Not(e) => json!({ "not": e.to_wire() }),
            Expr::Str(test, value, search) => {
                let mut m = Map::new();
                m.insert(test.wire_name().into(), value.to_wire());
                m.insert("search".into(), search.to_wire());
                Json::Object(m)
            }
            Expr::ToString(e) => json!({ "to_string": e.to_wire() }),
            Expr::ToInteger(e) => json!({ "to_integer": e.to_wire() }),

            Expr::Merge(a, b) => json!({ "merge": a.to_wire(), "with": b.to_wire() }),
            Expr::Append(elems, base) => {
                json!({ "append": elems.to_wire(), "collection": base.to_wire() })
            }
            Expr::Take(n, c) => json!({ "take": n, "collection": c.to_wire() }),
            Expr::Drop(n, c) => json!({ "drop": n, "collection": c.to_wire() }),
            Expr::Count(c) => json!({ "count": c.to_wire() }),
            Expr::Distinct(c) => json!({ "distinct": c.to_wire() }),
        }
    }
}

fn list(f: &mut std::fmt::Formatter<'_>, items: &[Expr]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Null => write!(f, "null"),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Float(n) => write!(f, "{:?}", n),
            Expr::String(s) => write!(f, "{:?}", s),
            Expr::Time(t) => write!(f, "Time({:?})", t),
            Expr::Array(items) => {
                write!(f, "[")?;
                list(f, items)?;
                write!(f, "]")
            }
            Expr::Object(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Expr::Collection(name) => write!(f, "Collection({:?})", name),
            Expr::Index(name) => write!(f, "Index({:?})", name),
            Expr::Indexes => write!(f, "Indexes()"),
            Expr::Documents(c) => write!(f, "Documents({})", c),
            Expr::Ref(c, id) => write!(f, "Ref({}, {})", c, id),
            Expr::Match(i, t) => write!(f, "Match({}, {})", i, t),
            Expr::Union(sets) => {
                write!(f, "Union(")?;
                list(f, sets)?;
                write!(f, ")")
            }
            Expr::Paginate { set, size } => write!(f, "Paginate({}, {{size: {}}})", set, size),
            Expr::Lambda(params, body) => {
                if params.len() == 1 {
                    write!(f, "Lambda({:?}, {})", params[0], body)
                } else {
                    write!(f, "Lambda({:?}, {})", params, body)
                }
            }
            Expr::Var(name) => write!(f, "Var({:?})", name),
            Expr::Let(bindings, body) => {
                write!(f, "Let({{")?;
                for (i, (k, v)) in bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}, {})", body)
            }
            Expr::Map(c, l) => write!(f, "Map({}, {})", c, l),
            Expr::Filter(c, l) => write!(f, "Filter({}, {})", c, l),
            Expr::Foreach(c, l) => write!(f, "Foreach({}, {})", c, l),
            Expr::Reduce {
                lambda,
                initial,
                collection,
            } => write!(f, "Reduce({}, {}, {})", lambda, initial, collection),
            Expr::Get(e) => write!(f, "Get({})", e),
            Expr::Select {
                path,
                from,
                default,
            } => {
                write!(f, "Select({:?}, {}", path, from)?;
                if let Some(d) = default {
                    write!(f, ", {}", d)?;
                }
                write!(f, ")")
            }
            Expr::Create(t, p) => write!(f, "Create({}, {})", t, p),
            Expr::Update(t, p) => write!(f, "Update({}, {})", t, p),
            Expr::Delete(e) => write!(f, "Delete({})", e),
            Expr::Do(items) => {
                write!(f, "Do(")?;
                list(f, items)?;
                write!(f, ")")
            }
            Expr::If(c, t, e) => write!(f, "If({}, {}, {})", c, t, e),
            Expr::Exists(e) => write!(f, "Exists({})", e),
            Expr::IsEmpty(e) => write!(f, "IsEmpty({})", e),
            Expr::Equals(a, b) => write!(f, "Equals({}, {})", a, b),
            Expr::Compare(op, a, b) => write!(f, "{}({}, {})", op.fql_name(), a, b),
            Expr::And(items) => {
                write!(f, "And(")?;
                list(f, items)?;
                write!(f, ")")
            }
            Expr::Or(items) => {
                write!(f, "Or(")?;
                list(f, items)?;
                write!(f, ")")
            }
            Expr::Not(e) => write!(f, "Not({})", e),
            Expr::Str(test, v, s) => write!(f, "{}({}, {})", test.fql_name(), v, s),
            Expr::ToString(e) => write!(f, "ToString({})", e),
            Expr::ToInteger(e) => write!(f, "ToInteger({})", e),
            Expr::Merge(a, b) => write!(f, "Merge({}, {})", a, b),
            Expr::Append(e, b) => write!(f, "Append({}, {})", e, b),
            Expr::Take(n, c) => write!(f, "Take({}, {})", n, c),
            Expr::Drop(n, c) => write!(f, "Drop({}, {})", n, c),
            Expr::Count(c) => write!(f, "Count({})", c),
            Expr::Distinct(c) => write!(f, "Distinct({})", c),
        }
    }
}
