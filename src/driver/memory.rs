//! In-memory transport.
//!
//! Evaluates [`Expr`] trees against a local document store with the same
//! semantics the remote store applies: collections of documents addressed by
//! ref, single-term indexes, sets, pagination, lambdas and writes. Each query
//! runs against a copy of the store that replaces it only on success.
//!
//! Collections are created on first write. An index named
//! `<collection>_by_<column>` resolves implicitly for any existing
//! collection.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value as Json};

use crate::driver::transport::Transport;
use crate::error::{FaunaError, FaunaResult};
use crate::transpiler::{Cmp, Expr, StrTest};

#[derive(Debug, Clone, PartialEq)]
enum Data {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Time(DateTime<Utc>),
    Array(Vec<Data>),
    Object(BTreeMap<String, Data>),
    Ref { collection: String, id: u64 },
    Collection(String),
    Index(String),
    Set(Vec<Data>),
}

impl Data {
    fn type_name(&self) -> &'static str {
        match self {
            Data::Null => "null",
            Data::Bool(_) => "boolean",
            Data::Int(_) => "integer",
            Data::Float(_) => "double",
            Data::String(_) => "string",
            Data::Time(_) => "time",
            Data::Array(_) => "array",
            Data::Object(_) => "object",
            Data::Ref { .. } => "document ref",
            Data::Collection(_) => "collection ref",
            Data::Index(_) => "index ref",
            Data::Set(_) => "set",
        }
    }

    fn to_wire(&self) -> Json {
        match self {
            Data::Null => Json::Null,
            Data::Bool(b) => json!(b),
            Data::Int(n) => json!(n),
            Data::Float(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Data::String(s) => json!(s),
            Data::Time(t) => json!({ "@ts": t.to_rfc3339_opts(SecondsFormat::AutoSi, true) }),
            Data::Array(items) => Json::Array(items.iter().map(Data::to_wire).collect()),
            Data::Object(map) => {
                let fields: Map<String, Json> =
                    map.iter().map(|(k, v)| (k.clone(), v.to_wire())).collect();
                if map.keys().any(|k| k.starts_with('@')) {
                    json!({ "@obj": fields })
                } else {
                    Json::Object(fields)
                }
            }
            Data::Ref { collection, id } => json!({
                "@ref": { "id": id.to_string(), "collection": schema_ref(collection, "collections") }
            }),
            Data::Collection(name) => schema_ref(name, "collections"),
            Data::Index(name) => schema_ref(name, "indexes"),
            Data::Set(items) => json!({ "@set": items.iter().map(Data::to_wire).collect::<Vec<_>>() }),
        }
    }
}

fn schema_ref(name: &str, class: &str) -> Json {
    json!({ "@ref": { "id": name, "collection": { "@ref": { "id": class } } } })
}

#[derive(Debug, Clone)]
struct Document {
    ts: i64,
    data: BTreeMap<String, Data>,
}

#[derive(Debug, Clone, Default)]
struct CollectionData {
    docs: BTreeMap<u64, Document>,
    next_id: u64,
}

#[derive(Debug, Clone)]
struct IndexDef {
    source: String,
    field: String,
}

#[derive(Debug, Clone, Default)]
struct Store {
    collections: BTreeMap<String, CollectionData>,
    indexes: BTreeMap<String, IndexDef>,
    clock: i64,
}

/// Transport backed by an in-process store.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    store: Mutex<Store>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection; existing collections are kept.
    pub fn create_collection(&self, name: &str) -> FaunaResult<()> {
        self.with_store(|store| {
            store.collections.entry(name.to_string()).or_default();
        })
    }

    /// Register a single-term index over `data.<column>`.
    pub fn create_index(&self, name: &str, collection: &str, column: &str) -> FaunaResult<()> {
        self.with_store(|store| {
            store.collections.entry(collection.to_string()).or_default();
            store.indexes.insert(
                name.to_string(),
                IndexDef {
                    source: collection.to_string(),
                    field: column.to_string(),
                },
            );
        })
    }

    pub fn collection_names(&self) -> FaunaResult<Vec<String>> {
        self.with_store(|store| store.collections.keys().cloned().collect())
    }

    pub fn index_names(&self) -> FaunaResult<Vec<String>> {
        self.with_store(|store| store.indexes.keys().cloned().collect())
    }

    /// Number of documents in `collection`, `None` if it does not exist.
    pub fn document_count(&self, collection: &str) -> FaunaResult<Option<usize>> {
        self.with_store(|store| store.collections.get(collection).map(|c| c.docs.len()))
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> FaunaResult<T> {
        let mut guard = self
            .store
            .lock()
            .map_err(|_| FaunaError::Connection("memory store lock poisoned".to_string()))?;
        Ok(f(&mut guard))
    }

    /// Evaluate an expression synchronously.
    pub fn evaluate(&self, expr: &Expr) -> FaunaResult<Json> {
        let mut guard = self
            .store
            .lock()
            .map_err(|_| FaunaError::Connection("memory store lock poisoned".to_string()))?;
        let mut working = guard.clone();
        let result = Evaluator {
            store: &mut working,
            scopes: Vec::new(),
        }
        .eval(expr)?;
        *guard = working;
        Ok(result.to_wire())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn query(&self, expr: &Expr) -> FaunaResult<Json> {
        let result = self.evaluate(expr);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "memory query failed");
        }
        result
    }
}

fn remote(code: &str, message: impl Into<String>) -> FaunaError {
    FaunaError::Remote {
        status: 400,
        code: code.to_string(),
        message: message.into(),
    }
}

fn invalid_argument(message: impl Into<String>) -> FaunaError {
    remote("invalid argument", message)
}

struct Evaluator<'s> {
    store: &'s mut Store,
    scopes: Vec<(String, Data)>,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr) -> FaunaResult<Data> {
        Ok(match expr {
            Expr::Null => Data::Null,
            Expr::Bool(b) => Data::Bool(*b),
            Expr::Int(n) => Data::Int(*n),
            Expr::Float(n) => Data::Float(*n),
            Expr::String(s) => Data::String(s.clone()),
            Expr::Time(t) => DateTime::parse_from_rfc3339(t)
                .map(|dt| Data::Time(dt.with_timezone(&Utc)))
                .map_err(|_| invalid_argument(format!("invalid time '{}'", t)))?,
            Expr::Array(items) => Data::Array(self.eval_all(items)?),
            Expr::Object(fields) => {
                let mut map = BTreeMap::new();
                for (k, v) in fields {
                    map.insert(k.clone(), self.eval(v)?);
                }
                Data::Object(map)
            }

            Expr::Collection(name) => Data::Collection(name.clone()),
            Expr::Index(name) => Data::Index(name.clone()),
            Expr::Indexes => Data::Set(
                self.store
                    .indexes
                    .keys()
                    .map(|k| Data::Index(k.clone()))
                    .collect(),
            ),
            Expr::Documents(c) => {
                let name = self.collection_arg(c)?;
                let coll = self.collection(&name)?;
                Data::Set(
                    coll.docs
                        .keys()
                        .map(|id| Data::Ref {
                            collection: name.clone(),
                            id: *id,
                        })
                        .collect(),
                )
            }
            Expr::Ref(c, id) => {
                let collection = self.collection_arg(c)?;
                let id = match self.eval(id)? {
                    Data::String(s) => s,
                    Data::Int(n) => n.to_string(),
                    other => {
                        return Err(invalid_argument(format!(
                            "ref id must be a string, got {}",
                            other.type_name()
                        )))
                    }
                };
                let id = id
                    .parse::<u64>()
                    .map_err(|_| invalid_argument(format!("invalid document id '{}'", id)))?;
                Data::Ref { collection, id }
            }
            Expr::Match(index, terms) => {
                let index = match self.eval(index)? {
                    Data::Index(name) => name,
                    other => return Err(invalid_argument(format!("expected index ref, got {}", other.type_name()))),
                };
                let terms = self.eval(terms)?;
                self.match_index(&index, &terms)?
            }
            Expr::Union(sets) => {
                let mut members: Vec<Data> = Vec::new();
                for set in sets {
                    for item in self.items(set)? {
                        if !members.contains(&item) {
                            members.push(item);
                        }
                    }
                }
                members.sort_by(ref_order);
                Data::Set(members)
            }
            Expr::Paginate { set, size } => {
                let items = self.items(set)?;
                let mut page = BTreeMap::new();
                if items.len() > *size {
                    page.insert("after".to_string(), items[*size].clone());
                }
                page.insert(
                    "data".to_string(),
                    Data::Array(items.into_iter().take(*size).collect()),
                );
                Data::Object(page)
            }

            Expr::Lambda(..) => return Err(invalid_argument("lambda used as a value")),
            Expr::Var(name) => self
                .scopes
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| remote("invalid expression", format!("variable '{}' is not defined", name)))?,
            Expr::Let(bindings, body) => {
                let depth = self.scopes.len();
                for (name, value) in bindings {
                    let value = self.eval(value)?;
                    self.scopes.push((name.clone(), value));
                }
                let result = self.eval(body);
                self.scopes.truncate(depth);
                result?
            }
            Expr::Map(c, lambda) => self.map_like(c, |ev, item| ev.apply(lambda, vec![item]))?,
            Expr::Filter(c, lambda) => {
                let collection = self.eval(c)?;
                let (items, page) = split_page(collection)?;
                let mut kept = Vec::new();
                for item in items {
                    if self.truthy(lambda, item.clone())? {
                        kept.push(item);
                    }
                }
                rebuild_page(kept, page)
            }
            Expr::Foreach(c, lambda) => {
                let collection = self.eval(c)?;
                let (items, page) = split_page(collection)?;
                for item in &items {
                    self.apply(lambda, vec![item.clone()])?;
                }
                rebuild_page(items, page)
            }
            Expr::Reduce {
                lambda,
                initial,
                collection,
            } => {
                let mut acc = self.eval(initial)?;
                let collection = self.eval(collection)?;
                let (items, _) = split_page(collection)?;
                for item in items {
                    acc = self.apply(lambda, vec![acc, item])?;
                }
                acc
            }

            Expr::Get(e) => {
                let target = self.eval(e)?;
                self.get(&target)?
            }
            Expr::Select {
                path,
                from,
                default,
            } => {
                let from = self.eval(from)?;
                match select(path, &from) {
                    Some(v) => v,
                    None => match default {
                        Some(d) => self.eval(d)?,
                        None => {
                            return Err(remote(
                                "value not found",
                                format!("value not found at path {:?}", path),
                            ))
                        }
                    },
                }
            }
            Expr::Create(target, params) => {
                let target = self.eval(target)?;
                let data = data_param(self.eval(params)?)?;
                self.create(target, data)?
            }
            Expr::Update(target, params) => {
                let target = self.eval(target)?;
                let data = data_param(self.eval(params)?)?;
                self.update(target, data)?
            }
            Expr::Delete(e) => {
                let target = self.eval(e)?;
                self.delete(target)?
            }
            Expr::Do(items) => {
                let mut last = Data::Null;
                for item in items {
                    last = self.eval(item)?;
                }
                last
            }
            Expr::If(cond, then, otherwise) => match self.eval(cond)? {
                Data::Bool(true) => self.eval(then)?,
                Data::Bool(false) => self.eval(otherwise)?,
                other => return Err(invalid_argument(format!("If expects a boolean, got {}", other.type_name()))),
            },
            Expr::Exists(e) => {
                let exists = match self.eval(e)? {
                    Data::Ref { collection, id } => self
                        .store
                        .collections
                        .get(&collection)
                        .is_some_and(|c| c.docs.contains_key(&id)),
                    Data::Collection(name) => self.store.collections.contains_key(&name),
                    Data::Index(name) => self.store.indexes.contains_key(&name),
                    other => return Err(invalid_argument(format!("Exists expects a ref, got {}", other.type_name()))),
                };
                Data::Bool(exists)
            }
            Expr::IsEmpty(e) => {
                let (items, _) = split_page(self.eval(e)?)?;
                Data::Bool(items.is_empty())
            }

            Expr::Equals(a, b) => Data::Bool(self.eval(a)? == self.eval(b)?),
            Expr::Compare(op, a, b) => {
                let ordering = compare(&self.eval(a)?, &self.eval(b)?);
                Data::Bool(match (op, ordering) {
                    (_, None) => false,
                    (Cmp::Lt, Some(o)) => o == Ordering::Less,
                    (Cmp::Lte, Some(o)) => o != Ordering::Greater,
                    (Cmp::Gt, Some(o)) => o == Ordering::Greater,
                    (Cmp::Gte, Some(o)) => o != Ordering::Less,
                })
            }
            Expr::And(items) => {
                for item in items {
                    if !self.boolean(item)? {
                        return Ok(Data::Bool(false));
                    }
                }
                Data::Bool(true)
            }
            Expr::Or(items) => {
                for item in items {
                    if self.boolean(item)? {
                        return Ok(Data::Bool(true));
                    }
                }
                Data::Bool(false)
            }
            Expr::Not(e) => Data::Bool(!self.boolean(e)?),
            Expr::Str(test, value, search) => match (self.eval(value)?, self.eval(search)?) {
                (Data::String(v), Data::String(s)) => Data::Bool(match test {
                    StrTest::Contains => v.contains(&s),
                    StrTest::StartsWith => v.starts_with(&s),
                    StrTest::EndsWith => v.ends_with(&s),
                }),
                _ => Data::Bool(false),
            },
            Expr::ToString(e) => Data::String(match self.eval(e)? {
                Data::Null => "null".to_string(),
                Data::Bool(b) => b.to_string(),
                Data::Int(n) => n.to_string(),
                Data::Float(n) => n.to_string(),
                Data::String(s) => s,
                Data::Time(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                other => return Err(invalid_argument(format!("cannot convert {} to string", other.type_name()))),
            }),
            Expr::ToInteger(e) => Data::Int(match self.eval(e)? {
                Data::Int(n) => n,
                Data::Float(n) => n as i64,
                Data::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| invalid_argument(format!("cannot convert '{}' to integer", s)))?,
                other => return Err(invalid_argument(format!("cannot convert {} to integer", other.type_name()))),
            }),

            Expr::Merge(a, b) => match (self.eval(a)?, self.eval(b)?) {
                (Data::Object(mut base), Data::Object(with)) => {
                    merge_into(&mut base, with);
                    Data::Object(base)
                }
                (a, b) => {
                    return Err(invalid_argument(format!(
                        "Merge expects objects, got {} and {}",
                        a.type_name(),
                        b.type_name()
                    )))
                }
            },
            Expr::Append(elements, base) => match (self.eval(elements)?, self.eval(base)?) {
                (Data::Array(elements), Data::Array(mut base)) => {
                    base.extend(elements);
                    Data::Array(base)
                }
                (a, b) => {
                    return Err(invalid_argument(format!(
                        "Append expects arrays, got {} and {}",
                        a.type_name(),
                        b.type_name()
                    )))
                }
            },
            Expr::Take(n, c) => {
                let (items, page) = split_page(self.eval(c)?)?;
                rebuild_page(items.into_iter().take(*n).collect(), page)
            }
            Expr::Drop(n, c) => {
                let (items, page) = split_page(self.eval(c)?)?;
                rebuild_page(items.into_iter().skip(*n).collect(), page)
            }
            Expr::Count(c) => {
                let (items, _) = split_page(self.eval(c)?)?;
                Data::Int(items.len() as i64)
            }
            Expr::Distinct(c) => {
                let (items, page) = split_page(self.eval(c)?)?;
                let mut unique: Vec<Data> = Vec::with_capacity(items.len());
                for item in items {
                    if !unique.contains(&item) {
                        unique.push(item);
                    }
                }
                rebuild_page(unique, page)
            }
        })
    }

    fn eval_all(&mut self, items: &[Expr]) -> FaunaResult<Vec<Data>> {
        items.iter().map(|e| self.eval(e)).collect()
    }

    fn boolean(&mut self, expr: &Expr) -> FaunaResult<bool> {
        match self.eval(expr)? {
            Data::Bool(b) => Ok(b),
            other => Err(invalid_argument(format!("expected a boolean, got {}", other.type_name()))),
        }
    }

    fn truthy(&mut self, lambda: &Expr, item: Data) -> FaunaResult<bool> {
        match self.apply(lambda, vec![item])? {
            Data::Bool(b) => Ok(b),
            other => Err(invalid_argument(format!(
                "filter lambda returned {}",
                other.type_name()
            ))),
        }
    }

    fn apply(&mut self, lambda: &Expr, args: Vec<Data>) -> FaunaResult<Data> {
        let Expr::Lambda(params, body) = lambda else {
            return Err(invalid_argument("expected a lambda"));
        };
        let depth = self.scopes.len();
        if params.len() == 1 {
            let value = if args.len() == 1 {
                args.into_iter().next().unwrap_or(Data::Null)
            } else {
                Data::Array(args)
            };
            self.scopes.push((params[0].clone(), value));
        } else if params.len() == args.len() {
            for (name, value) in params.iter().zip(args) {
                self.scopes.push((name.clone(), value));
            }
        } else {
            return Err(invalid_argument(format!(
                "lambda expects {} arguments, got {}",
                params.len(),
                args.len()
            )));
        }
        let result = self.eval(body);
        self.scopes.truncate(depth);
        result
    }

    fn map_like(
        &mut self,
        c: &Expr,
        mut f: impl FnMut(&mut Self, Data) -> FaunaResult<Data>,
    ) -> FaunaResult<Data> {
        let (items, page) = split_page(self.eval(c)?)?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(f(self, item)?);
        }
        Ok(rebuild_page(out, page))
    }

    /// Elements of an array, set or page.
    fn items(&mut self, expr: &Expr) -> FaunaResult<Vec<Data>> {
        Ok(split_page(self.eval(expr)?)?.0)
    }

    fn collection_arg(&mut self, expr: &Expr) -> FaunaResult<String> {
        match self.eval(expr)? {
            Data::Collection(name) => Ok(name),
            other => Err(invalid_argument(format!(
                "expected collection ref, got {}",
                other.type_name()
            ))),
        }
    }

    fn collection(&self, name: &str) -> FaunaResult<&CollectionData> {
        self.store
            .collections
            .get(name)
            .ok_or_else(|| remote("invalid ref", format!("collection '{}' not found", name)))
    }

    fn index(&mut self, name: &str) -> FaunaResult<IndexDef> {
        if let Some(def) = self.store.indexes.get(name) {
            return Ok(def.clone());
        }
        let implicit = name
            .rsplit_once("_by_")
            .filter(|(collection, _)| self.store.collections.contains_key(*collection))
            .map(|(collection, field)| IndexDef {
                source: collection.to_string(),
                field: field.to_string(),
            });
        match implicit {
            Some(def) => {
                self.store.indexes.insert(name.to_string(), def.clone());
                Ok(def)
            }
            None => Err(remote("invalid ref", format!("index '{}' not found", name))),
        }
    }

    fn match_index(&mut self, name: &str, terms: &Data) -> FaunaResult<Data> {
        let def = self.index(name)?;
        if *terms == Data::Null {
            return Ok(Data::Set(Vec::new()));
        }
        let coll = self.collection(&def.source)?;
        Ok(Data::Set(
            coll.docs
                .iter()
                .filter(|(_, doc)| doc.data.get(&def.field) == Some(terms))
                .map(|(id, _)| Data::Ref {
                    collection: def.source.clone(),
                    id: *id,
                })
                .collect(),
        ))
    }

    fn get(&self, target: &Data) -> FaunaResult<Data> {
        match target {
            Data::Ref { collection, id } => {
                let doc = self
                    .store
                    .collections
                    .get(collection)
                    .and_then(|c| c.docs.get(id))
                    .ok_or_else(|| remote("instance not found", "Document not found."))?;
                Ok(document(collection, *id, doc))
            }
            Data::Collection(name) => {
                self.collection(name)?;
                Ok(Data::Object(BTreeMap::from([
                    ("ref".to_string(), target.clone()),
                    ("name".to_string(), Data::String(name.clone())),
                ])))
            }
            Data::Index(name) => {
                let def = self
                    .store
                    .indexes
                    .get(name)
                    .ok_or_else(|| remote("instance not found", format!("index '{}' not found", name)))?;
                Ok(Data::Object(BTreeMap::from([
                    ("ref".to_string(), target.clone()),
                    ("name".to_string(), Data::String(name.clone())),
                    ("source".to_string(), Data::Collection(def.source.clone())),
                    (
                        "terms".to_string(),
                        Data::Array(vec![Data::Object(BTreeMap::from([(
                            "field".to_string(),
                            Data::Array(vec![
                                Data::String("data".to_string()),
                                Data::String(def.field.clone()),
                            ]),
                        )]))]),
                    ),
                ])))
            }
            other => Err(invalid_argument(format!("cannot Get {}", other.type_name()))),
        }
    }

    fn tick(&mut self) -> i64 {
        self.store.clock += 1;
        self.store.clock
    }

    fn create(&mut self, target: Data, data: BTreeMap<String, Data>) -> FaunaResult<Data> {
        let (collection, explicit) = match target {
            Data::Collection(name) => (name, None),
            Data::Ref { collection, id } => (collection, Some(id)),
            other => return Err(invalid_argument(format!("cannot Create {}", other.type_name()))),
        };
        let ts = self.tick();
        let coll = self.store.collections.entry(collection.clone()).or_default();
        let id = match explicit {
            Some(id) if coll.docs.contains_key(&id) => {
                return Err(remote("instance already exists", "Document already exists."));
            }
            Some(id) => {
                coll.next_id = coll.next_id.max(id);
                id
            }
            None => {
                coll.next_id += 1;
                coll.next_id
            }
        };
        let mut fields = BTreeMap::new();
        merge_into(&mut fields, data);
        let doc = Document { ts, data: fields };
        let out = document(&collection, id, &doc);
        coll.docs.insert(id, doc);
        Ok(out)
    }

    fn update(&mut self, target: Data, data: BTreeMap<String, Data>) -> FaunaResult<Data> {
        let Data::Ref { collection, id } = target else {
            return Err(invalid_argument(format!("cannot Update {}", target.type_name())));
        };
        let ts = self.tick();
        let doc = self
            .store
            .collections
            .get_mut(&collection)
            .and_then(|c| c.docs.get_mut(&id))
            .ok_or_else(|| remote("instance not found", "Document not found."))?;
        merge_into(&mut doc.data, data);
        doc.ts = ts;
        Ok(document(&collection, id, doc))
    }

    fn delete(&mut self, target: Data) -> FaunaResult<Data> {
        match target {
            Data::Ref { collection, id } => {
                let doc = self
                    .store
                    .collections
                    .get_mut(&collection)
                    .and_then(|c| c.docs.remove(&id))
                    .ok_or_else(|| remote("instance not found", "Document not found."))?;
                Ok(document(&collection, id, &doc))
            }
            Data::Collection(name) => {
                let removed = self.get(&Data::Collection(name.clone()))?;
                self.store.collections.remove(&name);
                Ok(removed)
            }
            Data::Index(name) => {
                let removed = self.get(&Data::Index(name.clone()))?;
                self.store.indexes.remove(&name);
                Ok(removed)
            }
            other => Err(invalid_argument(format!("cannot Delete {}", other.type_name()))),
        }
    }
}

fn document(collection: &str, id: u64, doc: &Document) -> Data {
    Data::Object(BTreeMap::from([
        (
            "ref".to_string(),
            Data::Ref {
                collection: collection.to_string(),
                id,
            },
        ),
        ("ts".to_string(), Data::Int(doc.ts)),
        ("data".to_string(), Data::Object(doc.data.clone())),
    ]))
}

/// `{data: {...}}` params of Create/Update.
fn data_param(params: Data) -> FaunaResult<BTreeMap<String, Data>> {
    match params {
        Data::Object(mut map) => match map.remove("data") {
            Some(Data::Object(data)) => Ok(data),
            None | Some(Data::Null) => Ok(BTreeMap::new()),
            Some(other) => Err(invalid_argument(format!("data must be an object, got {}", other.type_name()))),
        },
        other => Err(invalid_argument(format!("params must be an object, got {}", other.type_name()))),
    }
}

/// Null values delete keys.
fn merge_into(base: &mut BTreeMap<String, Data>, with: BTreeMap<String, Data>) {
    for (k, v) in with {
        if v == Data::Null {
            base.remove(&k);
        } else {
            base.insert(k, v);
        }
    }
}

type PageRest = Option<BTreeMap<String, Data>>;

/// Split an array, set or page into its elements plus the page envelope.
fn split_page(collection: Data) -> FaunaResult<(Vec<Data>, PageRest)> {
    match collection {
        Data::Array(items) | Data::Set(items) => Ok((items, None)),
        Data::Object(mut map) => match map.remove("data") {
            Some(Data::Array(items)) => Ok((items, Some(map))),
            _ => Err(invalid_argument("expected an array or page")),
        },
        other => Err(invalid_argument(format!(
            "expected an array or page, got {}",
            other.type_name()
        ))),
    }
}

fn rebuild_page(items: Vec<Data>, page: PageRest) -> Data {
    match page {
        Some(mut map) => {
            map.insert("data".to_string(), Data::Array(items));
            Data::Object(map)
        }
        None => Data::Array(items),
    }
}

fn select(path: &[String], from: &Data) -> Option<Data> {
    let mut current = from.clone();
    for segment in path {
        current = match current {
            Data::Object(mut map) => map.remove(segment)?,
            Data::Array(items) => items.into_iter().nth(segment.parse::<usize>().ok()?)?,
            Data::Ref { collection, id } => match segment.as_str() {
                "id" => Data::String(id.to_string()),
                "collection" => Data::Collection(collection),
                _ => return None,
            },
            Data::Collection(name) | Data::Index(name) if segment == "id" => Data::String(name),
            _ => return None,
        };
    }
    Some(current)
}

/// Sets are ordered by ref.
fn ref_order(a: &Data, b: &Data) -> Ordering {
    match (a, b) {
        (
            Data::Ref { collection: ca, id: ia },
            Data::Ref { collection: cb, id: ib },
        ) => ca.cmp(cb).then(ia.cmp(ib)),
        _ => Ordering::Equal,
    }
}

fn compare(a: &Data, b: &Data) -> Option<Ordering> {
    match (a, b) {
        (Data::Int(x), Data::Int(y)) => Some(x.cmp(y)),
        (Data::Int(x), Data::Float(y)) => (*x as f64).partial_cmp(y),
        (Data::Float(x), Data::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Data::Float(x), Data::Float(y)) => x.partial_cmp(y),
        (Data::String(x), Data::String(y)) => Some(x.cmp(y)),
        (Data::Time(x), Data::Time(y)) => Some(x.cmp(y)),
        (Data::Bool(x), Data::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::transpiler::translate;
    use pretty_assertions::assert_eq;

    fn run(mem: &MemoryTransport, sql: &str) -> Json {
        let t = translate(&parse(sql).unwrap()).unwrap();
        mem.evaluate(&t.expr).unwrap()
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let mem = MemoryTransport::new();
        let first = run(&mem, "INSERT INTO users (name) VALUES ('a')");
        let second = run(&mem, "INSERT INTO users (name) VALUES ('b')");
        assert_eq!(first["ref"]["@ref"]["id"], json!("1"));
        assert_eq!(second["ref"]["@ref"]["id"], json!("2"));
        assert_eq!(mem.document_count("users").unwrap(), Some(2));
    }

    #[test]
    fn test_select_with_index_and_filter() {
        let mem = MemoryTransport::new();
        run(&mem, "INSERT INTO users (name, age) VALUES ('Bob', 30), ('Al', 20), ('Bob', 10)");
        let rows = run(&mem, "SELECT users.name, users.age FROM users WHERE users.name = 'Bob' AND users.age > 15");
        assert_eq!(rows, json!([["Bob", 30]]));
    }

    #[test]
    fn test_failed_query_leaves_store_untouched() {
        let mem = MemoryTransport::new();
        run(&mem, "INSERT INTO users (id, name) VALUES (1, 'a')");
        let t = translate(&parse("INSERT INTO users (id, name) VALUES (2, 'b'), (1, 'c')").unwrap()).unwrap();
        let err = mem.evaluate(&t.expr).unwrap_err();
        assert!(err.is_remote());
        assert_eq!(mem.document_count("users").unwrap(), Some(1));
    }

    #[test]
    fn test_update_and_delete() {
        let mem = MemoryTransport::new();
        run(&mem, "INSERT INTO users (name, age) VALUES ('Bob', 30), ('Al', 20)");
        let updated = run(&mem, "UPDATE users SET age = 31 WHERE users.name = 'Bob'");
        assert_eq!(updated.as_array().map(Vec::len), Some(1));
        assert_eq!(
            run(&mem, "SELECT users.age FROM users WHERE users.name = 'Bob'"),
            json!([[31]])
        );
        let deleted = run(&mem, "DELETE FROM users");
        assert_eq!(deleted.as_array().map(Vec::len), Some(2));
        assert_eq!(mem.document_count("users").unwrap(), Some(0));
    }

    #[test]
    fn test_drop_removes_collection_and_indexes() {
        let mem = MemoryTransport::new();
        mem.create_index("users_by_name", "users", "name").unwrap();
        mem.create_index("orders_by_user_id", "orders", "user_id").unwrap();
        run(&mem, "DROP TABLE users");
        assert_eq!(mem.collection_names().unwrap(), vec!["orders".to_string()]);
        assert_eq!(mem.index_names().unwrap(), vec!["orders_by_user_id".to_string()]);
        // IF EXISTS on a missing collection is a no-op
        assert_eq!(run(&mem, "DROP TABLE IF EXISTS users"), Json::Null);
    }

    #[test]
    fn test_union_merges_sets_in_ref_order() {
        let mem = MemoryTransport::new();
        run(&mem, "INSERT INTO orders (user_id) VALUES (1), ('1'), (2), (1)");
        let index = || Box::new(Expr::index("orders_by_user_id"));
        let union = Expr::Union(vec![
            Expr::Match(index(), Box::new(Expr::string("1"))),
            Expr::Match(
                index(),
                Box::new(Expr::ToInteger(Box::new(Expr::string("1")))),
            ),
        ]);
        let ids: Vec<Json> = mem
            .evaluate(&union)
            .unwrap()["@set"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["@ref"]["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("1"), json!("2"), json!("4")]);
    }

    #[test]
    fn test_to_integer_rejects_non_numeric_strings() {
        let mem = MemoryTransport::new();
        let expr = Expr::ToInteger(Box::new(Expr::string("x1")));
        assert!(mem.evaluate(&expr).unwrap_err().is_remote());
        let expr = Expr::ToInteger(Box::new(Expr::string("42")));
        assert_eq!(mem.evaluate(&expr).unwrap(), json!(42));
    }

    #[test]
    fn test_missing_collection_is_remote_error() {
        let mem = MemoryTransport::new();
        let t = translate(&parse("SELECT users.name FROM users").unwrap()).unwrap();
        assert!(mem.evaluate(&t.expr).unwrap_err().is_remote());
    }
}
