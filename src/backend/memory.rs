//! InMemoryBackend - HashMap-backed backend for tests, demos and offline development.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::trace;

use super::{Backend, Op};
use crate::error::{BackendError, BackendResult, ErrorKind};
use crate::query::Query;
use crate::row::Row;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: Op,
    pub collection: String,
    /// The query for `select` and `delete_where`.
    pub query: Option<Query>,
    /// The target row for `update` and `delete`.
    pub id: Option<String>,
}

struct ForeignKey {
    child: String,
    column: String,
    parent: String,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    unique: HashMap<String, Vec<Vec<String>>>,
    foreign_keys: Vec<ForeignKey>,
    failures: HashMap<(Op, String), VecDeque<ErrorKind>>,
    calls: Vec<Call>,
}

/// In-memory backend keeping JSON rows per collection in insertion order.
///
/// Enforces `id` uniqueness, declared unique column sets and declared foreign
/// keys (on delete), and records every call. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a unique constraint over `columns` of `collection`.
    pub fn with_unique(self, collection: &str, columns: &[&str]) -> Self {
        self.write()
            .unique
            .entry(collection.to_string())
            .or_default()
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Declare that `child.column` references `parent.id`; deleting a
    /// referenced parent fails with `ReferentialConflict`.
    pub fn with_foreign_key(self, child: &str, column: &str, parent: &str) -> Self {
        self.write().foreign_keys.push(ForeignKey {
            child: child.to_string(),
            column: column.to_string(),
            parent: parent.to_string(),
        });
        self
    }

    /// Store typed rows directly, bypassing constraints and the call log.
    pub fn seed<R: Row>(&self, rows: &[R]) {
        let values = rows
            .iter()
            .filter_map(|row| serde_json::to_value(row).ok())
            .collect();
        self.seed_raw(R::COLLECTION, values);
    }

    pub fn seed_raw(&self, collection: &str, rows: Vec<Value>) {
        self.write()
            .tables
            .entry(collection.to_string())
            .or_default()
            .extend(rows);
    }

    /// Make the next `op` on `collection` fail with `kind`. Failures queue up.
    pub fn fail_next(&self, op: Op, collection: &str, kind: ErrorKind) {
        self.write()
            .failures
            .entry((op, collection.to_string()))
            .or_default()
            .push_back(kind);
    }

    /// Current rows of `collection`, in insertion order.
    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.write()
            .tables
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.write().calls.clone()
    }

    /// Queries of every `select` issued against `collection`.
    pub fn selects(&self, collection: &str) -> Vec<Query> {
        self.write()
            .calls
            .iter()
            .filter(|c| c.op == Op::Select && c.collection == collection)
            .filter_map(|c| c.query.clone())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.write().calls.clear();
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log the call, then surface any injected failure for it.
    fn begin(&self, call: Call) -> BackendResult<RwLockWriteGuard<'_, MemoryState>> {
        let mut state = self.write();
        trace!(op = ?call.op, collection = %call.collection, "in-memory backend call");
        let key = (call.op, call.collection.clone());
        state.calls.push(call);

        if let Some(kind) = state.failures.get_mut(&key).and_then(VecDeque::pop_front) {
            return Err(BackendError::new(
                kind,
                format!("injected {:?} failure on {}", key.0, key.1),
            ));
        }
        Ok(state)
    }
}

impl MemoryState {
    fn check_unique(&self, collection: &str, row: &Map<String, Value>) -> BackendResult<()> {
        let Some(table) = self.tables.get(collection) else {
            return Ok(());
        };
        let id = row.get("id");

        if table.iter().any(|existing| existing.get("id") == id) {
            return Err(duplicate(collection, "id"));
        }

        for columns in self.unique.get(collection).into_iter().flatten() {
            let values: Vec<&Value> = columns
                .iter()
                .map(|c| row.get(c).unwrap_or(&Value::Null))
                .collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            let clash = table.iter().any(|existing| {
                existing.get("id") != id
                    && columns
                        .iter()
                        .zip(&values)
                        .all(|(c, v)| existing.get(c) == Some(*v))
            });
            if clash {
                return Err(duplicate(collection, &columns.join(",")));
            }
        }
        Ok(())
    }

    fn check_unreferenced(&self, collection: &str, id: &str) -> BackendResult<()> {
        for fk in self.foreign_keys.iter().filter(|fk| fk.parent == collection) {
            let referenced = self
                .tables
                .get(&fk.child)
                .map(|rows| rows.iter().any(|r| r.get(&fk.column).and_then(Value::as_str) == Some(id)))
                .unwrap_or(false);
            if referenced {
                return Err(BackendError::new(
                    ErrorKind::ReferentialConflict,
                    format!("{}:{} is still referenced from {}.{}", collection, id, fk.child, fk.column),
                )
                .with_code("23503"));
            }
        }
        Ok(())
    }
}

fn duplicate(collection: &str, columns: &str) -> BackendError {
    BackendError::new(
        ErrorKind::Duplicate,
        format!("duplicate key on {}({})", collection, columns),
    )
    .with_code("23505")
}

fn into_object(collection: &str, value: Value) -> BackendResult<Map<String, Value>> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(BackendError::new(
            ErrorKind::SchemaMismatch,
            format!("{} expects an object, got {}", collection, other),
        )),
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn select(&self, collection: &str, query: &Query) -> BackendResult<Vec<Value>> {
        let state = self.begin(Call {
            op: Op::Select,
            collection: collection.to_string(),
            query: Some(query.clone()),
            id: None,
        })?;

        Ok(state
            .tables
            .get(collection)
            .map(|rows| query.apply(rows))
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, row: Value) -> BackendResult<Value> {
        let mut state = self.begin(Call {
            op: Op::Insert,
            collection: collection.to_string(),
            query: None,
            id: row.get("id").and_then(Value::as_str).map(str::to_string),
        })?;

        let mut object = into_object(collection, row)?;
        if !object.get("id").map(Value::is_string).unwrap_or(false) {
            object.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
        state.check_unique(collection, &object)?;

        let stored = Value::Object(object);
        state
            .tables
            .entry(collection.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> BackendResult<Value> {
        let mut state = self.begin(Call {
            op: Op::Update,
            collection: collection.to_string(),
            query: None,
            id: Some(id.to_string()),
        })?;

        let patch = into_object(collection, patch)?;
        let position = state
            .tables
            .get(collection)
            .and_then(|rows| rows.iter().position(|r| r.get("id").and_then(Value::as_str) == Some(id)))
            .ok_or_else(|| BackendError::not_found(collection, id).with_code("PGRST116"))?;

        let mut updated = into_object(collection, state.tables[collection][position].clone())?;
        for (key, value) in patch {
            if key != "id" {
                updated.insert(key, value);
            }
        }

        // Re-check unique sets against every other row.
        let mut others = std::mem::take(state.tables.entry(collection.to_string()).or_default());
        let current = others.remove(position);
        state.tables.insert(collection.to_string(), others);
        let checked = state.check_unique(collection, &updated);

        let rows = state.tables.entry(collection.to_string()).or_default();
        match checked {
            Ok(()) => {
                let stored = Value::Object(updated);
                rows.insert(position, stored.clone());
                Ok(stored)
            }
            Err(err) => {
                rows.insert(position, current);
                Err(err)
            }
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> BackendResult<()> {
        let mut state = self.begin(Call {
            op: Op::Delete,
            collection: collection.to_string(),
            query: None,
            id: Some(id.to_string()),
        })?;

        state.check_unreferenced(collection, id)?;
        if let Some(rows) = state.tables.get_mut(collection) {
            rows.retain(|r| r.get("id").and_then(Value::as_str) != Some(id));
        }
        Ok(())
    }

    async fn delete_where(&self, collection: &str, query: &Query) -> BackendResult<u64> {
        let mut state = self.begin(Call {
            op: Op::Delete,
            collection: collection.to_string(),
            query: Some(query.clone()),
            id: None,
        })?;

        let doomed: Vec<String> = state
            .tables
            .get(collection)
            .map(|rows| {
                rows.iter()
                    .filter(|r| query.filters.iter().all(|f| f.matches(r)))
                    .filter_map(|r| r.get("id").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        for id in &doomed {
            state.check_unreferenced(collection, id)?;
        }

        if let Some(rows) = state.tables.get_mut(collection) {
            rows.retain(|r| {
                r.get("id")
                    .and_then(Value::as_str)
                    .map(|id| !doomed.iter().any(|d| d == id))
                    .unwrap_or(true)
            });
        }
        Ok(doomed.len() as u64)
    }
}
