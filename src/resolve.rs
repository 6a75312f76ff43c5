//! Cross-reference resolution.
//!
//! Given a batch of rows holding foreign ids, collect the distinct ids and
//! fetch the referenced rows with a single `id in (...)` query.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::BackendResult;
use crate::fetch::CollectionsExt;
use crate::query::Query;
use crate::row::Row;

/// Distinct foreign ids for one relation, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignKeySet {
    ids: Vec<String>,
}

impl ForeignKeySet {
    /// Collect keys from `rows`; `None` and empty keys are skipped.
    pub fn collect<'r, R, F>(rows: &'r [R], key: F) -> Self
    where
        F: Fn(&'r R) -> Option<&'r str>,
    {
        let mut seen = HashSet::new();
        let ids = rows
            .iter()
            .filter_map(key)
            .filter(|id| !id.is_empty())
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect();
        Self { ids }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }
}

/// Id to referenced value, built once per resolve step.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupMap<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for LookupMap<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> LookupMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&V> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Insert or overwrite; the latest value for a key wins.
    pub fn insert(&mut self, id: impl Into<String>, value: V) {
        self.entries.insert(id.into(), value);
    }
}

impl<T: Row> LookupMap<T> {
    /// Index rows by their id.
    pub fn from_rows(rows: Vec<T>) -> Self {
        let mut map = Self::new();
        for row in rows {
            map.insert(row.id().to_string(), row);
        }
        map
    }
}

impl<T> LookupMap<Vec<T>> {
    /// Group rows under the key returned by `group`.
    pub fn grouped<F>(rows: Vec<T>, group: F) -> Self
    where
        F: Fn(&T) -> &str,
    {
        let mut map = Self::new();
        for row in rows {
            let key = group(&row).to_string();
            map.entries.entry(key).or_default().push(row);
        }
        map
    }

    /// Number of grouped rows under `id`; zero when absent.
    pub fn count(&self, id: &str) -> usize {
        self.get(id).map(Vec::len).unwrap_or(0)
    }
}

/// Resolve the relation `field` of `rows` into a map of `T` keyed by id.
///
/// Issues exactly one fetch, scoped to the deduplicated key set, or none at
/// all when there is nothing to resolve.
pub async fn resolve<'r, R, T, B, F>(
    backend: &B,
    rows: &'r [R],
    field: &str,
    key: F,
) -> BackendResult<LookupMap<T>>
where
    T: Row,
    B: Backend + ?Sized,
    F: Fn(&'r R) -> Option<&'r str>,
{
    let keys = ForeignKeySet::collect(rows, key);
    resolve_keys(backend, &keys, field).await
}

/// Resolve an already collected key set against `T::COLLECTION`.
pub async fn resolve_keys<T, B>(
    backend: &B,
    keys: &ForeignKeySet,
    field: &str,
) -> BackendResult<LookupMap<T>>
where
    T: Row,
    B: Backend + ?Sized,
{
    if keys.is_empty() {
        debug!(field, collection = T::COLLECTION, "no keys to resolve");
        return Ok(LookupMap::new());
    }

    let query = Query::new().in_list("id", keys.as_slice().iter().cloned());
    let rows = backend.collection::<T>().select(&query).await?;
    debug!(
        field,
        collection = T::COLLECTION,
        requested = keys.len(),
        found = rows.len(),
        "resolved references"
    );
    Ok(LookupMap::from_rows(rows))
}

/// One-to-many resolution: rows of `T` whose `column` is in `keys`,
/// optionally narrowed by `scope`, grouped by that column.
pub async fn resolve_grouped<T, B, G>(
    backend: &B,
    keys: &ForeignKeySet,
    column: &str,
    scope: Query,
    group: G,
) -> BackendResult<LookupMap<Vec<T>>>
where
    T: Row,
    B: Backend + ?Sized,
    G: Fn(&T) -> &str,
{
    if keys.is_empty() {
        debug!(column, collection = T::COLLECTION, "no keys to resolve");
        return Ok(LookupMap::new());
    }

    let query = scope.in_list(column, keys.as_slice().iter().cloned());
    let rows = backend.collection::<T>().select(&query).await?;
    debug!(column, collection = T::COLLECTION, found = rows.len(), "resolved related rows");
    Ok(LookupMap::grouped(rows, group))
}

/// Degrade a failed resolve step to an empty map so the merge can still
/// produce every view model with its defaults.
pub fn or_empty<V>(result: BackendResult<LookupMap<V>>, relation: &str) -> LookupMap<V> {
    match result {
        Ok(map) => map,
        Err(err) => {
            warn!(relation, error = %err, "cross-reference resolve failed, using defaults");
            LookupMap::new()
        }
    }
}
