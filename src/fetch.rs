//! Collection - typed accessor over one remote collection.
//!
//! This is the fetcher boundary: JSON rows coming back from a [`Backend`] are
//! decoded into closed [`Row`] shapes here, and nowhere else.

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult, ErrorKind};
use crate::query::Query;
use crate::row::Row;

/// Typed handle for reading and writing rows of type `R`.
pub struct Collection<'a, B: ?Sized, R> {
    backend: &'a B,
    _marker: PhantomData<R>,
}

impl<'a, B: Backend + ?Sized, R: Row> Collection<'a, B, R> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            _marker: PhantomData,
        }
    }

    /// Rows matching `query`, projected to `R::COLUMNS` unless the query
    /// names its own columns.
    pub async fn select(&self, query: &Query) -> BackendResult<Vec<R>> {
        let query = if query.columns.is_none() {
            query.clone().select(R::COLUMNS)
        } else {
            query.clone()
        };

        let raw = self.backend.select(R::COLLECTION, &query).await?;
        debug!(collection = R::COLLECTION, rows = raw.len(), "fetched rows");
        raw.into_iter().map(decode::<R>).collect()
    }

    /// Fetch the row with `id`; zero rows is `NotFound`.
    pub async fn get(&self, id: &str) -> BackendResult<R> {
        let mut rows = self.select(&Query::new().eq("id", id).limit(1)).await?;
        rows.pop()
            .ok_or_else(|| BackendError::not_found(R::COLLECTION, id))
    }

    pub async fn insert(&self, row: &R) -> BackendResult<R> {
        let stored = self.backend.insert(R::COLLECTION, encode(R::COLLECTION, row)?).await?;
        decode(stored)
    }

    pub async fn update<P: Serialize + ?Sized>(&self, id: &str, patch: &P) -> BackendResult<R> {
        let patch = encode(R::COLLECTION, patch)?;
        let stored = self.backend.update(R::COLLECTION, id, patch).await?;
        decode(stored)
    }

    pub async fn delete(&self, id: &str) -> BackendResult<()> {
        self.backend.delete(R::COLLECTION, id).await
    }

    pub async fn delete_where(&self, query: &Query) -> BackendResult<u64> {
        self.backend.delete_where(R::COLLECTION, query).await
    }
}

fn encode<T: Serialize + ?Sized>(collection: &str, value: &T) -> BackendResult<Value> {
    serde_json::to_value(value).map_err(|e| {
        BackendError::new(
            ErrorKind::SchemaMismatch,
            format!("{}: cannot encode row: {}", collection, e),
        )
    })
}

fn decode<R: Row>(value: Value) -> BackendResult<R> {
    serde_json::from_value(value).map_err(|e| {
        BackendError::new(
            ErrorKind::SchemaMismatch,
            format!("{}: unexpected row shape: {}", R::COLLECTION, e),
        )
    })
}

/// Extension trait for typed collection access on any backend.
pub trait CollectionsExt: Backend {
    /// Get a typed collection handle.
    fn collection<R: Row>(&self) -> Collection<'_, Self, R> {
        Collection::new(self)
    }
}

impl<B: Backend + ?Sized> CollectionsExt for B {}
