//! Backend - the remote table contract the aggregation layer is written against.
//!
//! Rows cross this boundary as JSON objects; typing happens one layer up, in
//! [`Collection`](crate::Collection).

mod memory;
#[cfg(feature = "rest")]
mod rest;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BackendResult;
use crate::query::Query;

pub use memory::{Call, InMemoryBackend};
#[cfg(feature = "rest")]
pub use rest::RestBackend;

/// Remote operations, as recorded by [`InMemoryBackend`] and used for
/// failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Select,
    Insert,
    Update,
    Delete,
}

/// Remote table-like storage.
///
/// Every call is attempted exactly once; implementations do not retry.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Rows of `collection` matching `query`. No match is an empty vector.
    async fn select(&self, collection: &str, query: &Query) -> BackendResult<Vec<Value>>;

    /// Insert one row and return it as stored.
    async fn insert(&self, collection: &str, row: Value) -> BackendResult<Value>;

    /// Shallow-merge `patch` into the row with `id` and return the result.
    /// Fails with `NotFound` when no such row exists.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> BackendResult<Value>;

    /// Delete the row with `id`. Deleting a missing row succeeds.
    async fn delete(&self, collection: &str, id: &str) -> BackendResult<()>;

    /// Delete every row matching `query`; returns how many were removed.
    async fn delete_where(&self, collection: &str, query: &Query) -> BackendResult<u64>;
}
