//! Typed remote records.

use serde::{de::DeserializeOwned, Serialize};

/// Trait for types that map onto one remote collection.
///
/// Usually derived with `#[derive(Row)]`.
pub trait Row: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// The remote collection (table) this row type is read from.
    const COLLECTION: &'static str;

    /// Columns requested when this row type is fetched.
    ///
    /// Several row types may share a collection with different projections,
    /// e.g. a full profile and a `{id, username, avatar_path}` summary.
    const COLUMNS: &'static [&'static str];

    /// Returns the unique identifier of this row.
    fn id(&self) -> &str;
}
