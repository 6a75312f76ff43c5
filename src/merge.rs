//! View model merging.
//!
//! Pure joins of fetched rows with [`LookupMap`]s. Output order always equals
//! input order and every input produces exactly one output; sorting, when
//! needed, is a separate step.

use crate::resolve::LookupMap;

/// Default for a missing referenced entity (forum, listing, ...).
pub const UNKNOWN: &str = "Unknown";

/// Default for a missing referenced person.
pub const ANONYMOUS: &str = "Anonymous";

/// Join `rows` with `lookup` through `key`, building one view per row.
///
/// `build` receives `None` when the row has no key or the key is missing
/// from the map (deleted or orphaned reference).
pub fn merge<'r, R, T, V, K, F>(rows: &'r [R], lookup: &LookupMap<T>, key: K, build: F) -> Vec<V>
where
    K: Fn(&'r R) -> Option<&'r str>,
    F: Fn(&'r R, Option<&T>) -> V,
{
    rows.iter()
        .map(|row| {
            let referenced = key(row).and_then(|id| lookup.get(id));
            build(row, referenced)
        })
        .collect()
}

/// Apply one more relation to already merged views.
pub fn merge_into<V, T, K, F>(views: Vec<V>, lookup: &LookupMap<T>, key: K, apply: F) -> Vec<V>
where
    K: Fn(&V) -> Option<String>,
    F: Fn(&mut V, Option<&T>),
{
    views
        .into_iter()
        .map(|mut view| {
            let id = key(&view);
            apply(&mut view, id.as_deref().and_then(|id| lookup.get(id)));
            view
        })
        .collect()
}
