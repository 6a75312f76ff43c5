//! CacheStore - in-memory view models of one feature, with a fetch/mutation
//! state machine and a stale-response guard.
//!
//! Every fetch takes a [`FetchTicket`] from a monotonically increasing
//! counter. When its pipeline completes, the result is applied only if no
//! newer fetch was started in the meantime; otherwise it is dropped.
//! Single-item loads take per-key tickets, so loads of different keys
//! never supersede each other.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{ErrorKind, StoreError, StoreResult};

/// View models cached by a store are addressed by a unique key.
pub trait Keyed {
    fn key(&self) -> &str;

    /// Namespace of the key, for caches mixing rows of several collections.
    /// Two items are the same only when both kind and key match.
    fn kind(&self) -> &'static str {
        ""
    }
}

fn same_item<V: Keyed>(a: &V, b: &V) -> bool {
    a.kind() == b.kind() && a.key() == b.key()
}

/// Lifecycle of a cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Constructed, never fetched.
    Idle,
    Loading,
    Ready,
    Mutating,
    /// The last fetch or write failed; a new fetch recovers.
    Error(ErrorKind),
}

/// Proof of a started fetch; only the latest ticket may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result replaced the cached items.
    Applied { rows: usize },
    /// A newer fetch was started; the result was discarded.
    Stale,
}

/// Where an inserted view model goes when its key is not cached yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Front,
    Back,
}

struct CacheInner<V> {
    items: Vec<V>,
    state: StoreState,
    generation: u64,
    // Latest ticket per key for single-item loads.
    item_fetches: HashMap<String, u64>,
    item_counter: u64,
    last_error: Option<StoreError>,
}

/// Shared, clone-friendly cache of view models for one feature.
///
/// Locks are never held across an `.await`.
pub struct CacheStore<V> {
    name: &'static str,
    inner: Arc<RwLock<CacheInner<V>>>,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Keyed + Clone> CacheStore<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(RwLock::new(CacheInner {
                items: Vec::new(),
                state: StoreState::Idle,
                generation: 0,
                item_fetches: HashMap::new(),
                item_counter: 0,
                last_error: None,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // Cached data is plain values, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, CacheInner<V>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner<V>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn state(&self) -> StoreState {
        self.read().state
    }

    pub fn last_error(&self) -> Option<StoreError> {
        self.read().last_error.clone()
    }

    /// Copy of the cached items, in order.
    pub fn items(&self) -> Vec<V> {
        self.read().items.clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.read().items.iter().map(|v| v.key().to_string()).collect()
    }

    pub fn get(&self, id: &str) -> Option<V> {
        self.read().items.iter().find(|v| v.key() == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().items.iter().any(|v| v.key() == id)
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    /// Drop every item and return to `Idle`. In-flight fetches become stale.
    pub fn reset(&self) {
        let mut inner = self.write();
        inner.items.clear();
        inner.state = StoreState::Idle;
        inner.generation += 1;
        inner.item_fetches.clear();
        inner.last_error = None;
    }

    // ------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------

    pub fn begin_fetch(&self) -> FetchTicket {
        let mut inner = self.write();
        inner.generation += 1;
        inner.state = StoreState::Loading;
        FetchTicket(inner.generation)
    }

    /// Commit a fetch result if `ticket` is still the latest.
    ///
    /// A stale result, successful or not, leaves items and state untouched.
    pub fn finish_fetch(
        &self,
        ticket: FetchTicket,
        result: StoreResult<Vec<V>>,
    ) -> StoreResult<FetchOutcome> {
        let mut inner = self.write();
        if ticket.0 != inner.generation {
            debug!(
                store = self.name,
                ticket = ticket.0,
                latest = inner.generation,
                "discarding stale fetch result"
            );
            return Ok(FetchOutcome::Stale);
        }

        match result {
            Ok(items) => {
                let items = dedup(items);
                let rows = items.len();
                inner.items = items;
                inner.state = StoreState::Ready;
                inner.last_error = None;
                debug!(store = self.name, rows, "fetch applied");
                Ok(FetchOutcome::Applied { rows })
            }
            Err(err) => {
                inner.state = StoreState::Error(err.kind().unwrap_or(ErrorKind::Unknown));
                inner.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Run a fetch pipeline under a fresh ticket.
    pub async fn refresh<Fut>(&self, pipeline: Fut) -> StoreResult<FetchOutcome>
    where
        Fut: Future<Output = StoreResult<Vec<V>>>,
    {
        let ticket = self.begin_fetch();
        let result = pipeline.await;
        self.finish_fetch(ticket, result)
    }

    /// Start loading the single item `key`. Only a newer load of the same
    /// key makes this one stale.
    pub fn begin_item_fetch(&self, key: &str) -> FetchTicket {
        let mut inner = self.write();
        inner.item_counter += 1;
        let ticket = inner.item_counter;
        inner.item_fetches.insert(key.to_string(), ticket);
        FetchTicket(ticket)
    }

    /// Upsert a single loaded item if `ticket` is still the latest for `key`.
    ///
    /// Other cached items are kept. A full fetch in flight keeps the
    /// `Loading` state.
    pub fn finish_item_fetch(
        &self,
        key: &str,
        ticket: FetchTicket,
        result: StoreResult<V>,
        placement: Placement,
    ) -> StoreResult<FetchOutcome> {
        let mut inner = self.write();
        if inner.item_fetches.get(key) != Some(&ticket.0) {
            debug!(store = self.name, key, ticket = ticket.0, "discarding stale item load");
            return Ok(FetchOutcome::Stale);
        }
        inner.item_fetches.remove(key);

        let loading = inner.state == StoreState::Loading;
        match result {
            Ok(view) => {
                upsert(&mut inner.items, view, placement);
                if !loading {
                    inner.state = StoreState::Ready;
                }
                inner.last_error = None;
                Ok(FetchOutcome::Applied { rows: 1 })
            }
            Err(err) => {
                if !loading {
                    inner.state = StoreState::Error(err.kind().unwrap_or(ErrorKind::Unknown));
                }
                inner.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Run a write under the `Mutating` state.
    ///
    /// Success returns to `Ready`; a backend failure moves to `Error`; input
    /// rejected before any remote call restores the previous state. A write
    /// started while a fetch is `Loading` leaves the state to that fetch.
    pub async fn mutate<T, Fut>(&self, op: Fut) -> StoreResult<T>
    where
        Fut: Future<Output = StoreResult<T>>,
    {
        let previous = {
            let mut inner = self.write();
            if inner.state == StoreState::Loading {
                StoreState::Loading
            } else {
                std::mem::replace(&mut inner.state, StoreState::Mutating)
            }
        };

        let result = op.await;

        let mut inner = self.write();
        let owns_state = inner.state == StoreState::Mutating;
        match &result {
            Ok(_) => {
                if owns_state {
                    inner.state = StoreState::Ready;
                }
            }
            Err(StoreError::Invalid(_)) => {
                if owns_state {
                    inner.state = previous;
                }
            }
            Err(err @ StoreError::Backend(backend)) => {
                if inner.state != StoreState::Loading {
                    inner.state = StoreState::Error(backend.kind);
                }
                inner.last_error = Some(err.clone());
            }
        }
        result
    }

    /// Insert `view`, replacing an existing item with the same key in place.
    pub fn insert(&self, view: V, placement: Placement) {
        upsert(&mut self.write().items, view, placement);
    }

    /// Replace the item with the same key; returns false when absent.
    pub fn replace(&self, view: V) -> bool {
        let mut inner = self.write();
        match inner.items.iter_mut().find(|v| same_item(&**v, &view)) {
            Some(slot) => {
                *slot = view;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> Option<V> {
        let mut inner = self.write();
        let position = inner.items.iter().position(|v| v.key() == id)?;
        Some(inner.items.remove(position))
    }

    /// Modify the item with `id` in place; returns its previous value so the
    /// change can be rolled back with [`CacheStore::replace`].
    pub fn patch<F>(&self, id: &str, f: F) -> Option<V>
    where
        F: FnOnce(&mut V),
    {
        let mut inner = self.write();
        let slot = inner.items.iter_mut().find(|v| v.key() == id)?;
        let previous = slot.clone();
        f(slot);
        Some(previous)
    }
}

fn upsert<V: Keyed>(items: &mut Vec<V>, view: V, placement: Placement) {
    if let Some(slot) = items.iter_mut().find(|v| same_item(&**v, &view)) {
        *slot = view;
        return;
    }
    match placement {
        Placement::Front => items.insert(0, view),
        Placement::Back => items.push(view),
    }
}

/// Keep the first occurrence of every kind and key.
fn dedup<V: Keyed>(items: Vec<V>) -> Vec<V> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|v| seen.insert((v.kind(), v.key().to_string())))
        .collect()
}
