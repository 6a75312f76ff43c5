//! Feature stores: fetch pipelines and mutations over [`CacheStore`]s.
//!
//! Every store follows the same write rules. Creates are optimistic and
//! reconciled by a refetch; updates and deletes touch the cache only after
//! the backend confirmed them; toggles flip the cached view first and roll
//! back when the backend refuses.

mod forums;
mod garage;
mod marketplace;
mod meets;
mod profiles;

pub use forums::{load_posts, ForumsStore};
pub use garage::{load_garage, GarageStore};
pub use marketplace::{load_listings, MarketplaceStore};
pub use meets::{load_meets, MeetsStore};
pub use profiles::ProfileStore;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::cache::{CacheStore, Keyed, Placement};
use crate::error::{BackendError, StoreError, StoreResult};

/// The last filter a store fetched with, reused by reconciling refetches.
pub(crate) struct LastFilter<F>(Arc<Mutex<F>>);

impl<F> Clone for LastFilter<F> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<F: Clone> LastFilter<F> {
    pub(crate) fn new(initial: F) -> Self {
        Self(Arc::new(Mutex::new(initial)))
    }

    pub(crate) fn get(&self) -> F {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn set(&self, filter: F) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = filter;
    }
}

/// Insert `provisional` at `placement`, then run the remote insert.
///
/// On success the provisional element is replaced by the confirmed one; on
/// failure it is removed again, leaving the cache as it was. With no
/// placement the cache is showing another selection: the write runs
/// without touching the cached items.
pub(crate) async fn optimistic_create<V, Fut>(
    cache: &CacheStore<V>,
    provisional: V,
    placement: Option<Placement>,
    remote: Fut,
) -> StoreResult<V>
where
    V: Keyed + Clone,
    Fut: Future<Output = StoreResult<V>>,
{
    let Some(placement) = placement else {
        debug!(store = cache.name(), id = %provisional.key(), "created item is not on display");
        return cache.mutate(remote).await;
    };

    let provisional_id = provisional.key().to_string();
    cache.insert(provisional, placement);

    let result = cache.mutate(remote).await;
    match &result {
        Ok(confirmed) => {
            if confirmed.key() != provisional_id {
                cache.remove(&provisional_id);
            }
            cache.insert(confirmed.clone(), placement);
        }
        Err(_) => {
            debug!(store = cache.name(), id = %provisional_id, "rolling back provisional item");
            cache.remove(&provisional_id);
        }
    }
    result
}

/// Flip a cached view with `flip`, run `remote`, and restore the previous
/// view if the remote call fails. Returns the flipped view.
pub(crate) async fn optimistic_toggle<V, F, Fut>(
    cache: &CacheStore<V>,
    id: &str,
    flip: F,
    remote: impl FnOnce(V) -> Fut,
) -> StoreResult<V>
where
    V: Keyed + Clone,
    F: FnOnce(&mut V),
    Fut: Future<Output = StoreResult<()>>,
{
    let previous = cache
        .patch(id, flip)
        .ok_or_else(|| StoreError::from(BackendError::not_found(cache.name(), id)))?;
    let flipped = cache.get(id).unwrap_or_else(|| previous.clone());

    match cache.mutate(remote(flipped.clone())).await {
        Ok(()) => Ok(flipped),
        Err(err) => {
            debug!(store = cache.name(), id, "rolling back toggle");
            cache.replace(previous);
            Err(err)
        }
    }
}
