//! Client data layer for CarSocial.
//!
//! Rows are fetched from a [`Backend`] through typed [`Collection`]s, their
//! foreign keys are resolved in one batched fetch per relation, and the
//! results are merged into view models held by per-feature [`CacheStore`]s.

extern crate self as carsocial;

mod app;
pub mod backend;
mod cache;
mod config;
mod context;
pub mod domain;
mod error;
mod feed;
mod fetch;
mod merge;
mod notify;
mod observability;
mod query;
mod resolve;
mod row;
mod search;
mod session;
mod storage;
pub mod stores;

pub use app::CarSocial;
pub use backend::{Backend, Call, InMemoryBackend, Op};
#[cfg(feature = "rest")]
pub use backend::RestBackend;
pub use cache::{CacheStore, FetchOutcome, FetchTicket, Keyed, Placement, StoreState};
pub use config::{ClientConfig, ConfigError};
pub use context::StoreContext;
pub use error::{BackendError, BackendResult, ErrorKind, StoreError, StoreResult};
pub use feed::{sort_newest_first, FeedItem, HomeFeed};
pub use fetch::{Collection, CollectionsExt};
pub use merge::{merge, merge_into, ANONYMOUS, UNKNOWN};
#[cfg(feature = "emitter")]
pub use notify::EmitterNotifier;
pub use notify::{BufferNotifier, Level, Notification, Notifier, TracingNotifier};
pub use observability::init_tracing;
pub use query::{Filter, Order, Query};
pub use resolve::{or_empty, resolve, resolve_grouped, resolve_keys, ForeignKeySet, LookupMap};
pub use row::Row;
pub use search::{SearchHit, SearchStore};
pub use session::{Identity, Session};
pub use storage::{ObjectRef, StorageUrls, AVATARS, CAR_IMAGES, LISTING_IMAGES};
pub use stores::{ForumsStore, GarageStore, MarketplaceStore, MeetsStore, ProfileStore};

// Re-export the derive macro alongside the trait.
pub use carsocial_macros::Row;

// Re-export the EventEmitter used by EmitterNotifier.
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
