//! CarSocial - the application container wiring one context into every store.

use std::sync::Arc;

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::context::StoreContext;
use crate::feed::HomeFeed;
use crate::notify::Notifier;
use crate::search::SearchStore;
use crate::session::{Identity, Session};
use crate::stores::{ForumsStore, GarageStore, MarketplaceStore, MeetsStore, ProfileStore};

/// Every feature store of the client, sharing one backend, session and
/// notifier. Clones share all state.
#[derive(Clone)]
pub struct CarSocial {
    ctx: StoreContext,
    pub forums: ForumsStore,
    pub marketplace: MarketplaceStore,
    pub meets: MeetsStore,
    pub garage: GarageStore,
    pub profiles: ProfileStore,
    pub search: SearchStore,
    pub feed: HomeFeed,
}

impl CarSocial {
    pub fn new(backend: Arc<dyn Backend>, config: ClientConfig) -> Self {
        Self::from_context(StoreContext::new(backend, config))
    }

    pub fn with_notifier(
        backend: Arc<dyn Backend>,
        config: ClientConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::from_context(StoreContext::new(backend, config).with_notifier(notifier))
    }

    pub fn from_context(ctx: StoreContext) -> Self {
        Self {
            forums: ForumsStore::new(ctx.clone()),
            marketplace: MarketplaceStore::new(ctx.clone()),
            meets: MeetsStore::new(ctx.clone()),
            garage: GarageStore::new(ctx.clone()),
            profiles: ProfileStore::new(ctx.clone()),
            search: SearchStore::new(ctx.clone()),
            feed: HomeFeed::new(ctx.clone()),
            ctx,
        }
    }

    /// Talk to the hosted backend described by `config`.
    #[cfg(feature = "rest")]
    pub fn connect(config: ClientConfig) -> Self {
        let session = Session::new();
        let backend = crate::backend::RestBackend::new(&config, session.clone());
        Self::from_context(StoreContext::new(Arc::new(backend), config).with_session(session))
    }

    pub fn context(&self) -> &StoreContext {
        &self.ctx
    }

    pub fn session(&self) -> &Session {
        &self.ctx.session
    }

    pub fn sign_in(&self, identity: Identity) {
        tracing::info!(user_id = %identity.user_id, "signed in");
        self.ctx.session.sign_in(identity);
    }

    /// Sign out and drop every cached view model; they carry per-user flags.
    pub fn sign_out(&self) {
        self.ctx.session.sign_out();
        self.forums.posts().reset();
        self.forums.comments().reset();
        self.marketplace.listings().reset();
        self.marketplace.favorites().reset();
        self.marketplace.offers().reset();
        self.meets.meets().reset();
        self.garage.cars().reset();
        self.profiles.profiles().reset();
        self.search.clear();
        self.feed.items().reset();
        tracing::info!("signed out");
    }
}
