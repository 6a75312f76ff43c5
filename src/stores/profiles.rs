use crate::cache::{CacheStore, Placement};
use crate::context::{require_text, StoreContext};
use crate::domain::{Car, Listing, Profile, ProfilePatch, ProfileView};
use crate::error::{StoreError, StoreResult};
use crate::fetch::CollectionsExt;
use crate::query::Query;
use crate::resolve::{or_empty, resolve_grouped, ForeignKeySet, LookupMap};
use crate::storage::AVATARS;

/// Profiles that have been opened, with avatar URL and activity counts.
#[derive(Clone)]
pub struct ProfileStore {
    ctx: StoreContext,
    profiles: CacheStore<ProfileView>,
}

async fn load_profile(ctx: &StoreContext, user_id: &str) -> StoreResult<ProfileView> {
    let backend = ctx.backend();
    let profile = backend.collection::<Profile>().get(user_id).await?;

    let keys = ForeignKeySet::collect(std::slice::from_ref(&profile), |p| Some(p.id.as_str()));
    let cars: LookupMap<Vec<Car>> = or_empty(
        resolve_grouped(backend, &keys, "owner_id", Query::new(), |c: &Car| c.owner_id.as_str()).await,
        "cars.owner_id",
    );
    let listings: LookupMap<Vec<Listing>> = or_empty(
        resolve_grouped(backend, &keys, "seller_id", Query::new(), |l: &Listing| {
            l.seller_id.as_str()
        })
        .await,
        "listings.seller_id",
    );

    Ok(ProfileView {
        avatar_url: ctx.storage.optional_url(AVATARS, profile.avatar_path.as_deref()),
        car_count: cars.count(&profile.id),
        listing_count: listings.count(&profile.id),
        profile,
    })
}

impl ProfileStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            profiles: CacheStore::new("profiles"),
        }
    }

    pub fn profiles(&self) -> &CacheStore<ProfileView> {
        &self.profiles
    }

    pub fn get(&self, user_id: &str) -> Option<ProfileView> {
        self.profiles.get(user_id)
    }

    /// Load one profile into the cache, keeping other loaded profiles.
    ///
    /// A missing profile is `NotFound`. Only a newer load of the same user
    /// supersedes this one in the cache; the caller still gets its result.
    pub async fn load(&self, user_id: &str) -> StoreResult<ProfileView> {
        let ticket = self.profiles.begin_item_fetch(user_id);
        let result = load_profile(&self.ctx, user_id).await;
        let _ = self
            .profiles
            .finish_item_fetch(user_id, ticket, result.clone(), Placement::Front);
        self.ctx.report_failure("load_profile", result)
    }

    pub async fn update_own_profile(&self, patch: ProfilePatch) -> StoreResult<ProfileView> {
        let result = self.update_own_profile_inner(patch).await;
        self.ctx.report("update_profile", "Profile updated", result)
    }

    async fn update_own_profile_inner(&self, patch: ProfilePatch) -> StoreResult<ProfileView> {
        let user = self.ctx.require_user()?;
        if let Some(username) = &patch.username {
            require_text("username", username)?;
        }

        let backend = self.ctx.backend();
        let stored = self
            .profiles
            .mutate(async {
                backend
                    .collection::<Profile>()
                    .update(&user.user_id, &patch)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;

        let avatar_url = self
            .ctx
            .storage
            .optional_url(AVATARS, stored.avatar_path.as_deref());
        let view = match self.profiles.get(&user.user_id) {
            Some(cached) => ProfileView {
                profile: stored,
                avatar_url,
                ..cached
            },
            None => ProfileView {
                profile: stored,
                avatar_url,
                car_count: 0,
                listing_count: 0,
            },
        };
        if !self.profiles.replace(view.clone()) {
            self.profiles.insert(view.clone(), Placement::Front);
        }
        Ok(view)
    }
}
