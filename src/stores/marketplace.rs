use chrono::Utc;
use tracing::debug;

use super::{optimistic_create, optimistic_toggle, LastFilter};
use crate::cache::{CacheStore, FetchOutcome, Placement};
use crate::context::{require_text, StoreContext};
use crate::domain::{
    new_id, Favorite, Listing, ListingFilter, ListingPatch, ListingStatus, ListingView,
    NewListing, NewOffer, Offer, OfferStatus, OfferView, ProfileSummary, UserRef,
};
use crate::error::{StoreError, StoreResult};
use crate::fetch::CollectionsExt;
use crate::merge::{merge, merge_into, ANONYMOUS};
use crate::query::Query;
use crate::resolve::{or_empty, resolve, resolve_grouped, ForeignKeySet, LookupMap};
use crate::storage::LISTING_IMAGES;

/// Marketplace listings, the signed-in user's favorites and the offers on
/// one listing.
#[derive(Clone)]
pub struct MarketplaceStore {
    ctx: StoreContext,
    listings: CacheStore<ListingView>,
    favorites: CacheStore<ListingView>,
    offers: CacheStore<OfferView>,
    listing_filter: LastFilter<ListingFilter>,
    offers_of: LastFilter<Option<String>>,
}

/// Listings matching `filter`, with seller, image URL and "favorited by me".
pub async fn load_listings(
    ctx: &StoreContext,
    filter: &ListingFilter,
) -> StoreResult<Vec<ListingView>> {
    let mut query = Query::new()
        .order_by("created_at", false)
        .limit(ctx.config.page_size);
    if let Some(seller_id) = &filter.seller_id {
        query = query.eq("seller_id", seller_id.as_str());
    }
    if let Some(status) = filter.status {
        query = query.eq("status", status.as_str());
    }
    if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
        query = query.contains("title", term);
    }
    if let Some(min) = filter.min_price {
        query = query.gte("price", min);
    }
    if let Some(max) = filter.max_price {
        query = query.lte("price", max);
    }

    let listings = ctx.backend().collection::<Listing>().select(&query).await?;
    Ok(listing_views(ctx, listings).await)
}

/// Resolve sellers and favorites for already fetched listings.
async fn listing_views(ctx: &StoreContext, listings: Vec<Listing>) -> Vec<ListingView> {
    let backend = ctx.backend();

    let sellers: LookupMap<ProfileSummary> = or_empty(
        resolve(backend, &listings, "seller_id", |l| Some(l.seller_id.as_str())).await,
        "listings.seller_id",
    );
    let favorites: LookupMap<Vec<Favorite>> = match ctx.user_id() {
        Some(user_id) => {
            let keys = ForeignKeySet::collect(&listings, |l| Some(l.id.as_str()));
            let scope = Query::new().eq("user_id", user_id);
            or_empty(
                resolve_grouped(backend, &keys, "listing_id", scope, |f: &Favorite| {
                    f.listing_id.as_str()
                })
                .await,
                "favorites.listing_id",
            )
        }
        None => LookupMap::new(),
    };

    let views = merge(
        &listings,
        &sellers,
        |l| Some(l.seller_id.as_str()),
        |listing, seller| ListingView {
            listing: listing.clone(),
            seller: UserRef::resolve(&listing.seller_id, seller, &ctx.storage),
            image_url: ctx
                .storage
                .optional_url(LISTING_IMAGES, listing.image_path.as_deref()),
            is_favorited: false,
        },
    );
    merge_into(views, &favorites, |v| Some(v.listing.id.clone()), |v, favs| {
        v.is_favorited = favs.is_some_and(|rows| !rows.is_empty());
    })
}

async fn load_favorites(ctx: &StoreContext, user_id: &str) -> StoreResult<Vec<ListingView>> {
    let backend = ctx.backend();
    let favorites = backend
        .collection::<Favorite>()
        .select(&Query::new().eq("user_id", user_id))
        .await?;
    let keys = ForeignKeySet::collect(&favorites, |f| Some(f.listing_id.as_str()));
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let query = Query::new()
        .in_list("id", keys.as_slice().iter().cloned())
        .order_by("created_at", false);
    let listings = backend.collection::<Listing>().select(&query).await?;
    Ok(listing_views(ctx, listings).await)
}

async fn load_offers(ctx: &StoreContext, listing_id: &str) -> StoreResult<Vec<OfferView>> {
    let backend = ctx.backend();
    let query = Query::new()
        .eq("listing_id", listing_id)
        .order_by("created_at", false);
    let offers = backend.collection::<Offer>().select(&query).await?;

    let buyers: LookupMap<ProfileSummary> = or_empty(
        resolve(backend, &offers, "buyer_id", |o| Some(o.buyer_id.as_str())).await,
        "offers.buyer_id",
    );
    Ok(merge(&offers, &buyers, |o| Some(o.buyer_id.as_str()), |offer, buyer| OfferView {
        offer: offer.clone(),
        buyer_name: buyer.map_or_else(|| ANONYMOUS.to_string(), |b| b.username.clone()),
    }))
}

fn validate_price(price: f64) -> StoreResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(StoreError::Invalid("price must be zero or more".into()));
    }
    Ok(())
}

impl MarketplaceStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            listings: CacheStore::new("listings"),
            favorites: CacheStore::new("favorites"),
            offers: CacheStore::new("offers"),
            listing_filter: LastFilter::new(ListingFilter::default()),
            offers_of: LastFilter::new(None),
        }
    }

    pub fn listings(&self) -> &CacheStore<ListingView> {
        &self.listings
    }

    pub fn favorites(&self) -> &CacheStore<ListingView> {
        &self.favorites
    }

    pub fn offers(&self) -> &CacheStore<OfferView> {
        &self.offers
    }

    // ------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------

    pub async fn fetch_listings(&self, filter: ListingFilter) -> StoreResult<FetchOutcome> {
        self.listing_filter.set(filter.clone());
        let result = self.listings.refresh(load_listings(&self.ctx, &filter)).await;
        self.ctx.report_failure("fetch_listings", result)
    }

    /// Listings the signed-in user favorited.
    pub async fn fetch_favorites(&self) -> StoreResult<FetchOutcome> {
        let result = match self.ctx.require_user() {
            Ok(user) => {
                self.favorites
                    .refresh(load_favorites(&self.ctx, &user.user_id))
                    .await
            }
            Err(err) => Err(err),
        };
        self.ctx.report_failure("fetch_favorites", result)
    }

    pub async fn fetch_offers(&self, listing_id: &str) -> StoreResult<FetchOutcome> {
        self.offers_of.set(Some(listing_id.to_string()));
        let result = self.offers.refresh(load_offers(&self.ctx, listing_id)).await;
        self.ctx.report_failure("fetch_offers", result)
    }

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------

    pub async fn create_listing(&self, input: NewListing) -> StoreResult<ListingView> {
        let result = self.create_listing_inner(input).await;
        let result = self.ctx.report("create_listing", "Listing published", result);
        if result.is_ok() && self.ctx.config.reconcile_after_write {
            let _ = self.fetch_listings(self.listing_filter.get()).await;
        }
        result
    }

    async fn create_listing_inner(&self, input: NewListing) -> StoreResult<ListingView> {
        let user = self.ctx.require_user()?;
        require_text("title", &input.title)?;
        validate_price(input.price)?;

        let listing = Listing {
            id: new_id(),
            seller_id: user.user_id.clone(),
            car_id: input.car_id,
            title: input.title.trim().to_string(),
            description: input.description,
            price: input.price,
            location: input.location,
            status: ListingStatus::Active,
            image_path: input.image_path,
            created_at: Utc::now(),
        };
        let provisional = ListingView {
            seller: UserRef {
                id: user.user_id,
                username: user.username,
                avatar_url: None,
            },
            image_url: self
                .ctx
                .storage
                .optional_url(LISTING_IMAGES, listing.image_path.as_deref()),
            is_favorited: false,
            listing,
        };

        let shown = self.listing_filter.get().matches(&provisional.listing);
        let placement = shown.then_some(Placement::Front);
        let backend = self.ctx.backend();
        let template = provisional.clone();
        optimistic_create(&self.listings, provisional, placement, async move {
            let stored = backend.collection::<Listing>().insert(&template.listing).await?;
            Ok::<_, StoreError>(ListingView {
                listing: stored,
                ..template
            })
        })
        .await
    }

    pub async fn update_listing(&self, id: &str, patch: ListingPatch) -> StoreResult<ListingView> {
        let result = self.update_listing_inner(id, patch).await;
        self.ctx.report("update_listing", "Listing updated", result)
    }

    /// Mark a listing sold. Sold listings stay cached until the next fetch.
    pub async fn mark_sold(&self, id: &str) -> StoreResult<ListingView> {
        let patch = ListingPatch {
            status: Some(ListingStatus::Sold),
            ..ListingPatch::default()
        };
        let result = self.update_listing_inner(id, patch).await;
        self.ctx.report("mark_sold", "Listing marked as sold", result)
    }

    async fn update_listing_inner(&self, id: &str, patch: ListingPatch) -> StoreResult<ListingView> {
        self.ctx.require_user()?;
        if let Some(title) = &patch.title {
            require_text("title", title)?;
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }

        let backend = self.ctx.backend();
        let stored = self
            .listings
            .mutate(async {
                backend
                    .collection::<Listing>()
                    .update(id, &patch)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;

        let image_url = self
            .ctx
            .storage
            .optional_url(LISTING_IMAGES, stored.image_path.as_deref());
        let view = match self.listings.get(id) {
            Some(cached) => ListingView {
                listing: stored,
                image_url,
                ..cached
            },
            None => ListingView {
                seller: UserRef::resolve(&stored.seller_id, None, &self.ctx.storage),
                listing: stored,
                image_url,
                is_favorited: false,
            },
        };
        self.listings.replace(view.clone());
        self.favorites.replace(view.clone());
        Ok(view)
    }

    pub async fn delete_listing(&self, id: &str) -> StoreResult<()> {
        let result = self.delete_listing_inner(id).await;
        self.ctx.report("delete_listing", "Listing deleted", result)
    }

    async fn delete_listing_inner(&self, id: &str) -> StoreResult<()> {
        self.ctx.require_user()?;
        let backend = self.ctx.backend();
        self.listings
            .mutate(async {
                backend
                    .collection::<Listing>()
                    .delete(id)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;
        self.listings.remove(id);
        self.favorites.remove(id);
        Ok(())
    }

    /// Favorite or unfavorite a cached listing; returns whether it is now a
    /// favorite. The favorites cache follows the listing.
    pub async fn toggle_favorite(&self, listing_id: &str) -> StoreResult<bool> {
        let result = self.toggle_favorite_inner(listing_id).await;
        let message = match &result {
            Ok(true) => "Added to favorites",
            _ => "Removed from favorites",
        };
        self.ctx.report("toggle_favorite", message, result)
    }

    async fn toggle_favorite_inner(&self, listing_id: &str) -> StoreResult<bool> {
        let user = self.ctx.require_user()?;
        let backend = self.ctx.backend();

        // A listing shown only under favorites can be unfavorited from there.
        let in_listings = self.listings.contains(listing_id);
        let cache = if in_listings {
            &self.listings
        } else {
            &self.favorites
        };

        let remote = |view: ListingView| async move {
            let favorites = backend.collection::<Favorite>();
            if view.is_favorited {
                let favorite = Favorite {
                    id: new_id(),
                    listing_id: view.listing.id.clone(),
                    user_id: user.user_id.clone(),
                };
                favorites.insert(&favorite).await?;
            } else {
                let query = Query::new()
                    .eq("listing_id", view.listing.id.as_str())
                    .eq("user_id", user.user_id.as_str());
                favorites.delete_where(&query).await?;
            }
            Ok::<_, StoreError>(())
        };

        let flip = |view: &mut ListingView| view.is_favorited = !view.is_favorited;
        let view = optimistic_toggle(cache, listing_id, flip, remote).await?;

        if view.is_favorited {
            self.favorites.insert(view.clone(), Placement::Front);
        } else {
            self.favorites.remove(listing_id);
        }
        debug!(listing_id, favorited = view.is_favorited, in_listings, "favorite toggled");
        Ok(view.is_favorited)
    }

    // ------------------------------------------------------------------
    // Offers
    // ------------------------------------------------------------------

    /// Offer on someone else's listing. The amount must be positive.
    pub async fn make_offer(&self, input: NewOffer) -> StoreResult<OfferView> {
        let result = self.make_offer_inner(input).await;
        let result = self.ctx.report("make_offer", "Offer sent", result);
        if result.is_ok() && self.ctx.config.reconcile_after_write {
            if let Some(current) = self.offers_of.get() {
                let _ = self.fetch_offers(&current).await;
            }
        }
        result
    }

    async fn make_offer_inner(&self, input: NewOffer) -> StoreResult<OfferView> {
        let user = self.ctx.require_user()?;
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(StoreError::Invalid("offer amount must be positive".into()));
        }

        let seller_id = match self.listings.get(&input.listing_id) {
            Some(view) => view.listing.seller_id,
            None => {
                self.ctx
                    .backend()
                    .collection::<Listing>()
                    .get(&input.listing_id)
                    .await?
                    .seller_id
            }
        };
        if seller_id == user.user_id {
            return Err(StoreError::Invalid(
                "you cannot make an offer on your own listing".into(),
            ));
        }

        let provisional = OfferView {
            offer: Offer {
                id: new_id(),
                listing_id: input.listing_id,
                buyer_id: user.user_id,
                amount: input.amount,
                message: input.message,
                status: OfferStatus::Pending,
                created_at: Utc::now(),
            },
            buyer_name: user.username,
        };

        // Only listings whose offers are on screen show the new offer.
        let showing = self.offers_of.get().as_deref() == Some(provisional.offer.listing_id.as_str());
        let backend = self.ctx.backend();
        let template = provisional.clone();
        let remote = async move {
            let stored = backend.collection::<Offer>().insert(&template.offer).await?;
            Ok::<_, StoreError>(OfferView {
                offer: stored,
                ..template
            })
        };
        let placement = showing.then_some(Placement::Front);
        optimistic_create(&self.offers, provisional, placement, remote).await
    }

    /// Accept or decline an offer on one of the signed-in user's listings.
    pub async fn respond_to_offer(&self, offer_id: &str, accept: bool) -> StoreResult<OfferView> {
        let result = self.respond_to_offer_inner(offer_id, accept).await;
        let message = if accept { "Offer accepted" } else { "Offer declined" };
        self.ctx.report("respond_to_offer", message, result)
    }

    async fn respond_to_offer_inner(&self, offer_id: &str, accept: bool) -> StoreResult<OfferView> {
        self.ctx.require_user()?;
        let status = if accept {
            OfferStatus::Accepted
        } else {
            OfferStatus::Declined
        };
        let patch = serde_json::json!({ "status": status });

        let backend = self.ctx.backend();
        let stored = self
            .offers
            .mutate(async {
                backend
                    .collection::<Offer>()
                    .update(offer_id, &patch)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;

        let view = match self.offers.get(offer_id) {
            Some(cached) => OfferView {
                offer: stored,
                ..cached
            },
            None => OfferView {
                offer: stored,
                buyer_name: ANONYMOUS.to_string(),
            },
        };
        self.offers.replace(view.clone());
        Ok(view)
    }
}
