//! HomeFeed - recent posts, active listings and upcoming meets in one list.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{CacheStore, FetchOutcome, Keyed};
use crate::context::StoreContext;
use crate::domain::{ListingFilter, ListingView, MeetFilter, MeetView, PostFilter, PostView};
use crate::error::StoreResult;
use crate::stores::{load_listings, load_meets, load_posts};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "item", rename_all = "lowercase")]
pub enum FeedItem {
    Post(PostView),
    Listing(ListingView),
    Meet(MeetView),
}

impl FeedItem {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            FeedItem::Post(view) => view.post.created_at,
            FeedItem::Listing(view) => view.listing.created_at,
            FeedItem::Meet(view) => view.meet.created_at,
        }
    }
}

impl Keyed for FeedItem {
    fn key(&self) -> &str {
        match self {
            FeedItem::Post(view) => &view.post.id,
            FeedItem::Listing(view) => &view.listing.id,
            FeedItem::Meet(view) => &view.meet.id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FeedItem::Post(_) => "post",
            FeedItem::Listing(_) => "listing",
            FeedItem::Meet(_) => "meet",
        }
    }
}

/// Newest first. Stable, so equal timestamps keep their merge order.
pub fn sort_newest_first(items: &mut [FeedItem]) {
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

async fn load_feed(ctx: &StoreContext) -> StoreResult<Vec<FeedItem>> {
    let posts = load_posts(ctx, &PostFilter::default()).await?;
    let listings = load_listings(ctx, &ListingFilter::default()).await?;
    let meets = load_meets(ctx, &MeetFilter::upcoming()).await?;

    let mut items: Vec<FeedItem> = posts.into_iter().map(FeedItem::Post).collect();
    items.extend(listings.into_iter().map(FeedItem::Listing));
    items.extend(meets.into_iter().map(FeedItem::Meet));
    sort_newest_first(&mut items);
    items.truncate(ctx.config.page_size);
    Ok(items)
}

#[derive(Clone)]
pub struct HomeFeed {
    ctx: StoreContext,
    items: CacheStore<FeedItem>,
}

impl HomeFeed {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            items: CacheStore::new("feed"),
        }
    }

    pub fn items(&self) -> &CacheStore<FeedItem> {
        &self.items
    }

    pub async fn load(&self) -> StoreResult<FetchOutcome> {
        let result = self.items.refresh(load_feed(&self.ctx)).await;
        self.ctx.report_failure("load_feed", result)
    }
}
