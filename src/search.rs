//! SearchStore - one term across people, listings and posts.

use serde::Serialize;

use crate::cache::{CacheStore, FetchOutcome, Keyed};
use crate::context::StoreContext;
use crate::domain::{ListingFilter, ListingView, PostFilter, PostView, ProfileSummary, UserRef};
use crate::error::{StoreError, StoreResult};
use crate::fetch::CollectionsExt;
use crate::query::Query;
use crate::stores::{load_listings, load_posts};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "item", rename_all = "lowercase")]
pub enum SearchHit {
    Profile(UserRef),
    Listing(ListingView),
    Post(PostView),
}

impl Keyed for SearchHit {
    fn key(&self) -> &str {
        match self {
            SearchHit::Profile(user) => &user.id,
            SearchHit::Listing(view) => &view.listing.id,
            SearchHit::Post(view) => &view.post.id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SearchHit::Profile(_) => "profile",
            SearchHit::Listing(_) => "listing",
            SearchHit::Post(_) => "post",
        }
    }
}

/// Search results for the latest term. Results of an older term that
/// complete late are discarded.
#[derive(Clone)]
pub struct SearchStore {
    ctx: StoreContext,
    hits: CacheStore<SearchHit>,
}

async fn run_search(ctx: &StoreContext, term: &str) -> StoreResult<Vec<SearchHit>> {
    let query = Query::new()
        .contains("username", term)
        .order_by("username", true)
        .limit(ctx.config.page_size);
    let people = ctx
        .backend()
        .collection::<ProfileSummary>()
        .select(&query)
        .await
        .map_err(StoreError::from)?;

    let listings = load_listings(
        ctx,
        &ListingFilter {
            search: Some(term.to_string()),
            ..ListingFilter::default()
        },
    )
    .await?;
    let posts = load_posts(
        ctx,
        &PostFilter {
            search: Some(term.to_string()),
            ..PostFilter::default()
        },
    )
    .await?;

    let mut hits: Vec<SearchHit> = people
        .iter()
        .map(|p| SearchHit::Profile(UserRef::resolve(&p.id, Some(p), &ctx.storage)))
        .collect();
    hits.extend(listings.into_iter().map(SearchHit::Listing));
    hits.extend(posts.into_iter().map(SearchHit::Post));
    Ok(hits)
}

impl SearchStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            hits: CacheStore::new("search"),
        }
    }

    pub fn hits(&self) -> &CacheStore<SearchHit> {
        &self.hits
    }

    /// Search usernames, listing titles and post titles. A blank term
    /// clears the results without a remote call.
    pub async fn search(&self, term: &str) -> StoreResult<FetchOutcome> {
        let term = term.trim();
        if term.is_empty() {
            self.hits.reset();
            return Ok(FetchOutcome::Applied { rows: 0 });
        }
        let result = self.hits.refresh(run_search(&self.ctx, term)).await;
        self.ctx.report_failure("search", result)
    }

    pub fn clear(&self) {
        self.hits.reset();
    }
}
