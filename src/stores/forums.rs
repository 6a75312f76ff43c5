use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use super::{optimistic_create, optimistic_toggle, LastFilter};
use crate::cache::{CacheStore, FetchOutcome, Placement};
use crate::context::{require_text, StoreContext};
use crate::domain::{
    new_id, Comment, CommentView, Forum, NewPost, Post, PostFilter, PostLike, PostPatch, PostView,
    ProfileSummary,
};
use crate::error::{StoreError, StoreResult};
use crate::fetch::CollectionsExt;
use crate::merge::{merge, merge_into, ANONYMOUS, UNKNOWN};
use crate::query::Query;
use crate::resolve::{or_empty, resolve, resolve_grouped, ForeignKeySet, LookupMap};

/// Forums, their posts and the comments of one post.
#[derive(Clone)]
pub struct ForumsStore {
    ctx: StoreContext,
    forums: CacheStore<Forum>,
    posts: CacheStore<PostView>,
    comments: CacheStore<CommentView>,
    post_filter: LastFilter<PostFilter>,
    comments_of: LastFilter<Option<String>>,
}

/// Posts matching `filter`, with author, forum name and "liked by me".
///
/// Author and forum lookups degrade to defaults when they fail; only the
/// primary fetch can fail the pipeline.
pub async fn load_posts(ctx: &StoreContext, filter: &PostFilter) -> StoreResult<Vec<PostView>> {
    let backend = ctx.backend();

    let mut query = Query::new()
        .order_by("created_at", false)
        .limit(ctx.config.page_size);
    if let Some(forum_id) = &filter.forum_id {
        query = query.eq("forum_id", forum_id.as_str());
    }
    if let Some(author_id) = &filter.author_id {
        query = query.eq("author_id", author_id.as_str());
    }
    if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
        query = query.contains("title", term);
    }
    let posts = backend.collection::<Post>().select(&query).await?;

    let authors: LookupMap<ProfileSummary> = or_empty(
        resolve(backend, &posts, "author_id", |p| Some(p.author_id.as_str())).await,
        "posts.author_id",
    );
    let forums: LookupMap<Forum> = or_empty(
        resolve(backend, &posts, "forum_id", |p| Some(p.forum_id.as_str())).await,
        "posts.forum_id",
    );
    let likes: LookupMap<Vec<PostLike>> = match ctx.user_id() {
        Some(user_id) => {
            let keys = ForeignKeySet::collect(&posts, |p| Some(p.id.as_str()));
            let scope = Query::new().eq("user_id", user_id);
            or_empty(
                resolve_grouped(backend, &keys, "post_id", scope, |l: &PostLike| l.post_id.as_str()).await,
                "post_likes.post_id",
            )
        }
        None => LookupMap::new(),
    };

    let views = merge(&posts, &authors, |p| Some(p.author_id.as_str()), |post, author| PostView {
        post: post.clone(),
        author_name: author.map_or_else(|| ANONYMOUS.to_string(), |a| a.username.clone()),
        forum_name: UNKNOWN.to_string(),
        liked_by_me: false,
    });
    let views = merge_into(views, &forums, |v| Some(v.post.forum_id.clone()), |v, forum| {
        v.forum_name = forum.map_or_else(|| UNKNOWN.to_string(), |f| f.name.clone());
    });
    Ok(merge_into(views, &likes, |v| Some(v.post.id.clone()), |v, liked| {
        v.liked_by_me = liked.is_some_and(|rows| !rows.is_empty());
    }))
}

async fn load_comments(ctx: &StoreContext, post_id: &str) -> StoreResult<Vec<CommentView>> {
    let backend = ctx.backend();
    let query = Query::new()
        .eq("post_id", post_id)
        .order_by("created_at", true)
        .limit(ctx.config.page_size);
    let comments = backend.collection::<Comment>().select(&query).await?;

    let authors: LookupMap<ProfileSummary> = or_empty(
        resolve(backend, &comments, "author_id", |c| Some(c.author_id.as_str())).await,
        "comments.author_id",
    );
    Ok(merge(&comments, &authors, |c| Some(c.author_id.as_str()), |comment, author| {
        CommentView {
            comment: comment.clone(),
            author_name: author.map_or_else(|| ANONYMOUS.to_string(), |a| a.username.clone()),
        }
    }))
}

impl ForumsStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            forums: CacheStore::new("forums"),
            posts: CacheStore::new("posts"),
            comments: CacheStore::new("comments"),
            post_filter: LastFilter::new(PostFilter::default()),
            comments_of: LastFilter::new(None),
        }
    }

    pub fn forums(&self) -> &CacheStore<Forum> {
        &self.forums
    }

    pub fn posts(&self) -> &CacheStore<PostView> {
        &self.posts
    }

    pub fn comments(&self) -> &CacheStore<CommentView> {
        &self.comments
    }

    // ------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------

    pub async fn fetch_forums(&self) -> StoreResult<FetchOutcome> {
        let backend = self.ctx.backend();
        let pipeline = async {
            let query = Query::new().order_by("name", true);
            backend.collection::<Forum>().select(&query).await.map_err(StoreError::from)
        };
        let result = self.forums.refresh(pipeline).await;
        self.ctx.report_failure("fetch_forums", result)
    }

    pub async fn fetch_posts(&self, filter: PostFilter) -> StoreResult<FetchOutcome> {
        self.post_filter.set(filter.clone());
        let result = self.posts.refresh(load_posts(&self.ctx, &filter)).await;
        self.ctx.report_failure("fetch_posts", result)
    }

    pub async fn fetch_comments(&self, post_id: &str) -> StoreResult<FetchOutcome> {
        self.comments_of.set(Some(post_id.to_string()));
        let result = self.comments.refresh(load_comments(&self.ctx, post_id)).await;
        self.ctx.report_failure("fetch_comments", result)
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    pub async fn create_post(&self, input: NewPost) -> StoreResult<PostView> {
        let result = self.create_post_inner(input).await;
        let result = self.ctx.report("create_post", "Post published", result);
        if result.is_ok() && self.ctx.config.reconcile_after_write {
            let _ = self.fetch_posts(self.post_filter.get()).await;
        }
        result
    }

    async fn create_post_inner(&self, input: NewPost) -> StoreResult<PostView> {
        let user = self.ctx.require_user()?;
        require_text("title", &input.title)?;
        require_text("content", &input.content)?;
        require_text("forum", &input.forum_id)?;

        let post = Post {
            id: new_id(),
            forum_id: input.forum_id,
            author_id: user.user_id,
            title: input.title.trim().to_string(),
            content: input.content,
            likes_count: 0,
            created_at: Utc::now(),
        };
        let provisional = PostView {
            forum_name: self
                .forums
                .get(&post.forum_id)
                .map_or_else(|| UNKNOWN.to_string(), |f| f.name),
            author_name: user.username,
            liked_by_me: false,
            post,
        };

        let shown = self.post_filter.get().matches(&provisional.post);
        let placement = shown.then_some(Placement::Front);
        let backend = self.ctx.backend();
        let template = provisional.clone();
        optimistic_create(&self.posts, provisional, placement, async move {
            let stored = backend.collection::<Post>().insert(&template.post).await?;
            Ok::<_, StoreError>(PostView { post: stored, ..template })
        })
        .await
    }

    pub async fn update_post(&self, id: &str, patch: PostPatch) -> StoreResult<PostView> {
        let result = self.update_post_inner(id, patch).await;
        self.ctx.report("update_post", "Post updated", result)
    }

    async fn update_post_inner(&self, id: &str, patch: PostPatch) -> StoreResult<PostView> {
        self.ctx.require_user()?;
        if let Some(title) = &patch.title {
            require_text("title", title)?;
        }

        let backend = self.ctx.backend();
        let stored = self
            .posts
            .mutate(async {
                backend
                    .collection::<Post>()
                    .update(id, &patch)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;

        let view = match self.posts.get(id) {
            Some(cached) => PostView { post: stored, ..cached },
            None => PostView {
                post: stored,
                author_name: ANONYMOUS.to_string(),
                forum_name: UNKNOWN.to_string(),
                liked_by_me: false,
            },
        };
        self.posts.replace(view.clone());
        Ok(view)
    }

    pub async fn delete_post(&self, id: &str) -> StoreResult<()> {
        let result = self.delete_post_inner(id).await;
        self.ctx.report("delete_post", "Post deleted", result)
    }

    async fn delete_post_inner(&self, id: &str) -> StoreResult<()> {
        self.ctx.require_user()?;
        let backend = self.ctx.backend();
        self.posts
            .mutate(async {
                backend
                    .collection::<Post>()
                    .delete(id)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;
        self.posts.remove(id);
        Ok(())
    }

    /// Like or unlike a cached post; returns whether it is now liked.
    pub async fn toggle_like(&self, post_id: &str) -> StoreResult<bool> {
        let result = self.toggle_like_inner(post_id).await;
        let message = match &result {
            Ok(true) => "Post liked",
            _ => "Like removed",
        };
        self.ctx.report("toggle_like", message, result)
    }

    async fn toggle_like_inner(&self, post_id: &str) -> StoreResult<bool> {
        let user = self.ctx.require_user()?;
        let backend = self.ctx.backend();

        let flip = |view: &mut PostView| {
            view.liked_by_me = !view.liked_by_me;
            view.post.likes_count += if view.liked_by_me { 1 } else { -1 };
            view.post.likes_count = view.post.likes_count.max(0);
        };
        let remote = |view: PostView| async move {
            let likes = backend.collection::<PostLike>();
            if view.liked_by_me {
                let like = PostLike {
                    id: new_id(),
                    post_id: view.post.id.clone(),
                    user_id: user.user_id.clone(),
                };
                likes.insert(&like).await?;
            } else {
                let query = Query::new()
                    .eq("post_id", view.post.id.as_str())
                    .eq("user_id", user.user_id.as_str());
                likes.delete_where(&query).await?;
            }

            // The join row is the source of truth; the counter is best effort.
            let counter = json!({ "likes_count": view.post.likes_count });
            if let Err(err) = backend.collection::<Post>().update(&view.post.id, &counter).await {
                warn!(post_id = %view.post.id, error = %err, "likes_count update failed");
            }
            Ok::<_, StoreError>(())
        };

        let view = optimistic_toggle(&self.posts, post_id, flip, remote).await?;
        debug!(post_id, liked = view.liked_by_me, "like toggled");
        Ok(view.liked_by_me)
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    pub async fn add_comment(&self, post_id: &str, content: &str) -> StoreResult<CommentView> {
        let result = self.add_comment_inner(post_id, content).await;
        let result = self.ctx.report("add_comment", "Comment added", result);
        if result.is_ok() && self.ctx.config.reconcile_after_write {
            if let Some(current) = self.comments_of.get() {
                let _ = self.fetch_comments(&current).await;
            }
        }
        result
    }

    async fn add_comment_inner(&self, post_id: &str, content: &str) -> StoreResult<CommentView> {
        let user = self.ctx.require_user()?;
        require_text("comment", content)?;

        let provisional = CommentView {
            comment: Comment {
                id: new_id(),
                post_id: post_id.to_string(),
                author_id: user.user_id,
                content: content.trim().to_string(),
                created_at: Utc::now(),
            },
            author_name: user.username,
        };

        // Comments are shown oldest first, for one post at a time.
        let shown = self.comments_of.get().as_deref() == Some(post_id);
        let placement = shown.then_some(Placement::Back);
        let backend = self.ctx.backend();
        let template = provisional.clone();
        optimistic_create(&self.comments, provisional, placement, async move {
            let stored = backend.collection::<Comment>().insert(&template.comment).await?;
            Ok::<_, StoreError>(CommentView { comment: stored, ..template })
        })
        .await
    }

    pub async fn delete_comment(&self, id: &str) -> StoreResult<()> {
        let result = self.delete_comment_inner(id).await;
        self.ctx.report("delete_comment", "Comment deleted", result)
    }

    async fn delete_comment_inner(&self, id: &str) -> StoreResult<()> {
        self.ctx.require_user()?;
        let backend = self.ctx.backend();
        self.comments
            .mutate(async {
                backend
                    .collection::<Comment>()
                    .delete(id)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;
        self.comments.remove(id);
        Ok(())
    }
}
