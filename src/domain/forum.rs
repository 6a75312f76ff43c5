use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Keyed;
use crate::Row;

/// A brand forum. Forums are cached as-is, so the row is its own view model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Row)]
#[row(collection = "forums")]
pub struct Forum {
    pub id: String,
    pub name: String,
    pub brand: Option<String>,
    pub description: Option<String>,
}

impl Keyed for Forum {
    fn key(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Row)]
#[row(collection = "posts")]
pub struct Post {
    pub id: String,
    pub forum_id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Row)]
#[row(collection = "post_likes")]
pub struct PostLike {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Row)]
#[row(collection = "comments")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub post: Post,
    pub author_name: String,
    pub forum_name: String,
    pub liked_by_me: bool,
}

impl Keyed for PostView {
    fn key(&self) -> &str {
        &self.post.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub comment: Comment,
    pub author_name: String,
}

impl Keyed for CommentView {
    fn key(&self) -> &str {
        &self.comment.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub forum_id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Which posts a fetch returns. The default is every forum, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub forum_id: Option<String>,
    pub author_id: Option<String>,
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
}

impl PostFilter {
    pub fn forum(forum_id: impl Into<String>) -> Self {
        Self {
            forum_id: Some(forum_id.into()),
            ..Self::default()
        }
    }

    /// Whether a fetch with this filter would return `post`.
    pub fn matches(&self, post: &Post) -> bool {
        self.forum_id.as_ref().map_or(true, |id| *id == post.forum_id)
            && self.author_id.as_ref().map_or(true, |id| *id == post.author_id)
            && super::title_matches(&post.title, self.search.as_deref())
    }
}
