use serde::{Deserialize, Serialize};

use crate::cache::Keyed;
use crate::merge::ANONYMOUS;
use crate::storage::{StorageUrls, AVATARS};
use crate::Row;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Row)]
#[row(collection = "profiles")]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_path: Option<String>,
}

/// The slice of a profile embedded in other view models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Row)]
#[row(collection = "profiles")]
pub struct ProfileSummary {
    pub id: String,
    pub username: String,
    pub avatar_path: Option<String>,
}

/// A person as shown next to content they own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl UserRef {
    /// Build from a resolved summary; a missing profile reads as anonymous.
    pub fn resolve(id: &str, summary: Option<&ProfileSummary>, storage: &StorageUrls) -> Self {
        match summary {
            Some(summary) => Self {
                id: summary.id.clone(),
                username: summary.username.clone(),
                avatar_url: storage.optional_url(AVATARS, summary.avatar_path.as_deref()),
            },
            None => Self {
                id: id.to_string(),
                username: ANONYMOUS.to_string(),
                avatar_url: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub profile: Profile,
    pub avatar_url: Option<String>,
    pub car_count: usize,
    pub listing_count: usize,
}

impl Keyed for ProfileView {
    fn key(&self) -> &str {
        &self.profile.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_path: Option<String>,
}
