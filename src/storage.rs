//! Public URLs for stored objects.
//!
//! Uploading, listing and deleting objects is left to the backend SDK; the
//! data layer only needs to turn a `(bucket, path)` pair into a URL.

use serde::{Deserialize, Serialize};

pub const AVATARS: &str = "avatars";
pub const CAR_IMAGES: &str = "car-images";
pub const LISTING_IMAGES: &str = "listing-images";

/// An object addressed by bucket and path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub path: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
        }
    }
}

/// Resolves objects to public URLs under a storage base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUrls {
    base: String,
}

impl StorageUrls {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/storage/v1/object/public/{bucket}/{path}`. Pure and infallible.
    pub fn public_url(&self, object: &ObjectRef) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base,
            object.bucket.trim_matches('/'),
            object.path.trim_start_matches('/')
        )
    }

    /// Public URL for an optional path in `bucket`; blank paths give `None`.
    pub fn optional_url(&self, bucket: &str, path: Option<&str>) -> Option<String> {
        path.map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| self.public_url(&ObjectRef::new(bucket, p)))
    }
}
