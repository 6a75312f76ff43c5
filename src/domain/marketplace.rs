use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::UserRef;
use crate::cache::Keyed;
use crate::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
#[row(collection = "listings")]
pub struct Listing {
    pub id: String,
    pub seller_id: String,
    pub car_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub location: Option<String>,
    pub status: ListingStatus,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Row)]
#[row(collection = "favorites")]
pub struct Favorite {
    pub id: String,
    pub listing_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
#[row(collection = "offers")]
pub struct Offer {
    pub id: String,
    pub listing_id: String,
    pub buyer_id: String,
    pub amount: f64,
    pub message: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingView {
    pub listing: Listing,
    pub seller: UserRef,
    pub image_url: Option<String>,
    pub is_favorited: bool,
}

impl Keyed for ListingView {
    fn key(&self) -> &str {
        &self.listing.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferView {
    pub offer: Offer,
    pub buyer_name: String,
}

impl Keyed for OfferView {
    fn key(&self) -> &str {
        &self.offer.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub car_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub location: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOffer {
    pub listing_id: String,
    pub amount: f64,
    pub message: Option<String>,
}

/// Which listings a fetch returns. The default is active listings, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFilter {
    pub seller_id: Option<String>,
    /// `None` returns every status.
    pub status: Option<ListingStatus>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            seller_id: None,
            status: Some(ListingStatus::Active),
            search: None,
            min_price: None,
            max_price: None,
        }
    }
}

impl ListingFilter {
    /// Whether a fetch with this filter would return `listing`.
    pub fn matches(&self, listing: &Listing) -> bool {
        self.seller_id.as_ref().map_or(true, |id| *id == listing.seller_id)
            && self.status.map_or(true, |status| status == listing.status)
            && self.min_price.map_or(true, |min| listing.price >= min)
            && self.max_price.map_or(true, |max| listing.price <= max)
            && super::title_matches(&listing.title, self.search.as_deref())
    }
}
