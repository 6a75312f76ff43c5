//! Row shapes per collection and the view models built from them.

mod car;
mod forum;
mod marketplace;
mod meet;
mod profile;

pub use car::{Car, CarPatch, CarView, NewCar};
pub use forum::{Comment, CommentView, Forum, NewPost, Post, PostFilter, PostLike, PostPatch, PostView};
pub use marketplace::{
    Favorite, Listing, ListingFilter, ListingPatch, ListingStatus, ListingView, NewListing,
    NewOffer, Offer, OfferStatus, OfferView,
};
pub use meet::{Meet, MeetAttendee, MeetFilter, MeetPatch, MeetView, NewMeet};
pub use profile::{Profile, ProfilePatch, ProfileSummary, ProfileView, UserRef};

/// Fresh client-side id for rows created by this client.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Case-insensitive substring match; a blank or absent term matches all.
pub(crate) fn title_matches(title: &str, term: Option<&str>) -> bool {
    match term.map(str::trim).filter(|t| !t.is_empty()) {
        Some(term) => title.to_lowercase().contains(&term.to_lowercase()),
        None => true,
    }
}
