use carsocial::domain::{ListingFilter, ListingPatch, ListingStatus, NewListing, NewOffer, OfferStatus};
use carsocial::{ErrorKind, Op, StoreError};

use crate::support::{world, ALICE, BOB};

fn offer(listing_id: &str, amount: f64) -> NewOffer {
    NewOffer {
        listing_id: listing_id.into(),
        amount,
        message: Some("Cash today".into()),
    }
}

#[tokio::test]
async fn listings_carry_seller_images_and_favorites() {
    let w = world();
    w.app
        .marketplace
        .fetch_listings(ListingFilter::default())
        .await
        .unwrap();

    let listings = w.app.marketplace.listings().items();
    assert_eq!(w.app.marketplace.listings().ids(), vec!["l2".to_string(), "l1".to_string()]);

    let mine = &listings[1];
    assert_eq!(mine.seller.username, "alice");
    assert_eq!(
        mine.seller.avatar_url.as_deref(),
        Some("http://localhost:54321/storage/v1/object/public/avatars/alice/me.png")
    );
    assert_eq!(
        mine.image_url.as_deref(),
        Some("http://localhost:54321/storage/v1/object/public/listing-images/l1/front.jpg")
    );
    assert!(listings.iter().all(|l| !l.is_favorited));
}

#[tokio::test]
async fn price_and_status_filters() {
    let w = world();
    let filter = ListingFilter {
        status: None,
        min_price: Some(1000.0),
        max_price: Some(30000.0),
        ..ListingFilter::default()
    };
    w.app.marketplace.fetch_listings(filter).await.unwrap();
    assert_eq!(w.app.marketplace.listings().ids(), vec!["l1".to_string()]);

    let sold = ListingFilter {
        status: Some(ListingStatus::Sold),
        ..ListingFilter::default()
    };
    w.app.marketplace.fetch_listings(sold).await.unwrap();
    assert_eq!(w.app.marketplace.listings().ids(), vec!["l3".to_string()]);
}

#[tokio::test]
async fn favorite_round_trip_restores_the_original_state() {
    let w = world();
    let market = &w.app.marketplace;
    market.fetch_listings(ListingFilter::default()).await.unwrap();
    let original = market.listings().get("l2").unwrap();

    assert!(market.toggle_favorite("l2").await.unwrap());
    assert!(market.listings().get("l2").unwrap().is_favorited);
    assert_eq!(market.favorites().ids(), vec!["l2".to_string()]);
    assert_eq!(w.backend.rows("favorites").len(), 1);

    assert!(!market.toggle_favorite("l2").await.unwrap());
    assert_eq!(market.listings().get("l2").unwrap(), original);
    assert!(market.favorites().is_empty());
    assert!(w.backend.rows("favorites").is_empty());
}

#[tokio::test]
async fn failed_favorite_is_rolled_back() {
    let w = world();
    let market = &w.app.marketplace;
    market.fetch_listings(ListingFilter::default()).await.unwrap();
    w.backend.fail_next(Op::Insert, "favorites", ErrorKind::Forbidden);

    let err = market.toggle_favorite("l2").await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Forbidden));
    assert!(!market.listings().get("l2").unwrap().is_favorited);
    assert!(market.favorites().is_empty());
}

#[tokio::test]
async fn favorites_are_fetched_for_the_signed_in_user() {
    let w = world();
    let market = &w.app.marketplace;
    market.fetch_listings(ListingFilter::default()).await.unwrap();
    market.toggle_favorite("l2").await.unwrap();
    market.favorites().reset();

    market.fetch_favorites().await.unwrap();
    let favorites = market.favorites().items();
    assert_eq!(favorites.len(), 1);
    assert!(favorites[0].is_favorited);
    assert_eq!(favorites[0].seller.username, "bob");
}

#[tokio::test]
async fn create_listing_is_optimistic_and_validated() {
    let w = world();
    let market = &w.app.marketplace;
    market.fetch_listings(ListingFilter::default()).await.unwrap();

    let input = NewListing {
        car_id: Some("car-1".into()),
        title: "1991 Miata".into(),
        description: None,
        price: 9500.0,
        location: None,
        image_path: None,
    };
    let err = market
        .create_listing(NewListing {
            price: -1.0,
            ..input.clone()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));

    let created = market.create_listing(input).await.unwrap();
    assert_eq!(created.seller.id, ALICE);
    assert_eq!(created.listing.status, ListingStatus::Active);
    assert_eq!(market.listings().ids()[0], created.listing.id);

    market.fetch_listings(ListingFilter::default()).await.unwrap();
    let ids = market.listings().ids();
    assert_eq!(ids.iter().filter(|id| **id == created.listing.id).count(), 1);
}

#[tokio::test]
async fn mark_sold_and_failed_update() {
    let w = world();
    let market = &w.app.marketplace;
    market.fetch_listings(ListingFilter::default()).await.unwrap();

    w.backend.fail_next(Op::Update, "listings", ErrorKind::Network);
    let patch = ListingPatch {
        price: Some(60000.0),
        ..ListingPatch::default()
    };
    assert!(market.update_listing("l2", patch).await.is_err());
    assert_eq!(market.listings().get("l2").unwrap().listing.price, 65000.0);

    let sold = market.mark_sold("l2").await.unwrap();
    assert_eq!(sold.listing.status, ListingStatus::Sold);
    assert_eq!(sold.seller.username, "bob");

    market.fetch_listings(ListingFilter::default()).await.unwrap();
    assert_eq!(market.listings().ids(), vec!["l1".to_string()]);
}

#[tokio::test]
async fn offers_follow_the_marketplace_rules() {
    let w = world();
    let market = &w.app.marketplace;
    market.fetch_listings(ListingFilter::default()).await.unwrap();

    let own = market.make_offer(offer("l1", 20000.0)).await.unwrap_err();
    assert!(matches!(own, StoreError::Invalid(_)));
    let zero = market.make_offer(offer("l2", 0.0)).await.unwrap_err();
    assert!(matches!(zero, StoreError::Invalid(_)));
    assert!(w.backend.rows("offers").is_empty());

    let made = market.make_offer(offer("l2", 60000.0)).await.unwrap();
    assert_eq!(made.offer.status, OfferStatus::Pending);
    assert_eq!(made.buyer_name, "alice");

    w.sign_in_as(BOB, "bob");
    market.fetch_offers("l2").await.unwrap();
    let offers = market.offers().items();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].buyer_name, "alice");

    let accepted = market.respond_to_offer(&made.offer.id, true).await.unwrap();
    assert_eq!(accepted.offer.status, OfferStatus::Accepted);
    assert_eq!(
        market.offers().get(&made.offer.id).unwrap().offer.status,
        OfferStatus::Accepted
    );
}

#[tokio::test]
async fn listing_with_offers_cannot_be_deleted() {
    let w = world();
    let market = &w.app.marketplace;
    market.fetch_listings(ListingFilter::default()).await.unwrap();
    market.make_offer(offer("l2", 61000.0)).await.unwrap();

    let err = market.delete_listing("l2").await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::ReferentialConflict));
    assert!(market.listings().contains("l2"));

    market.delete_listing("l1").await.unwrap();
    assert!(!market.listings().contains("l1"));
}

#[tokio::test]
async fn new_listing_stays_out_of_a_sold_only_view() {
    let w = world();
    let market = &w.app.marketplace;
    let sold = ListingFilter {
        status: Some(ListingStatus::Sold),
        ..ListingFilter::default()
    };
    market.fetch_listings(sold).await.unwrap();

    let input = NewListing {
        car_id: None,
        title: "Bucket seats".into(),
        description: None,
        price: 400.0,
        location: None,
        image_path: None,
    };
    market.create_listing(input).await.unwrap();

    assert_eq!(market.listings().ids(), vec!["l3".to_string()]);
    assert_eq!(w.backend.rows("listings").len(), 4);
}
