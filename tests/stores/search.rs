use carsocial::{FetchOutcome, SearchHit};

use crate::support::{listing, world, BOB};

#[tokio::test]
async fn search_spans_people_listings_and_posts() {
    let w = world();

    w.app.search.search("bo").await.unwrap();
    let hits = w.app.search.hits().items();
    assert_eq!(hits.len(), 1);
    assert!(matches!(&hits[0], SearchHit::Profile(user) if user.username == "bob"));

    w.app.search.search("911").await.unwrap();
    let hits = w.app.search.hits().items();
    assert!(matches!(&hits[..], [SearchHit::Listing(view)] if view.listing.id == "l2"));

    w.app.search.search("p2").await.unwrap();
    let hits = w.app.search.hits().items();
    assert!(matches!(&hits[..], [SearchHit::Post(view)] if view.author_name == "bob"));
}

#[tokio::test]
async fn blank_term_clears_without_calls() {
    let w = world();
    w.app.search.search("911").await.unwrap();
    w.backend.clear_calls();

    let outcome = w.app.search.search("   ").await.unwrap();

    assert_eq!(outcome, FetchOutcome::Applied { rows: 0 });
    assert!(w.app.search.hits().is_empty());
    assert!(w.backend.calls().is_empty());
}

#[tokio::test]
async fn hits_of_different_kinds_may_share_an_id() {
    let w = world();
    w.backend.seed(&[listing(BOB, BOB, "Bob's spare wheels", 100.0, 1)]);

    w.app.search.search("bo").await.unwrap();

    let hits = w.app.search.hits().items();
    assert_eq!(hits.len(), 2);
    assert!(matches!(&hits[0], SearchHit::Profile(user) if user.id == BOB));
    assert!(matches!(&hits[1], SearchHit::Listing(view) if view.listing.id == BOB));
}
