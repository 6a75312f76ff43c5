use carsocial::FeedItem;

use crate::support::world;

#[tokio::test]
async fn feed_is_sorted_newest_first_across_kinds() {
    let w = world();
    w.app.feed.load().await.unwrap();

    let items = w.app.feed.items().items();
    assert_eq!(
        w.app.feed.items().ids(),
        vec!["m2", "m1", "l2", "l1", "p3", "p2", "p1"]
    );
    assert!(matches!(items[0], FeedItem::Meet(_)));
    assert!(items
        .windows(2)
        .all(|pair| pair[0].created_at() >= pair[1].created_at()));
}
