//! Feature store integration tests on a seeded in-memory backend.

mod support;

mod feed;
mod forums;
mod garage;
mod marketplace;
mod profiles;
mod search;

use carsocial::{init_tracing, ErrorKind, Op, StoreState};
use support::world;

#[tokio::test]
async fn failed_fetch_sets_error_state_and_recovers() {
    init_tracing();
    let w = world();
    w.backend.fail_next(Op::Select, "meets", ErrorKind::Network);

    let err = w
        .app
        .meets
        .fetch_meets(Default::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Network));
    assert_eq!(w.app.meets.meets().state(), StoreState::Error(ErrorKind::Network));
    assert_eq!(w.errors(), vec![ErrorKind::Network.user_message().to_string()]);

    w.app.meets.fetch_meets(Default::default()).await.unwrap();
    assert_eq!(w.app.meets.meets().state(), StoreState::Ready);
    assert!(w.app.meets.meets().last_error().is_none());
}

#[tokio::test]
async fn sign_out_clears_per_user_caches() {
    let w = world();
    w.app.forums.fetch_posts(Default::default()).await.unwrap();
    assert!(!w.app.forums.posts().is_empty());

    w.app.sign_out();
    assert!(w.app.forums.posts().is_empty());
    assert_eq!(w.app.forums.posts().state(), StoreState::Idle);
    assert!(w.app.session().current().is_none());
}
