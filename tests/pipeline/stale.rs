use std::sync::Arc;

use carsocial::domain::PostFilter;
use carsocial::stores::load_posts;
use carsocial::{FetchOutcome, ForumsStore, ProfileStore, StoreError, StoreState};

use crate::support::{context, post, profile, GatedBackend};

#[tokio::test]
async fn late_response_of_an_older_fetch_is_discarded() {
    let backend = GatedBackend::default();
    backend.inner.seed(&[post("p1", "f1", "a", 0)]);
    let (ctx, _notes) = context(Arc::new(backend.clone()));
    let store = ForumsStore::new(ctx);

    let gate = backend.gate_next_select("posts");
    let first = store.fetch_posts(PostFilter::default());
    let second = async {
        gate.reached.await.unwrap();
        backend.inner.seed(&[post("p2", "f1", "a", 1)]);

        let outcome = store.fetch_posts(PostFilter::default()).await;
        gate.release.send(()).unwrap();
        outcome
    };

    let (first, second) = tokio::join!(first, second);

    assert_eq!(second.unwrap(), FetchOutcome::Applied { rows: 2 });
    assert_eq!(first.unwrap(), FetchOutcome::Stale);
    assert_eq!(store.posts().ids(), vec!["p2".to_string(), "p1".to_string()]);
    assert_eq!(store.posts().state(), StoreState::Ready);
}

#[tokio::test]
async fn stale_failure_does_not_touch_the_store() {
    let backend = GatedBackend::default();
    backend.inner.seed(&[post("p1", "f1", "a", 0)]);
    let (ctx, _notes) = context(Arc::new(backend.clone()));
    let store = ForumsStore::new(ctx.clone());

    // Make the older request fail only after the newer one has landed.
    let gate = backend.gate_next_select("posts");
    let first = async {
        let ticket = store.posts().begin_fetch();
        let _ = load_posts(&ctx, &PostFilter::default()).await;
        store
            .posts()
            .finish_fetch(ticket, Err(StoreError::Invalid("late".into())))
    };
    let second = async {
        gate.reached.await.unwrap();
        let outcome = store.fetch_posts(PostFilter::default()).await;
        gate.release.send(()).unwrap();
        outcome
    };

    let (first, second) = tokio::join!(first, second);

    assert_eq!(second.unwrap(), FetchOutcome::Applied { rows: 1 });
    assert_eq!(first.unwrap(), FetchOutcome::Stale);
    assert_eq!(store.posts().state(), StoreState::Ready);
    assert!(store.posts().last_error().is_none());
}

#[tokio::test]
async fn overlapping_loads_of_different_profiles_both_land() {
    let backend = GatedBackend::default();
    backend.inner.seed(&[profile("a", "alice"), profile("b", "bob")]);
    let (ctx, _notes) = context(Arc::new(backend.clone()));
    let store = ProfileStore::new(ctx);

    let gate = backend.gate_next_select("profiles");
    let first = store.load("a");
    let second = async {
        gate.reached.await.unwrap();
        let view = store.load("b").await;
        gate.release.send(()).unwrap();
        view
    };

    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap().profile.username, "alice");
    assert_eq!(second.unwrap().profile.username, "bob");
    assert_eq!(store.profiles().ids(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(store.get("a").unwrap().profile.username, "alice");
    assert_eq!(store.profiles().state(), StoreState::Ready);
}
