//! Fetch, resolve and merge pipelines against the in-memory backend.


mod stale;

use carsocial::domain::{Post, ProfileSummary};
use carsocial::{
    merge, or_empty, resolve, CollectionsExt, ErrorKind, InMemoryBackend, LookupMap, Op, Query,
    ANONYMOUS,
};
use support::{post, profile};

#[tokio::test]
async fn merge_fills_missing_authors_with_defaults() {
    let backend = InMemoryBackend::new();
    backend.seed(&[post("1", "f1", "a", 1), post("2", "f1", "b", 0)]);
    backend.seed(&[profile("a", "alice")]);

    let posts = backend
        .collection::<Post>()
        .select(&Query::new().order_by("created_at", false))
        .await
        .unwrap();
    let authors: LookupMap<ProfileSummary> =
        resolve(&backend, &posts, "author_id", |p| Some(p.author_id.as_str()))
            .await
            .unwrap();

    let views = merge(&posts, &authors, |p| Some(p.author_id.as_str()), |p, author| {
        (
            p.id.clone(),
            author.map_or(ANONYMOUS.to_string(), |a| a.username.clone()),
        )
    });
    assert_eq!(
        views,
        vec![
            ("1".to_string(), "alice".to_string()),
            ("2".to_string(), ANONYMOUS.to_string()),
        ]
    );
}

#[tokio::test]
async fn failed_resolve_degrades_to_defaults() {
    let backend = InMemoryBackend::new();
    backend.seed(&[post("1", "f1", "a", 0)]);
    backend.seed(&[profile("a", "alice")]);
    backend.fail_next(Op::Select, "profiles", ErrorKind::Network);

    let posts = backend.collection::<Post>().select(&Query::new()).await.unwrap();
    let authors: LookupMap<ProfileSummary> = or_empty(
        resolve(&backend, &posts, "author_id", |p| Some(p.author_id.as_str())).await,
        "author_id",
    );

    let views = merge(&posts, &authors, |p| Some(p.author_id.as_str()), |_, author| {
        author.map_or(ANONYMOUS, |a| a.username.as_str()).to_string()
    });
    assert_eq!(views, vec![ANONYMOUS.to_string()]);
}

#[tokio::test]
async fn fetch_one_reports_not_found() {
    let backend = InMemoryBackend::new();
    backend.seed(&[post("1", "f1", "a", 0)]);

    let found = backend.collection::<Post>().get("1").await.unwrap();
    assert_eq!(found.author_id, "a");

    let err = backend.collection::<Post>().get("2").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}
