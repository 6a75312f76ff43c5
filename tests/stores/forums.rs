use carsocial::domain::{NewPost, PostFilter, PostPatch};
use carsocial::{ErrorKind, Filter, Level, Op, StoreError, StoreState, ANONYMOUS, UNKNOWN};
use serde_json::json;

use crate::support::{world, world_with, ALICE, BOB, GHOST};

fn new_post(title: &str) -> NewPost {
    NewPost {
        forum_id: "f-porsche".into(),
        title: title.into(),
        content: "Just picked up a 964".into(),
    }
}

#[tokio::test]
async fn posts_are_merged_with_authors_forums_and_likes() {
    let w = world();
    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();

    let posts = w.app.forums.posts().items();
    let summary: Vec<(&str, &str, &str, bool)> = posts
        .iter()
        .map(|v| {
            (
                v.post.id.as_str(),
                v.author_name.as_str(),
                v.forum_name.as_str(),
                v.liked_by_me,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("p3", ANONYMOUS, UNKNOWN, false),
            ("p2", "bob", "Mazda", true),
            ("p1", "alice", "Porsche", false),
        ]
    );

    let profile_selects = w.backend.selects("profiles");
    assert_eq!(profile_selects.len(), 1);
    match &profile_selects[0].filters[0] {
        Filter::In { column, values } => {
            assert_eq!(column, "id");
            assert_eq!(values, &vec![json!(GHOST), json!(BOB), json!(ALICE)]);
        }
        other => panic!("unexpected filter {:?}", other),
    }
    assert_eq!(w.backend.selects("forums").len(), 1);
    assert_eq!(w.backend.selects("post_likes").len(), 1);
}

#[tokio::test]
async fn filters_narrow_the_fetch() {
    let w = world();
    w.app
        .forums
        .fetch_posts(PostFilter::forum("f-mazda"))
        .await
        .unwrap();
    assert_eq!(w.app.forums.posts().ids(), vec!["p2".to_string()]);

    w.app
        .forums
        .fetch_posts(PostFilter {
            search: Some("P1".into()),
            ..PostFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(w.app.forums.posts().ids(), vec!["p1".to_string()]);
}

#[tokio::test]
async fn created_post_appears_exactly_once_after_fetch() {
    let w = world();
    w.app.forums.fetch_forums().await.unwrap();
    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();

    let created = w.app.forums.create_post(new_post("New 964")).await.unwrap();
    assert_eq!(created.author_name, "alice");
    assert_eq!(created.forum_name, "Porsche");
    assert_eq!(w.app.forums.posts().ids()[0], created.post.id);

    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();
    let ids = w.app.forums.posts().ids();
    assert_eq!(ids.iter().filter(|id| **id == created.post.id).count(), 1);
    assert_eq!(ids.len(), 4);

    let notes = w.messages();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, Level::Success);
}

#[tokio::test]
async fn reconciling_refetch_runs_after_create() {
    let w = world_with(carsocial::ClientConfig::local());
    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();
    let before = w.backend.selects("posts").len();

    let created = w.app.forums.create_post(new_post("Reconciled")).await.unwrap();

    assert_eq!(w.backend.selects("posts").len(), before + 1);
    let ids = w.app.forums.posts().ids();
    assert_eq!(ids.iter().filter(|id| **id == created.post.id).count(), 1);
}

#[tokio::test]
async fn failed_create_rolls_back_the_provisional_post() {
    let w = world();
    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();
    let before = w.app.forums.posts().ids();
    w.backend.fail_next(Op::Insert, "posts", ErrorKind::Forbidden);

    let err = w.app.forums.create_post(new_post("Denied")).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Forbidden));
    assert_eq!(w.app.forums.posts().ids(), before);
    assert_eq!(w.app.forums.posts().state(), StoreState::Error(ErrorKind::Forbidden));
    assert_eq!(w.errors(), vec![ErrorKind::Forbidden.user_message().to_string()]);
}

#[tokio::test]
async fn invalid_input_never_reaches_the_backend() {
    let w = world();
    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();
    w.backend.clear_calls();

    let err = w.app.forums.create_post(new_post("   ")).await.unwrap_err();

    assert!(matches!(err, StoreError::Invalid(_)));
    assert!(w.backend.calls().is_empty());
    assert_eq!(w.app.forums.posts().state(), StoreState::Ready);
    assert_eq!(w.app.forums.posts().len(), 3);
}

#[tokio::test]
async fn signed_out_users_cannot_post() {
    let w = world();
    w.app.session().sign_out();

    let err = w.app.forums.create_post(new_post("Hello")).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));
    assert!(w.backend.calls().iter().all(|c| c.op != Op::Insert));
}

#[tokio::test]
async fn update_replaces_only_after_success() {
    let w = world();
    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();

    w.backend.fail_next(Op::Update, "posts", ErrorKind::Network);
    let patch = PostPatch {
        title: Some("Edited".into()),
        ..PostPatch::default()
    };
    assert!(w.app.forums.update_post("p1", patch.clone()).await.is_err());
    assert_eq!(w.app.forums.posts().get("p1").unwrap().post.title, "Post p1");

    let updated = w.app.forums.update_post("p1", patch).await.unwrap();
    assert_eq!(updated.post.title, "Edited");
    assert_eq!(updated.author_name, "alice");
    assert_eq!(w.app.forums.posts().get("p1").unwrap().post.title, "Edited");
}

#[tokio::test]
async fn deleted_post_is_gone_from_the_store() {
    let w = world();
    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();

    w.app.forums.delete_post("p2").await.unwrap();
    assert!(!w.app.forums.posts().contains("p2"));
    assert!(w.backend.rows("posts").iter().all(|r| r["id"] != "p2"));
}

#[tokio::test]
async fn referenced_post_cannot_be_deleted() {
    let w = world();
    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();

    let err = w.app.forums.delete_post("p1").await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::ReferentialConflict));
    assert!(w.app.forums.posts().contains("p1"));
    assert_eq!(
        w.errors(),
        vec![ErrorKind::ReferentialConflict.user_message().to_string()]
    );
}

#[tokio::test]
async fn like_toggle_round_trip() {
    let w = world();
    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();
    let original = w.app.forums.posts().get("p1").unwrap();

    assert!(w.app.forums.toggle_like("p1").await.unwrap());
    let liked = w.app.forums.posts().get("p1").unwrap();
    assert!(liked.liked_by_me);
    assert_eq!(liked.post.likes_count, 1);
    assert_eq!(w.backend.rows("post_likes").len(), 2);

    assert!(!w.app.forums.toggle_like("p1").await.unwrap());
    assert_eq!(w.app.forums.posts().get("p1").unwrap(), original);
    assert_eq!(w.backend.rows("post_likes").len(), 1);
}

#[tokio::test]
async fn failed_like_is_rolled_back() {
    let w = world();
    w.app.forums.fetch_posts(PostFilter::default()).await.unwrap();
    let original = w.app.forums.posts().get("p1").unwrap();
    w.backend.fail_next(Op::Insert, "post_likes", ErrorKind::Network);

    assert!(w.app.forums.toggle_like("p1").await.is_err());
    assert_eq!(w.app.forums.posts().get("p1").unwrap(), original);
}

#[tokio::test]
async fn comments_round_trip() {
    let w = world();
    w.app.forums.fetch_comments("p1").await.unwrap();

    let comments = w.app.forums.comments().items();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author_name, "bob");

    let added = w.app.forums.add_comment("p1", "Agreed").await.unwrap();
    assert_eq!(added.author_name, "alice");
    assert_eq!(
        w.app.forums.comments().ids(),
        vec!["c1".to_string(), added.comment.id.clone()]
    );

    w.app.forums.delete_comment(&added.comment.id).await.unwrap();
    assert!(!w.app.forums.comments().contains(&added.comment.id));
    assert_eq!(w.backend.rows("comments").len(), 1);
}

#[tokio::test]
async fn comment_on_another_post_stays_out_of_the_list() {
    let w = world();
    w.app.forums.fetch_comments("p1").await.unwrap();

    let added = w.app.forums.add_comment("p2", "Nice swap").await.unwrap();

    assert_eq!(added.comment.post_id, "p2");
    assert_eq!(w.app.forums.comments().ids(), vec!["c1".to_string()]);
    assert_eq!(w.app.forums.comments().state(), StoreState::Ready);
    assert_eq!(w.backend.rows("comments").len(), 2);
}

#[tokio::test]
async fn post_outside_the_current_filter_is_not_cached() {
    let w = world();
    w.app.forums.fetch_posts(PostFilter::forum("f-mazda")).await.unwrap();

    let created = w.app.forums.create_post(new_post("964 for sale")).await.unwrap();

    assert_eq!(created.post.forum_id, "f-porsche");
    assert_eq!(w.app.forums.posts().ids(), vec!["p2".to_string()]);
    assert_eq!(w.backend.rows("posts").len(), 4);
}
