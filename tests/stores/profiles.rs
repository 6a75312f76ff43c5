use carsocial::domain::ProfilePatch;
use carsocial::ErrorKind;

use crate::support::{world, ALICE, BOB};

#[tokio::test]
async fn profile_counts_cars_and_listings() {
    let w = world();
    let alice = w.app.profiles.load(ALICE).await.unwrap();

    assert_eq!(alice.profile.username, "alice");
    assert_eq!(alice.car_count, 2);
    assert_eq!(alice.listing_count, 1);
    assert!(alice.avatar_url.unwrap().ends_with("/avatars/alice/me.png"));

    let bob = w.app.profiles.load(BOB).await.unwrap();
    assert_eq!(bob.listing_count, 2);
    assert_eq!(w.app.profiles.profiles().len(), 2);
}

#[tokio::test]
async fn missing_profile_is_not_found() {
    let w = world();
    let err = w.app.profiles.load("u-nobody").await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn own_profile_update_keeps_counts() {
    let w = world();
    w.app.profiles.load(ALICE).await.unwrap();

    let taken = ProfilePatch {
        username: Some("bob".into()),
        ..ProfilePatch::default()
    };
    let err = w.app.profiles.update_own_profile(taken).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Duplicate));
    assert_eq!(w.app.profiles.get(ALICE).unwrap().profile.username, "alice");

    let bio = ProfilePatch {
        bio: Some("Miata is always the answer".into()),
        ..ProfilePatch::default()
    };
    let updated = w.app.profiles.update_own_profile(bio).await.unwrap();
    assert_eq!(updated.profile.bio.as_deref(), Some("Miata is always the answer"));
    assert_eq!(updated.car_count, 2);
}
