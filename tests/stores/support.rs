//! A seeded CarSocial world on the in-memory backend.

#![allow(dead_code)]

use std::sync::Arc;

use carsocial::domain::{
    Car, Comment, Forum, Listing, ListingStatus, Meet, MeetAttendee, Post, PostLike, Profile,
};
use carsocial::{
    BufferNotifier, CarSocial, ClientConfig, Identity, InMemoryBackend, Level, Notification,
    StoreContext,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub const ALICE: &str = "u-alice";
pub const BOB: &str = "u-bob";
pub const GHOST: &str = "u-ghost";

pub fn ts(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub struct World {
    pub backend: InMemoryBackend,
    pub notes: BufferNotifier,
    pub app: CarSocial,
}

impl World {
    /// Success and error messages received so far, draining the buffer.
    pub fn messages(&self) -> Vec<Notification> {
        self.notes.drain()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|n| n.level == Level::Error)
            .map(|n| n.message)
            .collect()
    }

    pub fn sign_in_as(&self, user_id: &str, username: &str) {
        self.app.sign_in(Identity::new(user_id, username));
    }
}

pub fn backend() -> InMemoryBackend {
    InMemoryBackend::new()
        .with_unique("profiles", &["username"])
        .with_unique("post_likes", &["post_id", "user_id"])
        .with_unique("favorites", &["listing_id", "user_id"])
        .with_unique("meet_attendees", &["meet_id", "user_id"])
        .with_foreign_key("comments", "post_id", "posts")
        .with_foreign_key("listings", "car_id", "cars")
        .with_foreign_key("offers", "listing_id", "listings")
}

/// Alice signed in; no reconciling refetch unless a test asks for one.
pub fn world() -> World {
    world_with(ClientConfig::local().with_reconcile(false))
}

pub fn world_with(config: ClientConfig) -> World {
    let backend = backend();
    seed(&backend);

    let notes = BufferNotifier::new();
    let ctx = StoreContext::new(Arc::new(backend.clone()), config)
        .with_notifier(Arc::new(notes.clone()));
    let app = CarSocial::from_context(ctx);
    app.sign_in(Identity::new(ALICE, "alice"));

    World {
        backend,
        notes,
        app,
    }
}

pub fn profile(id: &str, username: &str, avatar: Option<&str>) -> Profile {
    Profile {
        id: id.into(),
        username: username.into(),
        full_name: None,
        bio: None,
        location: None,
        avatar_path: avatar.map(str::to_string),
    }
}

pub fn post(id: &str, forum_id: &str, author_id: &str, minute: i64) -> Post {
    Post {
        id: id.into(),
        forum_id: forum_id.into(),
        author_id: author_id.into(),
        title: format!("Post {}", id),
        content: "Thoughts on the build".into(),
        likes_count: 0,
        created_at: ts(minute),
    }
}

pub fn listing(id: &str, seller_id: &str, title: &str, price: f64, minute: i64) -> Listing {
    Listing {
        id: id.into(),
        seller_id: seller_id.into(),
        car_id: None,
        title: title.into(),
        description: None,
        price,
        location: Some("Austin".into()),
        status: ListingStatus::Active,
        image_path: Some(format!("{}/front.jpg", id)),
        created_at: ts(minute),
    }
}

pub fn car(id: &str, owner_id: &str, make: &str, model: &str, year: i32, minute: i64) -> Car {
    Car {
        id: id.into(),
        owner_id: owner_id.into(),
        make: make.into(),
        model: model.into(),
        year,
        nickname: None,
        description: None,
        image_path: None,
        created_at: ts(minute),
    }
}

pub fn meet(id: &str, organizer_id: &str, title: &str, in_days: i64, minute: i64) -> Meet {
    Meet {
        id: id.into(),
        organizer_id: organizer_id.into(),
        title: title.into(),
        description: None,
        location: "Parking lot".into(),
        starts_at: Utc::now() + Duration::days(in_days),
        created_at: ts(minute),
    }
}

fn seed(backend: &InMemoryBackend) {
    backend.seed(&[
        profile(ALICE, "alice", Some("alice/me.png")),
        profile(BOB, "bob", None),
    ]);
    backend.seed(&[
        Forum {
            id: "f-porsche".into(),
            name: "Porsche".into(),
            brand: Some("Porsche".into()),
            description: None,
        },
        Forum {
            id: "f-mazda".into(),
            name: "Mazda".into(),
            brand: Some("Mazda".into()),
            description: None,
        },
    ]);
    backend.seed(&[
        post("p1", "f-porsche", ALICE, 10),
        post("p2", "f-mazda", BOB, 20),
        post("p3", "f-gone", GHOST, 30),
    ]);
    backend.seed(&[PostLike {
        id: "like-1".into(),
        post_id: "p2".into(),
        user_id: ALICE.into(),
    }]);
    backend.seed(&[Comment {
        id: "c1".into(),
        post_id: "p1".into(),
        author_id: BOB.into(),
        content: "Nice!".into(),
        created_at: ts(11),
    }]);
    backend.seed(&[
        car("car-1", ALICE, "Mazda", "Miata", 1991, 1),
        car("car-2", BOB, "Porsche", "911", 1989, 2),
        car("car-3", ALICE, "Honda", "S2000", 2004, 3),
    ]);
    backend.seed(&[
        Listing {
            car_id: Some("car-3".into()),
            ..listing("l1", ALICE, "Honda S2000 AP1", 28000.0, 40)
        },
        listing("l2", BOB, "Porsche 911 Carrera", 65000.0, 50),
        Listing {
            status: ListingStatus::Sold,
            ..listing("l3", BOB, "Miata hardtop", 900.0, 5)
        },
    ]);
    backend.seed(&[
        meet("m1", BOB, "Cars and Coffee", 3, 60),
        meet("m2", ALICE, "Canyon run", 10, 70),
        meet("m0", BOB, "Last month's meet", -30, 0),
    ]);
    backend.seed(&[
        MeetAttendee {
            id: "a1".into(),
            meet_id: "m1".into(),
            user_id: ALICE.into(),
        },
        MeetAttendee {
            id: "a2".into(),
            meet_id: "m1".into(),
            user_id: BOB.into(),
        },
    ]);
}
