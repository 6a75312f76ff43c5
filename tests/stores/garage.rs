use carsocial::domain::{CarPatch, NewCar};
use carsocial::{ErrorKind, StoreError};

use crate::support::{world, ALICE, BOB};

fn new_car(year: i32) -> NewCar {
    NewCar {
        make: "Toyota".into(),
        model: "AE86".into(),
        year,
        nickname: Some("Hachi".into()),
        description: None,
        image_path: Some("ae86.jpg".into()),
    }
}

#[tokio::test]
async fn garage_lists_owned_cars_newest_first() {
    let w = world();
    w.app.garage.fetch_garage(ALICE).await.unwrap();

    let cars = w.app.garage.cars().items();
    assert_eq!(w.app.garage.cars().ids(), vec!["car-3".to_string(), "car-1".to_string()]);
    assert!(cars.iter().all(|c| c.owner.username == "alice"));
    assert_eq!(cars[1].car.display_name(), "1991 Mazda Miata");
}

#[tokio::test]
async fn add_car_validates_and_inserts() {
    let w = world();
    w.app.garage.fetch_garage(ALICE).await.unwrap();

    let err = w.app.garage.add_car(new_car(1700)).await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));

    let added = w.app.garage.add_car(new_car(1986)).await.unwrap();
    assert_eq!(added.car.display_name(), "Hachi");
    assert_eq!(
        added.image_url.as_deref(),
        Some("http://localhost:54321/storage/v1/object/public/car-images/ae86.jpg")
    );
    assert_eq!(w.app.garage.cars().len(), 3);

    let updated = w
        .app
        .garage
        .update_car(
            &added.car.id,
            CarPatch {
                nickname: Some("Panda".into()),
                ..CarPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.car.display_name(), "Panda");
}

#[tokio::test]
async fn car_in_a_listing_cannot_be_removed() {
    let w = world();
    w.app.garage.fetch_garage(ALICE).await.unwrap();

    let err = w.app.garage.remove_car("car-3").await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::ReferentialConflict));
    assert!(w.app.garage.cars().contains("car-3"));

    w.app.garage.remove_car("car-1").await.unwrap();
    assert_eq!(w.app.garage.cars().ids(), vec!["car-3".to_string()]);
}

#[tokio::test]
async fn own_car_is_not_added_to_someone_elses_garage() {
    let w = world();
    w.app.garage.fetch_garage(BOB).await.unwrap();

    let added = w.app.garage.add_car(new_car(1986)).await.unwrap();

    assert_eq!(added.owner.id, ALICE);
    assert_eq!(w.app.garage.cars().ids(), vec!["car-2".to_string()]);
    assert_eq!(w.backend.rows("cars").len(), 4);
}
