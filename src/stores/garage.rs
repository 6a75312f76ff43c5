use chrono::{Datelike, Utc};

use super::{optimistic_create, LastFilter};
use crate::cache::{CacheStore, FetchOutcome, Placement};
use crate::context::{require_text, StoreContext};
use crate::domain::{new_id, Car, CarPatch, CarView, NewCar, ProfileSummary, UserRef};
use crate::error::{StoreError, StoreResult};
use crate::fetch::CollectionsExt;
use crate::merge::merge;
use crate::query::Query;
use crate::resolve::{or_empty, resolve, LookupMap};
use crate::storage::CAR_IMAGES;

const MIN_YEAR: i32 = 1885;

/// The cars of one user.
#[derive(Clone)]
pub struct GarageStore {
    ctx: StoreContext,
    cars: CacheStore<CarView>,
    owner: LastFilter<Option<String>>,
}

/// Cars owned by `user_id`, newest first, with owner and image URL.
pub async fn load_garage(ctx: &StoreContext, user_id: &str) -> StoreResult<Vec<CarView>> {
    let backend = ctx.backend();
    let query = Query::new()
        .eq("owner_id", user_id)
        .order_by("created_at", false);
    let cars = backend.collection::<Car>().select(&query).await?;

    let owners: LookupMap<ProfileSummary> = or_empty(
        resolve(backend, &cars, "owner_id", |c| Some(c.owner_id.as_str())).await,
        "cars.owner_id",
    );
    Ok(merge(&cars, &owners, |c| Some(c.owner_id.as_str()), |car, owner| CarView {
        car: car.clone(),
        owner: UserRef::resolve(&car.owner_id, owner, &ctx.storage),
        image_url: ctx.storage.optional_url(CAR_IMAGES, car.image_path.as_deref()),
    }))
}

fn validate_car(make: &str, model: &str, year: i32) -> StoreResult<()> {
    require_text("make", make)?;
    require_text("model", model)?;
    validate_year(year)
}

fn validate_year(year: i32) -> StoreResult<()> {
    let latest = Utc::now().year() + 1;
    if !(MIN_YEAR..=latest).contains(&year) {
        return Err(StoreError::Invalid(format!(
            "year must be between {} and {}",
            MIN_YEAR, latest
        )));
    }
    Ok(())
}

impl GarageStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            cars: CacheStore::new("cars"),
            owner: LastFilter::new(None),
        }
    }

    pub fn cars(&self) -> &CacheStore<CarView> {
        &self.cars
    }

    pub async fn fetch_garage(&self, user_id: &str) -> StoreResult<FetchOutcome> {
        self.owner.set(Some(user_id.to_string()));
        let result = self.cars.refresh(load_garage(&self.ctx, user_id)).await;
        self.ctx.report_failure("fetch_garage", result)
    }

    pub async fn add_car(&self, input: NewCar) -> StoreResult<CarView> {
        let result = self.add_car_inner(input).await;
        let result = self.ctx.report("add_car", "Car added to your garage", result);
        if result.is_ok() && self.ctx.config.reconcile_after_write {
            if let Some(owner) = self.owner.get() {
                let _ = self.fetch_garage(&owner).await;
            }
        }
        result
    }

    async fn add_car_inner(&self, input: NewCar) -> StoreResult<CarView> {
        let user = self.ctx.require_user()?;
        validate_car(&input.make, &input.model, input.year)?;

        let car = Car {
            id: new_id(),
            owner_id: user.user_id.clone(),
            make: input.make.trim().to_string(),
            model: input.model.trim().to_string(),
            year: input.year,
            nickname: input.nickname,
            description: input.description,
            image_path: input.image_path,
            created_at: Utc::now(),
        };
        let provisional = CarView {
            owner: UserRef {
                id: user.user_id,
                username: user.username,
                avatar_url: None,
            },
            image_url: self
                .ctx
                .storage
                .optional_url(CAR_IMAGES, car.image_path.as_deref()),
            car,
        };

        let shown = self.owner.get().as_deref() == Some(provisional.car.owner_id.as_str());
        let placement = shown.then_some(Placement::Front);
        let backend = self.ctx.backend();
        let template = provisional.clone();
        optimistic_create(&self.cars, provisional, placement, async move {
            let stored = backend.collection::<Car>().insert(&template.car).await?;
            Ok::<_, StoreError>(CarView {
                car: stored,
                ..template
            })
        })
        .await
    }

    pub async fn update_car(&self, id: &str, patch: CarPatch) -> StoreResult<CarView> {
        let result = self.update_car_inner(id, patch).await;
        self.ctx.report("update_car", "Car updated", result)
    }

    async fn update_car_inner(&self, id: &str, patch: CarPatch) -> StoreResult<CarView> {
        self.ctx.require_user()?;
        if let Some(make) = &patch.make {
            require_text("make", make)?;
        }
        if let Some(model) = &patch.model {
            require_text("model", model)?;
        }
        if let Some(year) = patch.year {
            validate_year(year)?;
        }

        let backend = self.ctx.backend();
        let stored = self
            .cars
            .mutate(async {
                backend
                    .collection::<Car>()
                    .update(id, &patch)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;

        let image_url = self
            .ctx
            .storage
            .optional_url(CAR_IMAGES, stored.image_path.as_deref());
        let view = match self.cars.get(id) {
            Some(cached) => CarView {
                car: stored,
                image_url,
                ..cached
            },
            None => CarView {
                owner: UserRef::resolve(&stored.owner_id, None, &self.ctx.storage),
                car: stored,
                image_url,
            },
        };
        self.cars.replace(view.clone());
        Ok(view)
    }

    /// Remove a car. Fails with `ReferentialConflict` while a listing still
    /// points at it.
    pub async fn remove_car(&self, id: &str) -> StoreResult<()> {
        let result = self.remove_car_inner(id).await;
        self.ctx.report("remove_car", "Car removed", result)
    }

    async fn remove_car_inner(&self, id: &str) -> StoreResult<()> {
        self.ctx.require_user()?;
        let backend = self.ctx.backend();
        self.cars
            .mutate(async {
                backend
                    .collection::<Car>()
                    .delete(id)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;
        self.cars.remove(id);
        Ok(())
    }
}
