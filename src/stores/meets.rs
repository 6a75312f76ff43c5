use chrono::Utc;

use super::{optimistic_create, optimistic_toggle, LastFilter};
use crate::cache::{CacheStore, FetchOutcome, Placement};
use crate::context::{require_text, StoreContext};
use crate::domain::{
    new_id, Meet, MeetAttendee, MeetFilter, MeetPatch, MeetView, NewMeet, ProfileSummary,
};
use crate::error::{StoreError, StoreResult};
use crate::fetch::CollectionsExt;
use crate::merge::{merge, merge_into, ANONYMOUS};
use crate::query::Query;
use crate::resolve::{or_empty, resolve, resolve_grouped, ForeignKeySet, LookupMap};

#[derive(Clone)]
pub struct MeetsStore {
    ctx: StoreContext,
    meets: CacheStore<MeetView>,
    filter: LastFilter<MeetFilter>,
}

/// Meets matching `filter`, soonest first, with organizer, attendee count
/// and whether the signed-in user attends.
pub async fn load_meets(ctx: &StoreContext, filter: &MeetFilter) -> StoreResult<Vec<MeetView>> {
    let backend = ctx.backend();

    let mut query = Query::new()
        .order_by("starts_at", true)
        .limit(ctx.config.page_size);
    if let Some(organizer_id) = &filter.organizer_id {
        query = query.eq("organizer_id", organizer_id.as_str());
    }
    if let Some(after) = filter.starting_after {
        query = query.gte("starts_at", after.to_rfc3339());
    }
    if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
        query = query.contains("title", term);
    }
    let meets = backend.collection::<Meet>().select(&query).await?;

    let organizers: LookupMap<ProfileSummary> = or_empty(
        resolve(backend, &meets, "organizer_id", |m| Some(m.organizer_id.as_str())).await,
        "meets.organizer_id",
    );
    let keys = ForeignKeySet::collect(&meets, |m| Some(m.id.as_str()));
    let attendees: LookupMap<Vec<MeetAttendee>> = or_empty(
        resolve_grouped(backend, &keys, "meet_id", Query::new(), |a: &MeetAttendee| {
            a.meet_id.as_str()
        })
        .await,
        "meet_attendees.meet_id",
    );

    let me = ctx.user_id();
    let views = merge(
        &meets,
        &organizers,
        |m| Some(m.organizer_id.as_str()),
        |meet, organizer| MeetView {
            meet: meet.clone(),
            organizer_name: organizer.map_or_else(|| ANONYMOUS.to_string(), |o| o.username.clone()),
            attendee_count: 0,
            attending: false,
        },
    );
    Ok(merge_into(views, &attendees, |v| Some(v.meet.id.clone()), |v, rows| {
        let rows = rows.map(Vec::as_slice).unwrap_or_default();
        v.attendee_count = rows.len();
        v.attending = me
            .as_deref()
            .is_some_and(|me| rows.iter().any(|a| a.user_id == me));
    }))
}

impl MeetsStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            meets: CacheStore::new("meets"),
            filter: LastFilter::new(MeetFilter::default()),
        }
    }

    pub fn meets(&self) -> &CacheStore<MeetView> {
        &self.meets
    }

    pub async fn fetch_meets(&self, filter: MeetFilter) -> StoreResult<FetchOutcome> {
        self.filter.set(filter.clone());
        let result = self.meets.refresh(load_meets(&self.ctx, &filter)).await;
        self.ctx.report_failure("fetch_meets", result)
    }

    pub async fn create_meet(&self, input: NewMeet) -> StoreResult<MeetView> {
        let result = self.create_meet_inner(input).await;
        let result = self.ctx.report("create_meet", "Meet created", result);
        if result.is_ok() && self.ctx.config.reconcile_after_write {
            let _ = self.fetch_meets(self.filter.get()).await;
        }
        result
    }

    async fn create_meet_inner(&self, input: NewMeet) -> StoreResult<MeetView> {
        let user = self.ctx.require_user()?;
        require_text("title", &input.title)?;
        require_text("location", &input.location)?;

        let provisional = MeetView {
            meet: Meet {
                id: new_id(),
                organizer_id: user.user_id,
                title: input.title.trim().to_string(),
                description: input.description,
                location: input.location.trim().to_string(),
                starts_at: input.starts_at,
                created_at: Utc::now(),
            },
            organizer_name: user.username,
            attendee_count: 0,
            attending: false,
        };

        let shown = self.filter.get().matches(&provisional.meet);
        let placement = shown.then_some(Placement::Front);
        let backend = self.ctx.backend();
        let template = provisional.clone();
        optimistic_create(&self.meets, provisional, placement, async move {
            let stored = backend.collection::<Meet>().insert(&template.meet).await?;
            Ok::<_, StoreError>(MeetView {
                meet: stored,
                ..template
            })
        })
        .await
    }

    pub async fn update_meet(&self, id: &str, patch: MeetPatch) -> StoreResult<MeetView> {
        let result = self.update_meet_inner(id, patch).await;
        self.ctx.report("update_meet", "Meet updated", result)
    }

    async fn update_meet_inner(&self, id: &str, patch: MeetPatch) -> StoreResult<MeetView> {
        self.ctx.require_user()?;
        if let Some(title) = &patch.title {
            require_text("title", title)?;
        }
        if let Some(location) = &patch.location {
            require_text("location", location)?;
        }

        let backend = self.ctx.backend();
        let stored = self
            .meets
            .mutate(async {
                backend
                    .collection::<Meet>()
                    .update(id, &patch)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;

        let view = match self.meets.get(id) {
            Some(cached) => MeetView {
                meet: stored,
                ..cached
            },
            None => MeetView {
                meet: stored,
                organizer_name: ANONYMOUS.to_string(),
                attendee_count: 0,
                attending: false,
            },
        };
        self.meets.replace(view.clone());
        Ok(view)
    }

    pub async fn delete_meet(&self, id: &str) -> StoreResult<()> {
        let result = self.delete_meet_inner(id).await;
        self.ctx.report("delete_meet", "Meet cancelled", result)
    }

    async fn delete_meet_inner(&self, id: &str) -> StoreResult<()> {
        self.ctx.require_user()?;
        let backend = self.ctx.backend();
        self.meets
            .mutate(async {
                backend
                    .collection::<Meet>()
                    .delete(id)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;
        self.meets.remove(id);
        Ok(())
    }

    /// Join or leave a cached meet; returns whether the user now attends.
    pub async fn toggle_attendance(&self, meet_id: &str) -> StoreResult<bool> {
        let result = self.toggle_attendance_inner(meet_id).await;
        let message = match &result {
            Ok(true) => "You're going",
            _ => "You left the meet",
        };
        self.ctx.report("toggle_attendance", message, result)
    }

    async fn toggle_attendance_inner(&self, meet_id: &str) -> StoreResult<bool> {
        let user = self.ctx.require_user()?;
        let backend = self.ctx.backend();

        let flip = |view: &mut MeetView| {
            view.attending = !view.attending;
            view.attendee_count = if view.attending {
                view.attendee_count + 1
            } else {
                view.attendee_count.saturating_sub(1)
            };
        };
        let remote = |view: MeetView| async move {
            let attendees = backend.collection::<MeetAttendee>();
            if view.attending {
                let row = MeetAttendee {
                    id: new_id(),
                    meet_id: view.meet.id.clone(),
                    user_id: user.user_id.clone(),
                };
                attendees.insert(&row).await?;
            } else {
                let query = Query::new()
                    .eq("meet_id", view.meet.id.as_str())
                    .eq("user_id", user.user_id.as_str());
                attendees.delete_where(&query).await?;
            }
            Ok::<_, StoreError>(())
        };

        let view = optimistic_toggle(&self.meets, meet_id, flip, remote).await?;
        Ok(view.attending)
    }
}
