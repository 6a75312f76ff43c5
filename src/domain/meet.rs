use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Keyed;
use crate::Row;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Row)]
#[row(collection = "meets")]
pub struct Meet {
    pub id: String,
    pub organizer_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Row)]
#[row(collection = "meet_attendees")]
pub struct MeetAttendee {
    pub id: String,
    pub meet_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetView {
    pub meet: Meet,
    pub organizer_name: String,
    pub attendee_count: usize,
    pub attending: bool,
}

impl Keyed for MeetView {
    fn key(&self) -> &str {
        &self.meet.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMeet {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub starts_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeetPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
}

/// Which meets a fetch returns, soonest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetFilter {
    pub organizer_id: Option<String>,
    /// Only meets starting at or after this instant.
    pub starting_after: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl MeetFilter {
    pub fn upcoming() -> Self {
        Self {
            starting_after: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Whether a fetch with this filter would return `meet`.
    pub fn matches(&self, meet: &Meet) -> bool {
        self.organizer_id.as_ref().map_or(true, |id| *id == meet.organizer_id)
            && self.starting_after.map_or(true, |after| meet.starts_at >= after)
            && super::title_matches(&meet.title, self.search.as_deref())
    }
}
