use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::UserRef;
use crate::cache::Keyed;
use crate::Row;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Row)]
#[row(collection = "cars")]
pub struct Car {
    pub id: String,
    pub owner_id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub nickname: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Car {
    /// "1991 Mazda Miata", or the nickname when one is set.
    pub fn display_name(&self) -> String {
        match self.nickname.as_deref().map(str::trim) {
            Some(nickname) if !nickname.is_empty() => nickname.to_string(),
            _ => format!("{} {} {}", self.year, self.make, self.model),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarView {
    pub car: Car,
    pub owner: UserRef,
    pub image_url: Option<String>,
}

impl Keyed for CarView {
    fn key(&self) -> &str {
        &self.car.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCar {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub nickname: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CarPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}
