use chrono::{DateTime, Utc};
use common::GeoPoint;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::spotted;

/// Input for posting a new spotted.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSpotted {
    pub anonymous: bool,
    pub location: GeoPoint,
    pub message: String,
}

/// A visible spotted. The archived flag is never exposed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Spotted {
    pub id: Uuid,
    pub owner_account_id: Uuid,
    pub anonymous: bool,
    pub location: GeoPoint,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<spotted::Model> for Spotted {
    fn from(model: spotted::Model) -> Self {
        Self {
            id: model.id,
            owner_account_id: model.owner_account_id,
            anonymous: model.anonymous,
            location: GeoPoint {
                latitude: model.latitude,
                longitude: model.longitude,
            },
            message: model.message,
            created_at: model.created_at,
        }
    }
}

/// Map-pin projection: just enough to draw a marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpottedPin {
    pub id: Uuid,
    pub location: GeoPoint,
}

/// A region query result, projected according to `location_only`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SpottedView {
    Pin(SpottedPin),
    Full(Spotted),
}

impl SpottedView {
    pub fn id(&self) -> Uuid {
        match self {
            SpottedView::Pin(pin) => pin.id,
            SpottedView::Full(spotted) => spotted.id,
        }
    }
}
