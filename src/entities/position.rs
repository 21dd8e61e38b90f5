use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Coordinates;

/// One entry of a trip's position history, stamped by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub trip_id: Uuid,
    pub coordinates: Coordinates,
    pub recorded_at: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(trip_id: Uuid, coordinates: Coordinates, recorded_at: DateTime<Utc>) -> Self {
        Self {
            trip_id,
            coordinates,
            recorded_at,
        }
    }
}
