use chrono::{DateTime, NaiveDate, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Coordinates;
use crate::error::{invalid_input_error, invalid_state_error, Error};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub number: String,
    pub expires_on: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub plate: String,
    pub model: String,
    pub color: String,
    pub year: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, PolarClass)]
pub struct Driver {
    #[polar(attribute)]
    pub id: Uuid,
    pub license: License,
    pub vehicle_type_id: Uuid,
    pub vehicle: Vehicle,
    pub is_available: bool,
    pub is_verified: bool,
    pub rating: f64,
    pub rating_count: i32,
    pub total_trips: i32,
    pub active_trip_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewDriver {
    pub license: License,
    pub vehicle_type_id: Uuid,
    pub vehicle: Vehicle,
}

/// Last reported position of a driver. Each ping overwrites the previous one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverLocation {
    pub driver_id: Uuid,
    pub coordinates: Coordinates,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn new(
        user_id: Uuid,
        license: License,
        vehicle_type_id: Uuid,
        vehicle: Vehicle,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        if license.number.trim().is_empty() || vehicle.plate.trim().is_empty() {
            return Err(invalid_input_error().with_message("license number and plate are required"));
        }

        if license.expires_on < now.date_naive() {
            return Err(invalid_input_error().with_message("license has expired"));
        }

        Ok(Self {
            id: user_id,
            license,
            vehicle_type_id,
            vehicle,
            is_available: false,
            is_verified: false,
            rating: 0.0,
            rating_count: 0,
            total_trips: 0,
            active_trip_id: None,
            created_at: now,
        })
    }

    pub fn is_on_trip(&self) -> bool {
        self.active_trip_id.is_some()
    }

    pub fn verify(&mut self) {
        self.is_verified = true;
    }

    #[tracing::instrument(skip(self), fields(driver_id = %self.id))]
    pub fn set_availability(&mut self, available: bool) -> Result<(), Error> {
        if available && self.is_on_trip() {
            return Err(invalid_state_error().with_message("driver is on an active trip"));
        }

        self.is_available = available;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(driver_id = %self.id))]
    pub fn assign(&mut self, trip_id: Uuid) -> Result<(), Error> {
        if self.is_on_trip() {
            return Err(invalid_state_error().with_message("driver is on an active trip"));
        }

        self.active_trip_id = Some(trip_id);
        self.is_available = false;
        Ok(())
    }

    /// Frees the driver once their trip reaches a terminal state.
    #[tracing::instrument(skip(self), fields(driver_id = %self.id))]
    pub fn release(&mut self, trip_id: Uuid, completed: bool) {
        if self.active_trip_id != Some(trip_id) {
            return;
        }

        self.active_trip_id = None;
        self.is_available = true;

        if completed {
            self.total_trips += 1;
        }
    }

    pub fn record_rating(&mut self, stars: u8) {
        let total = self.rating * f64::from(self.rating_count) + f64::from(stars);
        self.rating_count += 1;
        self.rating = total / f64::from(self.rating_count);
    }
}
