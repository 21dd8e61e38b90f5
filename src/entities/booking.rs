use chrono::{DateTime, Duration, Utc};
use oso::PolarClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{BookingRequest, Place, Trip, VehicleType};
use crate::error::{invalid_input_error, invalid_state_error, Error};
use crate::payment::PaymentMethod;
use crate::pricing::{estimate_fare, SHARED_RIDE_DISCOUNT_PERCENT};
use crate::routing::RouteEstimate;

/// How long a booking may wait for a driver before it expires.
pub const BOOKING_TTL_MINUTES: i64 = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, PolarClass)]
pub struct Booking {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub passenger_id: Uuid,
    pub vehicle_type_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub distance_km: f64,
    pub duration_min: i32,
    pub estimated_fare: Decimal,
    pub is_shared: bool,
    pub sharing_discount: Decimal,
    pub payment_method: PaymentMethod,
    pub notes: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Searching,
    Accepted,
    Arrived,
    Started,
    Completed,
    Cancelled,
    Expired,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Searching => "searching",
            Self::Accepted => "accepted",
            Self::Arrived => "arrived",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }

    pub fn can_transition_to(&self, next: Status) -> bool {
        use Status::*;

        matches!(
            (self, next),
            (Pending, Searching)
                | (Pending | Searching, Accepted)
                | (Pending | Searching, Expired)
                | (Pending | Searching | Accepted, Cancelled)
                | (Accepted, Arrived)
                | (Arrived, Started)
                | (Started, Completed)
        )
    }
}

/// Passenger input for a new booking, before route and fare are known.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewBooking {
    pub vehicle_type_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: String,
}

impl NewBooking {
    pub fn validate(&self) -> Result<(), Error> {
        self.pickup.coordinates.validate()?;
        self.dropoff.coordinates.validate()?;

        if self.pickup.address.trim().is_empty() || self.dropoff.address.trim().is_empty() {
            return Err(invalid_input_error().with_message("pickup and dropoff addresses are required"));
        }

        Ok(())
    }
}

impl Booking {
    /// Builds a booking with its fare fixed from the given route. The fare is
    /// never recomputed afterwards.
    pub fn new(
        passenger_id: Uuid,
        params: NewBooking,
        vehicle_type: &VehicleType,
        route: RouteEstimate,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        params.validate()?;

        if params.vehicle_type_id != vehicle_type.id || !vehicle_type.is_active {
            return Err(invalid_input_error().with_message("vehicle type is not available"));
        }

        let estimated_fare = estimate_fare(
            vehicle_type,
            route.distance_km,
            route.duration_min,
            params.is_shared,
        )?;

        let sharing_discount = if params.is_shared {
            SHARED_RIDE_DISCOUNT_PERCENT
        } else {
            Decimal::ZERO
        };

        Ok(Self {
            id: Uuid::new_v4(),
            passenger_id,
            vehicle_type_id: vehicle_type.id,
            pickup: params.pickup,
            dropoff: params.dropoff,
            distance_km: route.distance_km,
            duration_min: route.duration_min,
            estimated_fare,
            is_shared: params.is_shared,
            sharing_discount,
            payment_method: params.payment_method,
            notes: params.notes,
            status: Status::Pending,
            created_at: now,
            expires_at: now + Duration::minutes(BOOKING_TTL_MINUTES),
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Still looking for a driver.
    pub fn is_open(&self) -> bool {
        matches!(self.status, Status::Pending | Status::Searching)
    }

    fn transition(&mut self, next: Status) -> Result<(), Error> {
        if !self.status.can_transition_to(next) {
            return Err(invalid_state_error().with_message(format!(
                "booking cannot go from {} to {}",
                self.status.name(),
                next.name()
            )));
        }

        self.status = next;
        Ok(())
    }

    /// Creates one offer per candidate driver. The booking moves to
    /// `searching` when at least one offer went out and stays `pending`
    /// otherwise.
    #[tracing::instrument(skip(self, driver_ids), fields(booking_id = %self.id))]
    pub fn dispatch<I>(&mut self, driver_ids: I, now: DateTime<Utc>) -> Result<Vec<BookingRequest>, Error>
    where
        I: IntoIterator<Item = Uuid>,
    {
        if self.status != Status::Pending {
            return Err(invalid_state_error().with_message("only pending bookings can be dispatched"));
        }

        if self.is_expired(now) {
            return Err(invalid_state_error().with_message("booking has expired"));
        }

        let mut requests: Vec<BookingRequest> = Vec::new();

        for driver_id in driver_ids {
            if requests.iter().any(|r| r.driver_id == driver_id) {
                continue;
            }

            requests.push(BookingRequest::new(self.id, driver_id, now));
        }

        if !requests.is_empty() {
            self.transition(Status::Searching)?;
        }

        tracing::info!("dispatched {} requests", requests.len());

        Ok(requests)
    }

    /// Turns the booking into a trip assigned to `driver_id`.
    #[tracing::instrument(skip(self), fields(booking_id = %self.id))]
    pub fn convert_to_trip(&mut self, driver_id: Uuid, now: DateTime<Utc>) -> Result<Trip, Error> {
        self.transition(Status::Accepted)?;

        Ok(Trip::from_booking(self, driver_id, now))
    }

    /// Expires the booking if its window has passed. Returns whether the
    /// status changed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_open() || !self.is_expired(now) {
            return false;
        }

        self.status = Status::Expired;
        true
    }

    pub fn cancel(&mut self) -> Result<(), Error> {
        self.transition(Status::Cancelled)
    }
}
