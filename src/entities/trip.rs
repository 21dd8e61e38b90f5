use chrono::{DateTime, Utc};
use oso::PolarClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Booking, Coordinates, Place};
use crate::error::{invalid_input_error, invalid_state_error, unauthorized_error, Error};
use crate::payment::{PaymentMethod, PaymentStatus};
use crate::routing::haversine_km;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub passenger_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_type_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub distance_km: f64,
    pub duration_min: i32,
    pub fare: Decimal,
    pub is_shared: bool,
    pub sharing_discount: Decimal,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub no_show_at: Option<DateTime<Utc>>,
    pub current_location: Option<Coordinates>,
    /// Sum of the straight legs between consecutive reported positions.
    #[serde(default)]
    pub distance_traveled_km: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub rating: Option<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Accepted,
    Arrived,
    Started,
    Completed,
    Cancelled,
    NoShow,
}

/// The part a user plays in a trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Passenger,
    Driver,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Arrived => "arrived",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Driver and passenger are on their way or riding.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Accepted | Self::Arrived | Self::Started)
    }

    pub fn can_be_cancelled(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }

    pub fn can_transition_to(&self, next: Status) -> bool {
        use Status::*;

        match next {
            Cancelled => self.can_be_cancelled(),
            _ => matches!(
                (self, next),
                (Pending, Accepted)
                    | (Accepted, Arrived)
                    | (Accepted, NoShow)
                    | (Arrived, Started)
                    | (Started, Completed)
            ),
        }
    }

    /// Who may move a trip into this status.
    pub fn allowed_role(&self) -> Option<Role> {
        match self {
            Self::Arrived | Self::Started | Self::Completed | Self::NoShow => Some(Role::Driver),
            Self::Cancelled => Some(Role::Passenger),
            Self::Pending | Self::Accepted => None,
        }
    }
}

impl PolarClass for Trip {
    fn get_polar_class_builder() -> oso::ClassBuilder<Trip> {
        oso::Class::builder()
            .name("Trip")
            .add_attribute_getter("id", |recv: &Trip| recv.id)
            .add_attribute_getter("passenger_id", |recv: &Trip| recv.passenger_id)
            .add_attribute_getter("driver_id", |recv: &Trip| recv.driver_id)
            .add_attribute_getter("status", |recv: &Trip| recv.status.name().to_string())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Trip::get_polar_class_builder();
        builder.build()
    }
}

impl Trip {
    pub fn from_booking(booking: &Booking, driver_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            passenger_id: booking.passenger_id,
            driver_id,
            vehicle_type_id: booking.vehicle_type_id,
            pickup: booking.pickup.clone(),
            dropoff: booking.dropoff.clone(),
            distance_km: booking.distance_km,
            duration_min: booking.duration_min,
            fare: booking.estimated_fare,
            is_shared: booking.is_shared,
            sharing_discount: booking.sharing_discount,
            status: Status::Accepted,
            created_at: now,
            accepted_at: Some(now),
            arrived_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            no_show_at: None,
            current_location: None,
            distance_traveled_km: 0.0,
            payment_method: booking.payment_method,
            payment_status: PaymentStatus::Pending,
            rating: None,
        }
    }

    pub fn role_of(&self, user: &User) -> Option<Role> {
        if user.id == self.driver_id {
            Some(Role::Driver)
        } else if user.id == self.passenger_id {
            Some(Role::Passenger)
        } else {
            None
        }
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status.can_be_cancelled()
    }

    /// Moves the trip to `next` on behalf of `role`, stamping the matching
    /// timestamp. Cancellation after pickup is refused here, whatever the
    /// caller.
    #[tracing::instrument(skip(self), fields(trip_id = %self.id))]
    pub fn transition(&mut self, next: Status, role: Role, now: DateTime<Utc>) -> Result<(), Error> {
        if next.allowed_role() != Some(role) {
            return Err(unauthorized_error().with_message(format!(
                "{:?} cannot move a trip to {}",
                role,
                next.name()
            )));
        }

        if !self.status.can_transition_to(next) {
            return Err(invalid_state_error().with_message(format!(
                "trip cannot go from {} to {}",
                self.status.name(),
                next.name()
            )));
        }

        self.status = next;
        self.stamp(now);

        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        self.transition(Status::Cancelled, Role::Passenger, now)
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        let slot = match self.status {
            Status::Pending => return,
            Status::Accepted => &mut self.accepted_at,
            Status::Arrived => &mut self.arrived_at,
            Status::Started => &mut self.started_at,
            Status::Completed => &mut self.completed_at,
            Status::Cancelled => &mut self.cancelled_at,
            Status::NoShow => &mut self.no_show_at,
        };

        slot.get_or_insert(now);
    }

    pub fn record_position(&mut self, coordinates: Coordinates) -> Result<(), Error> {
        if !self.status.is_in_progress() {
            return Err(invalid_state_error().with_message("trip is not in progress"));
        }

        if let Some(previous) = self.current_location.replace(coordinates) {
            self.distance_traveled_km += haversine_km(previous, coordinates);
        }

        Ok(())
    }

    pub fn rate(&mut self, stars: u8) -> Result<(), Error> {
        if !(1..=5).contains(&stars) {
            return Err(invalid_input_error().with_message("rating must be between 1 and 5"));
        }

        if self.status != Status::Completed {
            return Err(invalid_state_error().with_message("only completed trips can be rated"));
        }

        if self.rating.is_some() {
            return Err(invalid_state_error().with_message("trip has already been rated"));
        }

        self.rating = Some(stars);
        Ok(())
    }
}
