use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{
    Booking, BookingRequest, Coordinates, Driver, DriverLocation, NewBooking, NewDriver, NewVehicleType,
    PositionSample, Trip, TripStatus, VehicleType,
};
use crate::error::Error;
use crate::locator::Candidate;
use crate::matching::SweepReport;
use crate::pricing::{FareEstimate, FareQuery};
use crate::tracking::OutboundEvent;

#[async_trait]
pub trait VehicleTypeAPI {
    async fn create_vehicle_type(&self, user: User, params: NewVehicleType) -> Result<VehicleType, Error>;

    async fn list_vehicle_types(&self, user: User) -> Result<Vec<VehicleType>, Error>;
}

#[async_trait]
pub trait FareAPI {
    async fn estimate_fare(&self, user: User, query: FareQuery) -> Result<FareEstimate, Error>;
}

#[async_trait]
pub trait DriverAPI {
    async fn register_driver(&self, user: User, params: NewDriver) -> Result<Driver, Error>;

    async fn find_driver(&self, user: User, id: Uuid) -> Result<Driver, Error>;

    async fn verify_driver(&self, user: User, id: Uuid) -> Result<Driver, Error>;

    async fn set_driver_availability(&self, user: User, id: Uuid, available: bool) -> Result<Driver, Error>;

    async fn update_driver_location(
        &self,
        user: User,
        id: Uuid,
        coordinates: Coordinates,
    ) -> Result<DriverLocation, Error>;
}

#[async_trait]
pub trait DriverSearchAPI {
    async fn find_candidates(
        &self,
        user: User,
        pickup: Coordinates,
        vehicle_type_id: Uuid,
        radius_m: f64,
    ) -> Result<Vec<Candidate>, Error>;
}

#[async_trait]
pub trait BookingAPI {
    async fn create_booking(&self, user: User, params: NewBooking) -> Result<Booking, Error>;

    async fn find_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;

    async fn dispatch_booking(&self, user: User, id: Uuid) -> Result<Vec<BookingRequest>, Error>;

    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;

    async fn list_booking_requests(&self, user: User, id: Uuid) -> Result<Vec<BookingRequest>, Error>;
}

#[async_trait]
pub trait BookingRequestAPI {
    async fn list_driver_requests(&self, user: User) -> Result<Vec<BookingRequest>, Error>;

    async fn find_booking_request(&self, user: User, id: Uuid) -> Result<BookingRequest, Error>;

    async fn accept_booking_request(&self, user: User, id: Uuid) -> Result<Option<Trip>, Error>;

    async fn reject_booking_request(&self, user: User, id: Uuid) -> Result<bool, Error>;
}

#[async_trait]
pub trait TripAPI {
    async fn find_trip(&self, user: User, id: Uuid) -> Result<Trip, Error>;

    async fn update_trip_status(&self, user: User, id: Uuid, status: TripStatus) -> Result<Trip, Error>;

    async fn update_trip_location(
        &self,
        user: User,
        id: Uuid,
        coordinates: Coordinates,
    ) -> Result<PositionSample, Error>;

    async fn cancel_trip(&self, user: User, id: Uuid) -> Result<Trip, Error>;

    async fn rate_trip(&self, user: User, id: Uuid, stars: u8) -> Result<Trip, Error>;

    async fn list_trip_positions(&self, user: User, id: Uuid) -> Result<Vec<PositionSample>, Error>;

    /// Trips the user took part in as passenger or driver, newest first.
    async fn list_trips(&self, user: User, status: Option<TripStatus>) -> Result<Vec<Trip>, Error>;
}

#[async_trait]
pub trait TrackingAPI {
    async fn join_trip_tracking(
        &self,
        user: User,
        id: Uuid,
    ) -> Result<(Trip, broadcast::Receiver<OutboundEvent>), Error>;

    async fn handle_tracking_message(&self, user: User, id: Uuid, text: String) -> Result<(), Error>;

    async fn leave_trip_tracking(&self, id: Uuid);
}

#[async_trait]
pub trait MaintenanceAPI {
    async fn expire_stale_requests(&self, user: User) -> Result<SweepReport, Error>;
}

pub trait API:
    VehicleTypeAPI
    + FareAPI
    + DriverAPI
    + DriverSearchAPI
    + BookingAPI
    + BookingRequestAPI
    + TripAPI
    + TrackingAPI
    + MaintenanceAPI
{
}
