mod booking;
mod booking_request;
mod driver;
mod place;
mod position;
mod trip;
mod vehicle_type;

pub use booking::{Booking, NewBooking, Status as BookingStatus, BOOKING_TTL_MINUTES};
pub use booking_request::{BookingRequest, Status as RequestStatus, REQUEST_TTL_SECONDS};
pub use driver::{Driver, DriverLocation, License, NewDriver, Vehicle};
pub use place::{Coordinates, Place};
pub use position::PositionSample;
pub use trip::{Role as TripRole, Status as TripStatus, Trip};
pub use vehicle_type::{Category, NewVehicleType, VehicleType};
