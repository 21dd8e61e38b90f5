pub mod booking_requests;
pub mod bookings;
pub mod drivers;
pub mod fares;
pub mod maintenance;
pub mod tracking;
pub mod trips;
pub mod vehicle_types;
