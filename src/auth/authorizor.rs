use oso::{Oso, OsoError, PolarClass};

use crate::auth::{Platform, User};
use crate::entities::{Booking, BookingRequest, Driver, Trip};

pub fn new() -> Result<Oso, OsoError> {
    let mut o = Oso::new();

    o.register_class(Platform::get_polar_class())?;
    o.register_class(User::get_polar_class())?;
    o.register_class(Driver::get_polar_class())?;
    o.register_class(Booking::get_polar_class())?;
    o.register_class(BookingRequest::get_polar_class())?;
    o.register_class(Trip::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Category, Coordinates, NewBooking, Place, VehicleType};
    use crate::payment::PaymentMethod;
    use crate::routing::RouteEstimate;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn user(roles: &[&str]) -> User {
        User::new(Uuid::new_v4(), roles.iter().map(|r| r.to_string()).collect())
    }

    fn booking(passenger: &User) -> Booking {
        let taxi = VehicleType::new(Category::Taxi, dec!(1000), dec!(250), dec!(50), 4).unwrap();
        let params = NewBooking {
            vehicle_type_id: taxi.id,
            pickup: Place::new("Akwa", Coordinates::new(4.05, 9.77)),
            dropoff: Place::new("Bonapriso", Coordinates::new(4.06, 9.75)),
            is_shared: false,
            payment_method: PaymentMethod::Cash,
            notes: String::new(),
        };
        let route = RouteEstimate {
            distance_km: 2.48,
            duration_min: 6,
        };

        Booking::new(passenger.id, params, &taxi, route, Utc::now()).unwrap()
    }

    #[test]
    fn platform_actions() {
        let authorizor = new().unwrap();
        let anyone = user(&[]);
        let admin = user(&["admin"]);
        let system = User::new_system_user();

        for action in ["create_vehicle_type", "verify_driver", "expire_stale_requests"] {
            assert!(!authorizor.is_allowed(anyone.clone(), action, Platform::default()).unwrap());
            assert!(authorizor.is_allowed(admin.clone(), action, Platform::default()).unwrap());
            assert!(authorizor.is_allowed(system.clone(), action, Platform::default()).unwrap());
        }

        for action in ["create_booking", "estimate_fare", "register_driver", "list_trips"] {
            assert!(authorizor.is_allowed(anyone.clone(), action, Platform::default()).unwrap());
        }
    }

    #[test]
    fn booking_belongs_to_passenger() {
        let authorizor = new().unwrap();
        let passenger = user(&[]);
        let stranger = user(&[]);
        let booking = booking(&passenger);

        for action in ["read", "dispatch", "cancel"] {
            assert!(authorizor.is_allowed(passenger.clone(), action, booking.clone()).unwrap());
            assert!(!authorizor.is_allowed(stranger.clone(), action, booking.clone()).unwrap());
        }

        let system = User::new_system_user();
        assert!(authorizor.is_allowed(system.clone(), "dispatch", booking.clone()).unwrap());
        assert!(!authorizor.is_allowed(system, "cancel", booking).unwrap());
    }

    #[test]
    fn only_addressed_driver_answers_request() {
        let authorizor = new().unwrap();
        let passenger = user(&[]);
        let driver = user(&["driver"]);
        let other_driver = user(&["driver"]);

        let mut booking = booking(&passenger);
        let request = booking
            .dispatch(vec![driver.id], Utc::now())
            .unwrap()
            .remove(0);

        for action in ["read", "accept", "reject"] {
            assert!(authorizor.is_allowed(driver.clone(), action, request.clone()).unwrap());
            assert!(!authorizor.is_allowed(other_driver.clone(), action, request.clone()).unwrap());
            assert!(!authorizor.is_allowed(passenger.clone(), action, request.clone()).unwrap());
        }
    }

    #[test]
    fn trip_participants() {
        let authorizor = new().unwrap();
        let passenger = user(&[]);
        let driver = user(&["driver"]);
        let stranger = user(&[]);

        let mut booking = booking(&passenger);
        let trip = booking.convert_to_trip(driver.id, Utc::now()).unwrap();

        for action in ["read", "track", "update_status"] {
            assert!(authorizor.is_allowed(passenger.clone(), action, trip.clone()).unwrap());
            assert!(authorizor.is_allowed(driver.clone(), action, trip.clone()).unwrap());
            assert!(!authorizor.is_allowed(stranger.clone(), action, trip.clone()).unwrap());
        }

        assert!(authorizor.is_allowed(driver.clone(), "update_location", trip.clone()).unwrap());
        assert!(!authorizor.is_allowed(passenger.clone(), "update_location", trip.clone()).unwrap());

        for action in ["cancel", "rate"] {
            assert!(authorizor.is_allowed(passenger.clone(), action, trip.clone()).unwrap());
            assert!(!authorizor.is_allowed(driver.clone(), action, trip.clone()).unwrap());
        }
    }
}
