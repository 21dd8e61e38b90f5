//! Needs a PostGIS database in `DATABASE_URL`:
//!
//!     cargo test --test accept_race -- --ignored

use std::sync::Arc;

use caballero::api::{BookingAPI, BookingRequestAPI, DriverAPI, MaintenanceAPI, TripAPI, VehicleTypeAPI};
use caballero::auth::User;
use caballero::engine::Engine;
use caballero::entities::{
    BookingStatus, Category, Coordinates, License, NewBooking, NewDriver, NewVehicleType, Place, RequestStatus,
    TripStatus, Vehicle,
};
use caballero::payment::PaymentMethod;
use chrono::Utc;
use rust_decimal_macros::dec;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn engine() -> Engine {
    dotenv::dotenv().ok();

    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a PostGIS database");
    let pool = PgPoolOptions::new().max_connections(10).connect(&url).await.unwrap();

    Engine::new(pool).await.unwrap()
}

fn user(roles: &[&str]) -> User {
    User::new(Uuid::new_v4(), roles.iter().map(|r| r.to_string()).collect())
}

#[tokio::test]
#[ignore]
async fn concurrent_acceptances_create_exactly_one_trip() {
    let engine = Arc::new(engine().await);
    let admin = user(&["admin"]);

    let taxi = engine
        .create_vehicle_type(
            admin.clone(),
            NewVehicleType {
                category: Category::Taxi,
                base_price: dec!(1000),
                price_per_km: dec!(250),
                price_per_minute: dec!(50),
                capacity: 4,
            },
        )
        .await
        .unwrap();

    // a pickup far from anything other test runs may have left behind
    let lat = -60.0 + rand_offset();
    let pickup = Coordinates::new(lat, 20.0);

    let mut drivers = vec![];

    for i in 0..5 {
        let driver_user = user(&["driver"]);

        engine
            .register_driver(
                driver_user.clone(),
                NewDriver {
                    license: License {
                        number: format!("RACE-{}", i),
                        expires_on: (Utc::now() + chrono::Duration::days(365)).date_naive(),
                    },
                    vehicle_type_id: taxi.id,
                    vehicle: Vehicle {
                        plate: format!("RC {}", i),
                        model: "Corolla".into(),
                        color: "white".into(),
                        year: None,
                    },
                },
            )
            .await
            .unwrap();

        engine.verify_driver(admin.clone(), driver_user.id).await.unwrap();
        engine
            .set_driver_availability(driver_user.clone(), driver_user.id, true)
            .await
            .unwrap();
        engine
            .update_driver_location(
                driver_user.clone(),
                driver_user.id,
                Coordinates::new(lat + 0.001 * (i as f64 + 1.0), 20.0),
            )
            .await
            .unwrap();

        drivers.push(driver_user);
    }

    let passenger = user(&[]);

    let booking = engine
        .create_booking(
            passenger.clone(),
            NewBooking {
                vehicle_type_id: taxi.id,
                pickup: Place::new("pickup", pickup),
                dropoff: Place::new("dropoff", Coordinates::new(lat + 0.02, 20.01)),
                is_shared: false,
                payment_method: PaymentMethod::Cash,
                notes: String::new(),
            },
        )
        .await
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Searching);

    let requests = engine
        .list_booking_requests(passenger.clone(), booking.id)
        .await
        .unwrap();
    assert_eq!(requests.len(), drivers.len());

    let handles: Vec<_> = requests
        .iter()
        .map(|request| {
            let engine = engine.clone();
            let driver = drivers.iter().find(|d| d.id == request.driver_id).unwrap().clone();
            let request_id = request.id;

            tokio::spawn(async move { engine.accept_booking_request(driver, request_id).await.unwrap() })
        })
        .collect();

    let mut trips = vec![];
    for handle in handles {
        if let Some(trip) = handle.await.unwrap() {
            trips.push(trip);
        }
    }

    assert_eq!(trips.len(), 1);

    let requests = engine
        .list_booking_requests(passenger.clone(), booking.id)
        .await
        .unwrap();

    let accepted = requests.iter().filter(|r| r.status == RequestStatus::Accepted).count();
    let expired = requests.iter().filter(|r| r.status == RequestStatus::Expired).count();
    assert_eq!(accepted, 1);
    assert_eq!(expired, drivers.len() - 1);

    let booking = engine.find_booking(passenger.clone(), booking.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Accepted);

    // the trip shows up in both participants' history, filtered by status
    let trip = &trips[0];
    let history = engine.list_trips(passenger.clone(), None).await.unwrap();
    assert_eq!(history.iter().map(|t| t.id).collect::<Vec<_>>(), vec![trip.id]);

    let driver = drivers.iter().find(|d| d.id == trip.driver_id).unwrap().clone();
    let history = engine.list_trips(driver, Some(TripStatus::Accepted)).await.unwrap();
    assert_eq!(history.len(), 1);

    let completed = engine.list_trips(passenger.clone(), Some(TripStatus::Completed)).await.unwrap();
    assert!(completed.is_empty());

    let stranger = engine.list_trips(user(&[]), None).await.unwrap();
    assert!(stranger.is_empty());

    // a sweep right after must not touch the accepted booking
    engine
        .expire_stale_requests(User::new_system_user())
        .await
        .unwrap();
}

fn rand_offset() -> f64 {
    (Uuid::new_v4().as_u128() % 1000) as f64 / 100.0
}
