//! Needs a PostGIS database in `DATABASE_URL`:
//!
//!     cargo test --test driver_search -- --ignored

use caballero::api::{DriverAPI, DriverSearchAPI, VehicleTypeAPI};
use caballero::auth::User;
use caballero::engine::Engine;
use caballero::entities::{Category, Coordinates, License, NewDriver, NewVehicleType, Vehicle};
use caballero::locator::{CANDIDATE_LIMIT, DISPATCH_RADIUS_M};
use chrono::Utc;
use rust_decimal_macros::dec;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn engine() -> Engine {
    dotenv::dotenv().ok();

    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a PostGIS database");
    let pool = PgPoolOptions::new().max_connections(5).connect(&url).await.unwrap();

    Engine::new(pool).await.unwrap()
}

fn user(roles: &[&str]) -> User {
    User::new(Uuid::new_v4(), roles.iter().map(|r| r.to_string()).collect())
}

#[tokio::test]
#[ignore]
async fn nearest_drivers_come_first_and_are_capped() {
    let engine = engine().await;
    let admin = user(&["admin"]);

    // a fresh vehicle type keeps drivers from other runs out of the result
    let van = engine
        .create_vehicle_type(
            admin.clone(),
            NewVehicleType {
                category: Category::Van,
                base_price: dec!(1500),
                price_per_km: dec!(300),
                price_per_minute: dec!(60),
                capacity: 7,
            },
        )
        .await
        .unwrap();

    let pickup = Coordinates::new(-40.0, 30.0);
    let mut expected = vec![];

    // inserted farthest first so the database order has to be fixed up
    for i in (0..12).rev() {
        let driver_user = user(&["driver"]);

        engine
            .register_driver(
                driver_user.clone(),
                NewDriver {
                    license: License {
                        number: format!("SRCH-{}", i),
                        expires_on: (Utc::now() + chrono::Duration::days(90)).date_naive(),
                    },
                    vehicle_type_id: van.id,
                    vehicle: Vehicle {
                        plate: format!("SR {}", i),
                        model: "Hiace".into(),
                        color: "grey".into(),
                        year: Some(2019),
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
                Coordinates::new(pickup.lat + 0.005 * (i as f64 + 1.0), pickup.lng),
            )
            .await
            .unwrap();

        expected.push((i, driver_user.id));
    }

    expected.sort();
    let nearest: Vec<Uuid> = expected.iter().take(CANDIDATE_LIMIT).map(|(_, id)| *id).collect();

    let candidates = engine
        .find_candidates(admin, pickup, van.id, DISPATCH_RADIUS_M)
        .await
        .unwrap();

    assert_eq!(candidates.iter().map(|c| c.driver.id).collect::<Vec<_>>(), nearest);
    assert!(candidates.windows(2).all(|w| w[0].distance_m <= w[1].distance_m));
}
