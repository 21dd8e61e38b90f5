use super::helpers::{fetch_driver_for_update, fetch_vehicle_type, update_driver, upsert_driver_location};
use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{types::Json, Acquire, Executor, Row};
use uuid::Uuid;

use crate::{
    api::DriverAPI,
    auth::{Platform, User},
    entities::{Coordinates, Driver, DriverLocation, NewDriver},
    error::{invalid_input_error, invalid_state_error, not_found_error, Error},
};

#[async_trait]
impl DriverAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn register_driver(&self, user: User, params: NewDriver) -> Result<Driver, Error> {
        self.authorize(user.clone(), "register_driver", Platform::default())?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let vehicle_type = fetch_vehicle_type(&mut tx, &params.vehicle_type_id)
            .await
            .map_err(|err| {
                if err.is_not_found_error() {
                    invalid_input_error().with_message("unknown vehicle type")
                } else {
                    err
                }
            })?;

        if !vehicle_type.is_active {
            return Err(invalid_input_error().with_message("vehicle type is not available"));
        }

        let driver = Driver::new(user.id, params.license, vehicle_type.id, params.vehicle, Utc::now())?;

        let result = tx
            .execute(
                sqlx::query(
                    "INSERT INTO drivers (id, vehicle_type_id, is_available, is_verified, data)
                        VALUES ($1, $2, $3, $4, $5)
                        ON CONFLICT (id) DO NOTHING",
                )
                .bind(&driver.id)
                .bind(&driver.vehicle_type_id)
                .bind(driver.is_available)
                .bind(driver.is_verified)
                .bind(Json(&driver)),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(invalid_state_error().with_message("user is already registered as a driver"));
        }

        tx.commit().await?;

        tracing::info!(driver_id = %driver.id, "driver registered");

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn find_driver(&self, user: User, id: Uuid) -> Result<Driver, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(driver): Json<Driver> = conn
            .fetch_optional(sqlx::query("SELECT data FROM drivers WHERE id = $1").bind(&id))
            .await?
            .ok_or_else(|| not_found_error().with_message("driver not found"))?
            .try_get("data")?;

        self.authorize(user.clone(), "read", driver.clone())?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn verify_driver(&self, user: User, id: Uuid) -> Result<Driver, Error> {
        self.authorize(user.clone(), "verify_driver", Platform::default())?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut driver = fetch_driver_for_update(&mut tx, &id).await?;

        driver.verify();

        update_driver(&mut tx, &driver).await?;

        tx.commit().await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn set_driver_availability(&self, user: User, id: Uuid, available: bool) -> Result<Driver, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut driver = fetch_driver_for_update(&mut tx, &id).await?;

        self.authorize(user.clone(), "update", driver.clone())?;

        driver.set_availability(available)?;

        update_driver(&mut tx, &driver).await?;

        tx.commit().await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn update_driver_location(
        &self,
        user: User,
        id: Uuid,
        coordinates: Coordinates,
    ) -> Result<DriverLocation, Error> {
        coordinates.validate()?;

        let driver = self.find_driver(user.clone(), id).await?;

        self.authorize(user.clone(), "update", driver.clone())?;

        let location = DriverLocation {
            driver_id: driver.id,
            coordinates,
            updated_at: Utc::now(),
        };

        upsert_driver_location(&self.pool, &location.driver_id, location.coordinates, location.updated_at).await?;

        Ok(location)
    }
}
