use super::Engine;

use async_trait::async_trait;
use sqlx::{types::Json, Executor, Row};

use crate::{
    api::VehicleTypeAPI,
    auth::{Platform, User},
    entities::{NewVehicleType, VehicleType},
    error::Error,
};

#[async_trait]
impl VehicleTypeAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_vehicle_type(&self, user: User, params: NewVehicleType) -> Result<VehicleType, Error> {
        self.authorize(user.clone(), "create_vehicle_type", Platform::default())?;

        let vehicle_type = VehicleType::from_params(params)?;

        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query("INSERT INTO vehicle_types (id, is_active, data) VALUES ($1, $2, $3)")
                .bind(&vehicle_type.id)
                .bind(vehicle_type.is_active)
                .bind(Json(&vehicle_type)),
        )
        .await?;

        tracing::info!(vehicle_type_id = %vehicle_type.id, "vehicle type created");

        Ok(vehicle_type)
    }

    #[tracing::instrument(skip(self))]
    async fn list_vehicle_types(&self, user: User) -> Result<Vec<VehicleType>, Error> {
        self.authorize(user.clone(), "list_vehicle_types", Platform::default())?;

        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(sqlx::query("SELECT data FROM vehicle_types WHERE is_active ORDER BY data->>'category'"))
            .await?;

        let mut vehicle_types = vec![];

        for result in results.iter() {
            let Json(vehicle_type): Json<VehicleType> = result.try_get("data")?;
            vehicle_types.push(vehicle_type);
        }

        Ok(vehicle_types)
    }
}
