use axum::extract::{Extension, Json};

use crate::auth::User;
use crate::entities::{NewVehicleType, VehicleType};
use crate::error::Error;
use crate::server::DynAPI;

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<NewVehicleType>,
) -> Result<Json<VehicleType>, Error> {
    let vehicle_type = api.create_vehicle_type(user, params).await?;

    Ok(vehicle_type.into())
}

pub async fn list(Extension(api): Extension<DynAPI>, user: User) -> Result<Json<Vec<VehicleType>>, Error> {
    let vehicle_types = api.list_vehicle_types(user).await?;

    Ok(vehicle_types.into())
}
