use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Coordinates, Driver, DriverLocation, NewDriver};
use crate::error::Error;
use crate::locator::{Candidate, DISPATCH_RADIUS_M};
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct AvailabilityParams {
    available: bool,
}

#[derive(Serialize, Deserialize)]
pub struct UpdateLocationParams {
    coordinates: Coordinates,
}

#[derive(Serialize, Deserialize)]
pub struct CandidatesQuery {
    lat: f64,
    lng: f64,
    vehicle_type_id: Uuid,
    radius_m: Option<f64>,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<NewDriver>,
) -> Result<Json<Driver>, Error> {
    let driver = api.register_driver(user, params).await?;

    Ok(driver.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, Error> {
    let driver = api.find_driver(user, id).await?;

    Ok(driver.into())
}

pub async fn verify(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, Error> {
    let driver = api.verify_driver(user, id).await?;

    Ok(driver.into())
}

pub async fn set_availability(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<AvailabilityParams>,
) -> Result<Json<Driver>, Error> {
    let driver = api.set_driver_availability(user, id, params.available).await?;

    Ok(driver.into())
}

pub async fn update_location(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateLocationParams>,
) -> Result<Json<DriverLocation>, Error> {
    let location = api.update_driver_location(user, id, params.coordinates).await?;

    Ok(location.into())
}

pub async fn candidates(
    Extension(api): Extension<DynAPI>,
    user: User,
    Query(query): Query<CandidatesQuery>,
) -> Result<Json<Vec<Candidate>>, Error> {
    let pickup = Coordinates::new(query.lat, query.lng);
    let radius_m = query.radius_m.unwrap_or(DISPATCH_RADIUS_M);

    let candidates = api
        .find_candidates(user, pickup, query.vehicle_type_id, radius_m)
        .await?;

    Ok(candidates.into())
}
