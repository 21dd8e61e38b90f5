use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Coordinates, PositionSample, Trip, TripStatus};
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct UpdateStatusParams {
    status: TripStatus,
}

#[derive(Serialize, Deserialize)]
pub struct UpdateLocationParams {
    coordinates: Coordinates,
}

#[derive(Serialize, Deserialize)]
pub struct RateParams {
    stars: u8,
}

#[derive(Serialize, Deserialize)]
pub struct ListQuery {
    status: Option<TripStatus>,
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    user: User,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Trip>>, Error> {
    let trips = api.list_trips(user, query.status).await?;

    Ok(trips.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, Error> {
    let trip = api.find_trip(user, id).await?;

    Ok(trip.into())
}

pub async fn update_status(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateStatusParams>,
) -> Result<Json<Trip>, Error> {
    let trip = api.update_trip_status(user, id, params.status).await?;

    Ok(trip.into())
}

pub async fn update_location(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateLocationParams>,
) -> Result<Json<PositionSample>, Error> {
    let sample = api.update_trip_location(user, id, params.coordinates).await?;

    Ok(sample.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, Error> {
    let trip = api.cancel_trip(user, id).await?;

    Ok(trip.into())
}

pub async fn rate(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<RateParams>,
) -> Result<Json<Trip>, Error> {
    let trip = api.rate_trip(user, id, params.stars).await?;

    Ok(trip.into())
}

pub async fn positions(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PositionSample>>, Error> {
    let samples = api.list_trip_positions(user, id).await?;

    Ok(samples.into())
}
