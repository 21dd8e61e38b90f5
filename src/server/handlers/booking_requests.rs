use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{BookingRequest, Trip};
use crate::error::{unavailable_error, Error};
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct RejectResponse {
    rejected: bool,
}

pub async fn inbox(Extension(api): Extension<DynAPI>, user: User) -> Result<Json<Vec<BookingRequest>>, Error> {
    let requests = api.list_driver_requests(user).await?;

    Ok(requests.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingRequest>, Error> {
    let request = api.find_booking_request(user, id).await?;

    Ok(request.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, Error> {
    let trip = api
        .accept_booking_request(user, id)
        .await?
        .ok_or_else(unavailable_error)?;

    Ok(trip.into())
}

pub async fn reject(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<RejectResponse>, Error> {
    let rejected = api.reject_booking_request(user, id).await?;

    Ok(RejectResponse { rejected }.into())
}
