use super::Database;

use chrono::{DateTime, Utc};
use geo_types::Geometry;
use geozero::wkb;
use sqlx::{types::Json, Executor, Row, Transaction};
use uuid::Uuid;

use crate::{
    entities::{Booking, BookingRequest, Coordinates, Driver, Trip, VehicleType},
    error::{not_found_error, Error},
};

#[tracing::instrument(skip(executor))]
pub async fn fetch_vehicle_type<'e, E>(executor: E, id: &Uuid) -> Result<VehicleType, Error>
where
    E: Executor<'e, Database = Database>,
{
    let Json(vehicle_type): Json<VehicleType> = executor
        .fetch_optional(sqlx::query("SELECT data FROM vehicle_types WHERE id = $1").bind(id))
        .await?
        .ok_or_else(|| not_found_error().with_message("vehicle type not found"))?
        .try_get("data")?;

    Ok(vehicle_type)
}

#[tracing::instrument(skip(executor))]
pub async fn fetch_booking_request<'e, E>(executor: E, id: &Uuid) -> Result<BookingRequest, Error>
where
    E: Executor<'e, Database = Database>,
{
    let Json(request): Json<BookingRequest> = executor
        .fetch_optional(sqlx::query("SELECT data FROM booking_requests WHERE id = $1").bind(id))
        .await?
        .ok_or_else(|| not_found_error().with_message("booking request not found"))?
        .try_get("data")?;

    Ok(request)
}

#[tracing::instrument(skip(executor))]
pub async fn fetch_trip<'e, E>(executor: E, id: &Uuid) -> Result<Trip, Error>
where
    E: Executor<'e, Database = Database>,
{
    let Json(trip): Json<Trip> = executor
        .fetch_optional(sqlx::query("SELECT data FROM trips WHERE id = $1").bind(id))
        .await?
        .ok_or_else(|| not_found_error().with_message("trip not found"))?
        .try_get("data")?;

    Ok(trip)
}

/// Located drivers around `pickup` that could serve `vehicle_type_id`, at
/// most `limit` of them, nearest first. Exact ranking happens in the locator.
#[tracing::instrument(skip(executor))]
pub async fn fetch_located_drivers<'e, E>(
    executor: E,
    pickup: Coordinates,
    vehicle_type_id: &Uuid,
    radius_m: f64,
    limit: usize,
) -> Result<Vec<(Driver, Coordinates)>, Error>
where
    E: Executor<'e, Database = Database>,
{
    let pickup_location: Geometry<f64> = pickup.into();

    let query = "
        SELECT
            d.data AS driver,
            ST_Y(l.location) AS lat,
            ST_X(l.location) AS lng
        FROM
            drivers d
            JOIN driver_locations l ON d.id = l.driver_id
        WHERE
            d.is_available
            AND d.is_verified
            AND d.vehicle_type_id = $2
            AND ST_DWithin(l.location::geography, ST_SetSRID($1, 4326)::geography, $3)
        ORDER BY
            ST_Distance(l.location::geography, ST_SetSRID($1, 4326)::geography)
        LIMIT $4
    ";

    let results = executor
        .fetch_all(
            sqlx::query(query)
                .bind(wkb::Encode(pickup_location))
                .bind(vehicle_type_id)
                .bind(radius_m)
                .bind(limit as i64),
        )
        .await?;

    let mut located = Vec::with_capacity(results.len());

    for result in results.iter() {
        let Json(driver): Json<Driver> = result.try_get("driver")?;
        let lat: f64 = result.try_get("lat")?;
        let lng: f64 = result.try_get("lng")?;

        located.push((driver, Coordinates::new(lat, lng)));
    }

    Ok(located)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_booking_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Booking, Error> {
    let Json(booking): Json<Booking> = tx
        .fetch_optional(sqlx::query("SELECT data FROM bookings WHERE id = $1 FOR UPDATE").bind(id))
        .await?
        .ok_or_else(|| not_found_error().with_message("booking not found"))?
        .try_get("data")?;

    Ok(booking)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_booking_requests_for_update(
    tx: &mut Transaction<'_, Database>,
    booking_id: &Uuid,
) -> Result<Vec<BookingRequest>, Error> {
    let results = tx
        .fetch_all(
            sqlx::query("SELECT data FROM booking_requests WHERE booking_id = $1 ORDER BY id FOR UPDATE")
                .bind(booking_id),
        )
        .await?;

    let mut requests = Vec::with_capacity(results.len());

    for result in results.iter() {
        let Json(request): Json<BookingRequest> = result.try_get("data")?;
        requests.push(request);
    }

    Ok(requests)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_driver_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Driver, Error> {
    let Json(driver): Json<Driver> = tx
        .fetch_optional(sqlx::query("SELECT data FROM drivers WHERE id = $1 FOR UPDATE").bind(id))
        .await?
        .ok_or_else(|| not_found_error().with_message("driver not found"))?
        .try_get("data")?;

    Ok(driver)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_trip_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Trip, Error> {
    let Json(trip): Json<Trip> = tx
        .fetch_optional(sqlx::query("SELECT data FROM trips WHERE id = $1 FOR UPDATE").bind(id))
        .await?
        .ok_or_else(|| not_found_error().with_message("trip not found"))?
        .try_get("data")?;

    Ok(trip)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_trip_by_booking_for_update(
    tx: &mut Transaction<'_, Database>,
    booking_id: &Uuid,
) -> Result<Option<Trip>, Error> {
    let maybe_result = tx
        .fetch_optional(
            sqlx::query("SELECT data FROM trips WHERE booking_id = $1 FOR UPDATE").bind(booking_id),
        )
        .await?;

    match maybe_result {
        Some(result) => {
            let Json(trip): Json<Trip> = result.try_get("data")?;
            Ok(Some(trip))
        }
        None => Ok(None),
    }
}

#[tracing::instrument(skip(tx, booking), fields(booking_id = %booking.id))]
pub async fn insert_booking(tx: &mut Transaction<'_, Database>, booking: &Booking) -> Result<(), Error> {
    tx.execute(
        sqlx::query("INSERT INTO bookings (id, passenger_id, status, expires_at, data) VALUES ($1, $2, $3, $4, $5)")
            .bind(&booking.id)
            .bind(&booking.passenger_id)
            .bind(booking.status.name())
            .bind(booking.expires_at)
            .bind(Json(booking)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx, booking), fields(booking_id = %booking.id))]
pub async fn update_booking(tx: &mut Transaction<'_, Database>, booking: &Booking) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE bookings SET status = $2, data = $3 WHERE id = $1")
            .bind(&booking.id)
            .bind(booking.status.name())
            .bind(Json(booking)),
    )
    .await?;

    Ok(())
}

/// Inserts the requests, skipping any driver that already has one for the
/// booking. Returns the requests that were actually stored.
#[tracing::instrument(skip(tx, requests))]
pub async fn insert_booking_requests(
    tx: &mut Transaction<'_, Database>,
    requests: Vec<BookingRequest>,
) -> Result<Vec<BookingRequest>, Error> {
    let mut inserted = Vec::with_capacity(requests.len());

    for request in requests {
        let result = sqlx::query(
            "INSERT INTO booking_requests (id, booking_id, driver_id, status, expires_at, data)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (booking_id, driver_id) DO NOTHING",
        )
        .bind(&request.id)
        .bind(&request.booking_id)
        .bind(&request.driver_id)
        .bind(request.status.name())
        .bind(request.expires_at)
        .bind(Json(&request))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 1 {
            inserted.push(request);
        } else {
            tracing::info!(driver_id = %request.driver_id, "driver already has a request for this booking");
        }
    }

    Ok(inserted)
}

#[tracing::instrument(skip(tx, requests))]
pub async fn update_booking_requests(
    tx: &mut Transaction<'_, Database>,
    requests: &[BookingRequest],
) -> Result<(), Error> {
    for request in requests {
        sqlx::query("UPDATE booking_requests SET status = $2, data = $3 WHERE id = $1")
            .bind(&request.id)
            .bind(request.status.name())
            .bind(Json(request))
            .execute(&mut *tx)
            .await?;
    }

    Ok(())
}

#[tracing::instrument(skip(tx, driver), fields(driver_id = %driver.id))]
pub async fn update_driver(tx: &mut Transaction<'_, Database>, driver: &Driver) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE drivers SET is_available = $2, is_verified = $3, data = $4 WHERE id = $1")
            .bind(&driver.id)
            .bind(driver.is_available)
            .bind(driver.is_verified)
            .bind(Json(driver)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(executor))]
pub async fn upsert_driver_location<'e, E>(
    executor: E,
    driver_id: &Uuid,
    coordinates: Coordinates,
    updated_at: DateTime<Utc>,
) -> Result<(), Error>
where
    E: Executor<'e, Database = Database>,
{
    let location: Geometry<f64> = coordinates.into();

    executor
        .execute(
            sqlx::query(
                "INSERT INTO driver_locations (driver_id, location, updated_at)
                    VALUES ($1, ST_SetSRID($2, 4326), $3)
                    ON CONFLICT (driver_id) DO UPDATE
                    SET location = EXCLUDED.location, updated_at = EXCLUDED.updated_at",
            )
            .bind(driver_id)
            .bind(wkb::Encode(location))
            .bind(updated_at),
        )
        .await?;

    Ok(())
}

#[tracing::instrument(skip(tx, trip), fields(trip_id = %trip.id))]
pub async fn insert_trip(tx: &mut Transaction<'_, Database>, trip: &Trip) -> Result<(), Error> {
    tx.execute(
        sqlx::query(
            "INSERT INTO trips (id, booking_id, passenger_id, driver_id, status, created_at, data)
                VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&trip.id)
        .bind(&trip.booking_id)
        .bind(&trip.passenger_id)
        .bind(&trip.driver_id)
        .bind(trip.status.name())
        .bind(trip.created_at)
        .bind(Json(trip)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx, trip), fields(trip_id = %trip.id))]
pub async fn update_trip(tx: &mut Transaction<'_, Database>, trip: &Trip) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE trips SET status = $2, data = $3 WHERE id = $1")
            .bind(&trip.id)
            .bind(trip.status.name())
            .bind(Json(trip)),
    )
    .await?;

    Ok(())
}

/// Frees the trip's driver once the trip is over.
#[tracing::instrument(skip(tx, trip), fields(trip_id = %trip.id))]
pub async fn release_driver(tx: &mut Transaction<'_, Database>, trip: &Trip, completed: bool) -> Result<(), Error> {
    let mut driver = fetch_driver_for_update(&mut *tx, &trip.driver_id).await?;

    driver.release(trip.id, completed);

    update_driver(&mut *tx, &driver).await
}
