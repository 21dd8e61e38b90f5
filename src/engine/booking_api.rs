use super::driver_search_api::locate;
use super::helpers::{
    fetch_booking_for_update, fetch_booking_requests_for_update, fetch_trip_by_booking_for_update,
    fetch_vehicle_type, insert_booking, insert_booking_requests, release_driver, update_booking,
    update_booking_requests, update_trip,
};
use super::{Database, Engine};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, Acquire, Executor, Row, Transaction};
use uuid::Uuid;

use crate::{
    api::BookingAPI,
    auth::{Platform, User},
    entities::{Booking, BookingRequest, BookingStatus, NewBooking},
    error::{invalid_input_error, not_found_error, Error},
    locator::DISPATCH_RADIUS_M,
    matching,
    notify::NotificationKind,
    routing::calculate_route,
    tracking::OutboundEvent,
};

#[async_trait]
impl BookingAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_booking(&self, user: User, params: NewBooking) -> Result<Booking, Error> {
        self.authorize(user.clone(), "create_booking", Platform::default())?;

        params.validate()?;

        let vehicle_type = fetch_vehicle_type(&self.pool, &params.vehicle_type_id)
            .await
            .map_err(|err| {
                if err.is_not_found_error() {
                    invalid_input_error().with_message("unknown vehicle type")
                } else {
                    err
                }
            })?;

        let route = calculate_route(
            self.routes.as_ref(),
            params.pickup.coordinates,
            params.dropoff.coordinates,
            self.route_timeout,
        )
        .await;

        let now = Utc::now();
        let mut booking = Booking::new(user.id, params, &vehicle_type, route, now)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        insert_booking(&mut tx, &booking).await?;

        let requests = dispatch(&mut tx, &mut booking, &[], now).await?;

        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            fare = %booking.estimated_fare,
            "booking created with {} requests",
            requests.len()
        );

        self.notify_drivers(&booking, &requests).await;

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn find_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(booking): Json<Booking> = conn
            .fetch_optional(sqlx::query("SELECT data FROM bookings WHERE id = $1").bind(&id))
            .await?
            .ok_or_else(|| not_found_error().with_message("booking not found"))?
            .try_get("data")?;

        self.authorize(user.clone(), "read", booking.clone())?;

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn dispatch_booking(&self, user: User, id: Uuid) -> Result<Vec<BookingRequest>, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut booking = fetch_booking_for_update(&mut tx, &id).await?;

        self.authorize(user.clone(), "dispatch", booking.clone())?;

        let existing = fetch_booking_requests_for_update(&mut tx, &id).await?;

        let requests = dispatch(&mut tx, &mut booking, &existing, Utc::now()).await?;

        tx.commit().await?;

        self.notify_drivers(&booking, &requests).await;

        Ok(requests)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut booking = fetch_booking_for_update(&mut tx, &id).await?;

        self.authorize(user.clone(), "cancel", booking.clone())?;

        let mut requests = fetch_booking_requests_for_update(&mut tx, &id).await?;

        let mut trip = match booking.status {
            BookingStatus::Accepted => fetch_trip_by_booking_for_update(&mut tx, &id).await?,
            _ => None,
        };

        let withdrawn = matching::cancel(&mut booking, &mut requests)?;

        let now = Utc::now();

        if let Some(trip) = trip.as_mut() {
            trip.cancel(now)?;

            update_trip(&mut tx, trip).await?;
            release_driver(&mut tx, trip, false).await?;
        }

        update_booking(&mut tx, &booking).await?;
        update_booking_requests(&mut tx, &requests).await?;

        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, "booking cancelled, {} requests withdrawn", withdrawn);

        if let Some(trip) = trip {
            self.publish(OutboundEvent::status(trip.id, trip.status, now)).await;
            self.notify(
                trip.driver_id,
                NotificationKind::BookingCancelled,
                serde_json::json!({ "booking_id": booking.id, "trip_id": trip.id }),
            )
            .await;
        }

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn list_booking_requests(&self, user: User, id: Uuid) -> Result<Vec<BookingRequest>, Error> {
        let booking = self.find_booking(user.clone(), id).await?;

        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query("SELECT data FROM booking_requests WHERE booking_id = $1 ORDER BY id")
                    .bind(&booking.id),
            )
            .await?;

        let mut requests = vec![];

        for result in results.iter() {
            let Json(request): Json<BookingRequest> = result.try_get("data")?;
            requests.push(request);
        }

        Ok(requests)
    }
}

impl Engine {
    async fn notify_drivers(&self, booking: &Booking, requests: &[BookingRequest]) {
        for request in requests {
            self.notify(
                request.driver_id,
                NotificationKind::BookingRequest,
                serde_json::json!({
                    "request_id": request.id,
                    "booking_id": booking.id,
                    "pickup": booking.pickup,
                    "estimated_fare": booking.estimated_fare,
                    "expires_at": request.expires_at,
                }),
            )
            .await;
        }
    }
}

/// Offers the booking to nearby drivers that have not been asked before.
/// The booking row must already be locked by `tx`.
async fn dispatch(
    tx: &mut Transaction<'_, Database>,
    booking: &mut Booking,
    existing: &[BookingRequest],
    now: DateTime<Utc>,
) -> Result<Vec<BookingRequest>, Error> {
    let candidates = locate(&mut *tx, booking.pickup.coordinates, booking.vehicle_type_id, DISPATCH_RADIUS_M).await?;

    let driver_ids = candidates
        .into_iter()
        .map(|candidate| candidate.driver.id)
        .filter(|driver_id| !existing.iter().any(|r| &r.driver_id == driver_id));

    let requests = booking.dispatch(driver_ids, now)?;
    let requests = insert_booking_requests(&mut *tx, requests).await?;

    update_booking(&mut *tx, booking).await?;

    Ok(requests)
}
