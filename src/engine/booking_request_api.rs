use super::helpers::{
    fetch_booking_for_update, fetch_booking_request, fetch_booking_requests_for_update, fetch_driver_for_update,
    insert_trip, update_booking, update_booking_requests, update_driver,
};
use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{types::Json, Acquire, Executor, Row};
use uuid::Uuid;

use crate::{
    api::BookingRequestAPI,
    auth::User,
    entities::{BookingRequest, Trip},
    error::{not_found_error, Error},
    matching,
    notify::NotificationKind,
};

#[async_trait]
impl BookingRequestAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn list_driver_requests(&self, user: User) -> Result<Vec<BookingRequest>, Error> {
        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query(
                    "SELECT data FROM booking_requests
                        WHERE driver_id = $1 AND status = 'sent' AND expires_at >= $2
                        ORDER BY expires_at",
                )
                .bind(&user.id)
                .bind(Utc::now()),
            )
            .await?;

        let mut requests = vec![];

        for result in results.iter() {
            let Json(request): Json<BookingRequest> = result.try_get("data")?;
            requests.push(request);
        }

        Ok(requests)
    }

    #[tracing::instrument(skip(self))]
    async fn find_booking_request(&self, user: User, id: Uuid) -> Result<BookingRequest, Error> {
        let request = fetch_booking_request(&self.pool, &id).await?;

        self.authorize(user.clone(), "read", request.clone())?;

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn accept_booking_request(&self, user: User, id: Uuid) -> Result<Option<Trip>, Error> {
        // it's safe to authorize before locking: the addressed driver never changes
        let request = self.find_booking_request(user.clone(), id).await?;

        self.authorize(user.clone(), "accept", request.clone())?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        // every competing acceptance and the expiry sweep queue up here
        let mut booking = fetch_booking_for_update(&mut tx, &request.booking_id).await?;
        let mut requests = fetch_booking_requests_for_update(&mut tx, &request.booking_id).await?;
        let mut driver = fetch_driver_for_update(&mut tx, &user.id).await?;

        let now = Utc::now();

        let trip = match matching::accept(&mut booking, &mut requests, id, &mut driver, now)? {
            Some(trip) => trip,
            None => {
                tracing::info!("booking request is no longer available, returning early...");
                return Ok(None);
            }
        };

        update_booking(&mut tx, &booking).await?;
        update_booking_requests(&mut tx, &requests).await?;
        insert_trip(&mut tx, &trip).await?;
        update_driver(&mut tx, &driver).await?;

        tx.commit().await?;

        tracing::info!(trip_id = %trip.id, "booking request accepted, trip created");

        self.notify(
            trip.passenger_id,
            NotificationKind::BookingAccepted,
            serde_json::json!({
                "booking_id": trip.booking_id,
                "trip_id": trip.id,
                "driver_id": trip.driver_id,
                "vehicle": driver.vehicle,
            }),
        )
        .await;

        Ok(Some(trip))
    }

    #[tracing::instrument(skip(self))]
    async fn reject_booking_request(&self, user: User, id: Uuid) -> Result<bool, Error> {
        let request = self.find_booking_request(user.clone(), id).await?;

        self.authorize(user.clone(), "reject", request.clone())?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        fetch_booking_for_update(&mut tx, &request.booking_id).await?;

        let mut requests = fetch_booking_requests_for_update(&mut tx, &request.booking_id).await?;

        let request = requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found_error().with_message("booking request not found"))?;

        if !request.reject(Utc::now()) {
            tracing::info!("booking request was already answered");
            return Ok(false);
        }

        update_booking_requests(&mut tx, std::slice::from_ref(request)).await?;

        tx.commit().await?;

        Ok(true)
    }
}
