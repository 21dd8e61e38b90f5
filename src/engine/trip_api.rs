use super::helpers::{
    fetch_booking_for_update, fetch_driver_for_update, fetch_trip, fetch_trip_for_update, release_driver,
    update_booking, update_driver, update_trip, upsert_driver_location,
};
use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use geo_types::Geometry;
use geozero::wkb;
use sqlx::{types::Json, Acquire, Executor, Row};
use uuid::Uuid;

use crate::{
    api::TripAPI,
    auth::{Platform, User},
    entities::{BookingStatus, Coordinates, PositionSample, Trip, TripStatus},
    error::{unauthorized_error, Error},
    notify::NotificationKind,
    payment::PaymentStatus,
    tracking::OutboundEvent,
};

#[async_trait]
impl TripAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn find_trip(&self, user: User, id: Uuid) -> Result<Trip, Error> {
        let trip = fetch_trip(&self.pool, &id).await?;

        self.authorize(user.clone(), "read", trip.clone())?;

        Ok(trip)
    }

    #[tracing::instrument(skip(self))]
    async fn update_trip_status(&self, user: User, id: Uuid, status: TripStatus) -> Result<Trip, Error> {
        self.transition_trip(user, id, status, "update_status").await
    }

    #[tracing::instrument(skip(self))]
    async fn update_trip_location(
        &self,
        user: User,
        id: Uuid,
        coordinates: Coordinates,
    ) -> Result<PositionSample, Error> {
        coordinates.validate()?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut trip = fetch_trip_for_update(&mut tx, &id).await?;

        self.authorize(user.clone(), "update_location", trip.clone())?;

        trip.record_position(coordinates)?;

        let sample = PositionSample::new(trip.id, coordinates, Utc::now());
        let location: Geometry<f64> = coordinates.into();

        update_trip(&mut tx, &trip).await?;

        tx.execute(
            sqlx::query(
                "INSERT INTO trip_positions (trip_id, location, recorded_at) VALUES ($1, ST_SetSRID($2, 4326), $3)",
            )
            .bind(&sample.trip_id)
            .bind(wkb::Encode(location))
            .bind(sample.recorded_at),
        )
        .await?;

        upsert_driver_location(&mut tx, &trip.driver_id, coordinates, sample.recorded_at).await?;

        tx.commit().await?;

        self.publish(OutboundEvent::location(
            trip.id,
            coordinates,
            trip.distance_traveled_km,
            sample.recorded_at,
        ))
        .await;

        Ok(sample)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_trip(&self, user: User, id: Uuid) -> Result<Trip, Error> {
        self.transition_trip(user, id, TripStatus::Cancelled, "cancel").await
    }

    #[tracing::instrument(skip(self))]
    async fn rate_trip(&self, user: User, id: Uuid, stars: u8) -> Result<Trip, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut trip = fetch_trip_for_update(&mut tx, &id).await?;

        self.authorize(user.clone(), "rate", trip.clone())?;

        trip.rate(stars)?;

        let mut driver = fetch_driver_for_update(&mut tx, &trip.driver_id).await?;
        driver.record_rating(stars);

        update_trip(&mut tx, &trip).await?;
        update_driver(&mut tx, &driver).await?;

        tx.commit().await?;

        Ok(trip)
    }

    #[tracing::instrument(skip(self))]
    async fn list_trip_positions(&self, user: User, id: Uuid) -> Result<Vec<PositionSample>, Error> {
        let trip = self.find_trip(user.clone(), id).await?;

        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query(
                    "SELECT ST_Y(location) AS lat, ST_X(location) AS lng, recorded_at
                        FROM trip_positions WHERE trip_id = $1 ORDER BY recorded_at, id",
                )
                .bind(&trip.id),
            )
            .await?;

        let mut samples = vec![];

        for result in results.iter() {
            let lat: f64 = result.try_get("lat")?;
            let lng: f64 = result.try_get("lng")?;

            samples.push(PositionSample::new(
                trip.id,
                Coordinates::new(lat, lng),
                result.try_get("recorded_at")?,
            ));
        }

        Ok(samples)
    }

    #[tracing::instrument(skip(self))]
    async fn list_trips(&self, user: User, status: Option<TripStatus>) -> Result<Vec<Trip>, Error> {
        self.authorize(user.clone(), "list_trips", Platform::default())?;

        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query(
                    "SELECT data FROM trips
                        WHERE (passenger_id = $1 OR driver_id = $1)
                            AND ($2::VARCHAR IS NULL OR status = $2)
                        ORDER BY created_at DESC",
                )
                .bind(&user.id)
                .bind(status.map(|s| s.name())),
            )
            .await?;

        let mut trips = vec![];

        for result in results.iter() {
            let Json(trip): Json<Trip> = result.try_get("data")?;
            trips.push(trip);
        }

        Ok(trips)
    }
}

impl Engine {
    /// Moves a trip through its lifecycle and applies the side effects on the
    /// driver, the payment and the originating booking.
    async fn transition_trip(&self, user: User, id: Uuid, status: TripStatus, action: &str) -> Result<Trip, Error> {
        // read the booking id first so locks are taken booking before trip
        let booking_id = fetch_trip(&self.pool, &id).await?.booking_id;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut booking = fetch_booking_for_update(&mut tx, &booking_id).await?;
        let mut trip = fetch_trip_for_update(&mut tx, &id).await?;

        self.authorize(user.clone(), action, trip.clone())?;

        let role = trip.role_of(&user).ok_or_else(unauthorized_error)?;
        let now = Utc::now();

        trip.transition(status, role, now)?;

        match trip.status {
            TripStatus::Completed => {
                trip.payment_status = match self.payments.settle(&trip).await {
                    Ok(payment_status) => payment_status,
                    Err(err) => {
                        tracing::warn!("payment settlement failed: {}", err);
                        PaymentStatus::Failed
                    }
                };

                release_driver(&mut tx, &trip, true).await?;
            }
            TripStatus::Cancelled | TripStatus::NoShow => {
                release_driver(&mut tx, &trip, false).await?;
            }
            _ => {}
        }

        if trip.status == TripStatus::Cancelled && booking.status == BookingStatus::Accepted {
            booking.cancel()?;
            update_booking(&mut tx, &booking).await?;
        }

        update_trip(&mut tx, &trip).await?;

        tx.commit().await?;

        tracing::info!(trip_id = %trip.id, "trip is now {}", trip.status.name());

        self.publish(OutboundEvent::status(trip.id, trip.status, now)).await;

        let counterpart = if user.id == trip.driver_id {
            trip.passenger_id
        } else {
            trip.driver_id
        };

        self.notify(
            counterpart,
            NotificationKind::TripStatusChanged,
            serde_json::json!({ "trip_id": trip.id, "status": trip.status }),
        )
        .await;

        Ok(trip)
    }
}
