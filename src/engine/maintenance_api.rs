use super::helpers::{fetch_booking_for_update, fetch_booking_requests_for_update, update_booking, update_booking_requests};
use super::Engine;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Acquire, Executor, Row};
use uuid::Uuid;

use crate::{
    api::MaintenanceAPI,
    auth::{Platform, User},
    error::Error,
    matching::{self, SweepOutcome, SweepReport},
    notify::NotificationKind,
};

#[async_trait]
impl MaintenanceAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn expire_stale_requests(&self, user: User) -> Result<SweepReport, Error> {
        self.authorize(user.clone(), "expire_stale_requests", Platform::default())?;

        let now = Utc::now();
        let mut conn = self.pool.acquire().await?;

        let query = "
            SELECT b.id AS booking_id
            FROM bookings b
            WHERE
                (b.status IN ('pending', 'searching') AND b.expires_at < $1)
                OR EXISTS (
                    SELECT 1 FROM booking_requests r
                    WHERE r.booking_id = b.id AND r.status = 'sent' AND r.expires_at < $1
                )
        ";

        let results = conn.fetch_all(sqlx::query(query).bind(now)).await?;

        let mut booking_ids = Vec::with_capacity(results.len());

        for result in results.iter() {
            booking_ids.push(result.try_get::<Uuid, _>("booking_id")?);
        }

        drop(conn);

        let report = matching::sweep_each(booking_ids, |booking_id| self.sweep_booking(booking_id, now)).await;

        if report != SweepReport::default() {
            tracing::info!(
                "expired {} bookings and {} requests, {} bookings failed",
                report.bookings_expired,
                report.requests_expired,
                report.bookings_failed
            );
        }

        Ok(report)
    }
}

impl Engine {
    /// Expires what is due for one booking, holding the same lock as
    /// acceptance so a request is either accepted or expired.
    async fn sweep_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<SweepOutcome, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut booking = fetch_booking_for_update(&mut tx, &booking_id).await?;
        let mut requests = fetch_booking_requests_for_update(&mut tx, &booking_id).await?;

        let outcome = matching::sweep(&mut booking, &mut requests, now);

        if outcome == SweepOutcome::default() {
            return Ok(outcome);
        }

        update_booking(&mut tx, &booking).await?;
        update_booking_requests(&mut tx, &requests).await?;

        tx.commit().await?;

        if outcome.booking_expired {
            self.notify(
                booking.passenger_id,
                NotificationKind::BookingExpired,
                serde_json::json!({ "booking_id": booking.id }),
            )
            .await;
        }

        Ok(outcome)
    }
}
