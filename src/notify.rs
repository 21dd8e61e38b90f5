use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingRequest,
    BookingAccepted,
    BookingExpired,
    BookingCancelled,
    TripStatusChanged,
}

impl NotificationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BookingRequest => "booking_request",
            Self::BookingAccepted => "booking_accepted",
            Self::BookingExpired => "booking_expired",
            Self::BookingCancelled => "booking_cancelled",
            Self::TripStatusChanged => "trip_status_changed",
        }
    }
}

/// Delivers a message to a user through whatever channel they are reachable on.
#[async_trait]
pub trait Notifier {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), Error>;
}

/// Writes notifications to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), Error> {
        tracing::info!(%user_id, kind = kind.name(), %payload, "notification");
        Ok(())
    }
}
