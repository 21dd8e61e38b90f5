use chrono::{DateTime, Duration, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a driver has to answer an offer.
pub const REQUEST_TTL_SECONDS: i64 = 120;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, PolarClass)]
pub struct BookingRequest {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub booking_id: Uuid,
    #[polar(attribute)]
    pub driver_id: Uuid,
    pub status: Status,
    pub sent_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

impl BookingRequest {
    pub fn new(booking_id: Uuid, driver_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            driver_id,
            status: Status::Sent,
            sent_at: now,
            responded_at: None,
            expires_at: now + Duration::seconds(REQUEST_TTL_SECONDS),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.status == Status::Sent
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// A request can be answered while it is still `sent` and inside its window.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_sent() && !self.is_stale(now)
    }

    pub fn accept(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_open(now) {
            return false;
        }

        self.status = Status::Accepted;
        self.responded_at = Some(now);
        true
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_sent() {
            return false;
        }

        self.status = Status::Rejected;
        self.responded_at = Some(now);
        true
    }

    pub fn expire(&mut self) -> bool {
        if !self.is_sent() {
            return false;
        }

        self.status = Status::Expired;
        true
    }
}
