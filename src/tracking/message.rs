use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Coordinates, Trip, TripStatus};
use crate::error::{invalid_input_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    LocationUpdate,
    StatusUpdate,
}

/// A text frame sent by a trip participant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub trip_id: Uuid,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Deserialize)]
struct StatusPayload {
    status: TripStatus,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Location(Coordinates),
    Status(TripStatus),
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text)
            .map_err(|err| invalid_input_error().with_message(format!("malformed message: {}", err)))
    }

    pub fn into_command(self) -> Result<Command, Error> {
        let malformed =
            |err: serde_json::Error| invalid_input_error().with_message(format!("malformed payload: {}", err));

        match self.kind {
            MessageKind::LocationUpdate => {
                let coordinates: Coordinates = serde_json::from_value(self.payload).map_err(malformed)?;
                coordinates.validate()?;
                Ok(Command::Location(coordinates))
            }
            MessageKind::StatusUpdate => {
                let StatusPayload { status } = serde_json::from_value(self.payload).map_err(malformed)?;
                Ok(Command::Status(status))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Initial,
    LocationUpdate,
    StatusUpdate,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub kind: EventKind,
    pub trip_id: Uuid,
    pub payload: serde_json::Value,
    pub server_timestamp: DateTime<Utc>,
}

impl OutboundEvent {
    pub fn initial(trip: &Trip) -> Result<Self, Error> {
        Ok(Self {
            kind: EventKind::Initial,
            trip_id: trip.id,
            payload: serde_json::to_value(trip)?,
            server_timestamp: Utc::now(),
        })
    }

    pub fn location(trip_id: Uuid, coordinates: Coordinates, distance_traveled_km: f64, at: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::LocationUpdate,
            trip_id,
            payload: serde_json::json!({
                "lat": coordinates.lat,
                "lng": coordinates.lng,
                "distance_traveled_km": distance_traveled_km,
            }),
            server_timestamp: at,
        }
    }

    pub fn status(trip_id: Uuid, status: TripStatus, at: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::StatusUpdate,
            trip_id,
            payload: serde_json::json!({ "status": status }),
            server_timestamp: at,
        }
    }

    pub fn error(trip_id: Uuid, err: &Error) -> Self {
        let message = if err.is_internal() {
            "internal error"
        } else {
            err.message.as_str()
        };

        Self {
            kind: EventKind::Error,
            trip_id,
            payload: serde_json::json!({ "code": err.code, "error": message }),
            server_timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_location_update() {
        let trip_id = Uuid::new_v4();
        let text = format!(
            r#"{{"kind":"location_update","trip_id":"{}","payload":{{"lat":4.051,"lng":9.765}}}}"#,
            trip_id
        );

        let message = InboundMessage::parse(&text).unwrap();
        assert_eq!(message.trip_id, trip_id);
        assert_eq!(
            message.into_command().unwrap(),
            Command::Location(Coordinates::new(4.051, 9.765))
        );
    }

    #[test]
    fn parses_status_update() {
        let text = format!(
            r#"{{"kind":"status_update","trip_id":"{}","payload":{{"status":"arrived"}}}}"#,
            Uuid::new_v4()
        );

        let command = InboundMessage::parse(&text).unwrap().into_command().unwrap();
        assert_eq!(command, Command::Status(TripStatus::Arrived));
    }

    #[test]
    fn rejects_unknown_kind_and_bad_payload() {
        let trip_id = Uuid::new_v4();

        let text = format!(r#"{{"kind":"chat","trip_id":"{}","payload":{{}}}}"#, trip_id);
        assert!(InboundMessage::parse(&text).unwrap_err().is_invalid_input_error());

        let text = format!(
            r#"{{"kind":"location_update","trip_id":"{}","payload":{{"lat":123.0,"lng":9.0}}}}"#,
            trip_id
        );
        let message = InboundMessage::parse(&text).unwrap();
        assert!(message.into_command().unwrap_err().is_invalid_input_error());
    }

    #[test]
    fn outbound_carries_server_timestamp() {
        let at = Utc::now();
        let event = OutboundEvent::status(Uuid::new_v4(), TripStatus::Started, at);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "status_update");
        assert_eq!(json["payload"]["status"], "started");
        assert!(json["server_timestamp"].is_string());
    }

    #[test]
    fn location_event_reports_distance_traveled() {
        let event = OutboundEvent::location(Uuid::new_v4(), Coordinates::new(4.051, 9.765), 3.25, Utc::now());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "location_update");
        assert_eq!(json["payload"]["lat"], 4.051);
        assert_eq!(json["payload"]["distance_traveled_km"], 3.25);
    }
}
