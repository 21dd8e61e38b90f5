use super::Engine;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    api::{TrackingAPI, TripAPI},
    auth::User,
    entities::Trip,
    error::{invalid_input_error, Error},
    tracking::{Command, InboundMessage, OutboundEvent},
};

#[async_trait]
impl TrackingAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn join_trip_tracking(
        &self,
        user: User,
        id: Uuid,
    ) -> Result<(Trip, broadcast::Receiver<OutboundEvent>), Error> {
        let trip = self.find_trip(user.clone(), id).await?;

        self.authorize(user.clone(), "track", trip.clone())?;

        let receiver = self.tracking.join(trip.id).await;

        tracing::info!(trip_id = %trip.id, user_id = %user.id, "joined trip tracking");

        Ok((trip, receiver))
    }

    #[tracing::instrument(skip(self, text))]
    async fn handle_tracking_message(&self, user: User, id: Uuid, text: String) -> Result<(), Error> {
        let message = InboundMessage::parse(&text)?;

        if message.trip_id != id {
            return Err(invalid_input_error().with_message("message is for another trip"));
        }

        match message.into_command()? {
            Command::Location(coordinates) => {
                self.update_trip_location(user, id, coordinates).await?;
            }
            Command::Status(status) => {
                self.update_trip_status(user, id, status).await?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn leave_trip_tracking(&self, id: Uuid) {
        self.tracking.leave(id).await;
    }
}
