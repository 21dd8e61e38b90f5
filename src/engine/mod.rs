mod booking_api;
mod booking_request_api;
mod driver_api;
mod driver_search_api;
mod fare_api;
mod helpers;
mod maintenance_api;
mod tracking_api;
mod trip_api;
mod vehicle_type_api;

use std::sync::Arc;
use std::time::Duration;

use oso::Oso;
use sqlx::{Executor, Pool, Postgres};
use uuid::Uuid;

use crate::{
    api::API,
    auth::authorizor,
    error::{unauthorized_error, Error},
    notify::{LogNotifier, NotificationKind, Notifier},
    payment::Processors,
    routing::{DynRouteProvider, Haversine},
    tracking::{OutboundEvent, TrackingHub},
};

type Database = Postgres;

pub type DynNotifier = Arc<dyn Notifier + Send + Sync>;

const DEFAULT_ROUTE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct Engine {
    pool: Pool<Database>,
    authorizor: Oso,
    routes: DynRouteProvider,
    route_timeout: Duration,
    notifier: DynNotifier,
    payments: Processors,
    tracking: TrackingHub,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub async fn new(pool: Pool<Database>) -> Result<Self, Error> {
        pool.execute("CREATE EXTENSION IF NOT EXISTS postgis").await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS vehicle_types (
                id UUID PRIMARY KEY,
                is_active BOOLEAN NOT NULL,
                data JSONB NOT NULL
            )",
        )
        .await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS drivers (
                id UUID PRIMARY KEY,
                vehicle_type_id UUID NOT NULL REFERENCES vehicle_types (id),
                is_available BOOLEAN NOT NULL,
                is_verified BOOLEAN NOT NULL,
                data JSONB NOT NULL
            )",
        )
        .await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS driver_locations (
                driver_id UUID PRIMARY KEY REFERENCES drivers (id),
                location geometry(Point, 4326) NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )",
        )
        .await?;

        pool.execute(
            "CREATE INDEX IF NOT EXISTS driver_locations_location_idx
                ON driver_locations USING GIST ((location::geography))",
        )
        .await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS bookings (
                id UUID PRIMARY KEY,
                passenger_id UUID NOT NULL,
                status VARCHAR NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL
            )",
        )
        .await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS booking_requests (
                id UUID PRIMARY KEY,
                booking_id UUID NOT NULL REFERENCES bookings (id),
                driver_id UUID NOT NULL REFERENCES drivers (id),
                status VARCHAR NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL,
                UNIQUE (booking_id, driver_id)
            )",
        )
        .await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS trips (
                id UUID PRIMARY KEY,
                booking_id UUID NOT NULL UNIQUE REFERENCES bookings (id),
                passenger_id UUID NOT NULL,
                driver_id UUID NOT NULL REFERENCES drivers (id),
                status VARCHAR NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL
            )",
        )
        .await?;

        pool.execute("CREATE INDEX IF NOT EXISTS trips_passenger_id_idx ON trips (passenger_id, created_at)")
            .await?;

        pool.execute("CREATE INDEX IF NOT EXISTS trips_driver_id_idx ON trips (driver_id, created_at)")
            .await?;

        pool.execute(
            "CREATE TABLE IF NOT EXISTS trip_positions (
                id BIGSERIAL PRIMARY KEY,
                trip_id UUID NOT NULL REFERENCES trips (id),
                location geometry(Point, 4326) NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL
            )",
        )
        .await?;

        Ok(Self {
            pool,
            authorizor: authorizor::new()?,
            routes: Arc::new(Haversine),
            route_timeout: DEFAULT_ROUTE_TIMEOUT,
            notifier: Arc::new(LogNotifier),
            payments: Processors::default(),
            tracking: TrackingHub::new(),
        })
    }

    pub fn with_route_provider(mut self, routes: DynRouteProvider, timeout: Duration) -> Self {
        self.routes = routes;
        self.route_timeout = timeout;
        self
    }

    pub fn with_notifier(mut self, notifier: DynNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_payments(mut self, payments: Processors) -> Self {
        self.payments = payments;
        self
    }
}

impl Engine {
    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(unauthorized_error())
    }

    /// Best effort: a failed notification is logged and otherwise ignored.
    async fn notify(&self, user_id: Uuid, kind: NotificationKind, payload: serde_json::Value) {
        if let Err(err) = self.notifier.notify(user_id, kind, payload).await {
            tracing::warn!(%user_id, kind = kind.name(), "notification failed: {}", err);
        }
    }

    async fn publish(&self, event: OutboundEvent) {
        let receivers = self.tracking.publish(event).await;
        tracing::debug!("tracking event delivered to {} participants", receivers);
    }
}

impl API for Engine {}
