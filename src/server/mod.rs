mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::api::API;
use crate::error::{unexpected_error, Error};
use crate::server::handlers::{
    booking_requests, bookings, drivers, fares, maintenance, tracking, trips, vehicle_types,
};

pub type DynAPI = Arc<dyn API + Send + Sync>;

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/vehicle_types", get(vehicle_types::list).post(vehicle_types::create))
        .route("/fares/estimate", post(fares::estimate))
        .route("/drivers", post(drivers::create))
        .route("/drivers/:id", get(drivers::find))
        .route("/drivers/:id/verify", patch(drivers::verify))
        .route("/drivers/:id/availability", patch(drivers::set_availability))
        .route("/drivers/:id/location", patch(drivers::update_location))
        .route("/candidates", get(drivers::candidates))
        .route("/bookings", post(bookings::create))
        .route("/bookings/:id", get(bookings::find))
        .route("/bookings/:id/dispatch", patch(bookings::dispatch))
        .route("/bookings/:id/cancel", patch(bookings::cancel))
        .route("/bookings/:id/requests", get(bookings::requests))
        .route("/booking_requests", get(booking_requests::inbox))
        .route("/booking_requests/:id", get(booking_requests::find))
        .route("/booking_requests/:id/accept", patch(booking_requests::accept))
        .route("/booking_requests/:id/reject", patch(booking_requests::reject))
        .route("/trips", get(trips::list))
        .route("/trips/:id", get(trips::find))
        .route("/trips/:id/status", patch(trips::update_status))
        .route("/trips/:id/location", patch(trips::update_location))
        .route("/trips/:id/cancel", patch(trips::cancel))
        .route("/trips/:id/rate", patch(trips::rate))
        .route("/trips/:id/positions", get(trips::positions))
        .route("/trips/:id/track", get(tracking::track))
        .route("/maintenance/expire", post(maintenance::expire))
        .layer(Extension(api))
}

pub async fn serve(api: DynAPI, addr: SocketAddr) -> Result<(), Error> {
    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::try_bind(&addr)
        .map_err(|err| {
            tracing::error!("failed to bind {}: {}", addr, err);
            unexpected_error()
        })?
        .serve(app.into_make_service())
        .await
        .map_err(|err| {
            tracing::error!("server error: {}", err);
            unexpected_error()
        })
}
