use std::sync::Arc;

use caballero::api::MaintenanceAPI;
use caballero::auth::User;
use caballero::config::Config;
use caballero::engine::Engine;
use caballero::error::Error;
use caballero::external::google_maps::DistanceMatrix;
use caballero::server::{serve, DynAPI};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    let mut engine = Engine::new(pool).await?;

    match config.google_maps.clone() {
        Some(google_maps) => {
            let provider = DistanceMatrix::new(google_maps, config.route_timeout)?;
            engine = engine.with_route_provider(Arc::new(provider), config.route_timeout);
        }
        None => tracing::warn!("GOOGLE_MAPS_API_KEY is not set, routes use straight-line estimates"),
    }

    let engine = Arc::new(engine);

    let sweeper = engine.clone();
    let sweep_interval = config.sweep_interval;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        let system = User::new_system_user();

        loop {
            interval.tick().await;

            if let Err(err) = sweeper.expire_stale_requests(system.clone()).await {
                tracing::warn!("expiry sweep failed: {}", err);
            }
        }
    });

    serve(engine as DynAPI, config.bind_addr).await
}
