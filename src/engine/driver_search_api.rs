use super::helpers::fetch_located_drivers;
use super::{Database, Engine};

use async_trait::async_trait;
use sqlx::Executor;
use uuid::Uuid;

use crate::{
    api::DriverSearchAPI,
    auth::{Platform, User},
    entities::Coordinates,
    error::Error,
    locator::{rank_candidates, validate_radius, Candidate, CANDIDATE_LIMIT, PREFILTER_LIMIT},
};

#[async_trait]
impl DriverSearchAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn find_candidates(
        &self,
        user: User,
        pickup: Coordinates,
        vehicle_type_id: Uuid,
        radius_m: f64,
    ) -> Result<Vec<Candidate>, Error> {
        self.authorize(user.clone(), "find_candidates", Platform::default())?;

        pickup.validate()?;

        locate(&self.pool, pickup, vehicle_type_id, radius_m).await
    }
}

/// Nearest free drivers for a pickup, closest first. An empty result is not
/// an error.
pub(super) async fn locate<'e, E>(
    executor: E,
    pickup: Coordinates,
    vehicle_type_id: Uuid,
    radius_m: f64,
) -> Result<Vec<Candidate>, Error>
where
    E: Executor<'e, Database = Database>,
{
    validate_radius(radius_m)?;

    let located = fetch_located_drivers(executor, pickup, &vehicle_type_id, radius_m, PREFILTER_LIMIT).await?;
    let candidates = rank_candidates(pickup, vehicle_type_id, located, radius_m, CANDIDATE_LIMIT)?;

    tracing::info!("found {} candidate drivers", candidates.len());

    Ok(candidates)
}
