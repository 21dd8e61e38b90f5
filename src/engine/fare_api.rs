use super::helpers::fetch_vehicle_type;
use super::Engine;

use async_trait::async_trait;

use crate::{
    api::FareAPI,
    auth::{Platform, User},
    error::{invalid_input_error, Error},
    pricing::{FareEstimate, FareQuery},
    routing::calculate_route,
};

#[async_trait]
impl FareAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn estimate_fare(&self, user: User, query: FareQuery) -> Result<FareEstimate, Error> {
        self.authorize(user.clone(), "estimate_fare", Platform::default())?;

        query.pickup.validate()?;
        query.dropoff.validate()?;

        let vehicle_type = fetch_vehicle_type(&self.pool, &query.vehicle_type_id).await?;

        if !vehicle_type.is_active {
            return Err(invalid_input_error().with_message("vehicle type is not available"));
        }

        let route = calculate_route(self.routes.as_ref(), query.pickup, query.dropoff, self.route_timeout).await;

        FareEstimate::new(&vehicle_type, route, query.is_shared)
    }
}
