use axum::extract::{Extension, Json};

use crate::auth::User;
use crate::error::Error;
use crate::pricing::{FareEstimate, FareQuery};
use crate::server::DynAPI;

pub async fn estimate(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(query): Json<FareQuery>,
) -> Result<Json<FareEstimate>, Error> {
    let estimate = api.estimate_fare(user, query).await?;

    Ok(estimate.into())
}
