use axum::extract::{Extension, Json};

use crate::auth::User;
use crate::error::Error;
use crate::matching::SweepReport;
use crate::server::DynAPI;

pub async fn expire(Extension(api): Extension<DynAPI>, user: User) -> Result<Json<SweepReport>, Error> {
    let report = api.expire_stale_requests(user).await?;

    Ok(report.into())
}
