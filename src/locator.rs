use serde::{Deserialize, Serialize};

use crate::entities::{Coordinates, Driver};
use crate::error::{invalid_input_error, Error};
use crate::routing::haversine_km;

/// Radius used when a booking is dispatched.
pub const DISPATCH_RADIUS_M: f64 = 10_000.0;
/// Upper bound for any proximity search.
pub const MAX_SEARCH_RADIUS_M: f64 = 50_000.0;
pub const CANDIDATE_LIMIT: usize = 10;
/// Rows the database hands over before exact ranking. Spheroid and sphere
/// distances disagree slightly, so this is wider than `CANDIDATE_LIMIT`.
pub const PREFILTER_LIMIT: usize = CANDIDATE_LIMIT * 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub driver: Driver,
    pub location: Coordinates,
    pub distance_m: f64,
}

pub fn validate_radius(radius_m: f64) -> Result<(), Error> {
    if !(radius_m > 0.0 && radius_m <= MAX_SEARCH_RADIUS_M) {
        return Err(invalid_input_error().with_message(format!(
            "radius must be greater than 0 and at most {} m",
            MAX_SEARCH_RADIUS_M
        )));
    }

    Ok(())
}

/// Orders located drivers by distance from `pickup`, keeping those strictly
/// inside `radius_m` that are free and verified for `vehicle_type_id`.
pub fn rank_candidates(
    pickup: Coordinates,
    vehicle_type_id: uuid::Uuid,
    located: Vec<(Driver, Coordinates)>,
    radius_m: f64,
    limit: usize,
) -> Result<Vec<Candidate>, Error> {
    validate_radius(radius_m)?;

    let mut candidates: Vec<Candidate> = located
        .into_iter()
        .filter(|(driver, _)| {
            driver.is_available
                && driver.is_verified
                && !driver.is_on_trip()
                && driver.vehicle_type_id == vehicle_type_id
        })
        .map(|(driver, location)| Candidate {
            distance_m: haversine_km(pickup, location) * 1000.0,
            driver,
            location,
        })
        .filter(|candidate| candidate.distance_m < radius_m)
        .collect();

    candidates.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    candidates.truncate(limit);

    Ok(candidates)
}
