use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Coordinates, VehicleType};
use crate::error::{invalid_input_error, Error};
use crate::routing::RouteEstimate;

/// Flat discount applied to shared rides, in percent.
pub const SHARED_RIDE_DISCOUNT_PERCENT: Decimal = Decimal::from_parts(30, 0, 0, false, 0);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FareQuery {
    pub vehicle_type_id: Uuid,
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
    #[serde(default)]
    pub is_shared: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FareEstimate {
    pub vehicle_type_id: Uuid,
    pub distance_km: f64,
    pub duration_min: i32,
    pub is_shared: bool,
    pub fare: Decimal,
}

impl FareEstimate {
    pub fn new(vehicle_type: &VehicleType, route: RouteEstimate, is_shared: bool) -> Result<Self, Error> {
        Ok(Self {
            vehicle_type_id: vehicle_type.id,
            distance_km: route.distance_km,
            duration_min: route.duration_min,
            is_shared,
            fare: estimate_fare(vehicle_type, route.distance_km, route.duration_min, is_shared)?,
        })
    }
}

/// `base + per_km * distance + per_minute * duration`, less the shared ride
/// discount, rounded half-up to cents.
pub fn estimate_fare(
    vehicle_type: &VehicleType,
    distance_km: f64,
    duration_min: i32,
    is_shared: bool,
) -> Result<Decimal, Error> {
    if duration_min < 0 {
        return Err(invalid_input_error().with_message("duration must not be negative"));
    }

    let distance = Decimal::from_f64(distance_km)
        .filter(|d| !d.is_sign_negative())
        .ok_or_else(|| invalid_input_error().with_message("distance is not a valid number"))?
        .round_dp(3);

    let mut total = vehicle_type.base_price
        + vehicle_type.price_per_km * distance
        + vehicle_type.price_per_minute * Decimal::from(duration_min);

    if is_shared {
        total -= total * SHARED_RIDE_DISCOUNT_PERCENT / Decimal::ONE_HUNDRED;
    }

    Ok(total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Category;
    use rust_decimal_macros::dec;

    fn vehicle_type(base: Decimal, per_km: Decimal, per_minute: Decimal) -> VehicleType {
        VehicleType::new(Category::Taxi, base, per_km, per_minute, 4).unwrap()
    }

    #[test]
    fn taxi_fare() {
        let taxi = vehicle_type(dec!(1000), dec!(250), dec!(50));

        assert_eq!(estimate_fare(&taxi, 5.0, 15, false).unwrap(), dec!(3000.00));
        assert_eq!(estimate_fare(&taxi, 5.0, 15, true).unwrap(), dec!(2100.00));
    }

    #[test]
    fn midpoint_rounds_up() {
        let vt = vehicle_type(dec!(1000), dec!(0.25), dec!(0));

        // 1000 + 0.25 * 0.5 = 1000.125
        assert_eq!(estimate_fare(&vt, 0.5, 0, false).unwrap(), dec!(1000.13));
    }

    #[test]
    fn zero_distance_costs_base_plus_time() {
        let moto = vehicle_type(dec!(500), dec!(150), dec!(25));
        assert_eq!(estimate_fare(&moto, 0.0, 2, false).unwrap(), dec!(550.00));
    }

    #[test]
    fn rejects_nonsense_inputs() {
        let taxi = vehicle_type(dec!(1000), dec!(250), dec!(50));

        assert!(estimate_fare(&taxi, f64::NAN, 5, false).is_err());
        assert!(estimate_fare(&taxi, -1.0, 5, false).is_err());
        assert!(estimate_fare(&taxi, 1.0, -5, false).is_err());
    }
}
