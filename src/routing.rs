use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;
use crate::error::Error;

const EARTH_RADIUS_KM: f64 = 6371.0;
const AVERAGE_SPEED_KMH: f64 = 30.0;
const PICKUP_OVERHEAD_MIN: i32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_min: i32,
}

#[async_trait]
pub trait RouteProvider {
    async fn route(&self, pickup: Coordinates, dropoff: Coordinates) -> Result<RouteEstimate, Error>;
}

pub type DynRouteProvider = Arc<dyn RouteProvider + Send + Sync>;

/// Great-circle distance in kilometres.
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let (lat1, lat2) = (from.lat.to_radians(), to.lat.to_radians());
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Straight-line estimate at city speed, never shorter than the pickup
/// overhead.
pub fn route_from_haversine(pickup: Coordinates, dropoff: Coordinates) -> RouteEstimate {
    let distance_km = haversine_km(pickup, dropoff);
    let driving = (distance_km / AVERAGE_SPEED_KMH * 60.0).floor() as i32;

    RouteEstimate {
        distance_km: (distance_km * 100.0).round() / 100.0,
        duration_min: (driving + PICKUP_OVERHEAD_MIN).max(2),
    }
}

pub struct Haversine;

#[async_trait]
impl RouteProvider for Haversine {
    async fn route(&self, pickup: Coordinates, dropoff: Coordinates) -> Result<RouteEstimate, Error> {
        Ok(route_from_haversine(pickup, dropoff))
    }
}

/// Asks `provider` for a route, falling back to the haversine estimate when
/// it fails or does not answer within `timeout`.
#[tracing::instrument(skip(provider))]
pub async fn calculate_route(
    provider: &(dyn RouteProvider + Send + Sync),
    pickup: Coordinates,
    dropoff: Coordinates,
    timeout: Duration,
) -> RouteEstimate {
    match tokio::time::timeout(timeout, provider.route(pickup, dropoff)).await {
        Ok(Ok(route)) => route,
        Ok(Err(err)) => {
            tracing::warn!("route provider failed, using haversine: {}", err);
            route_from_haversine(pickup, dropoff)
        }
        Err(_) => {
            tracing::warn!("route provider timed out after {:?}, using haversine", timeout);
            route_from_haversine(pickup, dropoff)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::upstream_error;

    struct Failing;

    #[async_trait]
    impl RouteProvider for Failing {
        async fn route(&self, _: Coordinates, _: Coordinates) -> Result<RouteEstimate, Error> {
            Err(upstream_error())
        }
    }

    struct Slow;

    #[async_trait]
    impl RouteProvider for Slow {
        async fn route(&self, _: Coordinates, _: Coordinates) -> Result<RouteEstimate, Error> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RouteEstimate {
                distance_km: 99.0,
                duration_min: 99,
            })
        }
    }

    #[test]
    fn same_point_is_zero_km_and_two_minutes() {
        let point = Coordinates::new(4.05, 9.77);
        let route = route_from_haversine(point, point);

        assert_eq!(route.distance_km, 0.0);
        assert_eq!(route.duration_min, 2);
    }

    #[test]
    fn one_degree_of_latitude() {
        let km = haversine_km(Coordinates::new(0.0, 0.0), Coordinates::new(1.0, 0.0));
        assert!((km - 111.19).abs() < 0.01, "{}", km);
    }

    #[test]
    fn duration_grows_at_thirty_kmh() {
        // 0.135 degrees of latitude is ~15.01 km: 30 minutes driving plus overhead
        let route = route_from_haversine(Coordinates::new(0.0, 0.0), Coordinates::new(0.135, 0.0));
        assert_eq!(route.duration_min, 32);
    }

    #[test]
    fn duration_is_taken_before_distance_rounding() {
        let pickup = Coordinates::new(0.0, 0.0);
        let dropoff = Coordinates::new(0.02248, 0.0);

        let raw = haversine_km(pickup, dropoff);
        assert!(raw > 2.4995 && raw < 2.5, "{}", raw);

        // 2.4996 km is 4.99 minutes of driving, the rounded 2.50 km would be 5
        let route = route_from_haversine(pickup, dropoff);
        assert_eq!(route.distance_km, 2.5);
        assert_eq!(route.duration_min, 6);
    }

    #[tokio::test]
    async fn falls_back_when_provider_fails() {
        let pickup = Coordinates::new(4.05, 9.77);
        let dropoff = Coordinates::new(4.06, 9.75);

        let route = calculate_route(&Failing, pickup, dropoff, Duration::from_secs(1)).await;
        assert_eq!(route, route_from_haversine(pickup, dropoff));
    }

    #[tokio::test]
    async fn falls_back_when_provider_is_slow() {
        let pickup = Coordinates::new(4.05, 9.77);
        let dropoff = Coordinates::new(4.06, 9.75);

        let route = calculate_route(&Slow, pickup, dropoff, Duration::from_millis(20)).await;
        assert_eq!(route, route_from_haversine(pickup, dropoff));
    }
}
