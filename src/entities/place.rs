use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};

use crate::error::{invalid_input_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(invalid_input_error().with_message("latitude out of range"));
        }

        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(invalid_input_error().with_message("longitude out of range"));
        }

        Ok(())
    }
}

impl From<Coordinates> for Geometry<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Geometry::Point(Point::new(coordinates.lng, coordinates.lat))
    }
}

impl From<Coordinates> for String {
    fn from(coordinates: Coordinates) -> Self {
        format!("{},{}", coordinates.lat, coordinates.lng)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub address: String,
    pub coordinates: Coordinates,
}

impl Place {
    pub fn new(address: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            address: address.into(),
            coordinates,
        }
    }
}

#[test]
fn coordinates_validation() {
    assert!(Coordinates::new(4.05, 9.77).validate().is_ok());
    assert!(Coordinates::new(-90.0, 180.0).validate().is_ok());
    assert!(Coordinates::new(90.5, 0.0).validate().is_err());
    assert!(Coordinates::new(0.0, -181.0).validate().is_err());
    assert!(Coordinates::new(f64::NAN, 0.0).validate().is_err());
}

#[test]
fn coordinates_into_geometry_uses_lng_as_x() {
    let geometry: Geometry<f64> = Coordinates::new(4.05, 9.77).into();

    match geometry {
        Geometry::Point(point) => {
            assert_eq!(point.x(), 9.77);
            assert_eq!(point.y(), 4.05);
        }
        _ => panic!("expected a point"),
    }
}
