use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    config::GoogleMapsConfig,
    entities::Coordinates,
    error::{invalid_input_error, upstream_error, Error},
    routing::{RouteEstimate, RouteProvider},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Response {
    status: String,
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Row {
    elements: Vec<Element>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Element {
    status: String,
    distance: Option<Value>,
    duration: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Value {
    value: f64,
}

/// Driving distance and duration from the Distance Matrix API.
pub struct DistanceMatrix {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl DistanceMatrix {
    pub fn new(config: GoogleMapsConfig, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: config.api_base,
            api_key: config.api_key,
        })
    }
}

#[async_trait]
impl RouteProvider for DistanceMatrix {
    #[tracing::instrument(skip(self))]
    async fn route(&self, pickup: Coordinates, dropoff: Coordinates) -> Result<RouteEstimate, Error> {
        let url = format!("https://{}/maps/api/distancematrix/json", self.api_base);
        let origins: String = pickup.into();
        let destinations: String = dropoff.into();

        let res = self
            .client
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .query(&[("origins", origins)])
            .query(&[("destinations", destinations)])
            .query(&[("mode", "driving")])
            .send()
            .await?;

        let status_code = res.status().as_u16();

        if (400..500).contains(&status_code) {
            return Err(invalid_input_error());
        } else if status_code != 200 {
            return Err(upstream_error());
        }

        let data: Response = res.json().await?;

        if data.status != "OK" {
            tracing::warn!("distance matrix returned {}", data.status);
            return Err(upstream_error());
        }

        let element = data
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or_else(upstream_error)?;

        to_estimate(element)
    }
}

fn to_estimate(element: Element) -> Result<RouteEstimate, Error> {
    if element.status != "OK" {
        return Err(upstream_error());
    }

    match (element.distance, element.duration) {
        (Some(distance), Some(duration)) => Ok(RouteEstimate {
            distance_km: (distance.value / 10.0).round() / 100.0,
            duration_min: (duration.value / 60.0).ceil() as i32,
        }),
        _ => Err(upstream_error()),
    }
}

#[test]
fn element_in_metres_and_seconds() {
    let body = r#"{
        "status": "OK",
        "rows": [{ "elements": [{
            "status": "OK",
            "distance": { "value": 2484, "text": "2.5 km" },
            "duration": { "value": 410, "text": "7 mins" }
        }]}]
    }"#;

    let data: Response = serde_json::from_str(body).unwrap();
    let element = data.rows[0].elements[0].clone();

    assert_eq!(
        to_estimate(element).unwrap(),
        RouteEstimate {
            distance_km: 2.48,
            duration_min: 7,
        }
    );
}

#[test]
fn unroutable_element_is_an_error() {
    let element = Element {
        status: "ZERO_RESULTS".into(),
        distance: None,
        duration: None,
    };

    assert!(to_estimate(element).is_err());
}
