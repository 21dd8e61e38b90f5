use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{invalid_input_error, Error};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub google_maps: Option<GoogleMapsConfig>,
    pub route_timeout: Duration,
    pub sweep_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct GoogleMapsConfig {
    pub api_base: String,
    pub api_key: String,
}

impl Config {
    /// Reads the service configuration from the process environment, loading
    /// a `.env` file first when one is present.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;

        let google_maps = match env::var("GOOGLE_MAPS_API_KEY") {
            Ok(api_key) if !api_key.is_empty() => Some(GoogleMapsConfig {
                api_base: env::var("GOOGLE_MAPS_API_BASE")
                    .unwrap_or_else(|_| "maps.googleapis.com".into()),
                api_key,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            bind_addr: parse_or("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            google_maps,
            route_timeout: Duration::from_millis(parse_or("ROUTE_TIMEOUT_MS", 3000)?),
            sweep_interval: Duration::from_secs(parse_or("SWEEP_INTERVAL_SECS", 30)?),
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, Error> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| {
            tracing::error!("{} has an unparseable value: {:?}", key, raw);
            invalid_input_error().with_message(format!("{} is malformed", key))
        }),
        Err(_) => Ok(default),
    }
}

#[test]
fn parse_or_falls_back_to_default() {
    let value: u32 = parse_or("CABALLERO_TEST_UNSET_VARIABLE", 7).unwrap();
    assert_eq!(value, 7);
}
