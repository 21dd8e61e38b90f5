pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod external;
pub mod locator;
pub mod matching;
pub mod notify;
pub mod payment;
pub mod pricing;
pub mod routing;
pub mod server;
pub mod tracking;
