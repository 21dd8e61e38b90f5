use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::Trip;
use crate::error::{unexpected_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    MobileMoney,
    Card,
    Wallet,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::MobileMoney
    }
}

impl PaymentMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::MobileMoney => "mobile_money",
            Self::Card => "card",
            Self::Wallet => "wallet",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Settles the fare of a completed trip.
#[async_trait]
pub trait PaymentProcessor {
    async fn settle(&self, trip: &Trip) -> Result<PaymentStatus, Error>;
}

/// The driver collects cash on drop-off, so the trip is paid as soon as it
/// completes.
pub struct CashProcessor;

#[async_trait]
impl PaymentProcessor for CashProcessor {
    async fn settle(&self, trip: &Trip) -> Result<PaymentStatus, Error> {
        tracing::info!(trip_id = %trip.id, fare = %trip.fare, "cash collected by driver");
        Ok(PaymentStatus::Paid)
    }
}

/// Hands the charge to an external provider, which confirms it later.
pub struct DeferredProcessor {
    method: PaymentMethod,
}

impl DeferredProcessor {
    pub fn new(method: PaymentMethod) -> Self {
        Self { method }
    }
}

#[async_trait]
impl PaymentProcessor for DeferredProcessor {
    async fn settle(&self, trip: &Trip) -> Result<PaymentStatus, Error> {
        tracing::info!(
            trip_id = %trip.id,
            fare = %trip.fare,
            "charge deferred to {} provider",
            self.method.name()
        );
        Ok(PaymentStatus::Pending)
    }
}

pub type DynProcessor = Arc<dyn PaymentProcessor + Send + Sync>;

/// Lookup table from payment method to the processor that handles it.
#[derive(Clone)]
pub struct Processors {
    table: HashMap<PaymentMethod, DynProcessor>,
}

impl Default for Processors {
    fn default() -> Self {
        let mut table: HashMap<PaymentMethod, DynProcessor> = HashMap::new();

        table.insert(PaymentMethod::Cash, Arc::new(CashProcessor));

        for method in [PaymentMethod::MobileMoney, PaymentMethod::Card, PaymentMethod::Wallet] {
            table.insert(method, Arc::new(DeferredProcessor::new(method)));
        }

        Self { table }
    }
}

impl Processors {
    pub fn with(mut self, method: PaymentMethod, processor: DynProcessor) -> Self {
        self.table.insert(method, processor);
        self
    }

    pub fn get(&self, method: PaymentMethod) -> Result<DynProcessor, Error> {
        self.table.get(&method).cloned().ok_or_else(|| {
            tracing::error!("no payment processor registered for {}", method.name());
            unexpected_error()
        })
    }

    pub async fn settle(&self, trip: &Trip) -> Result<PaymentStatus, Error> {
        self.get(trip.payment_method)?.settle(trip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_method_has_a_processor() {
        let processors = Processors::default();

        for method in [
            PaymentMethod::Cash,
            PaymentMethod::MobileMoney,
            PaymentMethod::Card,
            PaymentMethod::Wallet,
        ] {
            assert!(processors.get(method).is_ok(), "{}", method.name());
        }
    }

    #[test]
    fn payment_method_wire_names() {
        let method: PaymentMethod = serde_json::from_str("\"mobile_money\"").unwrap();
        assert_eq!(method, PaymentMethod::MobileMoney);
        assert_eq!(PaymentMethod::default(), PaymentMethod::MobileMoney);
    }
}
