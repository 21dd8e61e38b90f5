use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_input_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Moto,
    Taxi,
    Van,
    Vip,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Moto => "moto",
            Self::Taxi => "taxi",
            Self::Van => "van",
            Self::Vip => "vip",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleType {
    pub id: Uuid,
    pub category: Category,
    pub base_price: Decimal,
    pub price_per_km: Decimal,
    pub price_per_minute: Decimal,
    pub capacity: i32,
    pub is_active: bool,
}

/// Admin input for a new vehicle type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewVehicleType {
    pub category: Category,
    pub base_price: Decimal,
    pub price_per_km: Decimal,
    pub price_per_minute: Decimal,
    pub capacity: i32,
}

impl VehicleType {
    pub fn from_params(params: NewVehicleType) -> Result<Self, Error> {
        Self::new(
            params.category,
            params.base_price,
            params.price_per_km,
            params.price_per_minute,
            params.capacity,
        )
    }

    pub fn new(
        category: Category,
        base_price: Decimal,
        price_per_km: Decimal,
        price_per_minute: Decimal,
        capacity: i32,
    ) -> Result<Self, Error> {
        if base_price.is_sign_negative()
            || price_per_km.is_sign_negative()
            || price_per_minute.is_sign_negative()
        {
            return Err(invalid_input_error().with_message("prices must not be negative"));
        }

        if capacity < 1 {
            return Err(invalid_input_error().with_message("capacity must be at least 1"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            category,
            base_price: base_price.round_dp(2),
            price_per_km: price_per_km.round_dp(2),
            price_per_minute: price_per_minute.round_dp(2),
            capacity,
            is_active: true,
        })
    }
}
