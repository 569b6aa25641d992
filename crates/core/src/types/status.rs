//! Order status and shipping method enums.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Money;

/// Lifecycle of an order.
///
/// Orders placed directly from the cart are `Completed` immediately. Orders
/// created for card checkout start `Pending` and move to `Paid` once the
/// payment processor reports success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum OrderStatus {
    Pending,
    Completed,
    Paid,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Paid => "PAID",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown shipping method name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shipping method: {0}")]
pub struct UnknownShippingMethod(pub String);

/// Delivery option chosen at checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
}

impl ShippingMethod {
    /// Flat shipping cost added to the order total.
    #[must_use]
    pub fn cost(self) -> Money {
        match self {
            Self::Standard => Money::ZERO,
            Self::Express => Money::new(Decimal::new(999, 2)),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Express => "express",
        }
    }
}

impl fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShippingMethod {
    type Err = UnknownShippingMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            other => Err(UnknownShippingMethod(other.to_owned())),
        }
    }
}
