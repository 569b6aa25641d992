//! Order types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use novatech_core::{Money, OrderId, OrderItemId, OrderStatus, ProductId, ShippingMethod, UserId};

/// An order line with the price frozen at purchase time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    /// `None` once the product has been removed from the catalog.
    pub product_id: Option<ProductId>,
    pub title: String,
    /// Current product image, if the product still exists.
    pub image: Option<String>,
    pub quantity: u32,
    pub price: Money,
}

/// Delivery details collected at card checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub shipping_method: ShippingMethod,
}

/// A placed order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub shipping_method: Option<ShippingMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `user_id` placed this order.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}
