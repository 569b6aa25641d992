//! Shopping cart types.

use serde::Serialize;

use novatech_core::{CartId, CartItemId, Money, UserId};

use super::ProductSummary;

/// Most units of one product a cart line can hold. Mirrored by the
/// `cart_items.quantity` check constraint.
pub const MAX_LINE_QUANTITY: u16 = 99;

/// A cart line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub quantity: u32,
    pub product: ProductSummary,
}

impl CartItem {
    /// Price of this line at the product's current price.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.product.price.times(self.quantity)
    }
}

/// A user's cart with its lines in insertion order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub subtotal: Money,
    pub item_count: u64,
}

impl Cart {
    /// Build a cart and compute its totals.
    #[must_use]
    pub fn new(id: CartId, user_id: UserId, items: Vec<CartItem>) -> Self {
        let subtotal = items.iter().map(CartItem::line_total).sum();
        let item_count = items.iter().map(|item| u64::from(item.quantity)).sum();
        Self {
            id,
            user_id,
            items,
            subtotal,
            item_count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use novatech_core::ProductId;

    use super::*;

    fn item(price: &str, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::generate(),
            quantity,
            product: ProductSummary {
                id: ProductId::generate(),
                title: "Headphones".to_string(),
                brand: Some("Sonic".to_string()),
                category: "audio".to_string(),
                price: Money::new(price.parse().unwrap()),
                old_price: None,
                image: None,
            },
        }
    }

    #[test]
    fn test_totals() {
        let cart = Cart::new(
            CartId::generate(),
            UserId::generate(),
            vec![item("669.95", 2), item("19.99", 1)],
        );
        assert_eq!(cart.subtotal, Money::new("1359.89".parse().unwrap()));
        assert_eq!(cart.item_count, 3);
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::new(CartId::generate(), UserId::generate(), Vec::new());
        assert_eq!(cart.subtotal, Money::ZERO);
        assert_eq!(cart.item_count, 0);
        assert!(cart.is_empty());

        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["itemCount"], 0);
        assert_eq!(json["items"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_item_count_does_not_overflow() {
        let max = u32::try_from(i32::MAX).unwrap();
        let cart = Cart::new(
            CartId::generate(),
            UserId::generate(),
            vec![item("1.00", max), item("1.00", max), item("1.00", max)],
        );
        assert_eq!(cart.item_count, 3 * u64::from(max));
    }
}
