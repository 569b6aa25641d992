//! Order repository.
//!
//! Orders are always created from the caller's cart, inside one transaction
//! that locks the cart row, snapshots the current product prices onto the
//! order lines and (for direct checkout) empties the cart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use novatech_core::{
    CartId, Money, OrderId, OrderItemId, OrderStatus, ProductId, ShippingMethod, UserId,
};

use super::RepositoryError;
use super::carts::{clear_items, load_items};
use crate::models::{Order, OrderItem, ShippingDetails};

const ORDER_COLUMNS: &str = "id, user_id, status, subtotal, shipping_cost, total, address, city, \
                             postal_code, country, shipping_method, payment_intent_id, \
                             created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    subtotal: Money,
    shipping_cost: Money,
    total: Money,
    address: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
    shipping_method: Option<String>,
    payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let shipping_method = self
            .shipping_method
            .as_deref()
            .map(str::parse::<ShippingMethod>)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("order {}: {e}", self.id)))?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            total: self.total,
            address: self.address,
            city: self.city,
            postal_code: self.postal_code,
            country: self.country,
            shipping_method,
            payment_intent_id: self.payment_intent_id,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    title: String,
    image: Option<String>,
    quantity: i32,
    price: Money,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative quantity {} on order item {}",
                row.quantity, row.id
            ))
        })?;

        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            title: row.title,
            image: row.image,
            quantity,
            price: row.price,
        })
    }
}

/// How an order is being placed.
#[derive(Debug, Clone)]
pub enum Checkout {
    /// Order placed straight from the cart without online payment. The
    /// order is `COMPLETED` and the cart is emptied.
    Direct,
    /// Card checkout. The order starts `PENDING`; the cart is kept until the
    /// payment is confirmed.
    Card(ShippingDetails),
}

impl Checkout {
    const fn status(&self) -> OrderStatus {
        match self {
            Self::Direct => OrderStatus::Completed,
            Self::Card(_) => OrderStatus::Pending,
        }
    }

    fn shipping(&self) -> Option<&ShippingDetails> {
        match self {
            Self::Direct => None,
            Self::Card(details) => Some(details),
        }
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the user's cart into an order.
    ///
    /// Returns `None` if the user has no cart or the cart is empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; nothing is
    /// written in that case.
    pub async fn create_from_cart(
        &self,
        user_id: UserId,
        checkout: &Checkout,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let cart_id: Option<CartId> =
            sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(cart_id) = cart_id else {
            return Ok(None);
        };

        let lines = load_items(&mut *tx, cart_id).await?;
        if lines.is_empty() {
            return Ok(None);
        }

        let subtotal: Money = lines.iter().map(|line| line.line_total()).sum();
        let shipping = checkout.shipping();
        let shipping_cost = shipping.map_or(Money::ZERO, |s| s.shipping_method.cost());
        let total = subtotal + shipping_cost;

        let order_id = OrderId::generate();
        sqlx::query(
            r"
            INSERT INTO orders (id, user_id, status, subtotal, shipping_cost, total,
                                address, city, postal_code, country, shipping_method)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(order_id)
        .bind(user_id)
        .bind(checkout.status())
        .bind(subtotal)
        .bind(shipping_cost)
        .bind(total)
        .bind(shipping.map(|s| s.address.as_str()))
        .bind(shipping.map(|s| s.city.as_str()))
        .bind(shipping.map(|s| s.postal_code.as_str()))
        .bind(shipping.map(|s| s.country.as_str()))
        .bind(shipping.map(|s| s.shipping_method.as_str()))
        .execute(&mut *tx)
        .await?;

        for line in &lines {
            sqlx::query(
                r"
                INSERT INTO order_items (id, order_id, product_id, title, quantity, price)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(OrderItemId::generate())
            .bind(order_id)
            .bind(line.product.id)
            .bind(&line.product.title)
            .bind(i64::from(line.quantity))
            .bind(line.product.price)
            .execute(&mut *tx)
            .await?;
        }

        if matches!(checkout, Checkout::Direct) {
            clear_items(&mut *tx, user_id).await?;
        }

        let order = fetch_order(&mut *tx, order_id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<OrderId> = rows.iter().map(|row| row.id).collect();
        let mut items = load_order_items(&mut *conn, &ids).await?;

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    /// Get an order by ID, regardless of owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut *conn, id).await
    }

    /// Record the payment intent created for a pending order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<(), RepositoryError> {
        let updated = sqlx::query(
            "UPDATE orders SET payment_intent_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(payment_intent_id)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "payment intent already used"))?
        .rows_affected();

        if updated == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark a card order as paid. Confirming an already paid order is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if there is no pending or paid
    /// order with this ID.
    pub async fn mark_paid(&self, id: OrderId) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE orders
            SET status = 'PAID', updated_at = NOW()
            WHERE id = $1 AND status IN ('PENDING', 'PAID')
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(RepositoryError::NotFound);
        }

        let order = fetch_order(&mut *tx, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(order)
    }
}

async fn fetch_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row: Option<OrderRow> =
        sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut items = load_order_items(conn, &[row.id]).await?;
    let lines = items.remove(&row.id).unwrap_or_default();
    row.into_order(lines).map(Some)
}

async fn load_order_items(
    conn: &mut PgConnection,
    order_ids: &[OrderId],
) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let uuids: Vec<uuid::Uuid> = order_ids.iter().map(|id| id.as_uuid()).collect();
    let rows: Vec<OrderItemRow> = sqlx::query_as(
        r"
        SELECT oi.id, oi.order_id, oi.product_id, oi.title, p.image, oi.quantity, oi.price
        FROM order_items oi
        LEFT JOIN products p ON p.id = oi.product_id
        WHERE oi.order_id = ANY($1)
        ORDER BY oi.title, oi.id
        ",
    )
    .bind(uuids)
    .fetch_all(conn)
    .await?;

    let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        let order_id = row.order_id;
        grouped
            .entry(order_id)
            .or_default()
            .push(OrderItem::try_from(row)?);
    }
    Ok(grouped)
}
