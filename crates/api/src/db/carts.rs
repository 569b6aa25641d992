//! Cart repository.
//!
//! Every user has at most one cart, created lazily. All item operations are
//! scoped to the caller's cart, so an item ID from another user's cart is
//! reported as not found.

use sqlx::{PgConnection, PgPool};

use novatech_core::{CartId, CartItemId, Money, ProductId, UserId};

use super::RepositoryError;
use crate::models::{Cart, CartItem, MAX_LINE_QUANTITY, ProductSummary};

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    quantity: i32,
    product_id: ProductId,
    title: String,
    brand: Option<String>,
    category: String,
    price: Money,
    old_price: Option<Money>,
    image: Option<String>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative quantity {} on cart item {}",
                row.quantity, row.id
            ))
        })?;

        Ok(Self {
            id: row.id,
            quantity,
            product: ProductSummary {
                id: row.product_id,
                title: row.title,
                brand: row.brand,
                category: row.category,
                price: row.price,
                old_price: row.old_price,
                image: row.image,
            },
        })
    }
}

/// Fetch the user's cart ID, creating an empty cart if there is none.
pub(crate) async fn ensure_cart(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<CartId, RepositoryError> {
    sqlx::query("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
        .bind(CartId::generate())
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let cart_id = sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(cart_id)
}

/// Load a cart's lines with their products, in insertion order.
pub(crate) async fn load_items(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Vec<CartItem>, RepositoryError> {
    let rows: Vec<CartItemRow> = sqlx::query_as(
        r"
        SELECT ci.id, ci.quantity, p.id AS product_id, p.title, p.brand, p.category,
               p.price, p.old_price, p.image
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at, ci.id
        ",
    )
    .bind(cart_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(CartItem::try_from).collect()
}

/// Remove every line from the user's cart.
pub(crate) async fn clear_items(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)",
    )
    .bind(user_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's cart, creating an empty one if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let cart_id = ensure_cart(&mut *conn, user_id).await?;
        let items = load_items(&mut *conn, cart_id).await?;
        Ok(Cart::new(cart_id, user_id, items))
    }

    /// Add `quantity` units of a product, incrementing an existing line.
    ///
    /// Returns `None`, leaving the cart untouched, when the line would end up
    /// holding more than [`MAX_LINE_QUANTITY`] units.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u16,
    ) -> Result<Option<Cart>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let cart_id = ensure_cart(&mut *tx, user_id).await?;

        let written = sqlx::query(
            r"
            INSERT INTO cart_items (id, cart_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            WHERE cart_items.quantity + EXCLUDED.quantity <= $5
            ",
        )
        .bind(CartItemId::generate())
        .bind(cart_id)
        .bind(product_id)
        .bind(i32::from(quantity))
        .bind(i32::from(MAX_LINE_QUANTITY))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?
        .rows_affected();

        // The conflict branch's WHERE filtered the update out
        if written == 0 {
            return Ok(None);
        }

        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        let items = load_items(&mut *tx, cart_id).await?;
        tx.commit().await?;
        Ok(Some(Cart::new(cart_id, user_id, items)))
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in the user's cart.
    pub async fn update_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u16,
    ) -> Result<Cart, RepositoryError> {
        if quantity == 0 {
            return self.remove_item(user_id, item_id).await;
        }

        let mut tx = self.pool.begin().await?;
        let cart_id = ensure_cart(&mut *tx, user_id).await?;

        let updated = sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE id = $1 AND cart_id = $2",
        )
        .bind(item_id)
        .bind(cart_id)
        .bind(i32::from(quantity))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(RepositoryError::NotFound);
        }

        let items = load_items(&mut *tx, cart_id).await?;
        tx.commit().await?;
        Ok(Cart::new(cart_id, user_id, items))
    }

    /// Remove a line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in the user's cart.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let cart_id = ensure_cart(&mut *tx, user_id).await?;

        let deleted = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(item_id)
            .bind(cart_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(RepositoryError::NotFound);
        }

        let items = load_items(&mut *tx, cart_id).await?;
        tx.commit().await?;
        Ok(Cart::new(cart_id, user_id, items))
    }

    /// Remove every line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let cart_id = ensure_cart(&mut *conn, user_id).await?;
        clear_items(&mut *conn, user_id).await?;
        Ok(Cart::new(cart_id, user_id, Vec::new()))
    }
}

