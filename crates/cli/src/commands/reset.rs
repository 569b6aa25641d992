//! Wipe all customer data.
//!
//! # Usage
//!
//! ```bash
//! nova-cli reset-users --yes
//! ```
//!
//! Deletes every user together with their carts, orders and reviews, then
//! zeroes product ratings. The catalog itself is kept.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while resetting.
#[derive(Debug, Error)]
pub enum ResetError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Refusing to delete all users without --yes")]
    NotConfirmed,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Tables emptied by the reset, children before parents.
const USER_TABLES: [&str; 6] = [
    "order_items",
    "cart_items",
    "reviews",
    "orders",
    "carts",
    "users",
];

/// Delete all user-owned rows in one transaction.
///
/// # Errors
///
/// Returns `ResetError::NotConfirmed` unless `confirmed` is set; nothing is
/// deleted if any statement fails.
pub async fn run(confirmed: bool) -> Result<(), ResetError> {
    if !confirmed {
        return Err(ResetError::NotConfirmed);
    }

    let database_url =
        super::database_url().ok_or(ResetError::MissingEnvVar("NOVATECH_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    let mut tx = pool.begin().await?;

    for table in USER_TABLES {
        let deleted = sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tracing::info!(table, deleted, "Cleared table");
    }

    let products = sqlx::query("UPDATE products SET rating = 0, review_count = 0, updated_at = NOW()")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    tracing::info!(products, "Product ratings reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requires_confirmation() {
        assert!(matches!(run(false).await, Err(ResetError::NotConfirmed)));
    }

    #[test]
    fn test_children_cleared_before_parents() {
        let position = |name| USER_TABLES.iter().position(|t| *t == name).unwrap_or(usize::MAX);
        assert!(position("order_items") < position("orders"));
        assert!(position("cart_items") < position("carts"));
        assert!(position("orders") < position("users"));
        assert!(position("reviews") < position("users"));
    }
}
