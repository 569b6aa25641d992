//! Product catalog queries.
//!
//! Products are read-only through the API; they are loaded by operators
//! directly into the database.

use sqlx::PgPool;

use novatech_core::ProductId;

use super::RepositoryError;
use crate::models::{Product, ProductFilter};

const PRODUCT_COLUMNS: &str = "id, title, description, brand, category, price, old_price, \
                               image, specs, rating, review_count, created_at, updated_at";

/// Number of products returned as "similar products".
pub const SIMILAR_LIMIT: i64 = 4;

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching the filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let search = filter.search.as_deref().map(like_pattern);

        let products = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::TEXT IS NULL OR category = $1)
              AND ($2::TEXT IS NULL
                   OR title ILIKE $2
                   OR description ILIKE $2
                   OR brand ILIKE $2)
            ORDER BY {}
            ",
            filter.sort.order_by()
        ))
        .bind(filter.category.as_deref())
        .bind(search)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(product)
    }

    /// Other products in the same category, best rated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn similar(&self, product: &Product) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE category = $1 AND id <> $2
            ORDER BY rating DESC, created_at DESC
            LIMIT $3
            "
        ))
        .bind(&product.category)
        .bind(product.id)
        .bind(SIMILAR_LIMIT)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }
}

/// Build an `ILIKE` substring pattern, escaping the wildcards in `term`.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_wraps_term() {
        assert_eq!(like_pattern("phone"), "%phone%");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
