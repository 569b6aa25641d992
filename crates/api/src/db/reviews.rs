//! Review repository and product rating maintenance.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use novatech_core::{ProductId, Rating, ReviewId, UserId};

use super::RepositoryError;
use crate::models::{Review, ReviewAuthor, ReviewWithAuthor};

#[derive(sqlx::FromRow)]
struct ReviewWithAuthorRow {
    id: ReviewId,
    user_id: UserId,
    product_id: ProductId,
    rating: Rating,
    comment: String,
    created_at: DateTime<Utc>,
    first_name: String,
    last_name: String,
}

impl From<ReviewWithAuthorRow> for ReviewWithAuthor {
    fn from(row: ReviewWithAuthorRow) -> Self {
        Self {
            review: Review {
                id: row.id,
                user_id: row.user_id,
                product_id: row.product_id,
                rating: row.rating,
                comment: row.comment,
                created_at: row.created_at,
            },
            user: ReviewAuthor {
                first_name: row.first_name,
                last_name: row.last_name,
            },
        }
    }
}

/// Lock a product row until the end of the transaction.
///
/// Every write that changes a product's reviews takes this lock before
/// touching `reviews`, so two writers cannot each recompute the rating from
/// a snapshot that misses the other's review.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product does not exist.
pub(crate) async fn lock_product(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<(), RepositoryError> {
    sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(conn)
        .await?
        .map(|_| ())
        .ok_or(RepositoryError::NotFound)
}

/// Recompute a product's average rating and review count from its reviews.
///
/// Runs on the caller's connection so it joins the caller's transaction,
/// which must already hold [`lock_product`] for this product.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub(crate) async fn recompute_product_rating(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE products p
        SET rating = COALESCE(agg.avg_rating, 0),
            review_count = agg.review_count,
            updated_at = NOW()
        FROM (
            SELECT AVG(rating)::DOUBLE PRECISION AS avg_rating,
                   COUNT(*)::INTEGER AS review_count
            FROM reviews
            WHERE product_id = $1
        ) agg
        WHERE p.id = $1
        ",
    )
    .bind(product_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first, with their authors' names.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ReviewWithAuthor>, RepositoryError> {
        let rows: Vec<ReviewWithAuthorRow> = sqlx::query_as(
            r"
            SELECT r.id, r.user_id, r.product_id, r.rating, r.comment, r.created_at,
                   u.first_name, u.last_name
            FROM reviews r
            JOIN users u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC, r.id
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ReviewWithAuthor::from).collect())
    }

    /// Add a review and refresh the product's rating.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rating: Rating,
        comment: &str,
    ) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_product(&mut *tx, product_id).await?;

        let review: Review = sqlx::query_as(
            r"
            INSERT INTO reviews (id, user_id, product_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, product_id, rating, comment, created_at
            ",
        )
        .bind(ReviewId::generate())
        .bind(user_id)
        .bind(product_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await?;

        recompute_product_rating(&mut *tx, product_id).await?;

        tx.commit().await?;
        Ok(review)
    }

    /// Delete one of the user's reviews and refresh the product's rating.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist or
    /// belongs to someone else.
    pub async fn delete(&self, user_id: UserId, review_id: ReviewId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product_id: ProductId =
            sqlx::query_scalar("SELECT product_id FROM reviews WHERE id = $1 AND user_id = $2")
                .bind(review_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        lock_product(&mut *tx, product_id).await?;

        // Gone if a concurrent request deleted it while we waited for the lock
        let deleted = sqlx::query("DELETE FROM reviews WHERE id = $1 AND user_id = $2")
            .bind(review_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(RepositoryError::NotFound);
        }

        recompute_product_rating(&mut *tx, product_id).await?;

        tx.commit().await?;
        Ok(())
    }
}
