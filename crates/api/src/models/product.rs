//! Catalog product types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use novatech_core::{Money, ProductId};

use super::ReviewWithAuthor;

/// A catalog product.
///
/// `rating` and `review_count` are denormalized from the product's reviews
/// and recomputed whenever a review is added or removed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: String,
    pub price: Money,
    pub old_price: Option<Money>,
    pub image: Option<String>,
    pub specs: Option<serde_json::Value>,
    pub rating: f64,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The product fields embedded in cart lines.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    pub brand: Option<String>,
    pub category: String,
    pub price: Money,
    pub old_price: Option<Money>,
    pub image: Option<String>,
}

/// A product page: the product plus its reviews, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub reviews: Vec<ReviewWithAuthor>,
}

/// Catalog ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    /// Newest first.
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    /// Best rated first.
    Rating,
}

impl ProductSort {
    /// Parse a `sort` query value; unknown values fall back to newest first.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("price_asc") => Self::PriceAsc,
            Some("price_desc") => Self::PriceDesc,
            Some("rating") => Self::Rating,
            _ => Self::Newest,
        }
    }

    pub(crate) const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC, id",
            Self::PriceAsc => "price ASC, id",
            Self::PriceDesc => "price DESC, id",
            Self::Rating => "rating DESC, review_count DESC, id",
        }
    }
}

/// Catalog listing filters.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Case-insensitive substring over title, description and brand.
    pub search: Option<String>,
    pub sort: ProductSort,
}
