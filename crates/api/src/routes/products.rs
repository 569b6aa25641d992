//! Product catalog route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use novatech_core::ProductId;

use crate::db::{ProductRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::models::{Product, ProductDetail, ProductFilter, ProductSort};
use crate::state::AppState;

use super::ApiPath;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            sort: ProductSort::from_query(query.sort.as_deref()),
            category: non_empty(query.category),
            search: non_empty(query.search),
        }
    }
}

/// List products.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = ProductRepository::new(state.pool())
        .list(&query.into())
        .await?;
    Ok(Json(products))
}

/// Show one product with its reviews.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductDetail>> {
    let product = find_product(&state, id).await?;
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(id)
        .await?;

    Ok(Json(ProductDetail { product, reviews }))
}

/// Products in the same category.
#[instrument(skip(state))]
pub async fn similar(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Vec<Product>>> {
    let product = find_product(&state, id).await?;
    let similar = ProductRepository::new(state.pool())
        .similar(&product)
        .await?;
    Ok(Json(similar))
}

async fn find_product(state: &AppState, id: ProductId) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_to_filter() {
        let filter: ProductFilter = ProductQuery {
            category: Some("Laptops".to_string()),
            search: Some("  ".to_string()),
            sort: Some("price_desc".to_string()),
        }
        .into();

        assert_eq!(filter.category.as_deref(), Some("Laptops"));
        assert_eq!(filter.search, None);
        assert_eq!(filter.sort, ProductSort::PriceDesc);
    }

    #[test]
    fn test_empty_query_is_default_filter() {
        let filter: ProductFilter = ProductQuery::default().into();
        assert_eq!(filter.category, None);
        assert_eq!(filter.sort, ProductSort::Newest);
    }
}
