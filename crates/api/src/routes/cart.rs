//! Cart route handlers.
//!
//! Every operation acts on the caller's own cart and answers with the whole
//! cart, so the frontend never has to refetch.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use novatech_core::{CartItemId, ProductId};

use crate::db::{CartRepository, RepositoryError};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{Cart, MAX_LINE_QUANTITY};
use crate::state::AppState;

use super::{ApiJson, ApiPath};

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i64>,
}

/// Quantity update request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub item_id: Option<CartItemId>,
    pub quantity: Option<i64>,
}

/// Show the cart, creating it on first use.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<Cart>> {
    let cart = CartRepository::new(state.pool())
        .get_or_create(user_id)
        .await?;
    Ok(Json(cart))
}

/// Add a product. Adding a product already in the cart increases its quantity.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<Json<Cart>> {
    let product_id = body
        .product_id
        .ok_or_else(|| AppError::BadRequest("productId is required".to_string()))?;

    let quantity = match body.quantity {
        None => 1,
        Some(q) if q < 1 => {
            return Err(AppError::BadRequest(
                "Quantity must be at least 1".to_string(),
            ));
        }
        Some(q) => line_quantity(q)?,
    };

    let cart = CartRepository::new(state.pool())
        .add_item(user_id, product_id, quantity)
        .await
        .map_err(|e| not_found_as(e, "Product not found"))?
        .ok_or_else(too_many_units)?;

    let product = product_id.to_string();
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", product.as_str())][..]),
    );
    Ok(Json(cart))
}

/// Change a line's quantity. Anything below 1 removes the line.
#[instrument(skip(state))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    ApiJson(body): ApiJson<UpdateItemRequest>,
) -> Result<Json<Cart>> {
    let (Some(item_id), Some(quantity)) = (body.item_id, body.quantity) else {
        return Err(AppError::BadRequest(
            "itemId and quantity are required".to_string(),
        ));
    };

    let quantity = line_quantity(quantity.max(0))?;

    let cart = CartRepository::new(state.pool())
        .update_item(user_id, item_id, quantity)
        .await
        .map_err(|e| not_found_as(e, "Cart item not found"))?;
    Ok(Json(cart))
}

/// Remove a line.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    ApiPath(item_id): ApiPath<CartItemId>,
) -> Result<Json<Cart>> {
    let cart = CartRepository::new(state.pool())
        .remove_item(user_id, item_id)
        .await
        .map_err(|e| not_found_as(e, "Cart item not found"))?;
    Ok(Json(cart))
}

/// Remove every line.
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<Cart>> {
    let cart = CartRepository::new(state.pool()).clear(user_id).await?;
    Ok(Json(cart))
}

/// A requested line quantity, capped at [`MAX_LINE_QUANTITY`].
fn line_quantity(quantity: i64) -> Result<u16> {
    u16::try_from(quantity)
        .ok()
        .filter(|q| *q <= MAX_LINE_QUANTITY)
        .ok_or_else(too_many_units)
}

fn too_many_units() -> AppError {
    AppError::BadRequest(format!(
        "A cart line can hold at most {MAX_LINE_QUANTITY} units"
    ))
}

fn not_found_as(err: RepositoryError, what: &str) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound(what.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::routes::cart_routes;
    use crate::services::auth::SESSION_TTL;

    fn app(state: AppState) -> Router {
        Router::new()
            .nest("/api/cart", cart_routes())
            .with_state(state)
    }

    async fn post_add(state: AppState, cookie: Option<String>, body: &str) -> (StatusCode, String) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/cart/add")
            .header("content-type", "application/json");
        if let Some(cookie) = cookie {
            request = request.header("cookie", cookie);
        }
        let response = app(state)
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_cart_requires_auth() {
        let state = AppState::for_tests();
        let response = app(state)
            .oneshot(Request::builder().uri("/api/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_forged_token_is_403() {
        let (status, _) = post_add(
            AppState::for_tests(),
            Some("token=forged.token.value".to_string()),
            "{}",
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_add_rejects_zero_quantity() {
        let state = AppState::for_tests();
        let token = state
            .tokens()
            .issue(novatech_core::UserId::generate(), SESSION_TTL)
            .unwrap();

        let body = format!(
            r#"{{"productId":"{}","quantity":0}}"#,
            ProductId::generate()
        );
        let (status, body) = post_add(state, Some(format!("token={token}")), &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("at least 1"));
    }

    #[test]
    fn test_line_quantity_bounds() {
        assert_eq!(line_quantity(0).unwrap(), 0);
        assert_eq!(line_quantity(99).unwrap(), MAX_LINE_QUANTITY);
        assert!(matches!(line_quantity(100), Err(AppError::BadRequest(_))));
        assert!(matches!(
            line_quantity(i64::from(i32::MAX)),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(line_quantity(-1), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_add_rejects_quantity_over_line_limit() {
        let state = AppState::for_tests();
        let token = state
            .tokens()
            .issue(novatech_core::UserId::generate(), SESSION_TTL)
            .unwrap();

        let body = format!(
            r#"{{"productId":"{}","quantity":2147483647}}"#,
            ProductId::generate()
        );
        let (status, body) = post_add(state, Some(format!("token={token}")), &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("at most 99"));
    }

    #[tokio::test]
    async fn test_update_rejects_quantity_over_line_limit() {
        let state = AppState::for_tests();
        let token = state
            .tokens()
            .issue(novatech_core::UserId::generate(), SESSION_TTL)
            .unwrap();

        let body = format!(
            r#"{{"itemId":"{}","quantity":100}}"#,
            CartItemId::generate()
        );
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/cart/update")
                    .header("content-type", "application/json")
                    .header("cookie", format!("token={token}"))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_add_requires_product_id() {
        let state = AppState::for_tests();
        let token = state
            .tokens()
            .issue(novatech_core::UserId::generate(), SESSION_TTL)
            .unwrap();

        let (status, body) = post_add(state, Some(format!("token={token}")), "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("productId"));
    }
}
