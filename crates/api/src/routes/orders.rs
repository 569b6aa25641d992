//! Order route handlers.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use novatech_core::OrderId;

use crate::db::OrderRepository;
use crate::db::orders::Checkout;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::state::AppState;

use super::ApiPath;

/// Place an order from the cart without online payment.
#[instrument(skip(state))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<(StatusCode, Json<Order>)> {
    let order = OrderRepository::new(state.pool())
        .create_from_cart(user_id, &Checkout::Direct)
        .await?
        .ok_or_else(|| AppError::BadRequest("Cart is empty".to_string()))?;

    tracing::info!(order_id = %order.id, total = %order.total, "Order placed");
    add_breadcrumb("checkout", "Order placed", None);
    Ok((StatusCode::CREATED, Json(order)))
}

/// The caller's orders, newest first.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user_id)
        .await?;
    Ok(Json(orders))
}

/// One order. Other users' orders are forbidden.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if !order.is_owned_by(user_id) {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::order_routes;
    use crate::services::auth::SESSION_TTL;

    fn app(state: AppState) -> Router {
        Router::new()
            .nest("/api/orders", order_routes())
            .with_state(state)
    }

    #[tokio::test]
    async fn test_orders_require_auth() {
        let response = app(AppState::for_tests())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/orders")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_order_id_is_400() {
        let state = AppState::for_tests();
        let token = state
            .tokens()
            .issue(novatech_core::UserId::generate(), SESSION_TTL)
            .unwrap();

        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/orders/not-a-uuid")
                    .header("cookie", format!("token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
