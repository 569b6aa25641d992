//! Review route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use novatech_core::{ProductId, Rating, ReviewId};

use crate::db::{RepositoryError, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Review, ReviewWithAuthor};
use crate::state::AppState;

use super::{ApiJson, ApiPath, MessageResponse, message, non_blank};

/// New review request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub product_id: Option<ProductId>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

/// Reviews of a product, newest first.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<Vec<ReviewWithAuthor>>> {
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product_id)
        .await?;
    Ok(Json(reviews))
}

/// Review a product.
#[instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    ApiJson(body): ApiJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let (Some(product_id), Some(rating), Some(comment)) = (
        body.product_id,
        body.rating,
        non_blank(body.comment.as_ref()),
    ) else {
        return Err(AppError::BadRequest(
            "productId, rating and comment are required".to_string(),
        ));
    };

    let rating = Rating::new(rating).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let review = ReviewRepository::new(state.pool())
        .create(user_id, product_id, rating, comment.trim())
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Product not found".to_string()),
            other => other.into(),
        })?;

    tracing::info!(review_id = %review.id, product_id = %product_id, "Review added");
    Ok((StatusCode::CREATED, Json(review)))
}

/// Delete one of the caller's reviews.
#[instrument(skip(state))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    ApiPath(review_id): ApiPath<ReviewId>,
) -> Result<Json<MessageResponse>> {
    ReviewRepository::new(state.pool())
        .delete(user_id, review_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Review not found".to_string()),
            other => other.into(),
        })?;

    Ok(message("Review deleted"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::Request,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::routes::review_routes;
    use crate::services::auth::SESSION_TTL;

    async fn post_review(body: String, authenticated: bool) -> (StatusCode, serde_json::Value) {
        let state = AppState::for_tests();
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/reviews")
            .header("content-type", "application/json");
        if authenticated {
            let token = state
                .tokens()
                .issue(novatech_core::UserId::generate(), SESSION_TTL)
                .unwrap();
            request = request.header("authorization", format!("Bearer {token}"));
        }

        let response = Router::new()
            .nest("/api/reviews", review_routes())
            .with_state(state)
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_create_requires_auth() {
        let (status, _) = post_review("{}".to_string(), false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_requires_comment() {
        let body = format!(r#"{{"productId":"{}","rating":4}}"#, ProductId::generate());
        let (status, _) = post_review(body, true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_rating() {
        let body = format!(
            r#"{{"productId":"{}","rating":6,"comment":"Great"}}"#,
            ProductId::generate()
        );
        let (status, body) = post_review(body, true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("between 1 and 5"));
    }
}
