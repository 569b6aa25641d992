//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /api/auth/register            - Create an account
//! POST   /api/auth/login               - Log in, sets the `token` cookie
//! GET    /api/auth/me                  - Current user (cookie)
//! POST   /api/auth/logout              - Clear the `token` cookie
//! DELETE /api/auth/delete              - Delete the account (cookie)
//! POST   /api/auth/forgot-password     - Email a reset link
//! POST   /api/auth/reset-password      - Set a new password from a reset link
//! PUT    /api/auth/profile             - Update name and email (cookie)
//!
//! # Products
//! GET    /api/products                 - Listing (category, search, sort)
//! GET    /api/products/{id}            - Product with reviews
//! GET    /api/products/{id}/similar    - Up to 4 products in the same category
//!
//! # Cart (requires auth)
//! GET    /api/cart                     - The caller's cart
//! POST   /api/cart/add                 - Add a product
//! PUT    /api/cart/update              - Change a line's quantity
//! DELETE /api/cart/remove/{itemId}     - Remove a line
//! DELETE /api/cart/clear               - Remove every line
//!
//! # Reviews
//! GET    /api/reviews/{productId}      - Reviews of a product
//! POST   /api/reviews                  - Add a review (auth)
//! DELETE /api/reviews/{reviewId}       - Delete own review (auth)
//!
//! # Orders (requires auth)
//! POST   /api/orders                   - Direct checkout from the cart
//! GET    /api/orders                   - The caller's orders
//! GET    /api/orders/{id}              - One of the caller's orders
//!
//! # Payment (requires auth)
//! POST   /api/payment/create-payment-intent - Pending order + Stripe intent
//! POST   /api/payment/confirm-order         - Verify the intent, mark paid
//! ```

pub mod auth;
pub mod cart;
pub mod health;
pub mod orders;
pub mod payment;
pub mod products;
pub mod reviews;

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection},
    },
    routing::{delete, get, post, put},
};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

/// JSON body extractor whose rejections use the API's error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejections use the API's error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected path parameter");
        Self::BadRequest("Invalid identifier".to_string())
    }
}

/// `{"message": ...}` response body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Wrap a fixed message as a JSON response.
#[must_use]
pub const fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}

/// A request field that is present and not blank.
pub(crate) fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        .route("/delete", delete(auth::delete_account))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/profile", put(auth::update_profile))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/similar", get(products::similar))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", put(cart::update))
        .route("/remove/{item_id}", delete(cart::remove))
        .route("/clear", delete(cart::clear))
}

/// Create the review routes router.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(reviews::create))
        // GET takes a product ID, DELETE a review ID
        .route("/{id}", get(reviews::index).delete(reviews::destroy))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-payment-intent", post(payment::create_payment_intent))
        .route("/confirm-order", post(payment::confirm_order))
}

/// Create all `/api` routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/reviews", review_routes())
        .nest("/orders", order_routes())
        .nest("/payment", payment_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        let filled = "ada@novatech.com".to_string();
        let blank = "   ".to_string();
        assert_eq!(non_blank(Some(&filled)), Some("ada@novatech.com"));
        assert_eq!(non_blank(Some(&blank)), None);
        assert_eq!(non_blank(None), None);
    }
}
