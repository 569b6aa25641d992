//! Card payment route handlers.
//!
//! Checkout runs in two steps. `create-payment-intent` turns the cart into a
//! `PENDING` order and opens a Stripe PaymentIntent for its total; the
//! browser completes the payment with the returned client secret. Then
//! `confirm-order` asks Stripe (never the client) whether the intent
//! succeeded, marks the order `PAID` and empties the cart.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use novatech_core::{OrderId, ShippingMethod};

use crate::db::orders::Checkout;
use crate::db::{CartRepository, OrderRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::ShippingDetails;
use crate::services::payment::{PaymentError, PaymentIntentStatus};
use crate::state::AppState;

use super::{ApiJson, non_blank};

/// Card checkout request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub shipping_method: Option<String>,
}

impl CreatePaymentIntentRequest {
    fn shipping_details(&self) -> Result<ShippingDetails> {
        let (Some(address), Some(city), Some(postal_code), Some(country)) = (
            non_blank(self.address.as_ref()),
            non_blank(self.city.as_ref()),
            non_blank(self.postal_code.as_ref()),
            non_blank(self.country.as_ref()),
        ) else {
            return Err(AppError::BadRequest(
                "Shipping address is incomplete".to_string(),
            ));
        };

        let shipping_method = match non_blank(self.shipping_method.as_ref()) {
            None => ShippingMethod::default(),
            Some(method) => method
                .parse()
                .map_err(|e: novatech_core::UnknownShippingMethod| {
                    AppError::BadRequest(e.to_string())
                })?,
        };

        Ok(ShippingDetails {
            address: address.trim().to_string(),
            city: city.trim().to_string(),
            postal_code: postal_code.trim().to_string(),
            country: country.trim().to_string(),
            shipping_method,
        })
    }
}

/// What the browser needs to complete the payment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub order_id: OrderId,
}

/// Confirmation request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOrderRequest {
    pub payment_intent_id: Option<String>,
}

/// Confirmation result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOrderResponse {
    pub success: bool,
    pub order_id: OrderId,
}

/// Create a pending order from the cart and a PaymentIntent for its total.
///
/// If Stripe fails, the pending order stays behind unpaid.
#[instrument(skip(state, body))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    ApiJson(body): ApiJson<CreatePaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>> {
    let shipping = body.shipping_details()?;

    let orders = OrderRepository::new(state.pool());
    let order = orders
        .create_from_cart(user_id, &Checkout::Card(shipping))
        .await?
        .ok_or_else(|| AppError::BadRequest("Cart is empty".to_string()))?;

    let intent = state
        .stripe()
        .create_payment_intent(order.total, order.id, user_id)
        .await?;

    orders.set_payment_intent(order.id, &intent.id).await?;

    let client_secret = intent.client_secret.ok_or_else(|| {
        AppError::Internal(format!("payment intent {} has no client secret", intent.id))
    })?;

    tracing::info!(
        order_id = %order.id,
        payment_intent_id = %intent.id,
        total = %order.total,
        "Payment intent created"
    );
    add_breadcrumb("checkout", "Payment intent created", None);

    Ok(Json(PaymentIntentResponse {
        client_secret,
        order_id: order.id,
    }))
}

/// Mark the order paid once Stripe reports the intent succeeded.
#[instrument(skip(state, body))]
pub async fn confirm_order(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    ApiJson(body): ApiJson<ConfirmOrderRequest>,
) -> Result<Json<ConfirmOrderResponse>> {
    let Some(payment_intent_id) = non_blank(body.payment_intent_id.as_ref()) else {
        return Err(AppError::BadRequest(
            "paymentIntentId is required".to_string(),
        ));
    };

    let intent = state
        .stripe()
        .retrieve_payment_intent(payment_intent_id)
        .await
        .map_err(|e| match e {
            PaymentError::Api { status: 404, .. } => {
                AppError::BadRequest("Payment intent not found".to_string())
            }
            other => other.into(),
        })?;

    if intent.status != PaymentIntentStatus::Succeeded {
        return Err(AppError::BadRequest("Payment has not succeeded".to_string()));
    }

    let order_id = intent
        .order_id()
        .ok_or_else(|| AppError::BadRequest("Payment is not linked to an order".to_string()))?;

    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if !order.is_owned_by(user_id) {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    if order.payment_intent_id.as_deref() != Some(intent.id.as_str()) {
        return Err(AppError::BadRequest(
            "Payment does not belong to this order".to_string(),
        ));
    }

    if !intent.charges(order.total, state.stripe().currency()) {
        tracing::warn!(
            order_id = %order.id,
            payment_intent_id = %intent.id,
            intent_amount = intent.amount,
            intent_currency = %intent.currency,
            total = %order.total,
            "Payment amount does not match order"
        );
        return Err(AppError::BadRequest(
            "Payment amount does not match the order".to_string(),
        ));
    }

    let order = orders.mark_paid(order_id).await?;

    if let Err(e) = CartRepository::new(state.pool()).clear(user_id).await {
        tracing::error!(order_id = %order.id, error = %e, "Failed to clear cart after payment");
    }

    tracing::info!(order_id = %order.id, payment_intent_id = %intent.id, "Order paid");
    add_breadcrumb("checkout", "Order paid", None);

    Ok(Json(ConfirmOrderResponse {
        success: true,
        order_id: order.id,
    }))
}
