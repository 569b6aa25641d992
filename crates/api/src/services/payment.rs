//! Stripe API client for card payments.
//!
//! Talks to the PaymentIntents REST endpoints directly: form-encoded requests
//! authenticated with the secret key as the basic-auth username.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use novatech_core::{Money, OrderId, UserId};

use crate::config::StripeConfig;

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Amount cannot be expressed in minor units.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    /// Not shaped like a PaymentIntent ID (`pi_` + alphanumerics).
    #[error("Invalid payment intent ID: {0:?}")]
    InvalidIntentId(String),
}

/// Status of a PaymentIntent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

/// The fields of a Stripe PaymentIntent this backend uses.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Handed to the browser to complete the payment; absent on some
    /// restricted-key responses.
    pub client_secret: Option<String>,
    pub status: PaymentIntentStatus,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// Order ID recorded in the intent's metadata at creation.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata.get("orderId")?.parse().ok()
    }

    /// Whether the intent charges exactly `amount` in `currency`.
    #[must_use]
    pub fn charges(&self, amount: Money, currency: &str) -> bool {
        amount.to_minor_units() == Some(self.amount) && self.currency.eq_ignore_ascii_case(currency)
    }
}

/// Whether `id` has the shape of a PaymentIntent ID.
#[must_use]
pub fn is_payment_intent_id(id: &str) -> bool {
    id.strip_prefix("pi_")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric()))
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
    currency: String,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
            currency: config.currency.clone(),
        })
    }

    /// Currency charges are made in.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Create a PaymentIntent for an order.
    ///
    /// The order ID doubles as the idempotency key, so retrying after a
    /// network failure cannot create a second charge for the same order.
    ///
    /// # Errors
    ///
    /// Returns error if the amount is invalid or the API request fails.
    pub async fn create_payment_intent(
        &self,
        amount: Money,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<PaymentIntent, PaymentError> {
        let cents = amount
            .to_minor_units()
            .filter(|cents| *cents > 0)
            .ok_or(PaymentError::InvalidAmount(amount))?;

        let form = payment_intent_form(cents, &self.currency, order_id, user_id);

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .basic_auth(self.secret_key.expose_secret(), None::<&str>)
            .header("Idempotency-Key", order_id.to_string())
            .form(&form)
            .send()
            .await?;

        parse_response(response).await
    }

    /// Fetch a PaymentIntent by ID.
    ///
    /// # Errors
    ///
    /// Returns error if `id` is malformed, the API request fails or the
    /// intent does not exist.
    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        if !is_payment_intent_id(id) {
            return Err(PaymentError::InvalidIntentId(id.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/v1/payment_intents/{id}", self.api_base))
            .basic_auth(self.secret_key.expose_secret(), None::<&str>)
            .send()
            .await?;

        parse_response(response).await
    }
}

fn payment_intent_form(
    cents: i64,
    currency: &str,
    order_id: OrderId,
    user_id: UserId,
) -> Vec<(&'static str, String)> {
    vec![
        ("amount", cents.to_string()),
        ("currency", currency.to_string()),
        ("automatic_payment_methods[enabled]", "true".to_string()),
        ("metadata[orderId]", order_id.to_string()),
        ("metadata[userId]", user_id.to_string()),
    ]
}

async fn parse_response(response: reqwest::Response) -> Result<PaymentIntent, PaymentError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PaymentError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    Ok(response.json().await?)
}

/// Pull the human-readable message out of a Stripe error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(StripeErrorBody {
            error:
                StripeErrorDetail {
                    message: Some(message),
                    ..
                },
        }) => message,
        Ok(StripeErrorBody {
            error: StripeErrorDetail {
                kind: Some(kind), ..
            },
        }) => kind,
        _ => body.to_string(),
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_payment_intent() {
        let order_id = OrderId::generate();
        let user_id = UserId::generate();
        let json = format!(
            r#"{{
                "id": "pi_3MtwBwLkdIwHu7ix28a3tqPa",
                "object": "payment_intent",
                "amount": 67994,
                "currency": "eur",
                "client_secret": "pi_3MtwBwLkdIwHu7ix28a3tqPa_secret_YrKJUKribcBjcG8HVhfZluoGH",
                "status": "succeeded",
                "metadata": {{ "orderId": "{order_id}", "userId": "{user_id}" }}
            }}"#
        );

        let intent: PaymentIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(intent.status, PaymentIntentStatus::Succeeded);
        assert_eq!(intent.amount, 67_994);
        assert_eq!(intent.order_id(), Some(order_id));
        assert!(intent.client_secret.is_some());
    }

    #[test]
    fn test_unknown_status_and_missing_metadata() {
        let json = r#"{
            "id": "pi_123",
            "amount": 100,
            "currency": "eur",
            "client_secret": null,
            "status": "some_future_status"
        }"#;

        let intent: PaymentIntent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.status, PaymentIntentStatus::Unknown);
        assert_eq!(intent.order_id(), None);
    }

    #[test]
    fn test_metadata_with_garbage_order_id() {
        let json = r#"{
            "id": "pi_123",
            "amount": 100,
            "currency": "eur",
            "status": "succeeded",
            "metadata": { "orderId": "42" }
        }"#;

        let intent: PaymentIntent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.order_id(), None);
    }

    #[test]
    fn test_charges_compares_amount_and_currency() {
        let json = r#"{
            "id": "pi_123",
            "amount": 67994,
            "currency": "eur",
            "status": "succeeded"
        }"#;
        let intent: PaymentIntent = serde_json::from_str(json).unwrap();
        let total = Money::new("679.94".parse().unwrap());

        assert!(intent.charges(total, "eur"));
        assert!(intent.charges(total, "EUR"));
        assert!(!intent.charges(total, "usd"));
        assert!(!intent.charges(Money::new("679.95".parse().unwrap()), "eur"));
    }

    #[test]
    fn test_payment_intent_id_shape() {
        assert!(is_payment_intent_id("pi_3MtwBwLkdIwHu7ix28a3tqPa"));
        for bad in ["", "pi_", "ch_3MtwBw", "pi_../customers", "pi_abc/refunds", "pi_abc?expand=x"] {
            assert!(!is_payment_intent_id(bad), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_malformed_id_never_reaches_stripe() {
        let client = StripeClient::new(&crate::config::test_config().stripe).unwrap();
        let err = client
            .retrieve_payment_intent("../customers")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidIntentId(_)));
    }

    #[test]
    fn test_payment_intent_form() {
        let order_id = OrderId::generate();
        let user_id = UserId::generate();
        let form = payment_intent_form(999, "eur", order_id, user_id);

        assert!(form.contains(&("amount", "999".to_string())));
        assert!(form.contains(&("currency", "eur".to_string())));
        assert!(form.contains(&("automatic_payment_methods[enabled]", "true".to_string())));
        assert!(form.contains(&("metadata[orderId]", order_id.to_string())));
        assert!(form.contains(&("metadata[userId]", user_id.to_string())));
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"message":"No such payment_intent: 'pi_x'","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body), "No such payment_intent: 'pi_x'");

        let body = r#"{"error":{"type":"api_error"}}"#;
        assert_eq!(error_message(body), "api_error");

        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
