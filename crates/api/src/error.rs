//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client with a JSON `{"message": ...}` body.
//! All route handlers return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::email::EmailError;
use crate::services::payment::PaymentError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Stripe API operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Transactional email failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but may not touch this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl AppError {
    /// Whether this error is our fault rather than the client's.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(err) | Self::Auth(AuthError::Repository(err)) => {
                !matches!(err, RepositoryError::NotFound | RepositoryError::Conflict(_))
            }
            Self::Auth(err) => matches!(err, AuthError::TokenSigning(_) | AuthError::PasswordHash),
            Self::Payment(err) => !matches!(
                err,
                PaymentError::InvalidAmount(_) | PaymentError::InvalidIntentId(_)
            ),
            Self::Email(_) | Self::Internal(_) => true,
            _ => false,
        }
    }

    /// Status code and client-facing message.
    ///
    /// Server errors never expose their details.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) | Self::Auth(AuthError::Repository(err)) => repository_status(err),
            Self::Auth(err) => auth_status(err),
            Self::Payment(PaymentError::InvalidAmount(_)) => (
                StatusCode::BAD_REQUEST,
                "Order total must be greater than zero".to_string(),
            ),
            Self::Payment(PaymentError::InvalidIntentId(_)) => (
                StatusCode::BAD_REQUEST,
                "Invalid payment intent".to_string(),
            ),
            Self::Payment(_) => (
                StatusCode::BAD_GATEWAY,
                "Payment service error".to_string(),
            ),
            Self::Email(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send email".to_string(),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later".to_string(),
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_MESSAGE.to_string(),
            ),
        }
    }
}

fn repository_status(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_MESSAGE.to_string(),
        ),
    }
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidEmail(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        AuthError::InvalidName(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        AuthError::WeakPassword(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        AuthError::InvalidCredentials => (
            StatusCode::BAD_REQUEST,
            "Invalid email or password".to_string(),
        ),
        AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
        AuthError::UserAlreadyExists => (
            StatusCode::BAD_REQUEST,
            "This email is already in use".to_string(),
        ),
        AuthError::InvalidResetToken => (
            StatusCode::BAD_REQUEST,
            "Invalid or expired reset link".to_string(),
        ),
        AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
        AuthError::InvalidToken(_) => (
            StatusCode::FORBIDDEN,
            "Invalid or expired token".to_string(),
        ),
        AuthError::Repository(e) => repository_status(e),
        AuthError::TokenSigning(_) | AuthError::PasswordHash => (
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_MESSAGE.to_string(),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let (status, message) = self.status_and_message();
        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use novatech_core::{Email, PasswordError};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn get_message(err: AppError) -> String {
        let body = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        value["message"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Product not found".to_string());
        assert_eq!(err.to_string(), "Not found: Product not found");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::WeakPassword(PasswordError::MissingDigit).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::UserNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AuthError::MissingToken.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::Repository(RepositoryError::NotFound).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_repository_error_status_codes() {
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("taken".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad row".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_payment_api_error_is_bad_gateway() {
        let err = PaymentError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(get_status(err.into()), StatusCode::BAD_GATEWAY);

        let err = PaymentError::InvalidIntentId("../customers".to_string());
        assert_eq!(get_status(err.into()), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_json_body_carries_message() {
        let message = get_message(AuthError::InvalidCredentials.into()).await;
        assert_eq!(message, "Invalid email or password");

        let err = Email::parse("nope").unwrap_err();
        let message = get_message(AuthError::InvalidEmail(err).into()).await;
        assert_eq!(message, "email must look like name@domain.tld");
    }

    #[tokio::test]
    async fn test_server_error_details_are_hidden() {
        let err = RepositoryError::DataCorruption("secret table detail".to_string());
        let message = get_message(err.into()).await;
        assert_eq!(message, "Internal server error");
    }
}
