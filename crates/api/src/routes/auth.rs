//! Authentication route handlers.
//!
//! Registration, login/logout with the `token` cookie, profile and account
//! management, and the emailed password reset flow.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{CookieAuth, clear_session_cookie, session_cookie};
use crate::models::User;
use crate::services::auth::{AuthError, AuthService, REMEMBER_ME_TTL, Registration, SESSION_TTL};
use crate::state::AppState;

use super::{ApiJson, MessageResponse, message, non_blank};

// =============================================================================
// Request Types
// =============================================================================

/// Registration request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Login request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

/// Forgot password request body.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// Reset password request body.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub password: Option<String>,
}

/// Profile update request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

/// A message plus the affected user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: &'static str,
    pub user: User,
}

// =============================================================================
// Registration & Login
// =============================================================================

/// Create an account.
#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let (Some(email), Some(password), Some(first_name), Some(last_name)) = (
        non_blank(body.email.as_ref()),
        non_blank(body.password.as_ref()),
        non_blank(body.first_name.as_ref()),
        non_blank(body.last_name.as_ref()),
    ) else {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    };

    let user = AuthService::new(state.pool())
        .register(&Registration {
            email,
            password,
            first_name,
            last_name,
        })
        .await?;

    tracing::info!(user_id = %user.id, "Account created");
    Ok((StatusCode::CREATED, message("Account created successfully")))
}

/// Check credentials and set the session cookie.
#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let (Some(email), Some(password)) = (
        non_blank(body.email.as_ref()),
        non_blank(body.password.as_ref()),
    ) else {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    };

    let user = AuthService::new(state.pool()).login(email, password).await?;

    let ttl = if body.remember_me {
        REMEMBER_ME_TTL
    } else {
        SESSION_TTL
    };
    let token = state.tokens().issue(user.id, ttl)?;
    let cookie = session_cookie(&token, body.remember_me, state.config().secure_cookies);

    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "Logged in", None);

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(UserResponse {
            message: "Logged in successfully",
            user,
        }),
    ))
}

/// The user the session cookie belongs to.
#[instrument(skip(state))]
pub async fn me(State(state): State<AppState>, CookieAuth(user_id): CookieAuth) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .current_user(user_id)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound => AppError::Unauthorized("User not found".to_string()),
            other => other.into(),
        })?;

    Ok(Json(user))
}

/// Clear the session cookie.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    clear_sentry_user();
    (
        AppendHeaders([(SET_COOKIE, clear_session_cookie(state.config().secure_cookies))]),
        message("Logged out successfully"),
    )
}

// =============================================================================
// Account Management
// =============================================================================

/// Delete the account with its cart, orders and reviews.
#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    CookieAuth(user_id): CookieAuth,
) -> Result<impl IntoResponse> {
    AuthService::new(state.pool())
        .delete_account(user_id)
        .await?;

    tracing::info!(user_id = %user_id, "Account deleted");
    clear_sentry_user();

    Ok((
        AppendHeaders([(SET_COOKIE, clear_session_cookie(state.config().secure_cookies))]),
        message("Account deleted successfully"),
    ))
}

/// Change name and email.
#[instrument(skip(state, body))]
pub async fn update_profile(
    State(state): State<AppState>,
    CookieAuth(user_id): CookieAuth,
    ApiJson(body): ApiJson<ProfileRequest>,
) -> Result<Json<UserResponse>> {
    let (Some(first_name), Some(last_name), Some(email)) = (
        non_blank(body.first_name.as_ref()),
        non_blank(body.last_name.as_ref()),
        non_blank(body.email.as_ref()),
    ) else {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    };

    let user = AuthService::new(state.pool())
        .update_profile(user_id, email, first_name, last_name)
        .await?;

    Ok(Json(UserResponse {
        message: "Profile updated successfully",
        user,
    }))
}

// =============================================================================
// Password Reset
// =============================================================================

/// Email a password reset link.
#[instrument(skip(state, body))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let Some(email) = non_blank(body.email.as_ref()) else {
        return Err(AppError::BadRequest("Email is required".to_string()));
    };

    let (user, token) = AuthService::new(state.pool())
        .start_password_reset(email)
        .await?;

    let reset_url = state.config().reset_password_url(&token);
    state
        .email()
        .send_password_reset(user.email.as_str(), &user.first_name, &reset_url)
        .await?;

    tracing::info!(user_id = %user.id, "Password reset requested");
    Ok(message("Password reset email sent"))
}

/// Set a new password from an emailed link.
#[instrument(skip(state, body))]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let (Some(token), Some(password)) = (
        non_blank(body.token.as_ref()),
        non_blank(body.password.as_ref()),
    ) else {
        return Err(AppError::BadRequest(
            "Token and password are required".to_string(),
        ));
    };

    let user = AuthService::new(state.pool())
        .reset_password(token, password)
        .await?;

    // The password is already changed; a lost confirmation is not worth failing over
    if let Err(e) = state
        .email()
        .send_password_changed(user.email.as_str(), &user.first_name)
        .await
    {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to send password changed email");
    }

    tracing::info!(user_id = %user.id, "Password reset completed");
    Ok(message("Password reset successfully"))
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
    use crate::routes::auth_routes;

    fn app() -> Router {
        Router::new()
            .nest("/api/auth", auth_routes())
            .with_state(AppState::for_tests())
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_requires_all_fields() {
        let (status, body) = send(post_json(
            "/api/auth/register",
            r#"{"email":"ada@novatech.com","password":"Secur3!pass","firstName":"Ada"}"#,
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "All fields are required");
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password_before_touching_database() {
        let (status, body) = send(post_json(
            "/api/auth/register",
            r#"{"email":"ada@novatech.com","password":"short","firstName":"Ada","lastName":"Lovelace"}"#,
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("at least 8"));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_name() {
        let (status, _) = send(post_json(
            "/api/auth/register",
            r#"{"email":"ada@novatech.com","password":"Secur3!pass","firstName":"Ada2","lastName":"Lovelace"}"#,
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_is_json_error() {
        let (status, body) = send(post_json("/api/auth/login", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_login_requires_email_and_password() {
        let (status, body) = send(post_json("/api/auth/login", r#"{"email":""}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email and password are required");
    }

    #[tokio::test]
    async fn test_me_without_cookie_is_401() {
        let (status, _) = send(
            Request::builder()
                .uri("/api/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_with_forged_cookie_is_401() {
        let (status, _) = send(
            Request::builder()
                .uri("/api/auth/me")
                .header("cookie", "token=forged.token.value")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let response = app()
            .oneshot(post_json("/api/auth/logout", ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_forgot_password_requires_email() {
        let (status, body) = send(post_json("/api/auth/forgot-password", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email is required");
    }

    #[tokio::test]
    async fn test_reset_password_checks_policy_first() {
        let (status, _) = send(post_json(
            "/api/auth/reset-password",
            r#"{"token":"abc","password":"nouppercase1!"}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
