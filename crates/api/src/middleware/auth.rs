//! Authentication extractors and the session cookie.
//!
//! Sessions are stateless: the signed token lives in an HTTP-only cookie
//! named `token`. API clients that cannot hold cookies may send it as an
//! `Authorization: Bearer` header instead.

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use cookie::{Cookie, SameSite, time::Duration};

use novatech_core::UserId;

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Name of the session cookie.
pub const TOKEN_COOKIE: &str = "token";

/// Cookie lifetime when "remember me" is ticked. Without it the cookie
/// lasts for the browser session.
const REMEMBER_ME_MAX_AGE: Duration = Duration::days(30);

/// Extractor that requires a valid session token.
///
/// Accepts the `token` cookie or a Bearer header. Rejects with 401 when no
/// token is sent and 403 when the token is forged, malformed or expired.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user_id): RequireAuth) -> String {
///     format!("Hello, {user_id}!")
/// }
/// ```
pub struct RequireAuth(pub UserId);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_token(parts)
            .or_else(|| bearer_token(parts))
            .ok_or(AuthError::MissingToken)?;

        let user_id = state.tokens().verify(&token)?;
        set_sentry_user(&user_id, None);

        Ok(Self(user_id))
    }
}

/// Extractor for account routes: cookie only, and any problem with the
/// token is a 401.
pub struct CookieAuth(pub UserId);

impl FromRequestParts<AppState> for CookieAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_token(parts).ok_or(AuthError::MissingToken)?;

        let user_id = state.tokens().verify(&token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session cookie");
            AppError::Unauthorized("Invalid or expired session".to_string())
        })?;
        set_sentry_user(&user_id, None);

        Ok(Self(user_id))
    }
}

/// The `token` cookie's value, if the request carries a non-empty one.
fn cookie_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == TOKEN_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
}

/// `Set-Cookie` value carrying a freshly issued session token.
#[must_use]
pub fn session_cookie(token: &str, remember_me: bool, secure: bool) -> String {
    let mut builder = Cookie::build((TOKEN_COOKIE, token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/");

    if remember_me {
        builder = builder.max_age(REMEMBER_ME_MAX_AGE);
    }

    builder.build().to_string()
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> String {
    Cookie::build((TOKEN_COOKIE, ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
        .to_string()
}
