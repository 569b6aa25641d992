//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with method, path, status, latency)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. CORS (allow-listed frontend origins with credentials)
//! 6. Rate limiting (governor, `/api/*` only)
//!
//! Authentication is not a layer: handlers take a [`RequireAuth`] or
//! [`CookieAuth`] extractor.

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{
    CookieAuth, RequireAuth, TOKEN_COOKIE, clear_session_cookie, session_cookie,
};
pub use cors::cors_layer;
pub use rate_limit::{api_rate_limiter, rate_limit_json_body};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
