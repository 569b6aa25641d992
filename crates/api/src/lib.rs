//! NovaTech storefront API library.
//!
//! The JSON REST backend of the NovaTech store: accounts, catalog, cart,
//! reviews, orders and Stripe card payments over `PostgreSQL`. Exposed as a
//! library so the binary, the CLI and tests share one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{from_fn, map_response},
    routing::get,
};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

use state::AppState;

/// Build the full application router with its middleware stack.
pub fn app(state: AppState) -> Router {
    let api = routes::routes()
        .layer(middleware::api_rate_limiter())
        .layer(map_response(middleware::rate_limit_json_body));

    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = tracing::field::Empty,
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health))
        .route("/health/ready", get(routes::health::readiness))
        .nest("/api", api)
        .fallback(routes::health::not_found)
        .layer(middleware::cors_layer(state.config()))
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(trace)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        body::to_bytes,
        extract::ConnectInfo,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;

    fn request(uri: &str) -> Request<Body> {
        let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let peer: SocketAddr = "192.0.2.1:40000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let response = app(AppState::for_tests())
            .oneshot(request("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");

        let response = app(AppState::for_tests())
            .oneshot(request("/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let response = app(AppState::for_tests())
            .oneshot(request("/api/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["message"], "Route not found");
    }

    #[tokio::test]
    async fn test_api_routes_are_rate_limited_per_ip() {
        let app = app(AppState::for_tests());

        for _ in 0..300 {
            let response = app.clone().oneshot(request("/api/cart")).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = app.clone().oneshot(request("/api/cart")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(value["message"].is_string());

        // Liveness is outside the limiter
        let response = app.oneshot(request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
