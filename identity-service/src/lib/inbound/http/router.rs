use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::forgot_password;
use super::handlers::login;
use super::handlers::logout;
use super::handlers::resend_verification;
use super::handlers::reset_password;
use super::handlers::signup;
use super::handlers::verify_email;
use super::middleware::authenticate as auth_middleware;
use crate::account::ports::IdentityOps;
use crate::account::session::SessionTokenIssuer;

/// Shared handler state: one lifecycle service per role plus the shared
/// session token issuer.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn IdentityOps>,
    pub admins: Arc<dyn IdentityOps>,
    pub sessions: Arc<SessionTokenIssuer>,
}

pub fn create_router(
    users: Arc<dyn IdentityOps>,
    admins: Arc<dyn IdentityOps>,
    sessions: Arc<SessionTokenIssuer>,
) -> Router {
    let state = AppState {
        users,
        admins,
        sessions,
    };

    let member_routes = Router::new()
        .route("/signup", post(signup::member_signup))
        .route("/verify-email", get(verify_email::member_verify_email))
        .route(
            "/resend-verification",
            post(resend_verification::member_resend_verification),
        )
        .route("/forgot-password", post(forgot_password::member_forgot_password))
        .route("/reset-password", post(reset_password::member_reset_password))
        .route("/login", post(login::member_login));

    let staff_routes = Router::new()
        .route("/signup", post(signup::staff_signup))
        .route("/verify-email", get(verify_email::staff_verify_email))
        .route(
            "/resend-verification",
            post(resend_verification::staff_resend_verification),
        )
        .route("/forgot-password", post(forgot_password::staff_forgot_password))
        .route("/reset-password", post(reset_password::staff_reset_password))
        .route("/login", post(login::staff_login));

    let protected_routes = Router::new()
        .route("/api/users/logout", post(logout::logout))
        .route("/api/admins/logout", post(logout::logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .nest("/api/users", member_routes)
        .nest("/api/admins", staff_routes)
        .merge(protected_routes)
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
