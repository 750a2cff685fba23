use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::{self};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use crate::account::kind::Role;
use crate::account::models::AccountId;
use crate::account::session::SessionClaims;
use crate::account::session::SessionTokenIssuer;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;

/// Middleware that validates the bearer session token and adds the claims
/// to request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(req.headers())?;

    let claims = state.sessions.validate(token).map_err(|e| {
        tracing::warn!("Session token validation failed: {}", e);
        ApiError::Unauthorized("Invalid or expired session token".to_string()).into_response()
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Claims from an optional bearer token, if one is present and valid.
///
/// Used where a session may add context but is not required, such as
/// recording who provisioned a staff account. Invalid tokens are ignored
/// rather than rejected.
pub fn optional_session(headers: &HeaderMap, sessions: &SessionTokenIssuer) -> Option<SessionClaims> {
    let token = extract_token_from_header(headers).ok()?;
    sessions.validate(token).ok()
}

/// The account behind an optional session, when that session belongs to staff.
pub fn provisioning_staff_id(
    headers: &HeaderMap,
    sessions: &SessionTokenIssuer,
) -> Option<AccountId> {
    let claims = optional_session(headers, sessions)?;
    if claims.role != Role::Admin {
        return None;
    }
    AccountId::from_string(&claims.sub).ok()
}

fn extract_token_from_header(headers: &HeaderMap) -> Result<&str, Response> {
    let auth_header = headers.get(http::header::AUTHORIZATION).ok_or_else(|| {
        ApiError::Unauthorized("Missing Authorization header".to_string()).into_response()
    })?;

    let auth_str = auth_header.to_str().map_err(|_| {
        ApiError::Unauthorized("Invalid Authorization header".to_string()).into_response()
    })?;

    if !auth_str.starts_with("Bearer ") {
        return Err(ApiError::Unauthorized(
            "Invalid Authorization header format. Expected: Bearer <token>".to_string(),
        )
        .into_response());
    }

    Ok(auth_str.trim_start_matches("Bearer "))
}
