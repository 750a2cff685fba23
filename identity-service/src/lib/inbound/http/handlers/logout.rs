use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::account::kind::Role;
use crate::account::session::SessionClaims;
use crate::inbound::http::router::AppState;

/// Close the caller's session. Requires a valid bearer token; the claims
/// arrive through the authentication middleware.
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<ApiSuccess<LogoutResponseData>, ApiError> {
    let ops = match claims.role {
        Role::User => &state.users,
        Role::Admin => &state.admins,
    };

    ops.logout(&claims)
        .await
        .map_err(ApiError::from)
        .map(|()| ApiSuccess::new(StatusCode::OK, "Logged out.", LogoutResponseData {}))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutResponseData {}
