use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::account::models::Account;
use crate::account::models::EmailAddress;
use crate::account::models::LoginCommand;
use crate::account::ports::IdentityOps;
use crate::account::service::LoginSuccess;
use crate::inbound::http::fingerprint::fingerprint_from_request;
use crate::inbound::http::router::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequestBody {
    email: String,
    password: String,
}

pub async fn member_login(
    State(state): State<AppState>,
    addr: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequestBody>,
) -> Result<ApiSuccess<LoginResponseData>, ApiError> {
    login(state.users.as_ref(), addr, headers, body).await
}

pub async fn staff_login(
    State(state): State<AppState>,
    addr: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequestBody>,
) -> Result<ApiSuccess<LoginResponseData>, ApiError> {
    login(state.admins.as_ref(), addr, headers, body).await
}

async fn login(
    ops: &dyn IdentityOps,
    addr: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: LoginRequestBody,
) -> Result<ApiSuccess<LoginResponseData>, ApiError> {
    let email = EmailAddress::new(body.email).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let device = fingerprint_from_request(&headers, addr.map(|ConnectInfo(a)| a));

    ops.login(LoginCommand {
        email,
        password: body.password,
        device,
    })
    .await
    .map_err(ApiError::from)
    .map(|ref success| ApiSuccess::new(StatusCode::OK, "Login successful.", success.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponseData {
    pub account: AccountData,
    pub token: String,
    pub refresh_token: String,
}

impl From<&LoginSuccess> for LoginResponseData {
    fn from(success: &LoginSuccess) -> Self {
        Self {
            account: (&success.account).into(),
            token: success.tokens.access_token.clone(),
            refresh_token: success.tokens.refresh_token.clone(),
        }
    }
}

/// Account as presented to clients: secret state never appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub id: String,
    pub email: String,
    pub mobile: Option<String>,
    pub designation: Option<String>,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountData {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            email: account.email.as_str().to_string(),
            mobile: account.mobile.as_ref().map(|m| m.as_str().to_string()),
            designation: account.designation.clone(),
            is_email_verified: account.is_email_verified,
            created_at: account.created_at,
        }
    }
}
