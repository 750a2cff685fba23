use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use crate::account::errors::EmailError;
use crate::account::errors::MobileError;
use crate::account::models::Account;
use crate::account::models::AccountId;
use crate::account::models::EmailAddress;
use crate::account::models::Mobile;
use crate::account::models::SignupCommand;
use crate::inbound::http::middleware::provisioning_staff_id;
use crate::inbound::http::router::AppState;

pub async fn member_signup(
    State(state): State<AppState>,
    Json(body): Json<MemberSignupRequest>,
) -> Result<ApiSuccess<SignupResponseData>, ApiError> {
    state
        .users
        .signup(body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|ref account| {
            ApiSuccess::new(
                StatusCode::CREATED,
                "Account created. Verification email sent.",
                account.into(),
            )
        })
}

/// Staff accounts are provisioned without a password; when the request
/// carries a valid staff session, the new account records who created it.
pub async fn staff_signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<StaffSignupRequest>,
) -> Result<ApiSuccess<SignupResponseData>, ApiError> {
    let created_by = provisioning_staff_id(&headers, &state.sessions);
    state
        .admins
        .signup(body.try_into_command(created_by)?)
        .await
        .map_err(ApiError::from)
        .map(|ref account| {
            ApiSuccess::new(
                StatusCode::CREATED,
                "Account created. Verification email sent.",
                account.into(),
            )
        })
}

/// HTTP request body for member signup (raw JSON)
///
/// Credential fields stay optional in the body; whether a password is
/// required or refused is the service's call, so the answer arrives in the
/// regular envelope rather than as a deserialization failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSignupRequest {
    email: String,
    mobile: Option<String>,
    password: Option<String>,
    confirm_password: Option<String>,
}

/// HTTP request body for staff signup (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffSignupRequest {
    email: String,
    mobile: Option<String>,
    designation: Option<String>,
    password: Option<String>,
    confirm_password: Option<String>,
}

#[derive(Debug, Clone, Error)]
enum ParseSignupRequestError {
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("Invalid mobile number: {0}")]
    Mobile(#[from] MobileError),
}

impl MemberSignupRequest {
    fn try_into_command(self) -> Result<SignupCommand, ParseSignupRequestError> {
        let email = EmailAddress::new(self.email)?;
        let mobile = self.mobile.map(Mobile::new).transpose()?;
        Ok(SignupCommand {
            email,
            mobile,
            password: self.password,
            confirm_password: self.confirm_password,
            designation: None,
            created_by: None,
        })
    }
}

impl StaffSignupRequest {
    fn try_into_command(
        self,
        created_by: Option<AccountId>,
    ) -> Result<SignupCommand, ParseSignupRequestError> {
        let email = EmailAddress::new(self.email)?;
        let mobile = self.mobile.map(Mobile::new).transpose()?;
        Ok(SignupCommand {
            email,
            mobile,
            password: self.password,
            confirm_password: self.confirm_password,
            designation: self.designation,
            created_by,
        })
    }
}

impl From<ParseSignupRequestError> for ApiError {
    fn from(err: ParseSignupRequestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponseData {
    pub id: String,
    pub email: String,
    pub mobile: Option<String>,
    pub designation: Option<String>,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for SignupResponseData {
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
