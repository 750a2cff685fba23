use std::fmt;
use std::str::FromStr;

use auth::IssuedToken;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::account::errors::AccountIdError;
use crate::account::errors::EmailError;
use crate::account::errors::MobileError;
use crate::account::errors::PasswordPolicyError;

/// Account aggregate entity.
///
/// Represents one registered identity (library member or staff member).
/// Secret state (password hash, one-time token hashes) lives here and must
/// never cross the HTTP boundary; response types map from this entity and
/// omit those fields.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub email: EmailAddress,
    pub mobile: Option<Mobile>,
    pub secondary_emails: Vec<SecondaryEmail>,
    pub password_hash: Option<String>,
    pub must_change_password: bool,
    pub is_email_verified: bool,
    pub email_verify_token_hash: Option<String>,
    pub email_verify_token_expires_at: Option<DateTime<Utc>>,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub designation: Option<String>,
    pub is_active: bool,
    pub created_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub failed_logins: Vec<LoginAttempt>,
    pub successful_logins: Vec<LoginAttempt>,
}

impl Account {
    /// Create a fresh, unverified account with no credential state.
    ///
    /// # Arguments
    /// * `email` - Validated primary email
    /// * `mobile` - Optional validated mobile number
    /// * `designation` - Staff designation, if any
    /// * `created_by` - Account that provisioned this one, if any
    ///
    /// # Returns
    /// Account in the pending-verification state
    pub fn new(
        email: EmailAddress,
        mobile: Option<Mobile>,
        designation: Option<String>,
        created_by: Option<AccountId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            email,
            mobile,
            secondary_emails: Vec::new(),
            password_hash: None,
            must_change_password: false,
            is_email_verified: false,
            email_verify_token_hash: None,
            email_verify_token_expires_at: None,
            reset_token_hash: None,
            reset_token_expires_at: None,
            designation,
            is_active: true,
            created_by,
            created_at: now,
            updated_at: now,
            failed_logins: Vec::new(),
            successful_logins: Vec::new(),
        }
    }

    /// Derive the lifecycle phase from persisted state.
    pub fn phase(&self) -> AccountPhase {
        if !self.is_active {
            AccountPhase::Disabled
        } else if !self.is_email_verified {
            AccountPhase::PendingVerification
        } else if self.password_hash.is_none() {
            AccountPhase::VerifiedNoPassword
        } else if self.must_change_password {
            AccountPhase::ResetPending
        } else {
            AccountPhase::Active
        }
    }

    /// Install a new verification token, replacing any outstanding one.
    ///
    /// Hash and expiry are written together; a token half-pair is never
    /// persisted.
    pub fn set_verify_token(&mut self, token: &IssuedToken) {
        self.email_verify_token_hash = Some(token.hashed.clone());
        self.email_verify_token_expires_at = Some(token.expires_at);
        self.touch();
    }

    /// Check a presented verification token against the stored hash and expiry.
    pub fn verify_token_matches(&self, presented: &str, now: DateTime<Utc>) -> bool {
        match (
            self.email_verify_token_hash.as_deref(),
            self.email_verify_token_expires_at,
        ) {
            (Some(hash), Some(expires_at)) => auth::token::validate(presented, hash, expires_at, now),
            _ => false,
        }
    }

    /// Mark the primary email verified and consume the verification token.
    pub fn mark_email_verified(&mut self) {
        self.is_email_verified = true;
        self.email_verify_token_hash = None;
        self.email_verify_token_expires_at = None;
        self.touch();
    }

    /// Install a new password-reset token, replacing any outstanding one.
    pub fn set_reset_token(&mut self, token: &IssuedToken) {
        self.reset_token_hash = Some(token.hashed.clone());
        self.reset_token_expires_at = Some(token.expires_at);
        self.touch();
    }

    /// Check a presented reset token against the stored hash and expiry.
    pub fn reset_token_matches(&self, presented: &str, now: DateTime<Utc>) -> bool {
        match (self.reset_token_hash.as_deref(), self.reset_token_expires_at) {
            (Some(hash), Some(expires_at)) => auth::token::validate(presented, hash, expires_at, now),
            _ => false,
        }
    }

    /// Install a provisional password that the holder must replace at first
    /// reset (staff onboarding).
    pub fn install_temporary_password(&mut self, password_hash: String) {
        self.password_hash = Some(password_hash);
        self.must_change_password = true;
        self.touch();
    }

    /// Replace the password and consume the reset token.
    ///
    /// Clears the must-change flag: after a completed reset the credential
    /// is fully owned by the account holder.
    pub fn complete_password_reset(&mut self, password_hash: String) {
        self.password_hash = Some(password_hash);
        self.must_change_password = false;
        self.reset_token_hash = None;
        self.reset_token_expires_at = None;
        self.touch();
    }

    /// Set the initial self-chosen password (member signup).
    pub fn set_password(&mut self, password_hash: String) {
        self.password_hash = Some(password_hash);
        self.must_change_password = false;
        self.touch();
    }

    /// Count failed logins recorded after `since`.
    pub fn failed_logins_since(&self, since: DateTime<Utc>) -> usize {
        self.failed_logins.iter().filter(|a| a.at > since).count()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Lifecycle phase derived from account state, used for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountPhase {
    PendingVerification,
    VerifiedNoPassword,
    ResetPending,
    Active,
    Disabled,
}

/// Account unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub Uuid);

impl AccountId {
    /// Generate a new random account ID.
    ///
    /// # Returns
    /// AccountId with random UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an account ID from string.
    ///
    /// # Arguments
    /// * `s` - UUID string to parse
    ///
    /// # Returns
    /// Parsed AccountId
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, AccountIdError> {
        Uuid::parse_str(s)
            .map(AccountId)
            .map_err(|e| AccountIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Normalizes to lowercase and validates RFC 5322 format, then applies
/// registration policy: disposable-mail domains and numeric `+` alias
/// suffixes are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

/// Throwaway-mail providers excluded from registration.
const DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "tempmail.com",
    "10minutemail.com",
    "guerrillamail.com",
    "sharklasers.com",
    "yopmail.com",
    "trashmail.com",
    "getnada.com",
];

impl EmailAddress {
    /// Create a new validated email address.
    ///
    /// # Arguments
    /// * `email` - Raw email string
    ///
    /// # Returns
    /// Validated, lowercased EmailAddress value object
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    /// * `DisposableDomain` - Domain belongs to a throwaway-mail provider
    /// * `NumericAlias` - Local part carries a `+<digits>` alias suffix
    pub fn new(email: String) -> Result<Self, EmailError> {
        let email = email.trim().to_lowercase();
        email_address::EmailAddress::from_str(&email)
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))?;

        let (local, domain) = email
            .rsplit_once('@')
            .ok_or_else(|| EmailError::InvalidFormat(email.clone()))?;
        if DISPOSABLE_DOMAINS.contains(&domain) {
            return Err(EmailError::DisposableDomain(domain.to_string()));
        }
        if let Some((_, suffix)) = local.split_once('+') {
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                return Err(EmailError::NumericAlias);
            }
        }
        Ok(Self(email))
    }

    /// Rebuild from a stored value without re-applying registration policy.
    ///
    /// Rows written before a policy change must still load; policy checks
    /// run at registration time only.
    pub(crate) fn from_storage(email: String) -> Self {
        Self(email)
    }

    /// Get email as string slice.
    ///
    /// # Returns
    /// Email string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Mobile number value type
///
/// Accepts E.164-style numbers: optional leading `+`, 7 to 15 digits.
/// Spaces and hyphens are stripped before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mobile(String);

impl Mobile {
    const MIN_DIGITS: usize = 7;
    const MAX_DIGITS: usize = 15;

    /// Create a new validated mobile number.
    ///
    /// # Errors
    /// * `InvalidFormat` - Contains characters other than digits and a leading `+`
    /// * `InvalidLength` - Fewer than 7 or more than 15 digits
    pub fn new(mobile: String) -> Result<Self, MobileError> {
        let normalized: String = mobile.chars().filter(|c| *c != ' ' && *c != '-').collect();
        let digits = normalized.strip_prefix('+').unwrap_or(&normalized);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(MobileError::InvalidFormat(mobile));
        }
        let count = digits.len();
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&count) {
            return Err(MobileError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
                actual: count,
            });
        }
        Ok(Self(normalized))
    }

    pub(crate) fn from_storage(mobile: String) -> Self {
        Self(mobile)
    }

    /// Get mobile number as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mobile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Additional email attached to an account, each with its own verification
/// token pair. Stored as a JSON document alongside the account row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryEmail {
    pub email: String,
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_token_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_token_expires_at: Option<DateTime<Utc>>,
}

/// Coarse description of the client device presenting a login.
///
/// Derived from request headers at the HTTP boundary. Recorded in login
/// history, embedded in session claims, and named in login alert mail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    pub os: String,
    pub browser: String,
    pub ip: String,
    pub language: String,
    pub device_type: String,
}

impl DeviceFingerprint {
    /// One-line rendering for mail bodies and log lines.
    pub fn summary(&self) -> String {
        format!(
            "{} on {} ({}) from {}",
            self.browser, self.os, self.device_type, self.ip
        )
    }
}

/// One login attempt, successful or failed, as recorded in account history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub device: DeviceFingerprint,
    pub at: DateTime<Utc>,
}

/// Which history list a login attempt lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Succeeded,
    Failed,
}

/// Password complexity policy for caller-chosen passwords.
///
/// # Errors
/// One variant per unmet requirement; the first failure is reported.
pub fn validate_password_strength(password: &str) -> Result<(), PasswordPolicyError> {
    const MIN_LENGTH: usize = 8;
    const MAX_LENGTH: usize = 64;

    let length = password.chars().count();
    if length < MIN_LENGTH {
        return Err(PasswordPolicyError::TooShort {
            min: MIN_LENGTH,
            actual: length,
        });
    }
    if length > MAX_LENGTH {
        return Err(PasswordPolicyError::TooLong {
            max: MAX_LENGTH,
            actual: length,
        });
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(PasswordPolicyError::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordPolicyError::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordPolicyError::MissingDigit);
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PasswordPolicyError::MissingSymbol);
    }
    Ok(())
}

/// Command to open a new account with domain types.
///
/// `password` is present for member signup and absent for staff signup,
/// where credentials are issued at verification time instead.
#[derive(Debug)]
pub struct SignupCommand {
    pub email: EmailAddress,
    pub mobile: Option<Mobile>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub designation: Option<String>,
    pub created_by: Option<AccountId>,
}

/// Command to complete a password reset.
#[derive(Debug)]
pub struct ConfirmResetCommand {
    pub email: EmailAddress,
    pub token: String,
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Command to authenticate and open a session.
#[derive(Debug)]
pub struct LoginCommand {
    pub email: EmailAddress,
    pub password: String,
    pub device: DeviceFingerprint,
}
