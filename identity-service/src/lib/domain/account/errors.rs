use thiserror::Error;

/// Error for AccountId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),

    #[error("Disposable email domain not accepted: {0}")]
    DisposableDomain(String),

    #[error("Email aliases with a numeric suffix are not accepted")]
    NumericAlias,
}

/// Error for Mobile validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MobileError {
    #[error("Invalid mobile number format: {0}")]
    InvalidFormat(String),

    #[error("Mobile number must have between {min} and {max} digits, got {actual}")]
    InvalidLength {
        min: usize,
        max: usize,
        actual: usize,
    },
}

/// Error for password complexity policy failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Password too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error("Password must contain a lowercase letter")]
    MissingLowercase,

    #[error("Password must contain an uppercase letter")]
    MissingUppercase,

    #[error("Password must contain a digit")]
    MissingDigit,

    #[error("Password must contain a symbol")]
    MissingSymbol,
}

/// Error for notification dispatch operations
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Connection to mail channel failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to send notification: {0}")]
    SendFailed(String),
}

/// Top-level error for all identity lifecycle operations
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid account ID: {0}")]
    InvalidAccountId(#[from] AccountIdError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid mobile number: {0}")]
    InvalidMobile(#[from] MobileError),

    #[error("Password policy not met: {0}")]
    WeakPassword(#[from] PasswordPolicyError),

    #[error("Password error: {0}")]
    Password(#[from] auth::PasswordError),

    #[error("Session token error: {0}")]
    SessionToken(#[from] auth::JwtError),

    // Request validation errors
    #[error("Password and confirmation do not match")]
    PasswordConfirmationMismatch,

    #[error("A password is required")]
    PasswordRequired,

    #[error("Staff accounts receive a generated password; do not supply one")]
    PasswordNotAccepted,

    #[error("A designation is required for staff accounts")]
    DesignationRequired,

    #[error("New password must differ from the old password")]
    PasswordUnchanged,

    #[error("Old password is incorrect")]
    OldPasswordMismatch,

    // Domain-level errors
    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Email already registered: {0}")]
    EmailAlreadyRegistered(String),

    #[error("Mobile number already registered: {0}")]
    MobileAlreadyRegistered(String),

    #[error("Email is registered under a different account role")]
    EmailTakenByOtherRole,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("Email address is not verified")]
    EmailNotVerified,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No password has been set for this account")]
    PasswordNotSet,

    #[error("A password change is required before login")]
    PasswordChangeRequired,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Account temporarily locked after repeated failed logins")]
    AccountLocked,

    // Infrastructure errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for IdentityError {
    fn from(err: anyhow::Error) -> Self {
        IdentityError::Unknown(err.to_string())
    }
}
