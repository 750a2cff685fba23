use async_trait::async_trait;

use crate::account::errors::DispatchError;
use crate::account::errors::IdentityError;
use crate::account::models::Account;
use crate::account::models::AccountId;
use crate::account::models::ConfirmResetCommand;
use crate::account::models::EmailAddress;
use crate::account::models::LoginAttempt;
use crate::account::models::LoginCommand;
use crate::account::models::LoginOutcome;
use crate::account::models::SignupCommand;
use crate::account::notifications::EmailMessage;
use crate::account::service::LoginSuccess;
use crate::account::session::SessionClaims;

/// Port for identity lifecycle operations.
///
/// Object safe so the HTTP layer can hold one instance per role behind
/// `Arc<dyn IdentityOps>`.
#[async_trait]
pub trait IdentityOps: Send + Sync + 'static {
    /// Open a new account and send the verification mail.
    ///
    /// # Arguments
    /// * `command` - Validated signup command
    ///
    /// # Returns
    /// Created account in the pending-verification state
    ///
    /// # Errors
    /// * `EmailAlreadyRegistered` - Email is taken within this role
    /// * `MobileAlreadyRegistered` - Mobile number is taken within this role
    /// * `EmailTakenByOtherRole` - Email exists in the other role's collection
    /// * `WeakPassword` / `PasswordConfirmationMismatch` - Password policy failures
    /// * `DatabaseError` - Storage operation failed
    async fn signup(&self, command: SignupCommand) -> Result<Account, IdentityError>;

    /// Confirm ownership of the primary email with a one-time token.
    ///
    /// # Errors
    /// * `InvalidToken` - Token is unknown, already consumed, or expired
    /// * `DatabaseError` - Storage operation failed
    async fn verify_email(
        &self,
        email: &EmailAddress,
        token: &str,
    ) -> Result<Account, IdentityError>;

    /// Issue a fresh verification token, invalidating the previous one.
    ///
    /// # Errors
    /// * `NotFound` - No account for this email
    /// * `AlreadyVerified` - Email is already verified
    /// * `DatabaseError` - Storage operation failed
    async fn resend_verification(&self, email: &EmailAddress) -> Result<Account, IdentityError>;

    /// Issue a password-reset token and mail the reset link.
    ///
    /// # Errors
    /// * `NotFound` - No account for this email
    /// * `EmailNotVerified` - Email ownership was never confirmed
    /// * `AccountDisabled` - Account is deactivated
    /// * `DatabaseError` - Storage operation failed
    async fn request_password_reset(
        &self,
        email: &EmailAddress,
    ) -> Result<Account, IdentityError>;

    /// Complete a password reset with token, old password, and new password.
    ///
    /// # Errors
    /// * `InvalidToken` - Token is unknown, already consumed, or expired
    /// * `OldPasswordMismatch` - Old password does not verify
    /// * `WeakPassword` / `PasswordConfirmationMismatch` / `PasswordUnchanged` -
    ///   New password policy failures
    /// * `AccountDisabled` - Account is deactivated
    /// * `DatabaseError` - Storage operation failed
    async fn confirm_password_reset(
        &self,
        command: ConfirmResetCommand,
    ) -> Result<Account, IdentityError>;

    /// Authenticate and open a session.
    ///
    /// # Returns
    /// The account plus a signed access/refresh token pair
    ///
    /// # Errors
    /// * `NotFound` - No account for this email
    /// * `AccountDisabled` - Account is deactivated
    /// * `EmailNotVerified` - Email ownership was never confirmed
    /// * `PasswordNotSet` - No password credential exists yet
    /// * `PasswordChangeRequired` - Temporary password was never replaced
    /// * `AccountLocked` - Too many recent failed attempts
    /// * `InvalidCredentials` - Password does not verify
    async fn login(&self, command: LoginCommand) -> Result<LoginSuccess, IdentityError>;

    /// Close a session from the client's side.
    ///
    /// Sessions are stateless, so this acknowledges and records the close;
    /// the token itself stays valid until expiry.
    async fn logout(&self, session: &SessionClaims) -> Result<(), IdentityError>;
}

/// Persistence operations for one role's account collection.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    /// Persist a new account.
    ///
    /// # Errors
    /// * `EmailAlreadyRegistered` - Email unique constraint hit
    /// * `MobileAlreadyRegistered` - Mobile unique constraint hit
    /// * `DatabaseError` - Storage operation failed
    async fn insert(&self, account: Account) -> Result<Account, IdentityError>;

    /// Retrieve an account by identifier.
    ///
    /// # Returns
    /// Optional account (None if not found)
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, IdentityError>;

    /// Retrieve an account by primary email.
    ///
    /// # Returns
    /// Optional account (None if not found)
    async fn find_by_email(&self, email: &EmailAddress)
        -> Result<Option<Account>, IdentityError>;

    /// Check whether the other role's collection holds this email.
    async fn email_taken_by_other_role(
        &self,
        email: &EmailAddress,
    ) -> Result<bool, IdentityError>;

    /// Write back a modified account.
    ///
    /// Login history is append-only and owned by `append_login_attempt`;
    /// this writes every other field.
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    /// * `DatabaseError` - Storage operation failed
    async fn update(&self, account: Account) -> Result<Account, IdentityError>;

    /// Append one attempt to the account's login history.
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    /// * `DatabaseError` - Storage operation failed
    async fn append_login_attempt(
        &self,
        id: &AccountId,
        attempt: LoginAttempt,
        outcome: LoginOutcome,
    ) -> Result<(), IdentityError>;
}

/// Outbound delivery of account notifications.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + 'static {
    /// Establish or refresh the underlying delivery channel.
    ///
    /// Called once at startup and again before a send is retried.
    ///
    /// # Errors
    /// * `ConnectionFailed` - Channel could not be established
    async fn connect(&self) -> Result<(), DispatchError>;

    /// Deliver one rendered email.
    ///
    /// # Errors
    /// * `SendFailed` - Delivery was attempted and failed
    /// * `ConnectionFailed` - Channel is unavailable
    async fn send(&self, message: &EmailMessage) -> Result<(), DispatchError>;
}
