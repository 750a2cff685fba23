use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use chrono::Utc;

use crate::account::errors::IdentityError;
use crate::account::kind::AccountKind;
use crate::account::models::Account;
use crate::account::models::ConfirmResetCommand;
use crate::account::models::EmailAddress;
use crate::account::models::LoginAttempt;
use crate::account::models::LoginCommand;
use crate::account::models::LoginOutcome;
use crate::account::models::SignupCommand;
use crate::account::models::validate_password_strength;
use crate::account::notifications::LoginAlertMail;
use crate::account::notifications::Notification;
use crate::account::notifications::PasswordChangedMail;
use crate::account::notifications::ResetRequestedMail;
use crate::account::notifications::StaffCredentialsMail;
use crate::account::notifications::VerificationMail;
use crate::account::notifications::WelcomeMail;
use crate::account::ports::AccountStore;
use crate::account::ports::IdentityOps;
use crate::account::ports::NotificationDispatcher;
use crate::account::session::SessionClaims;
use crate::account::session::SessionTokenIssuer;
use crate::account::session::SessionTokens;

/// Tunable lifecycle rules: one-time token lifetimes and the lockout window.
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    pub verify_token_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub max_login_attempts: u32,
    pub lockout_window: Duration,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            verify_token_ttl: Duration::hours(1),
            reset_token_ttl: Duration::hours(1),
            max_login_attempts: 5,
            lockout_window: Duration::minutes(15),
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub account: Account,
    pub tokens: SessionTokens,
}

/// Domain service implementation for the account lifecycle.
///
/// Concrete implementation of IdentityOps with dependency injection. One
/// instance serves one account kind; the kind parameter decides credential
/// provisioning and the session permission snapshot.
pub struct IdentityService<K, S, N>
where
    K: AccountKind,
    S: AccountStore,
    N: NotificationDispatcher,
{
    store: Arc<S>,
    mailer: Arc<N>,
    sessions: Arc<SessionTokenIssuer>,
    password_hasher: auth::PasswordHasher,
    policy: LifecyclePolicy,
    link_base: String,
    _kind: PhantomData<K>,
}

impl<K, S, N> IdentityService<K, S, N>
where
    K: AccountKind,
    S: AccountStore,
    N: NotificationDispatcher,
{
    /// Create a new identity service with injected dependencies.
    ///
    /// # Arguments
    /// * `store` - Account persistence implementation for this kind's collection
    /// * `mailer` - Notification delivery implementation
    /// * `sessions` - Session token issuer shared across kinds
    /// * `policy` - Token lifetimes and lockout rules
    /// * `link_base` - Base URL for links embedded in mail
    pub fn new(
        store: Arc<S>,
        mailer: Arc<N>,
        sessions: Arc<SessionTokenIssuer>,
        policy: LifecyclePolicy,
        link_base: String,
    ) -> Self {
        Self {
            store,
            mailer,
            sessions,
            password_hasher: auth::PasswordHasher::new(),
            policy,
            link_base,
            _kind: PhantomData,
        }
    }

    /// Send a notification, first attempt inline.
    ///
    /// A failed first attempt moves to a background task that reconnects the
    /// channel and resends once; the calling request is not held open for
    /// that retry. Delivery failure never fails the operation that queued it.
    async fn dispatch(&self, notification: Notification) {
        let kind = notification.kind().to_string();
        let recipient = notification.recipient().to_string();
        let message = notification.into_message();

        if let Err(first) = self.mailer.send(&message).await {
            tracing::warn!(
                "Failed to send {} mail to {}: {}; retrying in background",
                kind,
                recipient,
                first
            );
            let mailer = Arc::clone(&self.mailer);
            tokio::spawn(async move {
                if let Err(e) = mailer.connect().await {
                    tracing::error!(
                        "Mail channel reconnect failed, dropping {} mail for {}: {}",
                        kind,
                        recipient,
                        e
                    );
                    return;
                }
                if let Err(e) = mailer.send(&message).await {
                    tracing::error!(
                        "Failed to send {} mail to {} after reconnect: {}",
                        kind,
                        recipient,
                        e
                    );
                }
            });
        }
    }
}

#[async_trait]
impl<K, S, N> IdentityOps for IdentityService<K, S, N>
where
    K: AccountKind,
    S: AccountStore,
    N: NotificationDispatcher,
{
    async fn signup(&self, command: SignupCommand) -> Result<Account, IdentityError> {
        let SignupCommand {
            email,
            mobile,
            password,
            confirm_password,
            designation,
            created_by,
        } = command;

        let chosen_password = if K::PASSWORD_AT_SIGNUP {
            let password = password.ok_or(IdentityError::PasswordRequired)?;
            let confirm = confirm_password.ok_or(IdentityError::PasswordConfirmationMismatch)?;
            if password != confirm {
                return Err(IdentityError::PasswordConfirmationMismatch);
            }
            validate_password_strength(&password)?;
            Some(password)
        } else {
            // Staff credentials are issued at verification time.
            if password.is_some() {
                return Err(IdentityError::PasswordNotAccepted);
            }
            if designation.is_none() {
                return Err(IdentityError::DesignationRequired);
            }
            None
        };
        let designation = if K::PASSWORD_AT_SIGNUP { None } else { designation };

        // One email, one role: the other collection must not know it.
        if self.store.email_taken_by_other_role(&email).await? {
            return Err(IdentityError::EmailTakenByOtherRole);
        }
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(IdentityError::EmailAlreadyRegistered(email.to_string()));
        }

        let mut account = Account::new(email, mobile, designation, created_by);
        if let Some(password) = chosen_password {
            account.set_password(self.password_hasher.hash(&password)?);
        }
        let token = auth::token::issue(self.policy.verify_token_ttl);
        account.set_verify_token(&token);

        let account = self.store.insert(account).await?;
        tracing::info!(
            "Created {} account {} ({:?})",
            K::ROLE,
            account.id,
            account.phase()
        );

        self.dispatch(Notification::Verification(VerificationMail::new(
            &account,
            &token.plain,
            &self.link_base,
        )))
        .await;

        Ok(account)
    }

    async fn verify_email(
        &self,
        email: &EmailAddress,
        token: &str,
    ) -> Result<Account, IdentityError> {
        // Unknown email and bad token answer identically; this endpoint
        // must not reveal which addresses hold accounts.
        let mut account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(IdentityError::InvalidToken)?;

        if !account.verify_token_matches(token, Utc::now()) {
            return Err(IdentityError::InvalidToken);
        }
        account.mark_email_verified();

        let notification = if K::PASSWORD_AT_SIGNUP {
            Notification::Welcome(WelcomeMail::new(&account))
        } else {
            let temporary = auth::password::generate_temporary();
            account.install_temporary_password(self.password_hasher.hash(&temporary)?);
            let reset = auth::token::issue(self.policy.reset_token_ttl);
            account.set_reset_token(&reset);
            Notification::StaffCredentials(StaffCredentialsMail::new(
                &account,
                temporary,
                &reset.plain,
                &self.link_base,
            ))
        };

        let account = self.store.update(account).await?;
        tracing::info!(
            "Verified email for {} account {} ({:?})",
            K::ROLE,
            account.id,
            account.phase()
        );

        self.dispatch(notification).await;

        Ok(account)
    }

    async fn resend_verification(&self, email: &EmailAddress) -> Result<Account, IdentityError> {
        let mut account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| IdentityError::NotFound(email.to_string()))?;

        if account.is_email_verified {
            return Err(IdentityError::AlreadyVerified);
        }

        // Overwriting the token pair invalidates any link still in flight.
        let token = auth::token::issue(self.policy.verify_token_ttl);
        account.set_verify_token(&token);

        let account = self.store.update(account).await?;

        self.dispatch(Notification::Verification(VerificationMail::new(
            &account,
            &token.plain,
            &self.link_base,
        )))
        .await;

        Ok(account)
    }

    async fn request_password_reset(
        &self,
        email: &EmailAddress,
    ) -> Result<Account, IdentityError> {
        let mut account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| IdentityError::NotFound(email.to_string()))?;

        if !account.is_active {
            return Err(IdentityError::AccountDisabled);
        }
        if !account.is_email_verified {
            return Err(IdentityError::EmailNotVerified);
        }

        let token = auth::token::issue(self.policy.reset_token_ttl);
        account.set_reset_token(&token);

        let account = self.store.update(account).await?;
        tracing::info!("Password reset requested for account {}", account.id);

        self.dispatch(Notification::ResetRequested(ResetRequestedMail::new(
            &account,
            &token.plain,
            &self.link_base,
        )))
        .await;

        Ok(account)
    }

    async fn confirm_password_reset(
        &self,
        command: ConfirmResetCommand,
    ) -> Result<Account, IdentityError> {
        let ConfirmResetCommand {
            email,
            token,
            old_password,
            new_password,
            confirm_password,
        } = command;

        // Same anonymity rule as verify_email: unknown email reads as a bad token.
        let mut account = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(IdentityError::InvalidToken)?;

        if !account.is_active {
            return Err(IdentityError::AccountDisabled);
        }
        if !account.reset_token_matches(&token, Utc::now()) {
            return Err(IdentityError::InvalidToken);
        }

        let stored = account
            .password_hash
            .as_deref()
            .ok_or(IdentityError::PasswordNotSet)?;
        if !self.password_hasher.verify(&old_password, stored)? {
            return Err(IdentityError::OldPasswordMismatch);
        }

        if new_password != confirm_password {
            return Err(IdentityError::PasswordConfirmationMismatch);
        }
        validate_password_strength(&new_password)?;
        if new_password == old_password {
            return Err(IdentityError::PasswordUnchanged);
        }

        account.complete_password_reset(self.password_hasher.hash(&new_password)?);

        let account = self.store.update(account).await?;
        tracing::info!(
            "Password reset completed for account {} ({:?})",
            account.id,
            account.phase()
        );

        self.dispatch(Notification::PasswordChanged(PasswordChangedMail::new(
            &account,
        )))
        .await;

        Ok(account)
    }

    async fn login(&self, command: LoginCommand) -> Result<LoginSuccess, IdentityError> {
        let LoginCommand {
            email,
            password,
            device,
        } = command;

        let account = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or_else(|| IdentityError::NotFound(email.to_string()))?;

        if !account.is_active {
            return Err(IdentityError::AccountDisabled);
        }
        if !account.is_email_verified {
            return Err(IdentityError::EmailNotVerified);
        }
        let stored = account
            .password_hash
            .as_deref()
            .ok_or(IdentityError::PasswordNotSet)?;
        if account.must_change_password {
            return Err(IdentityError::PasswordChangeRequired);
        }

        // Lockout is derived from history, never stored: it releases on its
        // own once failures age out of the window.
        let window_start = Utc::now() - self.policy.lockout_window;
        if account.failed_logins_since(window_start) >= self.policy.max_login_attempts as usize {
            tracing::warn!(
                "Login attempt on locked account {} from {}",
                account.id,
                device.summary()
            );
            return Err(IdentityError::AccountLocked);
        }

        if !self.password_hasher.verify(&password, stored)? {
            let attempt = LoginAttempt {
                device,
                at: Utc::now(),
            };
            if let Err(e) = self
                .store
                .append_login_attempt(&account.id, attempt, LoginOutcome::Failed)
                .await
            {
                tracing::error!(
                    "Failed to record failed login for account {}: {}",
                    account.id,
                    e
                );
            }
            return Err(IdentityError::InvalidCredentials);
        }

        let attempt = LoginAttempt {
            device: device.clone(),
            at: Utc::now(),
        };
        if let Err(e) = self
            .store
            .append_login_attempt(&account.id, attempt, LoginOutcome::Succeeded)
            .await
        {
            tracing::error!(
                "Failed to record successful login for account {}: {}",
                account.id,
                e
            );
        }

        let permissions = K::permissions(account.designation.as_deref());
        let tokens = self
            .sessions
            .issue_pair(&account, K::ROLE, permissions, &device)?;
        tracing::info!(
            "Login succeeded for {} account {} from {}",
            K::ROLE,
            account.id,
            device.summary()
        );

        self.dispatch(Notification::LoginAlert(LoginAlertMail::new(
            &account, &device,
        )))
        .await;

        Ok(LoginSuccess { account, tokens })
    }

    async fn logout(&self, session: &SessionClaims) -> Result<(), IdentityError> {
        // Sessions are stateless; the token stays valid until its expiry.
        // Logout acknowledges the client-side close and leaves a trace.
        tracing::info!(
            "Session {} closed by {} account {} from {}",
            session.jti,
            session.role,
            session.sub,
            session.device.summary()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockall::mock;
    use mockall::predicate::*;
    use tokio::sync::Notify;

    use super::*;
    use crate::account::errors::DispatchError;
    use crate::account::kind::AdminKind;
    use crate::account::kind::Role;
    use crate::account::kind::UserKind;
    use crate::account::models::AccountId;
    use crate::account::models::DeviceFingerprint;
    use crate::account::notifications::EmailMessage;

    // Define mocks in the test module using mockall
    mock! {
        pub TestAccountStore {}

        #[async_trait]
        impl AccountStore for TestAccountStore {
            async fn insert(&self, account: Account) -> Result<Account, IdentityError>;
            async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, IdentityError>;
            async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Account>, IdentityError>;
            async fn email_taken_by_other_role(&self, email: &EmailAddress) -> Result<bool, IdentityError>;
            async fn update(&self, account: Account) -> Result<Account, IdentityError>;
            async fn append_login_attempt(&self, id: &AccountId, attempt: LoginAttempt, outcome: LoginOutcome) -> Result<(), IdentityError>;
        }
    }

    mock! {
        pub TestDispatcher {}

        #[async_trait]
        impl NotificationDispatcher for TestDispatcher {
            async fn connect(&self) -> Result<(), DispatchError>;
            async fn send(&self, message: &EmailMessage) -> Result<(), DispatchError>;
        }
    }

    const SECRET: &[u8] = b"a-test-secret-that-is-long-enough";

    fn service<K: AccountKind>(
        store: MockTestAccountStore,
        mailer: MockTestDispatcher,
    ) -> IdentityService<K, MockTestAccountStore, MockTestDispatcher> {
        service_with_policy(store, mailer, LifecyclePolicy::default())
    }

    fn service_with_policy<K: AccountKind>(
        store: MockTestAccountStore,
        mailer: MockTestDispatcher,
        policy: LifecyclePolicy,
    ) -> IdentityService<K, MockTestAccountStore, MockTestDispatcher> {
        IdentityService::new(
            Arc::new(store),
            Arc::new(mailer),
            Arc::new(SessionTokenIssuer::new(
                SECRET,
                Duration::minutes(15),
                Duration::days(7),
            )),
            policy,
            "https://library.example.com".to_string(),
        )
    }

    fn email(s: &str) -> EmailAddress {
        EmailAddress::new(s.to_string()).unwrap()
    }

    fn device() -> DeviceFingerprint {
        DeviceFingerprint {
            os: "Linux".to_string(),
            browser: "Firefox".to_string(),
            ip: "198.51.100.7".to_string(),
            language: "en".to_string(),
            device_type: "Desktop".to_string(),
        }
    }

    fn member_signup(address: &str) -> SignupCommand {
        SignupCommand {
            email: email(address),
            mobile: None,
            password: Some("Str0ng!pass".to_string()),
            confirm_password: Some("Str0ng!pass".to_string()),
            designation: None,
            created_by: None,
        }
    }

    fn hasher() -> auth::PasswordHasher {
        auth::PasswordHasher::new()
    }

    /// A verified member account holding the given password.
    fn active_member(address: &str, password: &str) -> Account {
        let mut account = Account::new(email(address), None, None, None);
        account.mark_email_verified();
        account.set_password(hasher().hash(password).unwrap());
        account
    }

    #[tokio::test]
    async fn test_signup_hashes_password_and_stores_token_pair() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        store
            .expect_email_taken_by_other_role()
            .times(1)
            .returning(|_| Ok(false));
        store
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_insert()
            .withf(|account| {
                account
                    .password_hash
                    .as_deref()
                    .is_some_and(|h| h.starts_with("$argon2"))
                    && account.email_verify_token_hash.is_some()
                    && account.email_verify_token_expires_at.is_some()
                    && !account.is_email_verified
            })
            .times(1)
            .returning(|account| Ok(account));
        mailer
            .expect_send()
            .withf(|message| {
                message.to == "reader@example.com"
                    && message.subject == "Verify your email address"
                    // Stored hash is hex; the mailed link carries the plain token.
                    && !message.html_body.contains("$argon2")
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service::<UserKind>(store, mailer);
        let account = service
            .signup(member_signup("reader@example.com"))
            .await
            .unwrap();

        assert_eq!(account.email.as_str(), "reader@example.com");
        assert!(!account.is_email_verified);
    }

    #[tokio::test]
    async fn test_signup_rejects_duplicate_email() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        store
            .expect_email_taken_by_other_role()
            .times(1)
            .returning(|_| Ok(false));
        store
            .expect_find_by_email()
            .times(1)
            .returning(|e| Ok(Some(active_member(e.as_str(), "Str0ng!pass"))));
        store.expect_insert().times(0);

        let service = service::<UserKind>(store, mailer);
        let result = service.signup(member_signup("reader@example.com")).await;

        assert!(matches!(
            result.unwrap_err(),
            IdentityError::EmailAlreadyRegistered(_)
        ));
    }

    #[tokio::test]
    async fn test_signup_rejects_email_held_by_other_role() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        store
            .expect_email_taken_by_other_role()
            .times(1)
            .returning(|_| Ok(true));
        store.expect_find_by_email().times(0);
        store.expect_insert().times(0);

        let service = service::<UserKind>(store, mailer);
        let result = service.signup(member_signup("staff@example.com")).await;

        assert!(matches!(
            result.unwrap_err(),
            IdentityError::EmailTakenByOtherRole
        ));
    }

    #[tokio::test]
    async fn test_signup_rejects_mismatched_confirmation() {
        let store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        let mut command = member_signup("reader@example.com");
        command.confirm_password = Some("Different1!".to_string());

        let service = service::<UserKind>(store, mailer);
        let result = service.signup(command).await;

        assert!(matches!(
            result.unwrap_err(),
            IdentityError::PasswordConfirmationMismatch
        ));
    }

    #[tokio::test]
    async fn test_signup_rejects_weak_password() {
        let store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        let mut command = member_signup("reader@example.com");
        command.password = Some("weakpass".to_string());
        command.confirm_password = Some("weakpass".to_string());

        let service = service::<UserKind>(store, mailer);
        let result = service.signup(command).await;

        assert!(matches!(result.unwrap_err(), IdentityError::WeakPassword(_)));
    }

    #[tokio::test]
    async fn test_staff_signup_takes_no_password_and_needs_designation() {
        let service = service::<AdminKind>(MockTestAccountStore::new(), MockTestDispatcher::new());

        let mut command = member_signup("staff@example.com");
        command.designation = Some("librarian".to_string());
        let result = service.signup(command).await;
        assert!(matches!(
            result.unwrap_err(),
            IdentityError::PasswordNotAccepted
        ));

        let command = SignupCommand {
            email: email("staff@example.com"),
            mobile: None,
            password: None,
            confirm_password: None,
            designation: None,
            created_by: None,
        };
        let result = service.signup(command).await;
        assert!(matches!(
            result.unwrap_err(),
            IdentityError::DesignationRequired
        ));
    }

    #[tokio::test]
    async fn test_staff_signup_creates_passwordless_account() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        store
            .expect_email_taken_by_other_role()
            .times(1)
            .returning(|_| Ok(false));
        store
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_insert()
            .withf(|account| {
                account.password_hash.is_none()
                    && account.designation.as_deref() == Some("librarian")
                    && account.email_verify_token_hash.is_some()
            })
            .times(1)
            .returning(|account| Ok(account));
        mailer.expect_send().times(1).returning(|_| Ok(()));

        let command = SignupCommand {
            email: email("staff@example.com"),
            mobile: None,
            password: None,
            confirm_password: None,
            designation: Some("librarian".to_string()),
            created_by: Some(AccountId::new()),
        };

        let service = service::<AdminKind>(store, mailer);
        let account = service.signup(command).await.unwrap();
        assert!(account.password_hash.is_none());
        assert!(account.created_by.is_some());
    }

    #[tokio::test]
    async fn test_verify_email_consumes_token_and_welcomes_member() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        let mut account = Account::new(email("reader@example.com"), None, None, None);
        account.set_password(hasher().hash("Str0ng!pass").unwrap());
        let token = auth::token::issue(Duration::hours(1));
        account.set_verify_token(&token);

        let stored = account.clone();
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_update()
            .withf(|account| {
                account.is_email_verified
                    && account.email_verify_token_hash.is_none()
                    && account.email_verify_token_expires_at.is_none()
            })
            .times(1)
            .returning(|account| Ok(account));
        mailer
            .expect_send()
            .withf(|message| message.subject == "Your library account is ready")
            .times(1)
            .returning(|_| Ok(()));

        let service = service::<UserKind>(store, mailer);
        let verified = service
            .verify_email(&email("reader@example.com"), &token.plain)
            .await
            .unwrap();

        assert!(verified.is_email_verified);
    }

    #[tokio::test]
    async fn test_verify_email_rejects_expired_token() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        let mut account = Account::new(email("reader@example.com"), None, None, None);
        let token = auth::token::issue(Duration::minutes(-5));
        account.set_verify_token(&token);

        let stored = account.clone();
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_update().times(0);

        let service = service::<UserKind>(store, mailer);
        let result = service
            .verify_email(&email("reader@example.com"), &token.plain)
            .await;

        assert!(matches!(result.unwrap_err(), IdentityError::InvalidToken));
    }

    #[tokio::test]
    async fn test_verify_email_rejects_consumed_token() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        // Already verified: the token pair was cleared on first use.
        let stored = active_member("reader@example.com", "Str0ng!pass");
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_update().times(0);

        let service = service::<UserKind>(store, mailer);
        let result = service
            .verify_email(&email("reader@example.com"), "some-old-token")
            .await;

        assert!(matches!(result.unwrap_err(), IdentityError::InvalidToken));
    }

    #[tokio::test]
    async fn test_verify_staff_installs_temporary_credentials() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        let mut account = Account::new(
            email("staff@example.com"),
            None,
            Some("librarian".to_string()),
            None,
        );
        let token = auth::token::issue(Duration::hours(1));
        account.set_verify_token(&token);

        let stored = account.clone();
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_update()
            .withf(|account| {
                account.is_email_verified
                    && account.must_change_password
                    && account
                        .password_hash
                        .as_deref()
                        .is_some_and(|h| h.starts_with("$argon2"))
                    && account.reset_token_hash.is_some()
                    && account.reset_token_expires_at.is_some()
            })
            .times(1)
            .returning(|account| Ok(account));
        mailer
            .expect_send()
            .withf(|message| {
                message.subject == "Your staff account credentials"
                    && message.html_body.contains("/reset-password")
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service::<AdminKind>(store, mailer);
        let verified = service
            .verify_email(&email("staff@example.com"), &token.plain)
            .await
            .unwrap();

        assert!(verified.must_change_password);
    }

    #[tokio::test]
    async fn test_resend_verification_rotates_token() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        let mut account = Account::new(email("reader@example.com"), None, None, None);
        let old_token = auth::token::issue(Duration::hours(1));
        account.set_verify_token(&old_token);
        let old_hash = old_token.hashed.clone();

        let stored = account.clone();
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_update()
            .withf(move |account| {
                account
                    .email_verify_token_hash
                    .as_deref()
                    .is_some_and(|h| h != old_hash)
            })
            .times(1)
            .returning(|account| Ok(account));
        mailer.expect_send().times(1).returning(|_| Ok(()));

        let service = service::<UserKind>(store, mailer);
        service
            .resend_verification(&email("reader@example.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_resend_verification_rejects_verified_account() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        let stored = active_member("reader@example.com", "Str0ng!pass");
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_update().times(0);

        let service = service::<UserKind>(store, mailer);
        let result = service.resend_verification(&email("reader@example.com")).await;

        assert!(matches!(result.unwrap_err(), IdentityError::AlreadyVerified));
    }

    #[tokio::test]
    async fn test_request_reset_requires_verified_email() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        let stored = Account::new(email("reader@example.com"), None, None, None);
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_update().times(0);

        let service = service::<UserKind>(store, mailer);
        let result = service
            .request_password_reset(&email("reader@example.com"))
            .await;

        assert!(matches!(result.unwrap_err(), IdentityError::EmailNotVerified));
    }

    #[tokio::test]
    async fn test_request_reset_issues_token_and_mail() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        let stored = active_member("reader@example.com", "Str0ng!pass");
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_update()
            .withf(|account| {
                account.reset_token_hash.is_some() && account.reset_token_expires_at.is_some()
            })
            .times(1)
            .returning(|account| Ok(account));
        mailer
            .expect_send()
            .withf(|message| message.subject == "Password reset requested")
            .times(1)
            .returning(|_| Ok(()));

        let service = service::<UserKind>(store, mailer);
        service
            .request_password_reset(&email("reader@example.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_confirm_reset_replaces_password_and_consumes_token() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        let mut account = active_member("reader@example.com", "OldPass1!");
        let token = auth::token::issue(Duration::hours(1));
        account.set_reset_token(&token);
        let old_hash = account.password_hash.clone().unwrap();

        let stored = account.clone();
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_update()
            .withf(move |account| {
                account.reset_token_hash.is_none()
                    && account.reset_token_expires_at.is_none()
                    && !account.must_change_password
                    && account.password_hash.as_deref() != Some(old_hash.as_str())
            })
            .times(1)
            .returning(|account| Ok(account));
        mailer
            .expect_send()
            .withf(|message| message.subject == "Your password was changed")
            .times(1)
            .returning(|_| Ok(()));

        let service = service::<UserKind>(store, mailer);
        let command = ConfirmResetCommand {
            email: email("reader@example.com"),
            token: token.plain.clone(),
            old_password: "OldPass1!".to_string(),
            new_password: "NewPass2@".to_string(),
            confirm_password: "NewPass2@".to_string(),
        };
        let account = service.confirm_password_reset(command).await.unwrap();
        assert!(!account.must_change_password);
    }

    #[tokio::test]
    async fn test_confirm_reset_rejects_wrong_old_password() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        let mut account = active_member("reader@example.com", "OldPass1!");
        let token = auth::token::issue(Duration::hours(1));
        account.set_reset_token(&token);

        let stored = account.clone();
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_update().times(0);

        let service = service::<UserKind>(store, mailer);
        let command = ConfirmResetCommand {
            email: email("reader@example.com"),
            token: token.plain.clone(),
            old_password: "Wrong0ld!".to_string(),
            new_password: "NewPass2@".to_string(),
            confirm_password: "NewPass2@".to_string(),
        };
        let result = service.confirm_password_reset(command).await;

        assert!(matches!(
            result.unwrap_err(),
            IdentityError::OldPasswordMismatch
        ));
    }

    #[tokio::test]
    async fn test_confirm_reset_rejects_consumed_token() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        // No reset token outstanding.
        let stored = active_member("reader@example.com", "OldPass1!");
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_update().times(0);

        let service = service::<UserKind>(store, mailer);
        let command = ConfirmResetCommand {
            email: email("reader@example.com"),
            token: "stale-token".to_string(),
            old_password: "OldPass1!".to_string(),
            new_password: "NewPass2@".to_string(),
            confirm_password: "NewPass2@".to_string(),
        };
        let result = service.confirm_password_reset(command).await;

        assert!(matches!(result.unwrap_err(), IdentityError::InvalidToken));
    }

    #[tokio::test]
    async fn test_confirm_reset_rejects_unchanged_password() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        let mut account = active_member("reader@example.com", "OldPass1!");
        let token = auth::token::issue(Duration::hours(1));
        account.set_reset_token(&token);

        let stored = account.clone();
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_update().times(0);

        let service = service::<UserKind>(store, mailer);
        let command = ConfirmResetCommand {
            email: email("reader@example.com"),
            token: token.plain.clone(),
            old_password: "OldPass1!".to_string(),
            new_password: "OldPass1!".to_string(),
            confirm_password: "OldPass1!".to_string(),
        };
        let result = service.confirm_password_reset(command).await;

        assert!(matches!(
            result.unwrap_err(),
            IdentityError::PasswordUnchanged
        ));
    }

    #[tokio::test]
    async fn test_login_returns_session_pair_and_records_history() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        let stored = active_member("reader@example.com", "Str0ng!pass");
        let account_id = stored.id;
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_append_login_attempt()
            .withf(move |id, attempt, outcome| {
                *id == account_id
                    && attempt.device.browser == "Firefox"
                    && *outcome == LoginOutcome::Succeeded
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        mailer
            .expect_send()
            .withf(|message| message.subject == "New login to your account")
            .times(1)
            .returning(|_| Ok(()));

        let service = service::<UserKind>(store, mailer);
        let success = service
            .login(LoginCommand {
                email: email("reader@example.com"),
                password: "Str0ng!pass".to_string(),
                device: device(),
            })
            .await
            .unwrap();

        // Claims carry identity, role, permission snapshot, and device.
        let issuer = SessionTokenIssuer::new(SECRET, Duration::minutes(15), Duration::days(7));
        let claims = issuer.validate(&success.tokens.access_token).unwrap();
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.role, Role::User);
        assert!(claims.permissions.contains(&"catalog:read".to_string()));
        assert_eq!(claims.device.browser, "Firefox");
        let refresh = issuer.validate(&success.tokens.refresh_token).unwrap();
        assert!(refresh.exp > claims.exp);
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_recorded() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        let stored = active_member("reader@example.com", "Str0ng!pass");
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_append_login_attempt()
            .withf(|_, _, outcome| *outcome == LoginOutcome::Failed)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = service::<UserKind>(store, mailer);
        let result = service
            .login(LoginCommand {
                email: email("reader@example.com"),
                password: "WrongPass9#".to_string(),
                device: device(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            IdentityError::InvalidCredentials
        ));
    }

    #[tokio::test]
    async fn test_login_gates_precede_password_check() {
        // Each blocked state answers before any credential is examined,
        // so no login attempt is recorded.
        let cases: Vec<(Account, fn(&IdentityError) -> bool)> = vec![
            (
                {
                    let mut a = active_member("reader@example.com", "Str0ng!pass");
                    a.is_active = false;
                    a
                },
                |e| matches!(e, IdentityError::AccountDisabled),
            ),
            (
                {
                    let mut a = Account::new(email("reader@example.com"), None, None, None);
                    a.set_password(hasher().hash("Str0ng!pass").unwrap());
                    a
                },
                |e| matches!(e, IdentityError::EmailNotVerified),
            ),
            (
                {
                    let mut a = Account::new(email("reader@example.com"), None, None, None);
                    a.mark_email_verified();
                    a
                },
                |e| matches!(e, IdentityError::PasswordNotSet),
            ),
            (
                {
                    let mut a = active_member("reader@example.com", "Str0ng!pass");
                    a.must_change_password = true;
                    a
                },
                |e| matches!(e, IdentityError::PasswordChangeRequired),
            ),
        ];

        for (stored, check) in cases {
            let mut store = MockTestAccountStore::new();
            let mailer = MockTestDispatcher::new();
            store
                .expect_find_by_email()
                .times(1)
                .returning(move |_| Ok(Some(stored.clone())));
            store.expect_append_login_attempt().times(0);

            let service = service::<UserKind>(store, mailer);
            let result = service
                .login(LoginCommand {
                    email: email("reader@example.com"),
                    password: "Str0ng!pass".to_string(),
                    device: device(),
                })
                .await;
            let err = result.unwrap_err();
            assert!(check(&err), "unexpected error: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_login_locks_after_repeated_recent_failures() {
        let mut store = MockTestAccountStore::new();
        let mailer = MockTestDispatcher::new();

        let mut stored = active_member("reader@example.com", "Str0ng!pass");
        let now = Utc::now();
        for _ in 0..3 {
            stored.failed_logins.push(LoginAttempt {
                device: device(),
                at: now - Duration::minutes(2),
            });
        }
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_append_login_attempt().times(0);

        let policy = LifecyclePolicy {
            max_login_attempts: 3,
            lockout_window: Duration::minutes(15),
            ..LifecyclePolicy::default()
        };
        let service = service_with_policy::<UserKind>(store, mailer, policy);
        let result = service
            .login(LoginCommand {
                email: email("reader@example.com"),
                password: "Str0ng!pass".to_string(),
                device: device(),
            })
            .await;

        assert!(matches!(result.unwrap_err(), IdentityError::AccountLocked));
    }

    #[tokio::test]
    async fn test_login_lock_releases_once_failures_age_out() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        let mut stored = active_member("reader@example.com", "Str0ng!pass");
        let now = Utc::now();
        for _ in 0..3 {
            stored.failed_logins.push(LoginAttempt {
                device: device(),
                at: now - Duration::minutes(30),
            });
        }
        store
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_append_login_attempt()
            .times(1)
            .returning(|_, _, _| Ok(()));
        mailer.expect_send().times(1).returning(|_| Ok(()));

        let policy = LifecyclePolicy {
            max_login_attempts: 3,
            lockout_window: Duration::minutes(15),
            ..LifecyclePolicy::default()
        };
        let service = service_with_policy::<UserKind>(store, mailer, policy);
        let result = service
            .login(LoginCommand {
                email: email("reader@example.com"),
                password: "Str0ng!pass".to_string(),
                device: device(),
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_failed_send_reconnects_and_retries_once() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        store
            .expect_email_taken_by_other_role()
            .times(1)
            .returning(|_| Ok(false));
        store
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_insert()
            .times(1)
            .returning(|account| Ok(account));

        let retried = Arc::new(Notify::new());
        let on_retry = Arc::clone(&retried);
        let mut send_calls = 0;
        mailer.expect_send().times(2).returning(move |_| {
            send_calls += 1;
            if send_calls == 1 {
                Err(DispatchError::SendFailed("boom".to_string()))
            } else {
                on_retry.notify_one();
                Ok(())
            }
        });
        mailer.expect_connect().times(1).returning(|| Ok(()));

        let service = service::<UserKind>(store, mailer);
        let result = service.signup(member_signup("reader@example.com")).await;

        // Delivery trouble never fails the operation.
        assert!(result.is_ok());

        // The retried send fires the notify; a stored permit covers the case
        // where the background task already finished.
        retried.notified().await;
    }

    #[tokio::test]
    async fn test_failed_reconnect_drops_notification() {
        let mut store = MockTestAccountStore::new();
        let mut mailer = MockTestDispatcher::new();

        store
            .expect_email_taken_by_other_role()
            .times(1)
            .returning(|_| Ok(false));
        store
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_insert()
            .times(1)
            .returning(|account| Ok(account));

        let reconnected = Arc::new(Notify::new());
        let on_reconnect = Arc::clone(&reconnected);
        mailer
            .expect_send()
            .times(1)
            .returning(|_| Err(DispatchError::SendFailed("boom".to_string())));
        mailer.expect_connect().times(1).returning(move || {
            on_reconnect.notify_one();
            Err(DispatchError::ConnectionFailed("still down".to_string()))
        });

        let service = service::<UserKind>(store, mailer);
        let result = service.signup(member_signup("reader@example.com")).await;

        assert!(result.is_ok());

        // The failed reconnect is the background task's last step; send is
        // capped at one call, so the message was dropped rather than resent.
        reconnected.notified().await;
    }

    #[tokio::test]
    async fn test_logout_acknowledges_stateless_close() {
        let service = service::<UserKind>(MockTestAccountStore::new(), MockTestDispatcher::new());

        let claims = SessionClaims {
            jti: "token-1".to_string(),
            sub: AccountId::new().to_string(),
            role: Role::User,
            designation: None,
            permissions: vec![],
            device: device(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 900,
        };

        assert!(service.logout(&claims).await.is_ok());
    }
}
