use chrono::DateTime;
use chrono::Utc;

use crate::account::models::Account;
use crate::account::models::DeviceFingerprint;

/// A rendered email ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Envelope for all account lifecycle notifications.
///
/// Each variant captures a snapshot of the data its mail template needs,
/// so rendering never touches the account entity again.
#[derive(Debug, Clone)]
pub enum Notification {
    Verification(VerificationMail),
    Welcome(WelcomeMail),
    StaffCredentials(StaffCredentialsMail),
    ResetRequested(ResetRequestedMail),
    PasswordChanged(PasswordChangedMail),
    LoginAlert(LoginAlertMail),
}

impl Notification {
    /// Get the notification type name used in log lines.
    pub fn kind(&self) -> &str {
        match self {
            Notification::Verification(_) => "verification",
            Notification::Welcome(_) => "welcome",
            Notification::StaffCredentials(_) => "staff_credentials",
            Notification::ResetRequested(_) => "reset_requested",
            Notification::PasswordChanged(_) => "password_changed",
            Notification::LoginAlert(_) => "login_alert",
        }
    }

    /// Extract the recipient address.
    pub fn recipient(&self) -> &str {
        match self {
            Notification::Verification(m) => &m.email,
            Notification::Welcome(m) => &m.email,
            Notification::StaffCredentials(m) => &m.email,
            Notification::ResetRequested(m) => &m.email,
            Notification::PasswordChanged(m) => &m.email,
            Notification::LoginAlert(m) => &m.email,
        }
    }

    /// Render the notification into a sendable email.
    pub fn into_message(self) -> EmailMessage {
        match self {
            Notification::Verification(m) => m.render(),
            Notification::Welcome(m) => m.render(),
            Notification::StaffCredentials(m) => m.render(),
            Notification::ResetRequested(m) => m.render(),
            Notification::PasswordChanged(m) => m.render(),
            Notification::LoginAlert(m) => m.render(),
        }
    }
}

/// Email-verification mail carrying the one-time verify link.
#[derive(Debug, Clone)]
pub struct VerificationMail {
    pub email: String,
    pub verify_url: String,
    pub expires_at: DateTime<Utc>,
}

impl VerificationMail {
    /// Build from an account and the plain token it was just issued.
    ///
    /// The plain token exists only in this mail; storage holds its hash.
    pub fn new(account: &Account, plain_token: &str, link_base: &str) -> Self {
        Self {
            email: account.email.as_str().to_string(),
            verify_url: format!(
                "{}/verify-email?email={}&token={}",
                link_base,
                account.email.as_str(),
                plain_token
            ),
            expires_at: account
                .email_verify_token_expires_at
                .unwrap_or_else(Utc::now),
        }
    }

    fn render(self) -> EmailMessage {
        EmailMessage {
            to: self.email,
            subject: "Verify your email address".to_string(),
            html_body: format!(
                "<p>Welcome to the library.</p>\
                 <p>Please confirm your email address by visiting \
                 <a href=\"{url}\">{url}</a>.</p>\
                 <p>The link expires at {expires}.</p>",
                url = self.verify_url,
                expires = self.expires_at.to_rfc3339(),
            ),
        }
    }
}

/// Plain welcome mail sent to members once their email is verified.
#[derive(Debug, Clone)]
pub struct WelcomeMail {
    pub email: String,
}

impl WelcomeMail {
    pub fn new(account: &Account) -> Self {
        Self {
            email: account.email.as_str().to_string(),
        }
    }

    fn render(self) -> EmailMessage {
        EmailMessage {
            to: self.email,
            subject: "Your library account is ready".to_string(),
            html_body: "<p>Your email address is verified. You can now log in \
                        and browse the catalog.</p>"
                .to_string(),
        }
    }
}

/// Staff onboarding mail carrying the temporary password and the reset link
/// used to replace it.
#[derive(Debug, Clone)]
pub struct StaffCredentialsMail {
    pub email: String,
    pub temporary_password: String,
    pub reset_url: String,
    pub reset_expires_at: DateTime<Utc>,
}

impl StaffCredentialsMail {
    pub fn new(account: &Account, temporary_password: String, plain_token: &str, link_base: &str) -> Self {
        Self {
            email: account.email.as_str().to_string(),
            temporary_password,
            reset_url: format!(
                "{}/reset-password?email={}&token={}",
                link_base,
                account.email.as_str(),
                plain_token
            ),
            reset_expires_at: account.reset_token_expires_at.unwrap_or_else(Utc::now),
        }
    }

    fn render(self) -> EmailMessage {
        EmailMessage {
            to: self.email,
            subject: "Your staff account credentials".to_string(),
            html_body: format!(
                "<p>Your staff email is verified.</p>\
                 <p>Temporary password: <code>{password}</code></p>\
                 <p>Choose your own password at \
                 <a href=\"{url}\">{url}</a> before {expires}. Login stays \
                 disabled until you do.</p>",
                password = self.temporary_password,
                url = self.reset_url,
                expires = self.reset_expires_at.to_rfc3339(),
            ),
        }
    }
}

/// Password-reset mail carrying the one-time reset link.
#[derive(Debug, Clone)]
pub struct ResetRequestedMail {
    pub email: String,
    pub reset_url: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetRequestedMail {
    pub fn new(account: &Account, plain_token: &str, link_base: &str) -> Self {
        Self {
            email: account.email.as_str().to_string(),
            reset_url: format!(
                "{}/reset-password?email={}&token={}",
                link_base,
                account.email.as_str(),
                plain_token
            ),
            expires_at: account.reset_token_expires_at.unwrap_or_else(Utc::now),
        }
    }

    fn render(self) -> EmailMessage {
        EmailMessage {
            to: self.email,
            subject: "Password reset requested".to_string(),
            html_body: format!(
                "<p>A password reset was requested for your account.</p>\
                 <p>Set a new password at <a href=\"{url}\">{url}</a> \
                 before {expires}.</p>\
                 <p>If this was not you, no action is needed; the link \
                 expires on its own.</p>",
                url = self.reset_url,
                expires = self.expires_at.to_rfc3339(),
            ),
        }
    }
}

/// Confirmation mail sent after a completed password reset.
#[derive(Debug, Clone)]
pub struct PasswordChangedMail {
    pub email: String,
    pub changed_at: DateTime<Utc>,
}

impl PasswordChangedMail {
    pub fn new(account: &Account) -> Self {
        Self {
            email: account.email.as_str().to_string(),
            changed_at: Utc::now(),
        }
    }

    fn render(self) -> EmailMessage {
        EmailMessage {
            to: self.email,
            subject: "Your password was changed".to_string(),
            html_body: format!(
                "<p>Your account password was changed at {changed}.</p>\
                 <p>If this was not you, request a password reset \
                 immediately.</p>",
                changed = self.changed_at.to_rfc3339(),
            ),
        }
    }
}

/// New-login alert naming the device that opened the session.
#[derive(Debug, Clone)]
pub struct LoginAlertMail {
    pub email: String,
    pub device: DeviceFingerprint,
    pub at: DateTime<Utc>,
}

impl LoginAlertMail {
    pub fn new(account: &Account, device: &DeviceFingerprint) -> Self {
        Self {
            email: account.email.as_str().to_string(),
            device: device.clone(),
            at: Utc::now(),
        }
    }

    fn render(self) -> EmailMessage {
        EmailMessage {
            to: self.email,
            subject: "New login to your account".to_string(),
            html_body: format!(
                "<p>Your account was just logged into.</p>\
                 <p>Device: {device}</p>\
                 <p>Time: {at}</p>\
                 <p>If this was not you, change your password now.</p>",
                device = self.device.summary(),
                at = self.at.to_rfc3339(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::models::EmailAddress;
    use chrono::Duration;

    fn account() -> Account {
        Account::new(
            EmailAddress::new("reader@example.com".to_string()).unwrap(),
            None,
            None,
            None,
        )
    }

    #[test]
    fn verification_mail_embeds_plain_token_in_link() {
        let mut account = account();
        let token = auth::token::issue(Duration::hours(1));
        account.set_verify_token(&token);

        let mail = VerificationMail::new(&account, &token.plain, "https://lib.example.com");
        assert!(mail.verify_url.contains(&token.plain));
        assert!(mail.verify_url.starts_with("https://lib.example.com/verify-email"));

        let message = Notification::Verification(mail).into_message();
        assert_eq!(message.to, "reader@example.com");
        assert!(message.html_body.contains(&token.plain));
    }

    #[test]
    fn staff_credentials_mail_carries_password_and_reset_link() {
        let mut account = account();
        let token = auth::token::issue(Duration::hours(1));
        account.set_reset_token(&token);

        let mail = StaffCredentialsMail::new(
            &account,
            "Temp0rary!".to_string(),
            &token.plain,
            "https://lib.example.com",
        );
        let message = Notification::StaffCredentials(mail).into_message();
        assert!(message.html_body.contains("Temp0rary!"));
        assert!(message.html_body.contains(&token.plain));
        assert!(message.html_body.contains("/reset-password"));
    }

    #[test]
    fn notification_kinds_are_stable() {
        let account = account();
        let alert = Notification::LoginAlert(LoginAlertMail::new(
            &account,
            &DeviceFingerprint {
                os: "Linux".to_string(),
                browser: "Firefox".to_string(),
                ip: "10.0.0.1".to_string(),
                language: "en".to_string(),
                device_type: "Desktop".to_string(),
            },
        ));
        assert_eq!(alert.kind(), "login_alert");
        assert_eq!(alert.recipient(), "reader@example.com");
    }
}
