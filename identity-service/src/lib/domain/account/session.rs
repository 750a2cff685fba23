use auth::JwtCodec;
use auth::JwtError;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::account::kind::Role;
use crate::account::models::Account;
use crate::account::models::DeviceFingerprint;

/// Claims carried by a session token.
///
/// The permission snapshot is taken at login time; changing an account's
/// designation does not rewrite tokens already in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Unique token identifier.
    pub jti: String,
    /// Account ID the session belongs to.
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    pub permissions: Vec<String>,
    /// Device the session was opened from.
    pub device: DeviceFingerprint,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
}

/// Access/refresh token pair returned by a successful login.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and validates signed session tokens.
///
/// Sessions are stateless: validation checks signature and expiry only,
/// with no server-side session record to consult.
pub struct SessionTokenIssuer {
    codec: JwtCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionTokenIssuer {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            codec: JwtCodec::new(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue an access/refresh pair for a freshly authenticated account.
    ///
    /// # Arguments
    /// * `account` - Authenticated account
    /// * `role` - Role of the account's collection
    /// * `permissions` - Permission snapshot for the role and designation
    /// * `device` - Device the login came from
    ///
    /// # Errors
    /// * `EncodingFailed` - Token could not be signed
    pub fn issue_pair(
        &self,
        account: &Account,
        role: Role,
        permissions: Vec<String>,
        device: &DeviceFingerprint,
    ) -> Result<SessionTokens, JwtError> {
        let access_token =
            self.codec
                .encode(&self.claims(account, role, permissions.clone(), device, self.access_ttl))?;
        let refresh_token =
            self.codec
                .encode(&self.claims(account, role, permissions, device, self.refresh_ttl))?;
        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    /// Validate a presented token and recover its claims.
    ///
    /// # Errors
    /// * `TokenExpired` - Token expiry has passed
    /// * `InvalidToken` - Signature or structure is invalid
    pub fn validate(&self, token: &str) -> Result<SessionClaims, JwtError> {
        self.codec.decode(token)
    }

    fn claims(
        &self,
        account: &Account,
        role: Role,
        permissions: Vec<String>,
        device: &DeviceFingerprint,
        ttl: Duration,
    ) -> SessionClaims {
        let now = Utc::now();
        SessionClaims {
            jti: Uuid::new_v4().to_string(),
            sub: account.id.to_string(),
            role,
            designation: account.designation.clone(),
            permissions,
            device: device.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::kind::AccountKind;
    use crate::account::kind::UserKind;
    use crate::account::models::EmailAddress;

    const SECRET: &[u8] = b"a-test-secret-that-is-long-enough";

    fn account() -> Account {
        Account::new(
            EmailAddress::new("reader@example.com".to_string()).unwrap(),
            None,
            None,
            None,
        )
    }

    fn device() -> DeviceFingerprint {
        DeviceFingerprint {
            os: "macOS".to_string(),
            browser: "Safari".to_string(),
            ip: "203.0.113.9".to_string(),
            language: "en".to_string(),
            device_type: "Desktop".to_string(),
        }
    }

    #[test]
    fn issued_pair_round_trips_through_validation() {
        let issuer = SessionTokenIssuer::new(SECRET, Duration::minutes(15), Duration::days(7));
        let account = account();
        let tokens = issuer
            .issue_pair(&account, Role::User, UserKind::permissions(None), &device())
            .unwrap();

        let claims = issuer.validate(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.device.browser, "Safari");
        assert!(claims.permissions.contains(&"catalog:read".to_string()));
    }

    #[test]
    fn refresh_token_outlives_access_token() {
        let issuer = SessionTokenIssuer::new(SECRET, Duration::minutes(15), Duration::days(7));
        let tokens = issuer
            .issue_pair(&account(), Role::User, vec![], &device())
            .unwrap();

        let access = issuer.validate(&tokens.access_token).unwrap();
        let refresh = issuer.validate(&tokens.refresh_token).unwrap();
        assert!(refresh.exp > access.exp);
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn validation_rejects_foreign_signature() {
        let issuer = SessionTokenIssuer::new(SECRET, Duration::minutes(15), Duration::days(7));
        let other = SessionTokenIssuer::new(b"another-secret-of-decent-length!", Duration::minutes(15), Duration::days(7));
        let tokens = issuer
            .issue_pair(&account(), Role::User, vec![], &device())
            .unwrap();

        assert!(other.validate(&tokens.access_token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = SessionTokenIssuer::new(SECRET, Duration::minutes(-5), Duration::days(7));
        let tokens = issuer
            .issue_pair(&account(), Role::User, vec![], &device())
            .unwrap();

        assert!(matches!(
            issuer.validate(&tokens.access_token),
            Err(JwtError::TokenExpired)
        ));
    }
}
