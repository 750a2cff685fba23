//! Postgres-backed account persistence. One store instance per role; the
//! role picks the table, everything else is shared.

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::account::errors::IdentityError;
use crate::domain::account::kind::Role;
use crate::domain::account::models::Account;
use crate::domain::account::models::AccountId;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::models::LoginAttempt;
use crate::domain::account::models::LoginOutcome;
use crate::domain::account::models::Mobile;
use crate::domain::account::models::SecondaryEmail;
use crate::domain::account::ports::AccountStore;

/// Column list shared by every SELECT so rows always decode into
/// [`AccountRow`] the same way.
const ACCOUNT_COLUMNS: &str = "id, email, mobile, secondary_emails, password_hash, \
     must_change_password, is_email_verified, email_verify_token_hash, \
     email_verify_token_expires_at, reset_token_hash, reset_token_expires_at, \
     designation, is_active, created_by, created_at, updated_at, \
     failed_logins, successful_logins";

/// Postgres implementation of [`AccountStore`].
///
/// Users and admins live in separate tables with identical shapes. The
/// table name comes from the configured role, so the same queries serve
/// both; this is also why the runtime query API is used here rather than
/// the compile-time checked macros, which require a literal table name.
#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: PgPool,
    role: Role,
}

impl PgAccountStore {
    pub fn new(pool: PgPool, role: Role) -> Self {
        Self { pool, role }
    }

    fn table(&self) -> &'static str {
        self.role.table()
    }
}

/// Flat row image of an account. JSON columns decode through
/// [`sqlx::types::Json`]; conversion into the domain entity happens in
/// `From<AccountRow>`.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    mobile: Option<String>,
    secondary_emails: Json<Vec<SecondaryEmail>>,
    password_hash: Option<String>,
    must_change_password: bool,
    is_email_verified: bool,
    email_verify_token_hash: Option<String>,
    email_verify_token_expires_at: Option<DateTime<Utc>>,
    reset_token_hash: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
    designation: Option<String>,
    is_active: bool,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    failed_logins: Json<Vec<LoginAttempt>>,
    successful_logins: Json<Vec<LoginAttempt>>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId(row.id),
            // Stored values were validated at registration time; re-running
            // registration policy here would strand rows written before a
            // policy change.
            email: EmailAddress::from_storage(row.email),
            mobile: row.mobile.map(Mobile::from_storage),
            secondary_emails: row.secondary_emails.0,
            password_hash: row.password_hash,
            must_change_password: row.must_change_password,
            is_email_verified: row.is_email_verified,
            email_verify_token_hash: row.email_verify_token_hash,
            email_verify_token_expires_at: row.email_verify_token_expires_at,
            reset_token_hash: row.reset_token_hash,
            reset_token_expires_at: row.reset_token_expires_at,
            designation: row.designation,
            is_active: row.is_active,
            created_by: row.created_by.map(AccountId),
            created_at: row.created_at,
            updated_at: row.updated_at,
            failed_logins: row.failed_logins.0,
            successful_logins: row.successful_logins.0,
        }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn insert(&self, account: Account) -> Result<Account, IdentityError> {
        let sql = format!(
            "INSERT INTO {} ({ACCOUNT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            self.table(),
        );

        sqlx::query(&sql)
            .bind(account.id.0)
            .bind(account.email.as_str())
            .bind(account.mobile.as_ref().map(|m| m.as_str()))
            .bind(Json(&account.secondary_emails))
            .bind(account.password_hash.as_deref())
            .bind(account.must_change_password)
            .bind(account.is_email_verified)
            .bind(account.email_verify_token_hash.as_deref())
            .bind(account.email_verify_token_expires_at)
            .bind(account.reset_token_hash.as_deref())
            .bind(account.reset_token_expires_at)
            .bind(account.designation.as_deref())
            .bind(account.is_active)
            .bind(account.created_by.map(|id| id.0))
            .bind(account.created_at)
            .bind(account.updated_at)
            .bind(Json(&account.failed_logins))
            .bind(Json(&account.successful_logins))
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &account))?;

        Ok(account)
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, IdentityError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE id = $1",
            self.table()
        );

        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IdentityError::DatabaseError(e.to_string()))?;

        Ok(row.map(Account::from))
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Account>, IdentityError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE email = $1",
            self.table()
        );

        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IdentityError::DatabaseError(e.to_string()))?;

        Ok(row.map(Account::from))
    }

    async fn email_taken_by_other_role(
        &self,
        email: &EmailAddress,
    ) -> Result<bool, IdentityError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE email = $1)",
            self.role.other().table()
        );

        sqlx::query_scalar::<_, bool>(&sql)
            .bind(email.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IdentityError::DatabaseError(e.to_string()))
    }

    async fn update(&self, account: Account) -> Result<Account, IdentityError> {
        // Login history is append-only and owned by append_login_attempt;
        // created_at and created_by never change after insert.
        let sql = format!(
            "UPDATE {} \
             SET email = $2, mobile = $3, secondary_emails = $4, password_hash = $5, \
                 must_change_password = $6, is_email_verified = $7, \
                 email_verify_token_hash = $8, email_verify_token_expires_at = $9, \
                 reset_token_hash = $10, reset_token_expires_at = $11, \
                 designation = $12, is_active = $13, updated_at = $14 \
             WHERE id = $1",
            self.table(),
        );

        let result = sqlx::query(&sql)
            .bind(account.id.0)
            .bind(account.email.as_str())
            .bind(account.mobile.as_ref().map(|m| m.as_str()))
            .bind(Json(&account.secondary_emails))
            .bind(account.password_hash.as_deref())
            .bind(account.must_change_password)
            .bind(account.is_email_verified)
            .bind(account.email_verify_token_hash.as_deref())
            .bind(account.email_verify_token_expires_at)
            .bind(account.reset_token_hash.as_deref())
            .bind(account.reset_token_expires_at)
            .bind(account.designation.as_deref())
            .bind(account.is_active)
            .bind(account.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &account))?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound(account.id.to_string()));
        }

        Ok(account)
    }

    async fn append_login_attempt(
        &self,
        id: &AccountId,
        attempt: LoginAttempt,
        outcome: LoginOutcome,
    ) -> Result<(), IdentityError> {
        let column = match outcome {
            LoginOutcome::Succeeded => "successful_logins",
            LoginOutcome::Failed => "failed_logins",
        };
        // JSONB concatenation keeps the write independent of the rest of the
        // row, so a concurrent update cannot drop an attempt.
        let sql = format!(
            "UPDATE {} SET {column} = {column} || $2 WHERE id = $1",
            self.table(),
        );

        let result = sqlx::query(&sql)
            .bind(id.0)
            .bind(Json(vec![attempt]))
            .execute(&self.pool)
            .await
            .map_err(|e| IdentityError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound(id.to_string()));
        }

        Ok(())
    }
}

/// Translate unique-constraint violations on insert or update into the
/// matching duplicate error; everything else stays a database error.
///
/// Both tables carry the same constraint suffixes (`users_email_key`,
/// `admins_mobile_key`, ...), so matching on the suffix serves either role.
fn map_unique_violation(e: sqlx::Error, account: &Account) -> IdentityError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(c) if c.ends_with("_email_key") => {
                    return IdentityError::EmailAlreadyRegistered(account.email.to_string());
                }
                Some(c) if c.ends_with("_mobile_key") => {
                    return IdentityError::MobileAlreadyRegistered(
                        account
                            .mobile
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_default(),
                    );
                }
                _ => {}
            }
        }
    }
    IdentityError::DatabaseError(e.to_string())
}
