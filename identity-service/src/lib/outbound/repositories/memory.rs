//! In-memory account persistence for tests and local runs without Postgres.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::account::errors::IdentityError;
use crate::domain::account::kind::Role;
use crate::domain::account::models::Account;
use crate::domain::account::models::AccountId;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::models::LoginAttempt;
use crate::domain::account::models::LoginOutcome;
use crate::domain::account::ports::AccountStore;

#[derive(Debug, Default)]
struct RoleTables {
    users: HashMap<Uuid, Account>,
    admins: HashMap<Uuid, Account>,
}

impl RoleTables {
    fn table(&self, role: Role) -> &HashMap<Uuid, Account> {
        match role {
            Role::User => &self.users,
            Role::Admin => &self.admins,
        }
    }

    fn table_mut(&mut self, role: Role) -> &mut HashMap<Uuid, Account> {
        match role {
            Role::User => &mut self.users,
            Role::Admin => &mut self.admins,
        }
    }
}

/// [`AccountStore`] backed by process memory.
///
/// Both role stores share the same tables, so the cross-role email check
/// behaves as it does against the real database.
#[derive(Debug, Clone)]
pub struct InMemoryAccountStore {
    inner: Arc<RwLock<RoleTables>>,
    role: Role,
}

impl InMemoryAccountStore {
    /// Build the user-side and admin-side stores over one shared state.
    pub fn pair() -> (InMemoryAccountStore, InMemoryAccountStore) {
        let inner = Arc::new(RwLock::new(RoleTables::default()));
        (
            Self {
                inner: Arc::clone(&inner),
                role: Role::User,
            },
            Self {
                inner,
                role: Role::Admin,
            },
        )
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> Result<Account, IdentityError> {
        let mut tables = self.inner.write().await;
        let table = tables.table_mut(self.role);

        if table.values().any(|a| a.email == account.email) {
            return Err(IdentityError::EmailAlreadyRegistered(
                account.email.to_string(),
            ));
        }
        if let Some(mobile) = &account.mobile {
            if table
                .values()
                .any(|a| a.mobile.as_ref() == Some(mobile))
            {
                return Err(IdentityError::MobileAlreadyRegistered(mobile.to_string()));
            }
        }

        table.insert(account.id.0, account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, IdentityError> {
        let tables = self.inner.read().await;
        Ok(tables.table(self.role).get(&id.0).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Account>, IdentityError> {
        let tables = self.inner.read().await;
        Ok(tables
            .table(self.role)
            .values()
            .find(|a| &a.email == email)
            .cloned())
    }

    async fn email_taken_by_other_role(
        &self,
        email: &EmailAddress,
    ) -> Result<bool, IdentityError> {
        let tables = self.inner.read().await;
        Ok(tables
            .table(self.role.other())
            .values()
            .any(|a| &a.email == email))
    }

    async fn update(&self, account: Account) -> Result<Account, IdentityError> {
        let mut tables = self.inner.write().await;
        let table = tables.table_mut(self.role);

        let Some(stored) = table.get_mut(&account.id.0) else {
            return Err(IdentityError::NotFound(account.id.to_string()));
        };

        // Login history is owned by append_login_attempt, and provenance
        // fields never change after insert; keep the stored values.
        let mut next = account;
        next.failed_logins = stored.failed_logins.clone();
        next.successful_logins = stored.successful_logins.clone();
        next.created_at = stored.created_at;
        next.created_by = stored.created_by;

        *stored = next.clone();
        Ok(next)
    }

    async fn append_login_attempt(
        &self,
        id: &AccountId,
        attempt: LoginAttempt,
        outcome: LoginOutcome,
    ) -> Result<(), IdentityError> {
        let mut tables = self.inner.write().await;
        let Some(stored) = tables.table_mut(self.role).get_mut(&id.0) else {
            return Err(IdentityError::NotFound(id.to_string()));
        };

        match outcome {
            LoginOutcome::Succeeded => stored.successful_logins.push(attempt),
            LoginOutcome::Failed => stored.failed_logins.push(attempt),
        }

        Ok(())
    }
}
