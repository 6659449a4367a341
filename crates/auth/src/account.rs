//! Account records and the account store abstraction.
//!
//! # Invariants
//! - `id` and `role` are set at creation; `role` changes only through an
//!   explicit admin action (not modeled here).
//! - Only `Active` accounts may act (request permissions, mutate records).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pengadaan_core::{DomainError, DomainResult, UserId};

use crate::UserRole;

/// Account lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("active"),
            AccountStatus::Inactive => f.write_str("inactive"),
            AccountStatus::Suspended => f.write_str("suspended"),
        }
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create an account, normalizing and validating the email.
    pub fn new(
        id: UserId,
        email: impl Into<String>,
        display_name: impl Into<String>,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let email = email.into().trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        let display_name = display_name.into().trim().to_string();
        if display_name.is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        Ok(Self {
            id,
            email,
            display_name,
            role,
            status: AccountStatus::Active,
            created_at: now,
        })
    }

    /// Whether this account may currently act on the system.
    pub fn can_act(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Account store abstraction.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account; duplicate id or email is a conflict.
    async fn insert(&self, account: Account) -> DomainResult<()>;

    /// Fetch an account by id.
    async fn get(&self, id: UserId) -> DomainResult<Option<Account>>;

    /// Change an account's status, returning the updated record.
    async fn update_status(&self, id: UserId, status: AccountStatus) -> DomainResult<Account>;
}

/// In-memory account store for dev/test.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<UserId, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> DomainResult<()> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| DomainError::storage("account store lock poisoned"))?;

        if accounts.contains_key(&account.id) {
            return Err(DomainError::conflict("account already exists"));
        }
        if accounts.values().any(|a| a.email == account.email) {
            return Err(DomainError::conflict("email already registered"));
        }

        accounts.insert(account.id, account);
        Ok(())
    }

    async fn get(&self, id: UserId) -> DomainResult<Option<Account>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| DomainError::storage("account store lock poisoned"))?;
        Ok(accounts.get(&id).cloned())
    }

    async fn update_status(&self, id: UserId, status: AccountStatus) -> DomainResult<Account> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| DomainError::storage("account store lock poisoned"))?;

        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("account not found"))?;
        account.status = status;
        Ok(account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(email: &str) -> Account {
        Account::new(UserId::new(), email, "Someone", UserRole::User, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryAccountStore::new();
        let a = account("alice@example.com");
        store.insert(a.clone()).await.unwrap();

        let fetched = store.get(a.id).await.unwrap().unwrap();
        assert_eq!(fetched, a);
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let store = InMemoryAccountStore::new();
        store.insert(account("bob@example.com")).await.unwrap();

        let err = store.insert(account("bob@example.com")).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn email_is_normalized() {
        let a = Account::new(
            UserId::new(),
            "  Carol@Example.COM ",
            "Carol",
            UserRole::Admin,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(a.email, "carol@example.com");
    }

    #[test]
    fn rejects_invalid_email() {
        let err = Account::new(UserId::new(), "not-an-email", "Dave", UserRole::User, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn suspended_accounts_cannot_act() {
        let store = InMemoryAccountStore::new();
        let a = account("eve@example.com");
        store.insert(a.clone()).await.unwrap();

        let updated = store
            .update_status(a.id, AccountStatus::Suspended)
            .await
            .unwrap();
        assert!(!updated.can_act());
    }
}
