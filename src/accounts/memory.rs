use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{Account, AccountLookup, LookupError};

/// In-memory account table keyed by username.
#[derive(Default)]
pub struct MemoryAccounts {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account.
    pub fn insert(&self, account: Account) {
        self.accounts
            .write()
            .unwrap()
            .insert(account.username.clone(), account);
    }

    /// Remove an account. Returns true if it existed.
    pub fn remove(&self, username: &str) -> bool {
        self.accounts.write().unwrap().remove(username).is_some()
    }
}

impl FromIterator<Account> for MemoryAccounts {
    fn from_iter<I: IntoIterator<Item = Account>>(iter: I) -> Self {
        let accounts = iter
            .into_iter()
            .map(|a| (a.username.clone(), a))
            .collect();
        Self {
            accounts: RwLock::new(accounts),
        }
    }
}

#[async_trait]
impl AccountLookup for MemoryAccounts {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<Account>, LookupError> {
        Ok(self.accounts.read().unwrap().get(subject).cloned())
    }
}
