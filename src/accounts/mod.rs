//! Account lookup capability used by the request gate and login.
//!
//! Backends are picked when the app is built: the SQLite [`Database`] in
//! production, [`MemoryAccounts`] for tests and embedding.
//!
//! [`Database`]: crate::db::Database

mod memory;

use async_trait::async_trait;

pub use memory::MemoryAccounts;

/// An account as seen by authentication: who it is and what it may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Unique login identifier, also the token subject
    pub username: String,
    /// Stored password hash (PHC string)
    pub password_hash: String,
    /// Granted authorities, e.g. `ROLE_USER`
    pub authorities: Vec<String>,
}

/// Storage failure while resolving an account.
#[derive(Debug)]
pub enum LookupError {
    Storage(sqlx::Error),
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupError::Storage(e) => write!(f, "Account storage error: {}", e),
        }
    }
}

impl std::error::Error for LookupError {}

impl From<sqlx::Error> for LookupError {
    fn from(e: sqlx::Error) -> Self {
        LookupError::Storage(e)
    }
}

/// Resolve a token subject to the account's current credentials and roles.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    /// `Ok(None)` means no such account; `Err` means storage could not answer.
    async fn find_by_subject(&self, subject: &str) -> Result<Option<Account>, LookupError>;
}
