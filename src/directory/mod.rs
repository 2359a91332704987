//! Account directory contract: the identity store the workflows create, activate,
//! and assign roles against. The console consumes this capability; it does not
//! reimplement identity internals (credential hashing, sessions) behind it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier wrapper for directory accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Roles meaningful to the console. The workflows treat each account as holding at
/// most one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Counselor,
    Guardian,
    Adolescent,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Counselor, Role::Guardian, Role::Adolescent];

    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Counselor => "Counselor",
            Role::Guardian => "Guardian",
            Role::Adolescent => "Adolescent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownRole(value.to_string()))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

/// A user identity as the directory exposes it to the workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
}

/// Fields for a not-yet-persisted account. The directory assigns the id.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
}

/// Storage-backed identity directory consumed by the workflows. Implementations
/// guard their own state; callers hold them behind `Arc`.
pub trait AccountDirectory: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<Account>, DirectoryError>;
    fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, DirectoryError>;
    fn list(&self) -> Result<Vec<Account>, DirectoryError>;
    fn create(&self, account: NewAccount, credential: &str) -> Result<Account, DirectoryError>;
    fn update(&self, account: Account) -> Result<(), DirectoryError>;
    fn delete(&self, id: &AccountId) -> Result<(), DirectoryError>;
    fn ensure_role(&self, role: Role) -> Result<(), DirectoryError>;
    fn assign_role(&self, id: &AccountId, role: Role) -> Result<(), DirectoryError>;
    fn remove_role(&self, id: &AccountId, role: Role) -> Result<(), DirectoryError>;
    fn roles(&self, id: &AccountId) -> Result<Vec<Role>, DirectoryError>;
}

/// Error enumeration for directory failures.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("an account with email '{0}' already exists")]
    DuplicateEmail(String),
    #[error("account not found")]
    NotFound,
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}
