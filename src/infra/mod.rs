//! In-process adapters for the registry, directory, and audit contracts, plus the
//! startup seeding routine. The default server wiring and the test suites run
//! against these; a database-backed deployment swaps them behind the same traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use crate::audit::{Actor, AuditAction, AuditEntry, AuditError, AuditSink};
use crate::config::BootstrapConfig;
use crate::directory::{
    Account, AccountDirectory, AccountId, DirectoryError, NewAccount, Role,
};
use crate::workflows::verification::registry::{RegistryError, VerificationRegistry};
use crate::workflows::verification::{VerificationId, VerificationRecord, VerificationStatus};

#[derive(Default)]
pub struct InMemoryVerificationRegistry {
    records: Mutex<HashMap<VerificationId, VerificationRecord>>,
}

impl VerificationRegistry for InMemoryVerificationRegistry {
    fn create(&self, record: VerificationRecord) -> Result<VerificationRecord, RegistryError> {
        let mut guard = self.records.lock().expect("registry mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RegistryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn find(&self, id: &VerificationId) -> Result<Option<VerificationRecord>, RegistryError> {
        let guard = self.records.lock().expect("registry mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, record: VerificationRecord) -> Result<(), RegistryError> {
        let mut guard = self.records.lock().expect("registry mutex poisoned");
        if !guard.contains_key(&record.id) {
            return Err(RegistryError::NotFound);
        }
        guard.insert(record.id.clone(), record);
        Ok(())
    }

    fn delete(&self, id: &VerificationId) -> Result<(), RegistryError> {
        let mut guard = self.records.lock().expect("registry mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RegistryError::NotFound)
    }

    fn list(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<VerificationRecord>, RegistryError> {
        let guard = self.records.lock().expect("registry mutex poisoned");
        let mut records: Vec<VerificationRecord> = guard
            .values()
            .filter(|record| status.map_or(true, |wanted| record.status == wanted))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.request_date
                .cmp(&a.request_date)
                .then_with(|| b.id.0.cmp(&a.id.0))
        });
        Ok(records)
    }
}

#[derive(Default)]
struct DirectoryState {
    accounts: HashMap<AccountId, Account>,
    credentials: HashMap<AccountId, String>,
    known_roles: Vec<Role>,
    assignments: HashMap<AccountId, Vec<Role>>,
}

#[derive(Default)]
pub struct InMemoryAccountDirectory {
    state: Mutex<DirectoryState>,
}

impl AccountDirectory for InMemoryAccountDirectory {
    fn find_by_email(&self, email: &str) -> Result<Option<Account>, DirectoryError> {
        let guard = self.state.lock().expect("directory mutex poisoned");
        Ok(guard
            .accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, DirectoryError> {
        let guard = self.state.lock().expect("directory mutex poisoned");
        Ok(guard.accounts.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Account>, DirectoryError> {
        let guard = self.state.lock().expect("directory mutex poisoned");
        let mut accounts: Vec<Account> = guard.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(accounts)
    }

    fn create(&self, account: NewAccount, credential: &str) -> Result<Account, DirectoryError> {
        let mut guard = self.state.lock().expect("directory mutex poisoned");
        if guard
            .accounts
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(DirectoryError::DuplicateEmail(account.email));
        }

        let stored = Account {
            id: AccountId(Uuid::new_v4().to_string()),
            email: account.email,
            full_name: account.full_name,
            is_active: account.is_active,
        };
        guard
            .credentials
            .insert(stored.id.clone(), credential.to_string());
        guard.accounts.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn update(&self, account: Account) -> Result<(), DirectoryError> {
        let mut guard = self.state.lock().expect("directory mutex poisoned");
        if !guard.accounts.contains_key(&account.id) {
            return Err(DirectoryError::NotFound);
        }
        guard.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    fn delete(&self, id: &AccountId) -> Result<(), DirectoryError> {
        let mut guard = self.state.lock().expect("directory mutex poisoned");
        if guard.accounts.remove(id).is_none() {
            return Err(DirectoryError::NotFound);
        }
        guard.credentials.remove(id);
        guard.assignments.remove(id);
        Ok(())
    }

    fn ensure_role(&self, role: Role) -> Result<(), DirectoryError> {
        let mut guard = self.state.lock().expect("directory mutex poisoned");
        if !guard.known_roles.contains(&role) {
            guard.known_roles.push(role);
        }
        Ok(())
    }

    fn assign_role(&self, id: &AccountId, role: Role) -> Result<(), DirectoryError> {
        let mut guard = self.state.lock().expect("directory mutex poisoned");
        if !guard.accounts.contains_key(id) {
            return Err(DirectoryError::NotFound);
        }
        let roles = guard.assignments.entry(id.clone()).or_default();
        if !roles.contains(&role) {
            roles.push(role);
        }
        Ok(())
    }

    fn remove_role(&self, id: &AccountId, role: Role) -> Result<(), DirectoryError> {
        let mut guard = self.state.lock().expect("directory mutex poisoned");
        if !guard.accounts.contains_key(id) {
            return Err(DirectoryError::NotFound);
        }
        if let Some(roles) = guard.assignments.get_mut(id) {
            roles.retain(|assigned| *assigned != role);
        }
        Ok(())
    }

    fn roles(&self, id: &AccountId) -> Result<Vec<Role>, DirectoryError> {
        let guard = self.state.lock().expect("directory mutex poisoned");
        Ok(guard.assignments.get(id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    sequence: AtomicU64,
}

impl InMemoryAuditSink {
    /// Full trail in append order, for assertions and demos.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn append(
        &self,
        action: AuditAction,
        performed_by: &Actor,
        details: String,
    ) -> Result<AuditEntry, AuditError> {
        let entry = AuditEntry {
            id: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            action,
            performed_by: performed_by.as_str().to_string(),
            details,
            timestamp: Utc::now(),
        };
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry.clone());
        Ok(entry)
    }

    fn recent(&self, count: usize) -> Result<Vec<AuditEntry>, AuditError> {
        let guard = self.entries.lock().expect("audit mutex poisoned");
        let mut entries: Vec<AuditEntry> = guard.clone();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        entries.truncate(count);
        Ok(entries)
    }
}

/// Ensure the well-known roles and the bootstrap administrator exist. Safe to run
/// on every startup.
pub fn seed_directory<D: AccountDirectory>(
    directory: &D,
    bootstrap: &BootstrapConfig,
) -> Result<(), DirectoryError> {
    for role in Role::ALL {
        directory.ensure_role(role)?;
    }

    if directory.find_by_email(&bootstrap.admin_email)?.is_none() {
        let account = directory.create(
            NewAccount {
                email: bootstrap.admin_email.clone(),
                full_name: bootstrap.admin_name.clone(),
                is_active: true,
            },
            &bootstrap.admin_credential,
        )?;
        directory.assign_role(&account.id, Role::Admin)?;
    }

    Ok(())
}
