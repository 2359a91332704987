use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{Actor, AuditAction, AuditSink, AuditTrail};
use crate::directory::{Account, AccountDirectory, AccountId, DirectoryError, NewAccount, Role};
use crate::workflows::verification::domain::{validate_email, ValidationError, MIN_PASSWORD_LEN};

/// Account plus its single effective role, as the console lists users.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    #[serde(flatten)]
    pub account: Account,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
}

impl CreateAccountRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "full_name" });
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAccountRequest {
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    pub role: Role,
}

impl UpdateAccountRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)
    }
}

/// Error raised by account administration.
#[derive(Debug, thiserror::Error)]
pub enum AccountAdminError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("administrators cannot delete their own account")]
    SelfDeletion,
    #[error("account not found")]
    NotFound,
}

/// Service over the directory and audit sink for admin account management.
pub struct AccountAdminService<D, A> {
    directory: Arc<D>,
    audit: Arc<A>,
}

impl<D, A> AccountAdminService<D, A>
where
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    pub fn new(directory: Arc<D>, audit: Arc<A>) -> Self {
        Self { directory, audit }
    }

    /// List accounts, substring-matching email and full name, then filtering by
    /// the single effective role.
    pub fn list(
        &self,
        search: Option<&str>,
        role_filter: Option<Role>,
    ) -> Result<Vec<AccountSummary>, AccountAdminError> {
        let needle = search.map(str::to_lowercase);
        let mut summaries = Vec::new();

        for account in self.directory.list()? {
            if let Some(needle) = &needle {
                let matches = account.email.to_lowercase().contains(needle)
                    || account.full_name.to_lowercase().contains(needle);
                if !matches {
                    continue;
                }
            }

            let role = self.directory.roles(&account.id)?.into_iter().next();
            if let Some(filter) = role_filter {
                if role != Some(filter) {
                    continue;
                }
            }

            summaries.push(AccountSummary { account, role });
        }

        Ok(summaries)
    }

    pub fn create(
        &self,
        request: CreateAccountRequest,
        actor: &Actor,
    ) -> Result<(AccountSummary, AuditTrail), AccountAdminError> {
        request.validate()?;

        let account = self.directory.create(
            NewAccount {
                email: request.email,
                full_name: request.full_name,
                is_active: true,
            },
            &request.password,
        )?;
        self.directory.ensure_role(request.role)?;
        self.directory.assign_role(&account.id, request.role)?;

        let audit = self.record_action(
            AuditAction::UserCreated,
            actor,
            format!("Created user {} as {}", account.email, request.role),
        );

        info!(account = %account.id, actor = %actor, "account created");
        Ok((
            AccountSummary {
                account,
                role: Some(request.role),
            },
            audit,
        ))
    }

    /// Overwrite profile fields and swap the effective role when it changed.
    pub fn update(
        &self,
        id: &AccountId,
        request: UpdateAccountRequest,
        actor: &Actor,
    ) -> Result<(AccountSummary, AuditTrail), AccountAdminError> {
        request.validate()?;

        let Some(mut account) = self.directory.find_by_id(id)? else {
            return Err(AccountAdminError::NotFound);
        };

        account.email = request.email;
        account.full_name = request.full_name;
        account.is_active = request.is_active;
        self.directory.update(account.clone())?;

        let current = self.directory.roles(id)?.into_iter().next();
        if current != Some(request.role) {
            if let Some(role) = current {
                self.directory.remove_role(id, role)?;
            }
            self.directory.ensure_role(request.role)?;
            self.directory.assign_role(id, request.role)?;
        }

        let audit = self.record_action(
            AuditAction::UserUpdated,
            actor,
            format!(
                "Updated profile for {}. Role: {}, Active: {}",
                account.email, request.role, request.is_active
            ),
        );

        info!(account = %account.id, actor = %actor, "account updated");
        Ok((
            AccountSummary {
                account,
                role: Some(request.role),
            },
            audit,
        ))
    }

    /// Remove an account. Admins cannot delete the account they are acting as,
    /// matched by audit identity against the account email.
    pub fn delete(
        &self,
        id: &AccountId,
        actor: &Actor,
    ) -> Result<AuditTrail, AccountAdminError> {
        let Some(account) = self.directory.find_by_id(id)? else {
            return Err(AccountAdminError::NotFound);
        };

        if actor.as_str().eq_ignore_ascii_case(&account.email) {
            return Err(AccountAdminError::SelfDeletion);
        }

        self.directory.delete(id)?;

        let audit = self.record_action(
            AuditAction::UserDeleted,
            actor,
            format!("Deleted account {}", account.email),
        );

        info!(account = %account.id, actor = %actor, "account deleted");
        Ok(audit)
    }

    fn record_action(&self, action: AuditAction, actor: &Actor, details: String) -> AuditTrail {
        match self.audit.append(action, actor, details) {
            Ok(entry) => AuditTrail::Recorded(entry),
            Err(error) => {
                warn!(code = action.code(), %error, "audit append failed for a committed action");
                AuditTrail::Unrecorded(error)
            }
        }
    }
}
