use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{Actor, AuditAction, AuditSink, AuditTrail};
use crate::directory::{Account, AccountDirectory, AccountId, DirectoryError, NewAccount, Role};

use super::domain::{
    AdminVerificationRequest, CounselorApplication, Decision, ValidationError, VerificationId,
    VerificationOverride, VerificationRecord, VerificationStatus,
};
use super::registry::{RegistryError, VerificationRegistry};

/// Engine composing the registry, account directory, and audit sink into the
/// verification state machine.
///
/// Approve and reject run the guarded `Pending -> Verified | Rejected` transition;
/// the edit override is the one deliberately unchecked path and never shares code
/// with them.
pub struct VerificationService<R, D, A> {
    registry: Arc<R>,
    directory: Arc<D>,
    audit: Arc<A>,
}

static RECORD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_record_id() -> VerificationId {
    let id = RECORD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    VerificationId(format!("vr-{id:06}"))
}

/// Credential generated for accounts the activation procedure has to create,
/// returned to the caller instead of living in the code.
#[derive(Clone, PartialEq, Eq)]
pub struct OneTimeCredential(String);

impl OneTimeCredential {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OneTimeCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OneTimeCredential(..)")
    }
}

/// How the activation procedure satisfied "an active account exists and is linked".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// An account already existed for the institutional email; it was activated if
    /// necessary and the record linkage backfilled if missing.
    Existing {
        account_id: AccountId,
        was_active: bool,
    },
    /// No account matched; one was created active, with role `Counselor` and a
    /// generated one-time credential.
    Created {
        account_id: AccountId,
        credential: OneTimeCredential,
    },
}

impl Activation {
    pub fn account_id(&self) -> &AccountId {
        match self {
            Activation::Existing { account_id, .. } | Activation::Created { account_id, .. } => {
                account_id
            }
        }
    }

    pub fn issued_credential(&self) -> Option<&OneTimeCredential> {
        match self {
            Activation::Created { credential, .. } => Some(credential),
            Activation::Existing { .. } => None,
        }
    }
}

/// Activation could not find or create an account for the record's email.
#[derive(Debug, thiserror::Error)]
pub enum LinkageError {
    #[error("directory lookup for '{email}' failed: {source}")]
    Lookup {
        email: String,
        source: DirectoryError,
    },
    #[error("could not provision an account for '{email}': {source}")]
    Provision {
        email: String,
        source: DirectoryError,
    },
    #[error("could not persist activation of account {account_id}: {source}")]
    Persist {
        account_id: AccountId,
        source: DirectoryError,
    },
}

/// Error raised by the verification workflow engine.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("an account already exists for '{0}'; the application was not recorded")]
    EmailTaken(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Linkage(#[from] LinkageError),
    #[error("account {account_id} could not be rolled back after a failed enrollment: {rollback}")]
    OrphanedAccount {
        account_id: AccountId,
        source: Box<WorkflowError>,
        rollback: DirectoryError,
    },
    #[error("verification record not found")]
    RecordNotFound,
}

/// Outcome of an approve call. Absent and already-decided records are tolerated
/// rather than treated as errors, and neither produces an audit entry.
#[derive(Debug)]
pub enum ApproveOutcome {
    Approved {
        record: VerificationRecord,
        activation: Activation,
        audit: AuditTrail,
    },
    AlreadyDecided(VerificationRecord),
    NotFound,
}

/// Outcome of a reject call. The linked account is never touched on this path.
#[derive(Debug)]
pub enum RejectOutcome {
    Rejected {
        record: VerificationRecord,
        audit: AuditTrail,
    },
    AlreadyDecided(VerificationRecord),
    NotFound,
}

/// Outcome of a delete call.
#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted {
        record: VerificationRecord,
        audit: AuditTrail,
    },
    NotFound,
}

/// Result of admin-initiated creation. A linkage failure is reported, not rolled
/// back: the record stays verified with no linked account.
#[derive(Debug)]
pub struct AdminCreation {
    pub record: VerificationRecord,
    pub activation: Result<Activation, LinkageError>,
    pub audit: AuditTrail,
}

impl<R, D, A> VerificationService<R, D, A>
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    pub fn new(registry: Arc<R>, directory: Arc<D>, audit: Arc<A>) -> Self {
        Self {
            registry,
            directory,
            audit,
        }
    }

    /// Self-service counselor application: an inactive `Counselor` account plus a
    /// pending record, created as one logical transaction.
    ///
    /// Re-application with an email already bound to any account is rejected; the
    /// check runs before anything is created. If the record cannot be persisted
    /// after the account was, the account is rolled back; a failed rollback is
    /// surfaced as an orphaned-account error, never dropped.
    ///
    /// No audit entry: the trail records administrative decisions, not applicant
    /// self-service.
    pub fn apply(
        &self,
        application: CounselorApplication,
    ) -> Result<VerificationRecord, WorkflowError> {
        application.validate()?;

        if self
            .directory
            .find_by_email(&application.institutional_email)?
            .is_some()
        {
            return Err(WorkflowError::EmailTaken(application.institutional_email));
        }

        let account = self.directory.create(
            NewAccount {
                email: application.institutional_email.clone(),
                full_name: application.counselor_name.clone(),
                is_active: false,
            },
            &application.password,
        )?;

        let record = VerificationRecord {
            id: next_record_id(),
            counselor_account_id: Some(account.id.clone()),
            counselor_name: application.counselor_name,
            professional_affiliation: application.professional_affiliation,
            institutional_email: application.institutional_email,
            status: VerificationStatus::Pending,
            request_date: Utc::now(),
        };

        let stored = match self.enroll(&account, record) {
            Ok(stored) => stored,
            Err(source) => return Err(self.unwind_account(account, source)),
        };

        info!(record = %stored.id, "counselor application submitted");
        Ok(stored)
    }

    fn enroll(
        &self,
        account: &Account,
        record: VerificationRecord,
    ) -> Result<VerificationRecord, WorkflowError> {
        self.directory.ensure_role(Role::Counselor)?;
        self.directory.assign_role(&account.id, Role::Counselor)?;
        Ok(self.registry.create(record)?)
    }

    fn unwind_account(&self, account: Account, source: WorkflowError) -> WorkflowError {
        match self.directory.delete(&account.id) {
            Ok(()) => source,
            Err(rollback) => {
                warn!(account = %account.id, error = %rollback, "rollback failed, account orphaned");
                WorkflowError::OrphanedAccount {
                    account_id: account.id,
                    source: Box::new(source),
                    rollback,
                }
            }
        }
    }

    /// Admin-initiated creation: the record is persisted `Verified` outright and
    /// never passes through `Pending`, then the activation procedure runs.
    pub fn create_by_admin(
        &self,
        request: AdminVerificationRequest,
        actor: &Actor,
    ) -> Result<AdminCreation, WorkflowError> {
        request.validate()?;

        let record = VerificationRecord {
            id: next_record_id(),
            counselor_account_id: request.counselor_account_id,
            counselor_name: request.counselor_name,
            professional_affiliation: request.professional_affiliation,
            institutional_email: request.institutional_email,
            status: VerificationStatus::Verified,
            request_date: Utc::now(),
        };

        let mut record = self.registry.create(record)?;

        let activation = self.ensure_activated(&mut record);
        match &activation {
            Ok(_) => self.registry.update(record.clone())?,
            Err(error) => {
                warn!(record = %record.id, %error, "verified record left without a linked account")
            }
        }

        let audit = self.record_action(
            AuditAction::VerificationCreated,
            actor,
            format!("Created pre-verified record for {}.", record.counselor_name),
        );

        info!(record = %record.id, actor = %actor, "verification created by admin");
        Ok(AdminCreation {
            record,
            activation,
            audit,
        })
    }

    /// Approve a pending request. Activation runs before the status flips so no
    /// reader observes a verified record without an active account; on this path a
    /// linkage failure blocks the transition and the record stays pending.
    pub fn approve(
        &self,
        id: &VerificationId,
        actor: &Actor,
    ) -> Result<ApproveOutcome, WorkflowError> {
        let Some(mut record) = self.registry.find(id)? else {
            return Ok(ApproveOutcome::NotFound);
        };
        let Some(next) = record.status.transition(Decision::Approve) else {
            return Ok(ApproveOutcome::AlreadyDecided(record));
        };

        let activation = self.ensure_activated(&mut record)?;
        record.status = next;
        self.registry.update(record.clone())?;

        let audit = self.record_action(
            AuditAction::VerificationApproved,
            actor,
            format!("Approved counselor {}.", record.counselor_name),
        );

        info!(record = %record.id, actor = %actor, "verification approved");
        Ok(ApproveOutcome::Approved {
            record,
            activation,
            audit,
        })
    }

    /// Reject a pending request. The linked account keeps whatever state it has;
    /// rejection does not retroactively destroy an account that may serve other
    /// roles.
    pub fn reject(
        &self,
        id: &VerificationId,
        actor: &Actor,
    ) -> Result<RejectOutcome, WorkflowError> {
        let Some(mut record) = self.registry.find(id)? else {
            return Ok(RejectOutcome::NotFound);
        };
        let Some(next) = record.status.transition(Decision::Reject) else {
            return Ok(RejectOutcome::AlreadyDecided(record));
        };

        record.status = next;
        self.registry.update(record.clone())?;

        let audit = self.record_action(
            AuditAction::VerificationRejected,
            actor,
            format!("Rejected counselor {}", record.counselor_name),
        );

        info!(record = %record.id, actor = %actor, "verification rejected");
        Ok(RejectOutcome::Rejected { record, audit })
    }

    /// Administrative override: overwrites every field with no transition checks.
    /// This is the documented escape hatch around the state machine; an absent
    /// record is an error here, not a tolerated no-op.
    pub fn edit_override(
        &self,
        id: &VerificationId,
        fields: VerificationOverride,
    ) -> Result<VerificationRecord, WorkflowError> {
        if self.registry.find(id)?.is_none() {
            return Err(WorkflowError::RecordNotFound);
        }

        let record = VerificationRecord {
            id: id.clone(),
            counselor_account_id: fields.counselor_account_id,
            counselor_name: fields.counselor_name,
            professional_affiliation: fields.professional_affiliation,
            institutional_email: fields.institutional_email,
            status: fields.status,
            request_date: fields.request_date,
        };
        self.registry.update(record.clone())?;

        warn!(record = %record.id, status = record.status.label(), "record overwritten via edit override");
        Ok(record)
    }

    /// Unconditional removal of a record; the linked account is untouched.
    pub fn delete(
        &self,
        id: &VerificationId,
        actor: &Actor,
    ) -> Result<DeleteOutcome, WorkflowError> {
        let Some(record) = self.registry.find(id)? else {
            return Ok(DeleteOutcome::NotFound);
        };

        self.registry.delete(id)?;

        let audit = self.record_action(
            AuditAction::VerificationDeleted,
            actor,
            format!("Deleted verification request for {}", record.counselor_name),
        );

        info!(record = %record.id, actor = %actor, "verification deleted");
        Ok(DeleteOutcome::Deleted { record, audit })
    }

    pub fn find(&self, id: &VerificationId) -> Result<Option<VerificationRecord>, WorkflowError> {
        Ok(self.registry.find(id)?)
    }

    pub fn list(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<VerificationRecord>, WorkflowError> {
        Ok(self.registry.list(status)?)
    }

    /// The shared activation procedure: ensure an account exists for the record's
    /// institutional email, is active, and is linked. Idempotent by construction --
    /// a second run on an already-active, already-linked record changes nothing.
    fn ensure_activated(
        &self,
        record: &mut VerificationRecord,
    ) -> Result<Activation, LinkageError> {
        let email = record.institutional_email.clone();

        let found = self
            .directory
            .find_by_email(&email)
            .map_err(|source| LinkageError::Lookup {
                email: email.clone(),
                source,
            })?;

        if let Some(mut account) = found {
            let was_active = account.is_active;
            if !account.is_active {
                account.is_active = true;
                self.directory
                    .update(account.clone())
                    .map_err(|source| LinkageError::Persist {
                        account_id: account.id.clone(),
                        source,
                    })?;
            }
            if record.counselor_account_id.is_none() {
                record.counselor_account_id = Some(account.id.clone());
            }
            return Ok(Activation::Existing {
                account_id: account.id,
                was_active,
            });
        }

        let credential = OneTimeCredential::generate();
        let account = self
            .directory
            .create(
                NewAccount {
                    email: email.clone(),
                    full_name: record.counselor_name.clone(),
                    is_active: true,
                },
                credential.reveal(),
            )
            .map_err(|source| LinkageError::Provision {
                email: email.clone(),
                source,
            })?;

        self.directory
            .ensure_role(Role::Counselor)
            .and_then(|()| self.directory.assign_role(&account.id, Role::Counselor))
            .map_err(|source| LinkageError::Provision { email, source })?;

        record.counselor_account_id = Some(account.id.clone());
        Ok(Activation::Created {
            account_id: account.id,
            credential,
        })
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
