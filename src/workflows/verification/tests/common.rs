use std::sync::Arc;

use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::audit::{Actor, AuditAction, AuditEntry, AuditError, AuditSink};
use crate::directory::{Account, AccountDirectory, AccountId, DirectoryError, NewAccount, Role};
use crate::infra::{InMemoryAccountDirectory, InMemoryAuditSink, InMemoryVerificationRegistry};
use crate::workflows::verification::domain::{
    AdminVerificationRequest, CounselorApplication, VerificationId, VerificationRecord,
    VerificationStatus,
};
use crate::workflows::verification::registry::{RegistryError, VerificationRegistry};
use crate::workflows::verification::service::VerificationService;

pub(super) fn application() -> CounselorApplication {
    CounselorApplication {
        counselor_name: "Jane Rivera".to_string(),
        professional_affiliation: "State Counseling Board #88213".to_string(),
        institutional_email: "jane@inst.edu".to_string(),
        password: "quiet-harbor".to_string(),
        confirm_password: "quiet-harbor".to_string(),
    }
}

pub(super) fn admin_request(email: &str) -> AdminVerificationRequest {
    AdminVerificationRequest {
        counselor_account_id: None,
        counselor_name: "Marcus Bell".to_string(),
        professional_affiliation: "Riverside Clinic".to_string(),
        institutional_email: email.to_string(),
    }
}

pub(super) fn pending_record(id: &str, email: &str) -> VerificationRecord {
    VerificationRecord {
        id: VerificationId(id.to_string()),
        counselor_account_id: None,
        counselor_name: "Seeded Counselor".to_string(),
        professional_affiliation: "Seeded Clinic".to_string(),
        institutional_email: email.to_string(),
        status: VerificationStatus::Pending,
        request_date: Utc::now(),
    }
}

pub(super) fn admin() -> Actor {
    Actor::named("lead@console.local")
}

pub(super) type MemoryService =
    VerificationService<InMemoryVerificationRegistry, InMemoryAccountDirectory, InMemoryAuditSink>;

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryVerificationRegistry>,
    Arc<InMemoryAccountDirectory>,
    Arc<InMemoryAuditSink>,
) {
    let registry = Arc::new(InMemoryVerificationRegistry::default());
    let directory = Arc::new(InMemoryAccountDirectory::default());
    let audit = Arc::new(InMemoryAuditSink::default());
    let service = VerificationService::new(registry.clone(), directory.clone(), audit.clone());
    (service, registry, directory, audit)
}

pub(super) fn audit_codes(audit: &InMemoryAuditSink) -> Vec<AuditAction> {
    audit.entries().iter().map(|entry| entry.action).collect()
}

/// Registry whose writes always fail, for exercising the apply rollback path.
pub(super) struct UnavailableRegistry;

impl VerificationRegistry for UnavailableRegistry {
    fn create(&self, _record: VerificationRecord) -> Result<VerificationRecord, RegistryError> {
        Err(RegistryError::Unavailable("registry offline".to_string()))
    }

    fn find(&self, _id: &VerificationId) -> Result<Option<VerificationRecord>, RegistryError> {
        Ok(None)
    }

    fn update(&self, _record: VerificationRecord) -> Result<(), RegistryError> {
        Err(RegistryError::Unavailable("registry offline".to_string()))
    }

    fn delete(&self, _id: &VerificationId) -> Result<(), RegistryError> {
        Err(RegistryError::Unavailable("registry offline".to_string()))
    }

    fn list(
        &self,
        _status: Option<VerificationStatus>,
    ) -> Result<Vec<VerificationRecord>, RegistryError> {
        Ok(Vec::new())
    }
}

/// Directory wrapper that can be told to fail specific operations while the rest
/// delegate to a real in-memory directory.
#[derive(Default)]
pub(super) struct FlakyDirectory {
    pub(super) inner: InMemoryAccountDirectory,
    pub(super) fail_creates: bool,
    pub(super) fail_deletes: bool,
}

impl FlakyDirectory {
    fn refusal(&self) -> DirectoryError {
        DirectoryError::Unavailable("directory offline".to_string())
    }
}

impl AccountDirectory for FlakyDirectory {
    fn find_by_email(&self, email: &str) -> Result<Option<Account>, DirectoryError> {
        self.inner.find_by_email(email)
    }

    fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, DirectoryError> {
        self.inner.find_by_id(id)
    }

    fn list(&self) -> Result<Vec<Account>, DirectoryError> {
        self.inner.list()
    }

    fn create(&self, account: NewAccount, credential: &str) -> Result<Account, DirectoryError> {
        if self.fail_creates {
            return Err(self.refusal());
        }
        self.inner.create(account, credential)
    }

    fn update(&self, account: Account) -> Result<(), DirectoryError> {
        self.inner.update(account)
    }

    fn delete(&self, id: &AccountId) -> Result<(), DirectoryError> {
        if self.fail_deletes {
            return Err(self.refusal());
        }
        self.inner.delete(id)
    }

    fn ensure_role(&self, role: Role) -> Result<(), DirectoryError> {
        self.inner.ensure_role(role)
    }

    fn assign_role(&self, id: &AccountId, role: Role) -> Result<(), DirectoryError> {
        self.inner.assign_role(id, role)
    }

    fn remove_role(&self, id: &AccountId, role: Role) -> Result<(), DirectoryError> {
        self.inner.remove_role(id, role)
    }

    fn roles(&self, id: &AccountId) -> Result<Vec<Role>, DirectoryError> {
        self.inner.roles(id)
    }
}

/// Sink that refuses every append, for proving committed actions stay committed.
pub(super) struct FailingAuditSink;

impl AuditSink for FailingAuditSink {
    fn append(
        &self,
        _action: AuditAction,
        _performed_by: &Actor,
        _details: String,
    ) -> Result<AuditEntry, AuditError> {
        Err(AuditError::Unavailable("audit store offline".to_string()))
    }

    fn recent(&self, _count: usize) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(Vec::new())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
