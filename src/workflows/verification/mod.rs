//! Counselor credential verification: the state machine coupling a verification
//! record's `Pending -> Verified | Rejected` lifecycle to account activation and
//! the audit trail.

pub mod domain;
pub mod registry;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    AdminVerificationRequest, CounselorApplication, Decision, ValidationError, VerificationId,
    VerificationOverride, VerificationRecord, VerificationStatus, MIN_PASSWORD_LEN,
};
pub use registry::{RegistryError, VerificationRegistry};
pub use router::verification_router;
pub use service::{
    Activation, AdminCreation, ApproveOutcome, DeleteOutcome, LinkageError, OneTimeCredential,
    RejectOutcome, VerificationService, WorkflowError,
};
