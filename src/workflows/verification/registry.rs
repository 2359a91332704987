use super::domain::{VerificationId, VerificationRecord, VerificationStatus};

/// Storage abstraction for verification records, so the engine can be exercised
/// against in-memory and failing backends alike.
///
/// A failed `create` or `update` must leave prior state unchanged; the engine
/// relies on that to keep account and record mutations consistent.
pub trait VerificationRegistry: Send + Sync {
    fn create(&self, record: VerificationRecord) -> Result<VerificationRecord, RegistryError>;
    fn find(&self, id: &VerificationId) -> Result<Option<VerificationRecord>, RegistryError>;
    fn update(&self, record: VerificationRecord) -> Result<(), RegistryError>;
    fn delete(&self, id: &VerificationId) -> Result<(), RegistryError>;
    /// Records ordered by request date, newest first, optionally filtered by status.
    fn list(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<VerificationRecord>, RegistryError>;
}

/// Error enumeration for registry failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}
